//! Immutable query trees
//!
//! A [`QueryTree`] mirrors the association paths used by a query: the root
//! node is the queried model and every child is one joined association.
//! Trees are only ever changed through reducers that consume a tree and
//! return the next one, so a partially built tree can be shared or retried
//! freely.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::associations::{Association, JoinStep, resolve_join};

use super::query::Operator;

/// `column <operator> value` against the node it is attached to
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
	pub column: String,
	pub operator: Operator,
	pub value: JsonValue,
}

impl WhereClause {
	pub fn new(column: impl Into<String>, operator: Operator, value: JsonValue) -> Self {
		Self {
			column: column.into(),
			operator,
			value,
		}
	}
}

/// Where clauses combined with `AND`, `OR` and `NOT`, each bound to the
/// alias of the node it applies to
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseGroup {
	Clause { alias: String, clause: WhereClause },
	All(Vec<ClauseGroup>),
	Any(Vec<ClauseGroup>),
	Not(Box<ClauseGroup>),
}

/// Hands out unique table aliases for one query build
///
/// # Examples
///
/// ```
/// use lattice_db::orm::tree::AliasCounter;
///
/// let mut counter = AliasCounter::default();
/// assert_eq!(counter.next("authors"), "authors_1");
/// assert_eq!(counter.next("authors"), "authors_2");
/// assert_eq!(counter.next("tags"), "tags_1");
/// ```
#[derive(Debug, Default)]
pub struct AliasCounter {
	counts: HashMap<String, usize>,
}

impl AliasCounter {
	pub fn next(&mut self, table: &str) -> String {
		let count = self.counts.entry(table.to_string()).or_insert(0);
		*count += 1;
		format!("{}_{}", table, count)
	}
}

/// One node of a query tree
#[derive(Debug, Clone)]
pub struct QueryTree {
	pub alias: String,
	pub model: String,
	pub table: String,
	/// Association joined to reach this node; `None` at the root
	pub association: Option<Arc<Association>>,
	pub where_clauses: Vec<WhereClause>,
	/// Boolean groups spanning any nodes; only set on the root
	pub groups: Vec<ClauseGroup>,
	/// Joined associations keyed by attribute name
	pub children: IndexMap<String, QueryTree>,
}

impl QueryTree {
	/// Root node, aliased by its own table name
	pub fn root(model: impl Into<String>, table: impl Into<String>) -> Self {
		let table = table.into();
		Self {
			alias: table.clone(),
			model: model.into(),
			table,
			association: None,
			where_clauses: Vec::new(),
			groups: Vec::new(),
			children: IndexMap::new(),
		}
	}

	/// Node reached through `association`
	pub fn joined(association: Arc<Association>, alias: String) -> Self {
		Self {
			alias,
			model: association.target.clone().unwrap_or_default(),
			table: association.target_table.clone().unwrap_or_default(),
			association: Some(association),
			where_clauses: Vec::new(),
			groups: Vec::new(),
			children: IndexMap::new(),
		}
	}

	pub fn with_where(mut self, clause: WhereClause) -> Self {
		self.where_clauses.push(clause);
		self
	}

	pub fn with_group(mut self, group: ClauseGroup) -> Self {
		self.groups.push(group);
		self
	}

	/// Insert or replace the child under `key`, keeping its position
	pub fn with_child(mut self, key: impl Into<String>, child: QueryTree) -> Self {
		self.children.insert(key.into(), child);
		self
	}

	pub fn child(&self, key: &str) -> Option<&QueryTree> {
		self.children.get(key)
	}

	pub fn has_filters(&self) -> bool {
		!self.where_clauses.is_empty()
			|| !self.groups.is_empty()
			|| self.children.values().any(QueryTree::has_filters)
	}

	/// Join steps in depth-first pre-order
	pub fn joins(&self) -> Vec<JoinStep> {
		let mut steps = Vec::new();
		self.collect_joins(&mut steps);
		steps
	}

	fn collect_joins(&self, steps: &mut Vec<JoinStep>) {
		for child in self.children.values() {
			if let Some(association) = &child.association {
				steps.extend(resolve_join(association, &self.alias, &child.alias).steps);
			}
			child.collect_joins(steps);
		}
	}

	/// Where clauses with the alias they apply to, depth first
	pub fn clauses(&self) -> Vec<(&str, &WhereClause)> {
		let mut clauses: Vec<(&str, &WhereClause)> = self
			.where_clauses
			.iter()
			.map(|clause| (self.alias.as_str(), clause))
			.collect();
		for child in self.children.values() {
			clauses.extend(child.clauses());
		}
		clauses
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::associations::AssociationTable;
	use lattice_core::schema::{AttributeDefinition, ModelSchema, Nature, SchemaRegistry};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn table() -> AssociationTable {
		let registry = SchemaRegistry::builder()
			.model(ModelSchema::new("api::author.author", "authors"))
			.model(ModelSchema::new("api::tag.tag", "tags"))
			.model(
				ModelSchema::new("api::article.article", "articles")
					.attribute(
						"author",
						AttributeDefinition::relation(Nature::OneWay, "api::author.author"),
					)
					.attribute(
						"tags",
						AttributeDefinition::relation(Nature::ManyWay, "api::tag.tag"),
					),
			)
			.build()
			.unwrap();
		AssociationTable::build(&registry).unwrap()
	}

	#[rstest]
	fn test_reducers_leave_previous_tree_untouched(table: AssociationTable) {
		let root = QueryTree::root("api::article.article", "articles");
		let author = table.get("api::article.article", "author").unwrap().clone();
		let child = QueryTree::joined(author, "authors_1".into())
			.with_where(WhereClause::new("name", Operator::Eq, json!("Ann")));

		let next = root.clone().with_child("author", child);

		assert!(root.children.is_empty());
		assert!(!root.has_filters());
		assert!(next.has_filters());
		assert_eq!(next.child("author").unwrap().table, "authors");
	}

	#[rstest]
	fn test_joins_are_depth_first_and_clauses_follow(table: AssociationTable) {
		let author = table.get("api::article.article", "author").unwrap().clone();
		let tags = table.get("api::article.article", "tags").unwrap().clone();
		let tree = QueryTree::root("api::article.article", "articles")
			.with_where(WhereClause::new("title", Operator::Eq, json!("x")))
			.with_child(
				"author",
				QueryTree::joined(author, "authors_1".into())
					.with_where(WhereClause::new("name", Operator::Eq, json!("Ann"))),
			)
			.with_child("tags", QueryTree::joined(tags, "tags_1".into()));

		let aliases: Vec<_> = tree.joins().into_iter().map(|step| step.alias).collect();
		assert_eq!(aliases, vec!["authors_1", "tags_1_pivot", "tags_1"]);

		let clauses: Vec<_> = tree
			.clauses()
			.into_iter()
			.map(|(alias, clause)| format!("{}.{}", alias, clause.column))
			.collect();
		assert_eq!(clauses, vec!["articles.title", "authors_1.name"]);
	}
}
