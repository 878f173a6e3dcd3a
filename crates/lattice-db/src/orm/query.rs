//! Query building
//!
//! [`QueryBuilder::build`] turns filters with dotted attribute paths, sort
//! fields and pagination into an [`ExecutableQuery`]. Filters are folded
//! into an immutable [`QueryTree`]: each association segment of a path
//! creates or reuses a joined child node, and the final segment becomes a
//! where clause on the node it lands on.
//!
//! The rendered statement always lists every join (depth-first, pre-order)
//! before any where clause, then sort, offset and limit.
//!
//! ## Array values
//!
//! An array given to any operator other than `in`/`nin` is expanded into an
//! OR group of single-value comparisons with that operator, so
//! `{"rating": {"$gt": [3, 8]}}` means `rating > 3 OR rating > 8`.

use sea_query::{
	Alias, Asterisk, BinOper, Condition, Expr, ExprTrait, Func, JoinType, Order, Query, SelectStatement,
};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use lattice_core::schema::{AttributeType, ModelSchema, SchemaRegistry};

use crate::associations::{AssociationTable, JoinStep};
use crate::backends::values::{json_to_query_value, to_sea_value};
use crate::backends::{DatabaseConnection, DatabaseError, DatabaseType, QueryValue, Row};

use super::tree::{AliasCounter, ClauseGroup, QueryTree, WhereClause};

/// Query building and execution errors
#[derive(Debug, Error)]
pub enum QueryError {
	#[error("Unknown model \"{0}\"")]
	UnknownModel(String),

	#[error("Unknown field \"{field}\" on {model}")]
	UnknownField { model: String, field: String },

	#[error("Cannot query path \"{path}\": {reason}")]
	UnsupportedPath { path: String, reason: String },

	#[error("Unsupported operator \"{0}\"")]
	UnsupportedOperator(String),

	#[error("Invalid value for \"{field}\": {reason}")]
	InvalidValue { field: String, reason: String },

	#[error(transparent)]
	Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
	Eq,
	Ne,
	Lt,
	Lte,
	Gt,
	Gte,
	In,
	Nin,
	/// Case-insensitive substring match
	Contains,
	NContains,
	/// Case-sensitive substring match
	ContainsS,
	NContainsS,
	/// `true` for `IS NULL`, `false` for `IS NOT NULL`
	Null,
}

impl Operator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operator::Eq => "eq",
			Operator::Ne => "ne",
			Operator::Lt => "lt",
			Operator::Lte => "lte",
			Operator::Gt => "gt",
			Operator::Gte => "gte",
			Operator::In => "in",
			Operator::Nin => "nin",
			Operator::Contains => "contains",
			Operator::NContains => "ncontains",
			Operator::ContainsS => "containss",
			Operator::NContainsS => "ncontainss",
			Operator::Null => "null",
		}
	}

	/// Operators that take the whole array as their operand
	fn takes_list(&self) -> bool {
		matches!(self, Operator::In | Operator::Nin)
	}
}

impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operator {
	type Err = QueryError;

	/// Parse an operator name, with or without a leading `$`
	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		let name = s.strip_prefix('$').unwrap_or(s);
		let operator = match name {
			"eq" => Operator::Eq,
			"ne" => Operator::Ne,
			"lt" => Operator::Lt,
			"lte" => Operator::Lte,
			"gt" => Operator::Gt,
			"gte" => Operator::Gte,
			"in" => Operator::In,
			"nin" | "notIn" => Operator::Nin,
			"contains" | "containsi" => Operator::Contains,
			"ncontains" | "notContainsi" => Operator::NContains,
			"containss" => Operator::ContainsS,
			"ncontainss" | "notContains" => Operator::NContainsS,
			"null" => Operator::Null,
			_ => return Err(QueryError::UnsupportedOperator(s.to_string())),
		};
		Ok(operator)
	}
}

/// `field <operator> value`, where `field` may be a dotted association path
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub operator: Operator,
	pub value: JsonValue,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}

	pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		Self::new(field, Operator::Eq, value)
	}
}

/// A filter expression: a single filter or a boolean group of expressions
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
	Filter(Filter),
	And(Vec<FilterExpr>),
	Or(Vec<FilterExpr>),
	Not(Box<FilterExpr>),
}

impl FilterExpr {
	/// `And` of `items`, or the only item itself
	fn all(mut items: Vec<FilterExpr>) -> Self {
		if items.len() == 1 {
			items.remove(0)
		} else {
			FilterExpr::And(items)
		}
	}
}

impl From<Filter> for FilterExpr {
	fn from(filter: Filter) -> Self {
		FilterExpr::Filter(filter)
	}
}

/// Parse a nested JSON filter document into expressions that all must hold
///
/// Nested objects extend the path, `$`-prefixed keys name operators and a
/// bare value means `eq`. `$and` entries are flattened into the result,
/// `$or` takes an array of documents and `$not` a single document. Group
/// keys may appear at any depth and keep the path they are nested under.
/// A group that constrains nothing (an empty `$or`, or a branch or `$not`
/// with no filters) is dropped.
///
/// # Examples
///
/// ```
/// use lattice_db::orm::query::{Filter, FilterExpr, Operator, filters_from_json};
/// use serde_json::json;
///
/// let filters = filters_from_json(&json!({
///     "title": "Hello",
///     "author": { "$or": [{ "name": "Ann" }, { "name": { "$contains": "bob" } }] }
/// }))
/// .unwrap();
///
/// assert_eq!(filters, vec![
///     FilterExpr::from(Filter::eq("title", "Hello")),
///     FilterExpr::Or(vec![
///         Filter::eq("author.name", "Ann").into(),
///         Filter::new("author.name", Operator::Contains, "bob").into(),
///     ]),
/// ]);
/// ```
pub fn filters_from_json(document: &JsonValue) -> Result<Vec<FilterExpr>> {
	let mut filters = Vec::new();
	collect_filters(document, "", &mut filters)?;
	Ok(filters)
}

fn group_items<'a>(key: &str, value: &'a JsonValue) -> Result<&'a Vec<JsonValue>> {
	value.as_array().ok_or_else(|| QueryError::InvalidValue {
		field: key.to_string(),
		reason: "expected an array".to_string(),
	})
}

fn collect_filters(document: &JsonValue, path: &str, filters: &mut Vec<FilterExpr>) -> Result<()> {
	let JsonValue::Object(entries) = document else {
		if path.is_empty() {
			return Err(QueryError::InvalidValue {
				field: "filters".to_string(),
				reason: "expected an object".to_string(),
			});
		}
		filters.push(Filter::eq(path, document.clone()).into());
		return Ok(());
	};

	for (key, value) in entries {
		match key.as_str() {
			"$and" => {
				for group in group_items(key, value)? {
					collect_filters(group, path, filters)?;
				}
			}
			"$or" => {
				let mut branches = Vec::new();
				for group in group_items(key, value)? {
					let mut branch = Vec::new();
					collect_filters(group, path, &mut branch)?;
					branches.push(branch);
				}
				if !branches.is_empty() && branches.iter().all(|branch| !branch.is_empty()) {
					filters.push(FilterExpr::Or(
						branches.into_iter().map(FilterExpr::all).collect(),
					));
				}
			}
			"$not" => {
				let mut inner = Vec::new();
				collect_filters(value, path, &mut inner)?;
				if !inner.is_empty() {
					filters.push(FilterExpr::Not(Box::new(FilterExpr::all(inner))));
				}
			}
			operator if operator.starts_with('$') => {
				if path.is_empty() {
					return Err(QueryError::InvalidValue {
						field: key.clone(),
						reason: "operator without a field".to_string(),
					});
				}
				filters.push(Filter::new(path, operator.parse()?, value.clone()).into());
			}
			field => {
				let nested = if path.is_empty() {
					field.to_string()
				} else {
					format!("{}.{}", path, field)
				};
				collect_filters(value, &nested, filters)?;
			}
		}
	}
	Ok(())
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}

/// One sort key, parsed from `field` or `field:desc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
	pub field: String,
	pub order: SortOrder,
}

impl SortField {
	pub fn asc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			order: SortOrder::Asc,
		}
	}

	pub fn desc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			order: SortOrder::Desc,
		}
	}
}

impl FromStr for SortField {
	type Err = QueryError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		let (field, order) = match s.split_once(':') {
			None => (s, SortOrder::Asc),
			Some((field, order)) => match order.to_ascii_lowercase().as_str() {
				"asc" => (field, SortOrder::Asc),
				"desc" => (field, SortOrder::Desc),
				other => {
					return Err(QueryError::InvalidValue {
						field: field.to_string(),
						reason: format!("unknown sort order \"{}\"", other),
					});
				}
			},
		};
		Ok(Self {
			field: field.to_string(),
			order,
		})
	}
}

/// Offset and limit; a negative limit means no limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
	pub start: Option<i64>,
	pub limit: Option<i64>,
}

impl Pagination {
	pub fn new(start: i64, limit: i64) -> Self {
		Self {
			start: Some(start),
			limit: Some(limit),
		}
	}

	fn offset(&self) -> Option<u64> {
		self.start.filter(|start| *start > 0).map(|start| start as u64)
	}

	fn effective_limit(&self) -> Option<u64> {
		self.limit.filter(|limit| *limit >= 0).map(|limit| limit as u64)
	}
}

/// Page size used when `pagination.page` is given without `pageSize`
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Filters, sort keys and pagination for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
	/// Expressions that must all hold
	pub filters: Vec<FilterExpr>,
	pub sort: Vec<SortField>,
	pub pagination: Pagination,
}

impl QueryRequest {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter.into());
		self
	}

	/// Add a boolean group
	pub fn filter_expr(mut self, expr: FilterExpr) -> Self {
		self.filters.push(expr);
		self
	}

	pub fn sort(mut self, sort: SortField) -> Self {
		self.sort.push(sort);
		self
	}

	pub fn paginate(mut self, pagination: Pagination) -> Self {
		self.pagination = pagination;
		self
	}

	/// Parse `{ "filters", "sort", "pagination" }` query parameters
	///
	/// `sort` is `"a:desc,b"`, `{"a": "desc"}` or an array mixing both
	/// forms. `pagination` is either `{ "start", "limit" }` or
	/// `{ "page", "pageSize" }`; pages are numbered from 1.
	pub fn from_json(params: &JsonValue) -> Result<Self> {
		let mut request = Self::new();
		if let Some(filters) = params.get("filters") {
			request.filters = filters_from_json(filters)?;
		}
		match params.get("sort") {
			None | Some(JsonValue::Null) => {}
			Some(JsonValue::Array(entries)) => {
				for entry in entries {
					push_sort(entry, &mut request.sort)?;
				}
			}
			Some(entry) => push_sort(entry, &mut request.sort)?,
		}
		if let Some(pagination) = params.get("pagination") {
			request.pagination = pagination_from_json(pagination)?;
		}
		Ok(request)
	}
}

fn push_sort(entry: &JsonValue, sort: &mut Vec<SortField>) -> Result<()> {
	match entry {
		JsonValue::String(keys) => {
			for key in keys.split(',') {
				sort.push(key.trim().parse()?);
			}
		}
		JsonValue::Object(keys) => {
			for (field, order) in keys {
				let order = order.as_str().ok_or_else(|| QueryError::InvalidValue {
					field: field.clone(),
					reason: "sort order must be \"asc\" or \"desc\"".to_string(),
				})?;
				sort.push(format!("{}:{}", field, order).parse()?);
			}
		}
		_ => {
			return Err(QueryError::InvalidValue {
				field: "sort".to_string(),
				reason: "expected a string, an object or an array of them".to_string(),
			});
		}
	}
	Ok(())
}

fn pagination_from_json(pagination: &JsonValue) -> Result<Pagination> {
	let number = |key: &str| -> Result<Option<i64>> {
		match pagination.get(key) {
			None | Some(JsonValue::Null) => Ok(None),
			Some(value) => value.as_i64().map(Some).ok_or_else(|| QueryError::InvalidValue {
				field: key.to_string(),
				reason: "expected an integer".to_string(),
			}),
		}
	};
	let (page, page_size) = (number("page")?, number("pageSize")?);
	if page.is_none() && page_size.is_none() {
		return Ok(Pagination {
			start: number("start")?,
			limit: number("limit")?,
		});
	}
	let page = page.unwrap_or(1);
	let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
	if page < 1 || page_size < 1 {
		return Err(QueryError::InvalidValue {
			field: "pagination".to_string(),
			reason: "page and pageSize must be at least 1".to_string(),
		});
	}
	Ok(Pagination::new((page - 1) * page_size, page_size))
}

/// Builds executable queries against a registry and its associations
#[derive(Debug, Clone)]
pub struct QueryBuilder {
	registry: Arc<SchemaRegistry>,
	associations: Arc<AssociationTable>,
}

impl QueryBuilder {
	pub fn new(registry: Arc<SchemaRegistry>, associations: Arc<AssociationTable>) -> Self {
		Self {
			registry,
			associations,
		}
	}

	fn model(&self, uid: &str) -> Result<&ModelSchema> {
		self.registry
			.get_model(uid)
			.map_err(|_| QueryError::UnknownModel(uid.to_string()))
	}

	/// Build the query tree for `uid` and attach sort and pagination
	pub fn build(&self, uid: &str, request: &QueryRequest) -> Result<ExecutableQuery> {
		let model = self.model(uid)?;
		let mut counter = AliasCounter::default();
		let mut tree = QueryTree::root(&model.uid, &model.collection_name);

		for expr in &request.filters {
			tree = match expr {
				FilterExpr::Filter(filter) => {
					let path: Vec<&str> = filter.field.split('.').collect();
					self.insert_filter(tree, &path, filter, &mut counter, true)?.0
				}
				group => {
					let (tree, group) = self.insert_expr(tree, group, &mut counter)?;
					tree.with_group(group)
				}
			};
		}

		let mut sort = Vec::with_capacity(request.sort.len());
		for key in &request.sort {
			sort.push(self.resolve_sort(&tree, key)?);
		}

		debug!(
			model = uid,
			filters = request.filters.len(),
			joins = tree.joins().len(),
			"query built"
		);
		Ok(ExecutableQuery {
			primary_key: model.primary_key.clone(),
			tree,
			sort,
			pagination: request.pagination,
		})
	}

	/// Join every path used by `expr` and return its clauses as a group
	fn insert_expr(
		&self,
		tree: QueryTree,
		expr: &FilterExpr,
		counter: &mut AliasCounter,
	) -> Result<(QueryTree, ClauseGroup)> {
		match expr {
			FilterExpr::Filter(filter) => {
				let path: Vec<&str> = filter.field.split('.').collect();
				let (tree, (alias, clause)) =
					self.insert_filter(tree, &path, filter, counter, false)?;
				Ok((tree, ClauseGroup::Clause { alias, clause }))
			}
			FilterExpr::And(items) | FilterExpr::Or(items) => {
				if items.is_empty() {
					return Err(QueryError::InvalidValue {
						field: "filters".to_string(),
						reason: "empty filter group".to_string(),
					});
				}
				let mut tree = tree;
				let mut groups = Vec::with_capacity(items.len());
				for item in items {
					let (next, group) = self.insert_expr(tree, item, counter)?;
					tree = next;
					groups.push(group);
				}
				let group = match expr {
					FilterExpr::And(_) => ClauseGroup::All(groups),
					_ => ClauseGroup::Any(groups),
				};
				Ok((tree, group))
			}
			FilterExpr::Not(inner) => {
				let (tree, group) = self.insert_expr(tree, inner, counter)?;
				Ok((tree, ClauseGroup::Not(Box::new(group))))
			}
		}
	}

	/// Walk `path` from `node`, joining associations on the way
	///
	/// Returns the next tree and the clause with the alias it lands on. The
	/// clause is also attached to that node when `attach` is set.
	fn insert_filter(
		&self,
		node: QueryTree,
		path: &[&str],
		filter: &Filter,
		counter: &mut AliasCounter,
		attach: bool,
	) -> Result<(QueryTree, (String, WhereClause))> {
		let Some((segment, rest)) = path.split_first() else {
			return Err(QueryError::InvalidValue {
				field: filter.field.clone(),
				reason: "empty field path".to_string(),
			});
		};
		let model = self.model(&node.model)?;
		let land = |node: QueryTree, column: &str| {
			let clause = WhereClause::new(column, filter.operator, filter.value.clone());
			let alias = node.alias.clone();
			let node = if attach {
				node.with_where(clause.clone())
			} else {
				node
			};
			(node, (alias, clause))
		};

		let Some(association) = self.associations.get(&model.uid, segment) else {
			self.check_column(model, segment, &filter.field)?;
			if !rest.is_empty() {
				return Err(QueryError::UnsupportedPath {
					path: filter.field.clone(),
					reason: format!("{} is not an association", segment),
				});
			}
			return Ok(land(node, *segment));
		};

		if association.is_polymorphic() {
			return Err(QueryError::UnsupportedPath {
				path: filter.field.clone(),
				reason: format!("{} has no fixed target model", association.nature),
			});
		}
		if rest.is_empty() {
			if let Some(column) = association.owning_column() {
				return Ok(land(node, column));
			}
		}

		let child = match node.child(segment) {
			Some(existing) => existing.clone(),
			None => {
				let table = association.target_table.as_deref().unwrap_or_default();
				QueryTree::joined(association.clone(), counter.next(table))
			}
		};
		let (child, placed) = if rest.is_empty() {
			land(child, association.target_primary_key.as_str())
		} else {
			self.insert_filter(child, rest, filter, counter, attach)?
		};
		Ok((node.with_child(*segment, child), placed))
	}

	/// Check that `column` is a filterable column of `model`
	fn check_column(&self, model: &ModelSchema, column: &str, path: &str) -> Result<()> {
		if column == model.primary_key {
			return Ok(());
		}
		if let Some((created, updated)) = model.options.timestamps.columns() {
			if column == created || column == updated {
				return Ok(());
			}
		}
		let attribute = model
			.get_attribute(column)
			.ok_or_else(|| QueryError::UnknownField {
				model: model.uid.clone(),
				field: column.to_string(),
			})?;
		let attribute = self
			.registry
			.resolve_attribute(&model.uid, column, attribute)
			.map_err(|_| QueryError::UnknownField {
				model: model.uid.clone(),
				field: column.to_string(),
			})?;
		match attribute.kind {
			AttributeType::Component | AttributeType::DynamicZone => {
				Err(QueryError::UnsupportedPath {
					path: path.to_string(),
					reason: format!("{} is a {} field", column, attribute.kind),
				})
			}
			_ => Ok(()),
		}
	}

	/// Sort keys may only reach associations already joined by a filter
	fn resolve_sort(&self, tree: &QueryTree, key: &SortField) -> Result<(String, String, SortOrder)> {
		let path: Vec<&str> = key.field.split('.').collect();
		let Some((column, associations)) = path.split_last() else {
			return Err(QueryError::InvalidValue {
				field: key.field.clone(),
				reason: "empty sort field".to_string(),
			});
		};
		let mut node = tree;
		for segment in associations {
			node = node
				.child(segment)
				.ok_or_else(|| QueryError::UnsupportedPath {
					path: key.field.clone(),
					reason: format!("{} is not joined by any filter", segment),
				})?;
		}
		let model = self.model(&node.model)?;
		let column = match self.associations.get(&model.uid, column) {
			Some(association) => association
				.owning_column()
				.ok_or_else(|| QueryError::UnsupportedPath {
					path: key.field.clone(),
					reason: format!("{} has no column to sort on", column),
				})?
				.to_string(),
			None => {
				self.check_column(model, column, &key.field)?;
				column.to_string()
			}
		};
		Ok((node.alias.clone(), column, key.order))
	}
}

/// A built query, ready to render or run
#[derive(Debug, Clone)]
pub struct ExecutableQuery {
	primary_key: String,
	tree: QueryTree,
	sort: Vec<(String, String, SortOrder)>,
	pagination: Pagination,
}

impl ExecutableQuery {
	pub fn tree(&self) -> &QueryTree {
		&self.tree
	}

	/// `SELECT <root>.*` with joins, filters, sort and pagination
	pub fn statement(&self) -> Result<SelectStatement> {
		let mut select = Query::select();
		select
			.column((Alias::new(&self.tree.alias), Asterisk))
			.from(Alias::new(&self.tree.table));
		if self.tree.has_filters() {
			select.distinct();
		}
		self.apply_filters(&mut select)?;

		for (alias, column, order) in &self.sort {
			let order = match order {
				SortOrder::Asc => Order::Asc,
				SortOrder::Desc => Order::Desc,
			};
			select.order_by((Alias::new(alias), Alias::new(column)), order);
		}
		let limit = self.pagination.effective_limit();
		if let Some(offset) = self.pagination.offset() {
			select.offset(offset);
			// SQLite and MySQL only accept OFFSET after a LIMIT
			select.limit(limit.unwrap_or(i64::MAX as u64));
		} else if let Some(limit) = limit {
			select.limit(limit);
		}
		Ok(select.to_owned())
	}

	/// `SELECT COUNT(DISTINCT <root>.<pk>) AS count` over the same joins and filters
	pub fn count_statement(&self) -> Result<SelectStatement> {
		let mut select = Query::select();
		select
			.expr_as(
				Func::count_distinct(Expr::col((
					Alias::new(&self.tree.alias),
					Alias::new(&self.primary_key),
				))),
				Alias::new("count"),
			)
			.from(Alias::new(&self.tree.table));
		self.apply_filters(&mut select)?;
		Ok(select.to_owned())
	}

	fn apply_filters(&self, select: &mut SelectStatement) -> Result<()> {
		for step in self.tree.joins() {
			select.join_as(
				JoinType::LeftJoin,
				Alias::new(&step.table),
				Alias::new(&step.alias),
				join_condition(&step),
			);
		}
		for (alias, clause) in self.tree.clauses() {
			select.cond_where(clause_condition(alias, clause)?);
		}
		for group in &self.tree.groups {
			select.cond_where(group_condition(group)?);
		}
		Ok(())
	}

	/// Render for `db`
	pub fn to_sql(&self, db: DatabaseType) -> Result<(String, Vec<QueryValue>)> {
		Ok(crate::backends::values::render(db, &self.statement()?)?)
	}

	pub async fn fetch(&self, conn: &DatabaseConnection) -> Result<Vec<Row>> {
		let statement = conn.prepare(&self.statement()?)?;
		Ok(conn.query_all(statement).await?)
	}

	pub async fn count(&self, conn: &DatabaseConnection) -> Result<u64> {
		let statement = conn.prepare(&self.count_statement()?)?;
		let row = conn.query_one(statement).await?;
		Ok(row.get::<u64>("count")?)
	}
}

fn column_expr(alias: &str, column: &str) -> Expr {
	Expr::col((Alias::new(alias), Alias::new(column)))
}

fn join_condition(step: &JoinStep) -> Condition {
	let (left, right) = &step.on;
	let mut condition = Condition::all().add(
		column_expr(&left.alias, &left.column)
			.equals((Alias::new(&right.alias), Alias::new(&right.column))),
	);
	for (column, value) in &step.extra {
		condition = condition.add(column_expr(&column.alias, &column.column).eq(value.as_str()));
	}
	condition
}

fn group_condition(group: &ClauseGroup) -> Result<Condition> {
	match group {
		ClauseGroup::Clause { alias, clause } => clause_condition(alias, clause),
		ClauseGroup::All(items) => items
			.iter()
			.try_fold(Condition::all(), |all, item| -> Result<Condition> {
				Ok(all.add(group_condition(item)?))
			}),
		ClauseGroup::Any(items) => items
			.iter()
			.try_fold(Condition::any(), |any, item| -> Result<Condition> {
				Ok(any.add(group_condition(item)?))
			}),
		ClauseGroup::Not(inner) => Ok(group_condition(inner)?.not()),
	}
}

fn clause_condition(alias: &str, clause: &WhereClause) -> Result<Condition> {
	match &clause.value {
		JsonValue::Array(values) if !clause.operator.takes_list() => {
			if values.is_empty() {
				return Err(QueryError::InvalidValue {
					field: clause.column.clone(),
					reason: format!("empty array for {}", clause.operator),
				});
			}
			let mut group = Condition::any();
			for value in values {
				group = group.add(comparison(alias, &clause.column, clause.operator, value)?);
			}
			Ok(group)
		}
		value => Ok(Condition::all().add(comparison(alias, &clause.column, clause.operator, value)?)),
	}
}

fn comparison(alias: &str, column: &str, operator: Operator, value: &JsonValue) -> Result<Expr> {
	let col = column_expr(alias, column);
	let scalar = || to_sea_value(&json_to_query_value(value));
	let pattern = |lower: bool| {
		let text = match value {
			JsonValue::String(s) => s.clone(),
			other => other.to_string(),
		};
		let text = if lower { text.to_lowercase() } else { text };
		format!("%{}%", text)
	};

	let expr = match operator {
		Operator::Eq if value.is_null() => col.is_null(),
		Operator::Ne if value.is_null() => col.is_not_null(),
		Operator::Eq => col.eq(scalar()),
		Operator::Ne => col.binary(BinOper::Custom("!="), scalar()),
		Operator::Lt => col.lt(scalar()),
		Operator::Lte => col.lte(scalar()),
		Operator::Gt => col.gt(scalar()),
		Operator::Gte => col.gte(scalar()),
		Operator::In | Operator::Nin => {
			let items: Vec<sea_query::Value> = match value {
				JsonValue::Array(items) => items
					.iter()
					.map(|item| to_sea_value(&json_to_query_value(item)))
					.collect(),
				single => vec![to_sea_value(&json_to_query_value(single))],
			};
			if operator == Operator::In {
				col.is_in(items)
			} else {
				col.is_not_in(items)
			}
		}
		Operator::Contains => Expr::expr(Func::lower(col)).like(pattern(true)),
		Operator::NContains => Expr::expr(Func::lower(col)).not_like(pattern(true)),
		Operator::ContainsS => col.like(pattern(false)),
		Operator::NContainsS => col.not_like(pattern(false)),
		Operator::Null => match value.as_bool() {
			Some(true) => col.is_null(),
			Some(false) => col.is_not_null(),
			None => {
				return Err(QueryError::InvalidValue {
					field: column.to_string(),
					reason: "null expects true or false".to_string(),
				});
			}
		},
	};
	Ok(expr)
}
