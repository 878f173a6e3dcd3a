//! Query-parameter schemas
//!
//! These schemas check the *shape* of list-endpoint parameters against the
//! model: only scalar fields may be selected or sorted on and only
//! populatable fields may be populated. Filter operator values are accepted
//! as-is; the query builder validates operators.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::BuildError;
use crate::rule::{FieldRule, NumberRule, ObjectRule, Rule, StringRule, UnknownKeys};

/// Populate wildcard, expanding one level only
pub const WILDCARD: &str = "*";

/// Supported list-endpoint parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryParam {
	Fields,
	Populate,
	Sort,
	Filters,
	Pagination,
	Status,
	Locale,
	/// Full-text search term
	Search,
}

impl QueryParam {
	pub const ALL: [QueryParam; 8] = [
		QueryParam::Fields,
		QueryParam::Populate,
		QueryParam::Sort,
		QueryParam::Filters,
		QueryParam::Pagination,
		QueryParam::Status,
		QueryParam::Locale,
		QueryParam::Search,
	];

	/// Parameter name as sent by clients
	pub fn name(&self) -> &'static str {
		match self {
			QueryParam::Fields => "fields",
			QueryParam::Populate => "populate",
			QueryParam::Sort => "sort",
			QueryParam::Filters => "filters",
			QueryParam::Pagination => "pagination",
			QueryParam::Status => "status",
			QueryParam::Locale => "locale",
			QueryParam::Search => "_q",
		}
	}
}

impl fmt::Display for QueryParam {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for QueryParam {
	type Err = BuildError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		QueryParam::ALL
			.iter()
			.find(|param| param.name() == s)
			.copied()
			.ok_or_else(|| BuildError::UnknownQueryParam(s.to_string()))
	}
}

pub(crate) fn rule_for(param: QueryParam, scalar: &[String], sortable: &[String], populatable: &[String]) -> Rule {
	match param {
		QueryParam::Fields => {
			let field = Rule::Enumeration(scalar.to_vec());
			Rule::Union(vec![field.clone(), Rule::array(field)])
		}
		QueryParam::Populate => {
			let mut first_level = vec![WILDCARD.to_string()];
			first_level.extend(populatable.iter().cloned());
			Rule::Union(vec![
				Rule::Enumeration(first_level),
				Rule::array(Rule::Enumeration(populatable.to_vec())),
			])
		}
		QueryParam::Sort => {
			let key = Rule::SortKey(sortable.to_vec());
			let map = Rule::SortMap(sortable.to_vec());
			let entry = Rule::Union(vec![key.clone(), map.clone()]);
			Rule::Union(vec![key, map, Rule::array(entry)])
		}
		QueryParam::Filters => {
			let mut filterable = sortable.to_vec();
			filterable.extend(populatable.iter().cloned());
			Rule::Filters(Arc::new(filterable))
		}
		QueryParam::Pagination => {
			let count = |min: f64| {
				FieldRule::optional(Rule::Number(NumberRule {
					integer: true,
					min: Some(min),
					max: None,
				}))
			};
			let by_page = ObjectRule::new(UnknownKeys::Reject)
				.field("page", count(1.0))
				.field("pageSize", count(1.0))
				.field("withCount", FieldRule::optional(Rule::Boolean));
			let by_offset = ObjectRule::new(UnknownKeys::Reject)
				.field("start", count(0.0))
				.field(
					"limit",
					FieldRule::optional(Rule::Number(NumberRule {
						integer: true,
						min: None,
						max: None,
					})),
				)
				.field("withCount", FieldRule::optional(Rule::Boolean));
			Rule::Union(vec![Rule::Object(by_page), Rule::Object(by_offset)])
		}
		QueryParam::Status => Rule::Enumeration(vec!["draft".to_string(), "published".to_string()]),
		QueryParam::Locale => Rule::String(StringRule {
			min_length: Some(1),
			..Default::default()
		}),
		QueryParam::Search => Rule::String(StringRule::default()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::{Value, json};

	fn names(raw: &[&str]) -> Vec<String> {
		raw.iter().map(|s| s.to_string()).collect()
	}

	fn rule(param: QueryParam) -> Rule {
		rule_for(
			param,
			&names(&["title", "status"]),
			&names(&["id", "title", "status"]),
			&names(&["author", "tags"]),
		)
	}

	#[rstest]
	#[case(QueryParam::Fields, json!("title"), true)]
	#[case(QueryParam::Fields, json!(["title", "status"]), true)]
	#[case(QueryParam::Fields, json!("author"), false)]
	#[case(QueryParam::Populate, json!("*"), true)]
	#[case(QueryParam::Populate, json!(["author", "tags"]), true)]
	#[case(QueryParam::Populate, json!(["*"]), false)]
	#[case(QueryParam::Populate, json!("title"), false)]
	#[case(QueryParam::Sort, json!("title:desc"), true)]
	#[case(QueryParam::Sort, json!(["title", { "id": "asc" }]), true)]
	#[case(QueryParam::Sort, json!({ "title": "sideways" }), false)]
	#[case(QueryParam::Sort, json!("author"), false)]
	#[case(QueryParam::Filters, json!({ "title": { "$eq": "x" } }), true)]
	#[case(QueryParam::Filters, json!({ "$or": [{ "status": "draft" }, { "author": { "name": "Ada" } }] }), true)]
	#[case(QueryParam::Filters, json!({ "$not": { "secret": 1 } }), false)]
	#[case(QueryParam::Pagination, json!({ "page": 2, "pageSize": 10 }), true)]
	#[case(QueryParam::Pagination, json!({ "start": 0, "limit": -1 }), true)]
	#[case(QueryParam::Pagination, json!({ "page": 1, "limit": 5 }), false)]
	#[case(QueryParam::Pagination, json!({ "page": 0 }), false)]
	#[case(QueryParam::Status, json!("published"), true)]
	#[case(QueryParam::Status, json!("archived"), false)]
	#[case(QueryParam::Locale, json!(""), false)]
	#[case(QueryParam::Search, json!("hello"), true)]
	fn test_param_shapes(#[case] param: QueryParam, #[case] value: Value, #[case] ok: bool) {
		assert_eq!(rule(param).validate(&value).is_ok(), ok, "{param} {value}");
	}

	#[rstest]
	fn test_parse_param_names() {
		assert_eq!("_q".parse::<QueryParam>().unwrap(), QueryParam::Search);
		assert!(matches!(
			"where".parse::<QueryParam>(),
			Err(BuildError::UnknownQueryParam(_))
		));
	}
}
