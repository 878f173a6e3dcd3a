//! List parameters accepted by the query-parameter validators run as queries

use lattice::db::backends::QueryValue;
use lattice::validators::QueryParam;
use lattice::{Lattice, QueryRequest};
use lattice_integration_tests::{ARTICLE, record, settings, start};
use rstest::rstest;
use serde_json::{Value, json};

/// Articles "a" to "e" with ratings 1 to 5
async fn seeded() -> Lattice {
	let lattice = start(settings()).await;
	for (rating, title) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
		lattice
			.mutator()
			.create(
				ARTICLE,
				record(json!({ "title": title, "rating": rating + 1 })),
			)
			.await
			.unwrap();
	}
	lattice
}

/// Validate every parameter present in `params`, then build and run the query
async fn titles(lattice: &Lattice, params: Value) -> Vec<String> {
	let schemas = lattice
		.validators()
		.query_params(
			ARTICLE,
			&[QueryParam::Sort, QueryParam::Filters, QueryParam::Pagination],
		)
		.unwrap();
	for (name, schema) in &schemas {
		if let Some(value) = params.get(name) {
			if let Err(errors) = schema.validate(value) {
				panic!("{} rejected {}: {:?}", name, value, errors);
			}
		}
	}

	let request = QueryRequest::from_json(&params).unwrap();
	let query = lattice.queries().build(ARTICLE, &request).unwrap();
	query
		.fetch(lattice.connection())
		.await
		.unwrap()
		.iter()
		.map(|row| match row.value("title") {
			Some(QueryValue::String(title)) => title.clone(),
			other => panic!("unexpected title {:?}", other),
		})
		.collect()
}

#[rstest]
#[case(json!({ "sort": "title:desc" }), &["e", "d", "c", "b", "a"])]
#[case(json!({ "sort": { "title": "desc" } }), &["e", "d", "c", "b", "a"])]
#[case(json!({ "sort": [{ "rating": "desc" }] }), &["e", "d", "c", "b", "a"])]
#[case(json!({ "sort": ["rating:asc", { "title": "desc" }] }), &["a", "b", "c", "d", "e"])]
#[tokio::test]
async fn test_sort_forms(#[case] params: Value, #[case] expected: &[&str]) {
	let lattice = seeded().await;
	assert_eq!(titles(&lattice, params).await, expected);
}

#[rstest]
#[case(json!({ "page": 2, "pageSize": 2 }), &["c", "d"])]
#[case(json!({ "page": 3, "pageSize": 2 }), &["e"])]
#[case(json!({ "pageSize": 2 }), &["a", "b"])]
#[case(json!({ "start": 1, "limit": 3 }), &["b", "c", "d"])]
#[case(json!({ "start": 3, "limit": -1 }), &["d", "e"])]
#[tokio::test]
async fn test_pagination_forms(#[case] pagination: Value, #[case] expected: &[&str]) {
	let lattice = seeded().await;
	let params = json!({ "sort": "title", "pagination": pagination });
	assert_eq!(titles(&lattice, params).await, expected);
}

#[rstest]
#[case(
	json!({ "$or": [{ "title": { "$eq": "a" } }, { "title": { "$eq": "e" } }] }),
	&["a", "e"]
)]
#[case(
	json!({ "$and": [
		{ "$or": [{ "title": "a" }, { "rating": { "$gte": 4 } }] },
		{ "title": { "$ne": "e" } }
	] }),
	&["a", "d"]
)]
#[case(json!({ "$not": { "rating": { "$lt": 4 } } }), &["d", "e"])]
#[case(
	json!({ "$or": [{ "$not": { "title": "c" } }, { "rating": 3 }], "rating": { "$gt": 2 } }),
	&["c", "d", "e"]
)]
#[tokio::test]
async fn test_boolean_filter_groups(#[case] filters: Value, #[case] expected: &[&str]) {
	let lattice = seeded().await;
	let params = json!({ "sort": "title", "filters": filters });
	assert_eq!(titles(&lattice, params).await, expected);
}
