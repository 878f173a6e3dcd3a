//! Validation, migration and relation sync through the bootstrap

use lattice::db::backends::QueryValue;
use lattice::Settings;
use lattice_integration_tests::{ARTICLE, AUTHOR, pivot_rows, record, start};
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn settings() -> Settings {
	lattice_integration_tests::settings()
}

#[rstest]
#[tokio::test]
async fn test_input_validation(settings: Settings) {
	let lattice = start(settings).await;
	let input = lattice.validators().input(ARTICLE).unwrap();

	let valid = input
		.validate(&json!({"title": "Hello", "authorIds": [1, 2]}))
		.unwrap();
	assert_eq!(valid["title"], json!("Hello"));

	let errors = input.validate(&json!({"authorIds": [1, 2]})).unwrap_err();
	assert_eq!(errors.len(), 1);
	assert_eq!(errors.paths(), vec!["title"]);
}

#[rstest]
#[tokio::test]
async fn test_author_ids_update_rewrites_pivot(settings: Settings) {
	let lattice = start(settings).await;
	let mutator = lattice.mutator();
	for name in ["Ada", "Grace", "Barbara"] {
		mutator
			.create(AUTHOR, record(json!({ "name": name })))
			.await
			.unwrap();
	}

	let input = lattice.validators().input(ARTICLE).unwrap();
	let data = input
		.validate(&json!({"title": "Hello", "authorIds": [1, 2]}))
		.unwrap();
	let created = mutator.create(ARTICLE, record(data)).await.unwrap();
	let id = created["id"].as_i64().unwrap();
	assert_eq!(pivot_rows(&lattice).await, vec![(id, 1), (id, 2)]);

	let updated = mutator
		.apply_relation_update(ARTICLE, id, record(json!({"authorIds": [2, 3]})))
		.await
		.unwrap();
	assert_eq!(updated["authorIds"], json!([2, 3]));
	assert_eq!(pivot_rows(&lattice).await, vec![(id, 2), (id, 3)]);

	let author = mutator.find_one(AUTHOR, 3i64).await.unwrap().unwrap();
	assert_eq!(author["articles"], json!([id]));
}

#[rstest]
#[tokio::test]
async fn test_restart_leaves_schema_unchanged(settings: Settings) {
	let lattice = start(settings).await;
	let report = lattice.migrate().await.unwrap();
	assert!(report.created.is_empty());
	assert!(report.altered.is_empty());
	assert!(report.unchanged.contains(&"articles".to_string()));
}

#[rstest]
#[tokio::test]
async fn test_query_by_related_name(settings: Settings) {
	let lattice = start(settings).await;
	let mutator = lattice.mutator();
	mutator
		.create(AUTHOR, record(json!({"name": "Ada"})))
		.await
		.unwrap();
	mutator
		.create(ARTICLE, record(json!({"title": "Engines", "authorIds": [1]})))
		.await
		.unwrap();
	mutator
		.create(ARTICLE, record(json!({"title": "Looms"})))
		.await
		.unwrap();

	let request = lattice::QueryRequest::from_json(&json!({
		"filters": {"authorIds": {"name": {"$eq": "Ada"}}}
	}))
	.unwrap();
	let query = lattice.queries().build(ARTICLE, &request).unwrap();
	let rows = query.fetch(lattice.connection()).await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].value("title"), Some(&QueryValue::String("Engines".into())));
}
