//! Schema reconciliation against in-memory SQLite

mod common;

use std::sync::Arc;

use common::{ARTICLE, article, exec, migrated, recording, registry, registry_with};
use lattice_core::schema::{AttributeDefinition, AttributeType, SchemaRegistry};
use lattice_db::DatabaseConnection;
use lattice_db::associations::AssociationTable;
use lattice_db::migrations::SchemaMigrator;
use lattice_db::migrations::introspect::{columns, has_table};
use rstest::rstest;

fn migrator(conn: &DatabaseConnection, registry: SchemaRegistry) -> SchemaMigrator {
	let associations = AssociationTable::build(&registry).unwrap();
	SchemaMigrator::new(conn.clone(), Arc::new(registry), Arc::new(associations))
}

async fn count(conn: &DatabaseConnection, table: &str) -> i64 {
	conn.fetch_one(&format!("SELECT COUNT(*) AS n FROM {}", table), vec![])
		.await
		.unwrap()
		.get::<i64>("n")
		.unwrap()
}

fn with_unique_title() -> SchemaRegistry {
	registry_with(article().attribute(
		"title",
		AttributeDefinition::new(AttributeType::String)
			.required()
			.unique(),
	))
}

#[rstest]
#[tokio::test]
async fn test_second_run_issues_no_ddl() {
	let (conn, _, _) = migrated(registry()).await;
	let (recorded, log) = recording(&conn);

	let report = migrator(&recorded, registry()).reconcile_all().await.unwrap();

	assert!(report.created.is_empty());
	assert!(report.altered.is_empty());
	assert!(report.is_success());
	assert!(log.matching(&["CREATE", "ALTER", "DROP"]).is_empty(), "{:?}", log.statements());
}

#[rstest]
#[tokio::test]
async fn test_first_run_creates_every_table() {
	let (conn, _, _) = migrated(registry()).await;
	for table in ["upload_file", "authors", "articles", "articles_authors", "upload_file_morph"] {
		assert!(has_table(&conn, table).await.unwrap(), "{} missing", table);
	}
	let article_columns = columns(&conn, "articles").await.unwrap();
	for column in ["title", "status", "writer", "created_at", "updated_at"] {
		assert!(article_columns.iter().any(|name| name == column), "{} missing", column);
	}
}

#[rstest]
#[tokio::test]
async fn test_new_attribute_adds_column() {
	let (conn, _, _) = migrated(registry()).await;
	exec(&conn, "INSERT INTO articles (id, title) VALUES (1, 'Engines')").await;

	let extended = registry_with(
		article().attribute("summary", AttributeDefinition::new(AttributeType::Text)),
	);
	let report = migrator(&conn, extended).reconcile_all().await.unwrap();

	assert_eq!(report.altered, vec!["articles"]);
	assert!(columns(&conn, "articles")
		.await
		.unwrap()
		.contains(&"summary".to_string()));
	assert_eq!(count(&conn, "articles").await, 1);
}

#[rstest]
#[tokio::test]
async fn test_sqlite_rebuild_keeps_rows() {
	let (conn, _, _) = migrated(registry()).await;
	exec(
		&conn,
		"INSERT INTO articles (id, title, status) VALUES (1, 'Engines', 'draft'), (2, 'Compilers', NULL)",
	)
	.await;

	let report = migrator(&conn, with_unique_title()).reconcile_all().await.unwrap();

	assert_eq!(report.altered, vec!["articles"]);
	assert!(!has_table(&conn, "tmp_articles").await.unwrap());
	assert_eq!(count(&conn, "articles").await, 2);
	let row = conn
		.fetch_one("SELECT title, status FROM articles WHERE id = 1", vec![])
		.await
		.unwrap();
	assert_eq!(row.get::<String>("title").unwrap(), "Engines");
	assert_eq!(row.get::<String>("status").unwrap(), "draft");

	let duplicate = conn
		.execute("INSERT INTO articles (id, title) VALUES (3, 'Engines')", vec![])
		.await
		.unwrap_err();
	assert!(duplicate.is_unique_violation(), "{}", duplicate);
}

#[rstest]
#[tokio::test]
async fn test_unique_violation_keeps_previous_table() {
	let (conn, _, _) = migrated(registry()).await;
	exec(
		&conn,
		"INSERT INTO articles (id, title) VALUES (1, 'Engines'), (2, 'Engines')",
	)
	.await;

	let migrator = migrator(&conn, with_unique_title());
	assert!(!migrator.reconcile(ARTICLE).await.unwrap());

	assert_eq!(count(&conn, "articles").await, 2);
	assert!(!has_table(&conn, "tmp_articles").await.unwrap());
	exec(&conn, "INSERT INTO articles (id, title) VALUES (3, 'Engines')").await;
}

#[rstest]
#[tokio::test]
async fn test_snapshot_follows_reconciled_schema() {
	let (conn, _, _) = migrated(registry()).await;
	let migrator = migrator(&conn, with_unique_title());
	migrator.reconcile_all().await.unwrap();

	let snapshot = migrator.store().snapshot("articles").await.unwrap().unwrap();
	assert!(snapshot.column("title").unwrap().unique);

	let again = migrator.reconcile_all().await.unwrap();
	assert!(again.altered.is_empty());
}
