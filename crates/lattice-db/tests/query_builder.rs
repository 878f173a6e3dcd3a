//! Query building against a migrated SQLite database

mod common;

use common::{ARTICLE, exec, migrated, registry};
use lattice_db::backends::{DatabaseType, QueryValue};
use lattice_db::orm::{Filter, Operator, Pagination, QueryBuilder, QueryRequest, SortField};
use rstest::rstest;
use serde_json::json;

async fn seeded() -> (lattice_db::DatabaseConnection, QueryBuilder) {
	let (conn, registry, associations) = migrated(registry()).await;
	exec(&conn, "INSERT INTO authors (id, name) VALUES (1, 'Ada'), (2, 'Grace')").await;
	exec(
		&conn,
		"INSERT INTO articles (id, title, status, writer) VALUES \
		 (1, 'Engines', 'published', 1), \
		 (2, 'Compilers', 'draft', 2), \
		 (3, 'Notes', 'archived', 1)",
	)
	.await;
	exec(
		&conn,
		"INSERT INTO articles_authors (article_id, author_id) VALUES (1, 1), (1, 2), (2, 2)",
	)
	.await;
	(conn, QueryBuilder::new(registry, associations))
}

fn ids(rows: &[lattice_db::backends::Row]) -> Vec<i64> {
	rows.iter().map(|row| row.get::<i64>("id").unwrap()).collect()
}

#[rstest]
#[tokio::test]
async fn test_in_filter_binds_each_value() {
	let (conn, builder) = seeded().await;
	let request = QueryRequest::new()
		.filter(Filter::new("status", Operator::In, json!(["draft", "published"])))
		.sort(SortField::asc("id"));
	let query = builder.build(ARTICLE, &request).unwrap();

	let (sql, params) = query.to_sql(DatabaseType::Sqlite).unwrap();
	assert!(sql.contains(r#""articles"."status" IN (?, ?)"#), "{}", sql);
	assert!(!sql.contains(" OR "));
	assert_eq!(
		params,
		vec![
			QueryValue::String("draft".into()),
			QueryValue::String("published".into())
		]
	);

	assert_eq!(ids(&query.fetch(&conn).await.unwrap()), vec![1, 2]);
}

#[rstest]
#[tokio::test]
async fn test_relation_path_joins_before_filtering() {
	let (conn, builder) = seeded().await;
	let request = QueryRequest::new()
		.filter(Filter::eq("writer.name", "Ada"))
		.sort(SortField::asc("id"));
	let query = builder.build(ARTICLE, &request).unwrap();

	let (sql, _) = query.to_sql(DatabaseType::Sqlite).unwrap();
	let join = sql.find("LEFT JOIN").expect("join emitted");
	let filter = sql.find("WHERE").expect("filter emitted");
	assert!(join < filter, "{}", sql);
	assert!(sql.contains(r#""articles"."writer" = "authors_1"."id""#), "{}", sql);
	assert!(sql.contains(r#""authors_1"."name" = ?"#), "{}", sql);

	assert_eq!(ids(&query.fetch(&conn).await.unwrap()), vec![1, 3]);
}

#[rstest]
#[tokio::test]
async fn test_pivot_path_returns_distinct_rows() {
	let (conn, builder) = seeded().await;
	let request = QueryRequest::new()
		.filter(Filter::new("authors.name", Operator::In, json!(["Ada", "Grace"])))
		.sort(SortField::asc("id"));
	let query = builder.build(ARTICLE, &request).unwrap();

	let (sql, _) = query.to_sql(DatabaseType::Sqlite).unwrap();
	assert!(sql.starts_with("SELECT DISTINCT"), "{}", sql);
	assert_eq!(sql.matches("LEFT JOIN").count(), 2);

	assert_eq!(ids(&query.fetch(&conn).await.unwrap()), vec![1, 2]);
	assert_eq!(query.count(&conn).await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_negative_limit_returns_everything() {
	let (conn, builder) = seeded().await;
	let request = QueryRequest::new()
		.sort(SortField::desc("id"))
		.paginate(Pagination::new(0, -1));
	let query = builder.build(ARTICLE, &request).unwrap();

	let (sql, _) = query.to_sql(DatabaseType::Sqlite).unwrap();
	assert!(!sql.contains("LIMIT"), "{}", sql);
	assert_eq!(ids(&query.fetch(&conn).await.unwrap()), vec![3, 2, 1]);

	let page = builder
		.build(
			ARTICLE,
			&QueryRequest::new()
				.sort(SortField::asc("id"))
				.paginate(Pagination::new(1, 1)),
		)
		.unwrap();
	assert_eq!(ids(&page.fetch(&conn).await.unwrap()), vec![2]);
}

#[rstest]
#[tokio::test]
async fn test_contains_is_case_insensitive() {
	let (conn, builder) = seeded().await;
	let request = QueryRequest::new()
		.filter(Filter::new("title", Operator::Contains, "ENG"))
		.sort(SortField::asc("id"));
	let query = builder.build(ARTICLE, &request).unwrap();
	assert_eq!(ids(&query.fetch(&conn).await.unwrap()), vec![1]);

	let request = QueryRequest::from_json(&json!({
		"filters": {"title": {"$containss": "eng"}}
	}))
	.unwrap();
	let query = builder.build(ARTICLE, &request).unwrap();
	let (sql, params) = query.to_sql(DatabaseType::Sqlite).unwrap();
	assert!(sql.contains(r#""articles"."title" LIKE ?"#), "{}", sql);
	assert_eq!(params, vec![QueryValue::String("%eng%".into())]);
}
