//! Shared fixtures for lattice-db integration tests

#![allow(dead_code)]

use std::sync::Arc;

use lattice_core::schema::{
	AttributeDefinition, AttributeType, ModelSchema, MorphKind, Nature, SchemaRegistry,
};
use lattice_db::associations::AssociationTable;
use lattice_db::backends::{DatabaseConnection, RecordingBackend, StatementLog};
use lattice_db::migrations::SchemaMigrator;
use sqlx::sqlite::SqlitePoolOptions;

pub const ARTICLE: &str = "api::article.article";
pub const AUTHOR: &str = "api::author.author";
pub const FILE: &str = "plugin::upload.file";

pub fn file() -> ModelSchema {
	ModelSchema::new(FILE, "upload_file")
		.attribute("name", AttributeDefinition::new(AttributeType::String))
		.attribute(
			"related",
			AttributeDefinition::relation(Nature::Morph(MorphKind::ManyMorphToMany), "*"),
		)
}

pub fn author() -> ModelSchema {
	ModelSchema::new(AUTHOR, "authors")
		.attribute("name", AttributeDefinition::new(AttributeType::String))
		.attribute(
			"articles",
			AttributeDefinition::relation(Nature::ManyToMany, ARTICLE).with_via("authors"),
		)
		.attribute(
			"posts",
			AttributeDefinition::relation(Nature::OneToMany, ARTICLE).with_via("writer"),
		)
}

pub fn article() -> ModelSchema {
	ModelSchema::new(ARTICLE, "articles")
		.with_timestamps()
		.attribute(
			"title",
			AttributeDefinition::new(AttributeType::String).required(),
		)
		.attribute("status", AttributeDefinition::new(AttributeType::String))
		.attribute(
			"authors",
			AttributeDefinition::relation(Nature::ManyToMany, AUTHOR)
				.with_via("articles")
				.dominant(),
		)
		.attribute(
			"writer",
			AttributeDefinition::relation(Nature::ManyToOne, AUTHOR).with_via("posts"),
		)
		.attribute("cover", AttributeDefinition::new(AttributeType::Media))
}

/// File, author and article models
pub fn registry() -> SchemaRegistry {
	registry_with(article())
}

/// The standard registry with `article` swapped for another definition
pub fn registry_with(article: ModelSchema) -> SchemaRegistry {
	SchemaRegistry::builder()
		.models([file(), author(), article])
		.build()
		.unwrap()
}

/// Single-connection in-memory SQLite; every pooled connection would
/// otherwise see its own empty database
pub async fn sqlite() -> DatabaseConnection {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	DatabaseConnection::from_sqlite_pool(pool)
}

/// `conn` wrapped so every statement lands in the returned log
pub fn recording(conn: &DatabaseConnection) -> (DatabaseConnection, StatementLog) {
	let backend = RecordingBackend::new(conn.backend());
	let log = backend.log();
	(DatabaseConnection::new(Arc::new(backend)), log)
}

/// Connection with every table of `registry` created
pub async fn migrated(
	registry: SchemaRegistry,
) -> (DatabaseConnection, Arc<SchemaRegistry>, Arc<AssociationTable>) {
	let conn = sqlite().await;
	let associations = Arc::new(AssociationTable::build(&registry).unwrap());
	let registry = Arc::new(registry);
	let report = SchemaMigrator::new(conn.clone(), registry.clone(), associations.clone())
		.reconcile_all()
		.await
		.unwrap();
	assert!(report.is_success(), "{:?}", report.failed);
	(conn, registry, associations)
}

pub async fn exec(conn: &DatabaseConnection, sql: &str) {
	conn.execute(sql, vec![]).await.unwrap();
}
