//! # Lattice DB
//!
//! Database layer of Lattice: everything between a frozen
//! [`SchemaRegistry`](lattice_core::SchemaRegistry) and SQL.
//!
//! - **Associations**: every relation attribute resolved to its storage
//!   (owning column, foreign key, pivot table or morph table)
//! - **Backends**: sqlx pools for PostgreSQL, MySQL and SQLite behind one
//!   [`DatabaseConnection`]
//! - **Migrations**: idempotent table reconciliation with stored snapshots
//! - **ORM**: query building, record reads and relation-synchronising writes
//!
//! ## Example
//!
//! ```
//! use lattice_core::schema::{AttributeDefinition, AttributeType, ModelSchema, Nature, SchemaRegistry};
//! use lattice_db::associations::AssociationTable;
//! use lattice_db::backends::DatabaseType;
//! use lattice_db::orm::{Filter, QueryBuilder, QueryRequest};
//! use std::sync::Arc;
//!
//! let registry = SchemaRegistry::builder()
//!     .model(
//!         ModelSchema::new("api::author.author", "authors")
//!             .attribute("name", AttributeDefinition::new(AttributeType::String)),
//!     )
//!     .model(
//!         ModelSchema::new("api::article.article", "articles")
//!             .attribute("author", AttributeDefinition::relation(Nature::OneWay, "api::author.author")),
//!     )
//!     .build()
//!     .unwrap();
//! let associations = AssociationTable::build(&registry).unwrap();
//!
//! let builder = QueryBuilder::new(Arc::new(registry), Arc::new(associations));
//! let request = QueryRequest::new().filter(Filter::eq("author.name", "Ada"));
//! let query = builder.build("api::article.article", &request).unwrap();
//! let (sql, _) = query.to_sql(DatabaseType::Sqlite).unwrap();
//! assert!(sql.contains("LEFT JOIN"));
//! ```

pub mod associations;
pub mod backends;
pub mod migrations;
pub mod orm;

pub use associations::{Association, AssociationTable};
pub use backends::{DatabaseConnection, DatabaseError, DatabaseType, QueryValue};
pub use migrations::{MigrationError, MigrationReport, SchemaMigrator};
pub use orm::{
	ExecutableQuery, Lifecycle, LifecycleRegistry, MutationError, QueryBuilder, QueryError,
	QueryRequest, Record, RelationMutator,
};
