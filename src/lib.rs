//! # Lattice
//!
//! Schema-driven runtime for content types. One registry of content-type
//! and component schemas drives input validation, relational query plans,
//! table reconciliation and relation-synchronising writes.
//!
//! ## Feature Flags
//!
//! - `core` - schema registry, attribute model and introspection
//! - `validators` - validation schemas derived from content types
//! - `database` - associations, query builder, migrator and relation mutator
//! - `conf` - TOML settings
//! - `full` (default) - everything, plus the [`Lattice`] bootstrap
//!
//! ## Example
//!
//! ```
//! use lattice::{AttributeDefinition, AttributeType, Lattice, ModelSchema, Settings};
//! use lattice::conf::DatabaseConfig;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut settings = Settings::default();
//! settings.database = DatabaseConfig::in_memory();
//!
//! let registry = Lattice::registry_builder(&settings)
//!     .model(
//!         ModelSchema::new("api::tag.tag", "tags")
//!             .attribute("name", AttributeDefinition::new(AttributeType::String).required()),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let lattice = Lattice::start(settings, registry).await.unwrap();
//! let input = lattice.validators().input("api::tag.tag").unwrap();
//! assert!(input.validate(&json!({ "name": "rust" })).is_ok());
//! # }
//! ```

#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "database")]
pub mod db;
#[cfg(all(feature = "validators", feature = "database", feature = "conf"))]
pub mod runtime;
#[cfg(feature = "validators")]
pub mod validators;

// Re-export schema types
#[cfg(feature = "core")]
pub use lattice_core::{
	AttributeDefinition, AttributeType, ModelSchema, MorphKind, Nature, SchemaError,
	SchemaIntrospector, SchemaRegistry,
};

// Re-export settings
#[cfg(feature = "conf")]
pub use lattice_conf::{ConfError, Settings};

// Re-export validators
#[cfg(feature = "validators")]
pub use lattice_validators::{Schema, ValidationErrors, ValidatorBuilder};

// Re-export database layer
#[cfg(feature = "database")]
pub use lattice_db::{
	AssociationTable, DatabaseConnection, DatabaseError, Lifecycle, LifecycleRegistry,
	MigrationError, MutationError, QueryBuilder, QueryError, QueryRequest, Record,
	RelationMutator, SchemaMigrator,
};

#[cfg(all(feature = "validators", feature = "database", feature = "conf"))]
pub use runtime::{Lattice, LatticeError};
