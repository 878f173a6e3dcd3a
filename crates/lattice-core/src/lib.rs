//! # Lattice Core
//!
//! Schema model shared by every Lattice crate.
//!
//! A content-management schema is a set of named models (content types and
//! components), each a map of [`AttributeDefinition`](schema::AttributeDefinition)s.
//! This crate provides:
//!
//! - **Schema types**: [`AttributeType`](schema::AttributeType) (closed),
//!   [`Nature`](schema::Nature) with its polymorphic [`MorphKind`](schema::MorphKind)
//!   sub-variant, and [`ModelSchema`](schema::ModelSchema)
//! - **Registry**: [`SchemaRegistry`](schema::SchemaRegistry), checked and frozen at bootstrap
//! - **Introspection**: scalar/populatable classification with private-field filtering
//! - **Naming**: snake-casing and table-name singularisation
//!
//! ## Example
//!
//! ```
//! use lattice_core::introspect::{SchemaIntrospector, Visibility};
//! use lattice_core::schema::{AttributeDefinition, AttributeType, ModelSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builder()
//!     .model(
//!         ModelSchema::new("api::tag.tag", "tags")
//!             .attribute("name", AttributeDefinition::new(AttributeType::String).required()),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let classification = SchemaIntrospector::new(&registry)
//!     .classify("api::tag.tag", Visibility::Public)
//!     .unwrap();
//! assert_eq!(classification.scalar_names(), vec!["name"]);
//! ```

pub mod exception;
pub mod introspect;
pub mod naming;
pub mod schema;

pub use exception::{Result, SchemaError};
pub use introspect::{Classification, SchemaIntrospector, Visibility};
pub use schema::{
	AttributeDefinition, AttributeType, ModelSchema, MorphKind, Nature, SchemaRegistry,
};
