//! Schema registry, attribute model and introspection.
//!
//! # Examples
//!
//! ```rust
//! use lattice::core::schema::{AttributeDefinition, AttributeType, ModelSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builder()
//!     .model(
//!         ModelSchema::new("api::tag.tag", "tags")
//!             .attribute("name", AttributeDefinition::new(AttributeType::String)),
//!     )
//!     .build()
//!     .unwrap();
//! assert!(registry.contains("api::tag.tag"));
//! ```

pub use lattice_core::*;
