//! # Lattice Validators
//!
//! Derives validation schemas from content-type schemas.
//!
//! ## Overview
//!
//! - [`mapper`]: one attribute → one [`FieldRule`](rule::FieldRule), in read
//!   mode (related entities embedded) or input mode (related entities by ID)
//! - [`builder`]: whole-entity `document`, `documents`, `data` and
//!   `partialBody` schemas plus query-parameter schemas
//! - [`cache`]: per-builder memoisation that also breaks reference cycles
//!   between mutually-referencing models
//!
//! Validation returns the normalised value or every field-addressable error:
//!
//! ```
//! use std::sync::Arc;
//! use lattice_core::schema::{AttributeDefinition, AttributeType, ModelSchema, SchemaRegistry};
//! use lattice_validators::ValidatorBuilder;
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::builder()
//!     .model(
//!         ModelSchema::new("api::tag.tag", "tags")
//!             .attribute("name", AttributeDefinition::new(AttributeType::String).required()),
//!     )
//!     .build()
//!     .unwrap();
//! let builder = ValidatorBuilder::new(Arc::new(registry));
//!
//! let input = builder.input("api::tag.tag").unwrap();
//! assert!(input.validate(&json!({ "name": "rust" })).is_ok());
//!
//! let errors = input.validate(&json!({})).unwrap_err();
//! assert_eq!(errors.paths(), vec!["name"]);
//! ```

pub mod builder;
pub mod cache;
pub mod error;
pub mod formats;
pub mod mapper;
pub mod query_params;
pub mod rule;

pub use builder::{Schema, ValidatorBuilder};
pub use cache::SchemaCache;
pub use error::{BuildError, ErrorCode, FieldPath, Result, ValidationError, ValidationErrors};
pub use mapper::{MappingContext, map_to_validation};
pub use query_params::QueryParam;
pub use rule::{FieldRule, IdKind, Mode, Rule};
