//! Declarative content-type schemas

pub mod attribute;
pub mod custom_field;
pub mod model;
pub mod nature;
pub mod registry;

pub use attribute::{AttributeDefinition, AttributeType, DefaultFactory, DefaultValue};
pub use custom_field::CustomFieldDefinition;
pub use model::{ModelInfo, ModelKind, ModelOptions, ModelSchema, PrimaryKeyType, Timestamps};
pub use nature::{MorphKind, Nature};
pub use registry::{
	DEFAULT_UPLOAD_MODEL, SENSITIVE_ATTRIBUTES, SchemaRegistry, SchemaRegistryBuilder,
};
