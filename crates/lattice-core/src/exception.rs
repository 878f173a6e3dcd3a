//! Configuration errors raised while loading or interpreting schemas.
//!
//! Every variant here is fatal: a schema that produces one of these errors
//! cannot be validated, queried or migrated consistently, so bootstrap must
//! stop instead of degrading.

use thiserror::Error;

/// Schema configuration error
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
	/// An attribute declares a type tag that has no mapping
	#[error("Unsupported attribute type \"{0}\"")]
	UnsupportedType(String),

	/// A relation points at a model that is not registered anywhere
	#[error(
		"Model \"{target}\" referenced by {model}.{attribute} was not found in content types, components or plugins"
	)]
	UnknownTarget {
		model: String,
		attribute: String,
		target: String,
	},

	/// A model UID was requested that the registry does not know
	#[error("Unknown model \"{0}\"")]
	UnknownModel(String),

	/// A custom field attribute references an unregistered custom field
	#[error("Custom field \"{custom_field}\" used by {model}.{attribute} is not registered")]
	MissingCustomField {
		model: String,
		attribute: String,
		custom_field: String,
	},

	/// An enumeration declares no values
	#[error("Enumeration {model}.{attribute} must declare at least one value")]
	EmptyEnumeration { model: String, attribute: String },

	/// A constraint is not legal for the attribute's type
	#[error("Constraint \"{constraint}\" is not allowed on {model}.{attribute} of type {kind}")]
	IllegalConstraint {
		model: String,
		attribute: String,
		kind: String,
		constraint: String,
	},

	/// A required constraint is missing for the attribute's type
	#[error("{model}.{attribute} of type {kind} requires \"{constraint}\"")]
	MissingConstraint {
		model: String,
		attribute: String,
		kind: String,
		constraint: String,
	},

	/// A relation pairing is inconsistent
	#[error("Invalid relation {model}.{attribute}: {reason}")]
	InvalidRelation {
		model: String,
		attribute: String,
		reason: String,
	},

	/// Two models share the same UID or table name
	#[error("Duplicate {what} \"{value}\"")]
	Duplicate { what: &'static str, value: String },

	/// A schema document could not be parsed
	#[error("Invalid schema document: {0}")]
	Parse(String),
}

impl From<serde_json::Error> for SchemaError {
	fn from(err: serde_json::Error) -> Self {
		SchemaError::Parse(err.to_string())
	}
}

/// Result alias for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;
