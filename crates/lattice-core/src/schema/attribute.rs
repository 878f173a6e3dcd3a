//! Attribute definitions
//!
//! An [`AttributeDefinition`] is one field of a content type or component.
//! Its [`AttributeType`] is a closed enum; every consumer matches on it
//! exhaustively so that adding a type is a compile error until each mapping
//! handles it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::nature::Nature;
use crate::exception::{Result, SchemaError};

/// Attribute type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
	String,
	Text,
	RichText,
	Password,
	Email,
	Uid,
	Integer,
	BigInteger,
	Float,
	Decimal,
	Boolean,
	Date,
	DateTime,
	Time,
	Timestamp,
	Json,
	Blocks,
	Enumeration,
	Media,
	Component,
	DynamicZone,
	Relation,
	CustomField,
}

impl AttributeType {
	pub const ALL: [AttributeType; 23] = [
		AttributeType::String,
		AttributeType::Text,
		AttributeType::RichText,
		AttributeType::Password,
		AttributeType::Email,
		AttributeType::Uid,
		AttributeType::Integer,
		AttributeType::BigInteger,
		AttributeType::Float,
		AttributeType::Decimal,
		AttributeType::Boolean,
		AttributeType::Date,
		AttributeType::DateTime,
		AttributeType::Time,
		AttributeType::Timestamp,
		AttributeType::Json,
		AttributeType::Blocks,
		AttributeType::Enumeration,
		AttributeType::Media,
		AttributeType::Component,
		AttributeType::DynamicZone,
		AttributeType::Relation,
		AttributeType::CustomField,
	];

	/// Type tag as written in schema documents
	pub fn as_str(&self) -> &'static str {
		match self {
			AttributeType::String => "string",
			AttributeType::Text => "text",
			AttributeType::RichText => "richtext",
			AttributeType::Password => "password",
			AttributeType::Email => "email",
			AttributeType::Uid => "uid",
			AttributeType::Integer => "integer",
			AttributeType::BigInteger => "biginteger",
			AttributeType::Float => "float",
			AttributeType::Decimal => "decimal",
			AttributeType::Boolean => "boolean",
			AttributeType::Date => "date",
			AttributeType::DateTime => "datetime",
			AttributeType::Time => "time",
			AttributeType::Timestamp => "timestamp",
			AttributeType::Json => "json",
			AttributeType::Blocks => "blocks",
			AttributeType::Enumeration => "enumeration",
			AttributeType::Media => "media",
			AttributeType::Component => "component",
			AttributeType::DynamicZone => "dynamiczone",
			AttributeType::Relation => "relation",
			AttributeType::CustomField => "customField",
		}
	}

	/// Whether values of this type are stored in a single column of the owning table.
	///
	/// Custom fields report `false` here; resolve them through the registry first.
	pub fn is_scalar(&self) -> bool {
		match self {
			AttributeType::String
			| AttributeType::Text
			| AttributeType::RichText
			| AttributeType::Password
			| AttributeType::Email
			| AttributeType::Uid
			| AttributeType::Integer
			| AttributeType::BigInteger
			| AttributeType::Float
			| AttributeType::Decimal
			| AttributeType::Boolean
			| AttributeType::Date
			| AttributeType::DateTime
			| AttributeType::Time
			| AttributeType::Timestamp
			| AttributeType::Json
			| AttributeType::Blocks
			| AttributeType::Enumeration => true,
			AttributeType::Media
			| AttributeType::Component
			| AttributeType::DynamicZone
			| AttributeType::Relation
			| AttributeType::CustomField => false,
		}
	}

	/// Whether this type holds characters and accepts length constraints
	pub fn is_textual(&self) -> bool {
		matches!(
			self,
			AttributeType::String
				| AttributeType::Text
				| AttributeType::RichText
				| AttributeType::Password
				| AttributeType::Email
				| AttributeType::Uid
		)
	}

	/// Whether this type is numeric and accepts `min`/`max`
	pub fn is_numeric(&self) -> bool {
		matches!(
			self,
			AttributeType::Integer
				| AttributeType::BigInteger
				| AttributeType::Float
				| AttributeType::Decimal
		)
	}
}

impl fmt::Display for AttributeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AttributeType {
	type Err = SchemaError;

	fn from_str(s: &str) -> Result<Self> {
		AttributeType::ALL
			.iter()
			.find(|t| t.as_str() == s)
			.copied()
			.ok_or_else(|| SchemaError::UnsupportedType(s.to_string()))
	}
}

impl Serialize for AttributeType {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for AttributeType {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Zero-argument default factory
#[derive(Clone)]
pub struct DefaultFactory(Arc<dyn Fn() -> serde_json::Value + Send + Sync>);

impl DefaultFactory {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn() -> serde_json::Value + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn produce(&self) -> serde_json::Value {
		(self.0)()
	}
}

/// Default value of an attribute
#[derive(Clone)]
pub enum DefaultValue {
	Literal(serde_json::Value),
	Factory(DefaultFactory),
}

impl DefaultValue {
	/// Evaluate the default
	pub fn resolve(&self) -> serde_json::Value {
		match self {
			DefaultValue::Literal(value) => value.clone(),
			DefaultValue::Factory(factory) => factory.produce(),
		}
	}
}

impl fmt::Debug for DefaultValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
			DefaultValue::Factory(_) => f.write_str("Factory(..)"),
		}
	}
}

impl PartialEq for DefaultValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(DefaultValue::Literal(a), DefaultValue::Literal(b)) => a == b,
			(DefaultValue::Factory(a), DefaultValue::Factory(b)) => Arc::ptr_eq(&a.0, &b.0),
			_ => false,
		}
	}
}

// Factories are runtime-only; they serialize as null so that stored
// snapshots stay comparable.
impl Serialize for DefaultValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		match self {
			DefaultValue::Literal(value) => value.serialize(serializer),
			DefaultValue::Factory(_) => serializer.serialize_none(),
		}
	}
}

impl<'de> Deserialize<'de> for DefaultValue {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		serde_json::Value::deserialize(deserializer).map(DefaultValue::Literal)
	}
}

fn is_false(value: &bool) -> bool {
	!*value
}

/// One schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
	#[serde(rename = "type")]
	pub kind: AttributeType,

	#[serde(default, skip_serializing_if = "is_false")]
	pub required: bool,

	#[serde(default, skip_serializing_if = "is_false")]
	pub unique: bool,

	#[serde(default, skip_serializing_if = "is_false")]
	pub private: bool,

	/// `false` makes the field read-only for API writes
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub writable: Option<bool>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub configurable: Option<bool>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<DefaultValue>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub min_length: Option<usize>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_length: Option<usize>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub min: Option<f64>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max: Option<f64>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub regex: Option<String>,

	#[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
	pub enum_values: Option<Vec<String>>,

	/// Media: accept several files
	#[serde(default, skip_serializing_if = "is_false")]
	pub multiple: bool,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowed_types: Option<Vec<String>>,

	/// Component: list of entries
	#[serde(default, skip_serializing_if = "is_false")]
	pub repeatable: bool,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub component: Option<String>,

	/// Dynamic zone: allowed component UIDs
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub components: Option<Vec<String>>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relation: Option<Nature>,

	/// Relation target UID, `*` for polymorphic targets
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target: Option<String>,

	/// Inverse attribute on the target
	#[serde(
		default,
		alias = "inversedBy",
		alias = "mappedBy",
		skip_serializing_if = "Option::is_none"
	)]
	pub via: Option<String>,

	/// Owning side of a many-to-many pivot table
	#[serde(default, skip_serializing_if = "is_false")]
	pub dominant: bool,

	/// Explicit pivot table name
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub collection_name: Option<String>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub with_pivot: Vec<String>,

	/// Uid: attribute the value is generated from
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_field: Option<String>,

	/// Custom field UID
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_field: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<serde_json::Value>,
}

impl AttributeDefinition {
	/// Bare attribute of the given type
	pub fn new(kind: AttributeType) -> Self {
		Self {
			kind,
			required: false,
			unique: false,
			private: false,
			writable: None,
			configurable: None,
			default: None,
			min_length: None,
			max_length: None,
			min: None,
			max: None,
			regex: None,
			enum_values: None,
			multiple: false,
			allowed_types: None,
			repeatable: false,
			component: None,
			components: None,
			relation: None,
			target: None,
			via: None,
			dominant: false,
			collection_name: None,
			with_pivot: Vec::new(),
			target_field: None,
			custom_field: None,
			options: None,
		}
	}

	/// Relation attribute
	pub fn relation(nature: Nature, target: impl Into<String>) -> Self {
		let mut attr = Self::new(AttributeType::Relation);
		attr.relation = Some(nature);
		attr.target = Some(target.into());
		attr
	}

	/// Component attribute
	pub fn component(uid: impl Into<String>, repeatable: bool) -> Self {
		let mut attr = Self::new(AttributeType::Component);
		attr.component = Some(uid.into());
		attr.repeatable = repeatable;
		attr
	}

	/// Enumeration attribute
	pub fn enumeration<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut attr = Self::new(AttributeType::Enumeration);
		attr.enum_values = Some(values.into_iter().map(Into::into).collect());
		attr
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	pub fn private(mut self) -> Self {
		self.private = true;
		self
	}

	pub fn read_only(mut self) -> Self {
		self.writable = Some(false);
		self
	}

	pub fn with_via(mut self, via: impl Into<String>) -> Self {
		self.via = Some(via.into());
		self
	}

	pub fn dominant(mut self) -> Self {
		self.dominant = true;
		self
	}

	pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
		self.min_length = min;
		self.max_length = max;
		self
	}

	pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
		self.min = min;
		self.max = max;
		self
	}

	pub fn with_default(mut self, value: serde_json::Value) -> Self {
		self.default = Some(DefaultValue::Literal(value));
		self
	}

	pub fn with_default_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn() -> serde_json::Value + Send + Sync + 'static,
	{
		self.default = Some(DefaultValue::Factory(DefaultFactory::new(factory)));
		self
	}

	/// Whether API writes may set this field
	pub fn is_writable(&self) -> bool {
		self.writable.unwrap_or(true)
	}

	/// Whether this relation targets any model (`*`)
	pub fn is_polymorphic_target(&self) -> bool {
		self.target.as_deref() == Some("*")
	}

	/// Check that the constraints present are legal for the type.
	///
	/// `model` and `name` only feed error messages.
	pub fn check(&self, model: &str, name: &str) -> Result<()> {
		let illegal = |constraint: &str| SchemaError::IllegalConstraint {
			model: model.to_string(),
			attribute: name.to_string(),
			kind: self.kind.to_string(),
			constraint: constraint.to_string(),
		};
		let missing = |constraint: &str| SchemaError::MissingConstraint {
			model: model.to_string(),
			attribute: name.to_string(),
			kind: self.kind.to_string(),
			constraint: constraint.to_string(),
		};

		// Custom fields carry the constraints of their underlying type, which
		// is checked once the custom field is resolved.
		if self.kind == AttributeType::CustomField {
			if self.custom_field.is_none() {
				return Err(missing("customField"));
			}
			return Ok(());
		}
		if self.custom_field.is_some() {
			return Err(illegal("customField"));
		}

		if (self.min_length.is_some() || self.max_length.is_some()) && !self.kind.is_textual() {
			return Err(illegal("minLength/maxLength"));
		}
		if (self.min.is_some() || self.max.is_some()) && !self.kind.is_numeric() {
			return Err(illegal("min/max"));
		}
		if self.regex.is_some() && !self.kind.is_textual() {
			return Err(illegal("regex"));
		}
		if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
			if min > max {
				return Err(illegal("minLength greater than maxLength"));
			}
		}
		if let (Some(min), Some(max)) = (self.min, self.max) {
			if min > max {
				return Err(illegal("min greater than max"));
			}
		}

		match self.kind {
			AttributeType::Enumeration => match &self.enum_values {
				None => return Err(missing("enum")),
				Some(values) if values.is_empty() => {
					return Err(SchemaError::EmptyEnumeration {
						model: model.to_string(),
						attribute: name.to_string(),
					});
				}
				Some(_) => {}
			},
			_ if self.enum_values.is_some() => return Err(illegal("enum")),
			_ => {}
		}

		if self.kind != AttributeType::Media {
			if self.multiple {
				return Err(illegal("multiple"));
			}
			if self.allowed_types.is_some() {
				return Err(illegal("allowedTypes"));
			}
		}

		if self.kind == AttributeType::Component {
			if self.component.is_none() {
				return Err(missing("component"));
			}
		} else if self.component.is_some() {
			return Err(illegal("component"));
		} else if self.repeatable {
			return Err(illegal("repeatable"));
		}

		if self.kind == AttributeType::DynamicZone {
			match &self.components {
				Some(components) if !components.is_empty() => {}
				_ => return Err(missing("components")),
			}
		} else if self.components.is_some() {
			return Err(illegal("components"));
		}

		if self.kind == AttributeType::Relation {
			if self.relation.is_none() {
				return Err(missing("relation"));
			}
			if self.target.is_none() {
				return Err(missing("target"));
			}
		} else {
			for (present, constraint) in [
				(self.relation.is_some(), "relation"),
				(self.target.is_some(), "target"),
				(self.via.is_some(), "via"),
				(self.dominant, "dominant"),
				(self.collection_name.is_some(), "collectionName"),
				(!self.with_pivot.is_empty(), "withPivot"),
			] {
				if present {
					return Err(illegal(constraint));
				}
			}
		}

		if self.target_field.is_some() && self.kind != AttributeType::Uid {
			return Err(illegal("targetField"));
		}

		Ok(())
	}
}
