//! Content-type and component schemas

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::attribute::AttributeDefinition;

/// Kind of schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
	#[default]
	CollectionType,
	SingleType,
	Component,
}

/// Storage type of the primary key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryKeyType {
	#[default]
	Integer,
	Uuid,
}

/// Timestamp columns maintained on every write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamps {
	Enabled(bool),
	Columns([String; 2]),
}

impl Default for Timestamps {
	fn default() -> Self {
		Timestamps::Enabled(false)
	}
}

impl Timestamps {
	/// `(created, updated)` column names when enabled
	pub fn columns(&self) -> Option<(&str, &str)> {
		match self {
			Timestamps::Enabled(true) => Some(("created_at", "updated_at")),
			Timestamps::Enabled(false) => None,
			Timestamps::Columns([created, updated]) => Some((created.as_str(), updated.as_str())),
		}
	}
}

/// Schema-level options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
	#[serde(default)]
	pub timestamps: Timestamps,

	/// Attributes hidden from API responses in addition to `private: true` ones
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub private_attributes: Vec<String>,

	#[serde(default)]
	pub draft_and_publish: bool,
}

/// Display information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub singular_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub plural_name: Option<String>,
}

fn default_primary_key() -> String {
	"id".to_string()
}

/// A content type or component schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
	pub uid: String,

	#[serde(default)]
	pub kind: ModelKind,

	/// Table name
	pub collection_name: String,

	#[serde(default = "default_primary_key")]
	pub primary_key: String,

	#[serde(default)]
	pub primary_key_type: PrimaryKeyType,

	#[serde(default)]
	pub info: ModelInfo,

	#[serde(default)]
	pub options: ModelOptions,

	#[serde(default)]
	pub attributes: IndexMap<String, AttributeDefinition>,
}

impl ModelSchema {
	/// Collection-type schema with no attributes
	pub fn new(uid: impl Into<String>, collection_name: impl Into<String>) -> Self {
		Self {
			uid: uid.into(),
			kind: ModelKind::CollectionType,
			collection_name: collection_name.into(),
			primary_key: default_primary_key(),
			primary_key_type: PrimaryKeyType::Integer,
			info: ModelInfo::default(),
			options: ModelOptions::default(),
			attributes: IndexMap::new(),
		}
	}

	/// Component schema with no attributes
	pub fn component(uid: impl Into<String>, collection_name: impl Into<String>) -> Self {
		let mut schema = Self::new(uid, collection_name);
		schema.kind = ModelKind::Component;
		schema
	}

	/// Add an attribute, keeping declaration order
	pub fn attribute(mut self, name: impl Into<String>, attribute: AttributeDefinition) -> Self {
		self.attributes.insert(name.into(), attribute);
		self
	}

	pub fn with_timestamps(mut self) -> Self {
		self.options.timestamps = Timestamps::Enabled(true);
		self
	}

	pub fn with_primary_key_type(mut self, pk_type: PrimaryKeyType) -> Self {
		self.primary_key_type = pk_type;
		self
	}

	pub fn is_component(&self) -> bool {
		self.kind == ModelKind::Component
	}

	/// Plugin owning this model, taken from a `plugin::<name>.<model>` UID
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::ModelSchema;
	///
	/// let file = ModelSchema::new("plugin::upload.file", "upload_file");
	/// assert_eq!(file.plugin(), Some("upload"));
	///
	/// let article = ModelSchema::new("api::article.article", "articles");
	/// assert_eq!(article.plugin(), None);
	/// ```
	pub fn plugin(&self) -> Option<&str> {
		let rest = self.uid.strip_prefix("plugin::")?;
		rest.split('.').next()
	}

	/// Short name used for global identifiers (`article` for `api::article.article`)
	pub fn model_name(&self) -> &str {
		let tail = self.uid.rsplit("::").next().unwrap_or(&self.uid);
		tail.rsplit('.').next().unwrap_or(tail)
	}

	pub fn get_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
		self.attributes.get(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_deserialize_schema_with_defaults() {
		let schema: ModelSchema = serde_json::from_value(json!({
			"uid": "api::article.article",
			"collectionName": "articles",
			"options": { "timestamps": true },
			"attributes": {
				"title": { "type": "string" },
				"body": { "type": "richtext" }
			}
		}))
		.unwrap();

		assert_eq!(schema.primary_key, "id");
		assert_eq!(schema.primary_key_type, PrimaryKeyType::Integer);
		assert_eq!(schema.kind, ModelKind::CollectionType);
		assert_eq!(
			schema.options.timestamps.columns(),
			Some(("created_at", "updated_at"))
		);
		let names: Vec<&str> = schema.attributes.keys().map(String::as_str).collect();
		assert_eq!(names, vec!["title", "body"]);
	}

	#[rstest]
	fn test_custom_timestamp_columns() {
		let options: ModelOptions =
			serde_json::from_value(json!({ "timestamps": ["created", "modified"] })).unwrap();
		assert_eq!(options.timestamps.columns(), Some(("created", "modified")));
	}

	#[rstest]
	#[case("api::article.article", "article")]
	#[case("plugin::upload.file", "file")]
	#[case("default.hero", "hero")]
	fn test_model_name(#[case] uid: &str, #[case] expected: &str) {
		assert_eq!(ModelSchema::new(uid, "t").model_name(), expected);
	}
}
