//! Schema registry
//!
//! The registry is assembled once at bootstrap through
//! [`SchemaRegistryBuilder`] and is immutable afterwards. Building it checks
//! every attribute, resolves custom fields and verifies that every
//! referenced model exists, so a registry value is always internally
//! consistent.

use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::attribute::{AttributeDefinition, AttributeType};
use super::custom_field::CustomFieldDefinition;
use super::model::ModelSchema;
use crate::exception::{Result, SchemaError};

/// UID of the model backing media attributes unless configured otherwise
pub const DEFAULT_UPLOAD_MODEL: &str = "plugin::upload.file";

/// Built-in attributes that are never exposed through the API
pub const SENSITIVE_ATTRIBUTES: &[&str] = &["created_by", "updated_by"];

/// Immutable collection of content types, components and custom fields
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
	models: IndexMap<String, Arc<ModelSchema>>,
	custom_fields: IndexMap<String, CustomFieldDefinition>,
	private_attributes: Vec<String>,
	upload_model: String,
}

impl SchemaRegistry {
	pub fn builder() -> SchemaRegistryBuilder {
		SchemaRegistryBuilder::default()
	}

	/// Load a registry from JSON schema documents
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::SchemaRegistry;
	///
	/// let registry = SchemaRegistry::from_json_documents(&[r#"{
	///     "uid": "api::tag.tag",
	///     "collectionName": "tags",
	///     "attributes": { "name": { "type": "string" } }
	/// }"#])
	/// .unwrap();
	///
	/// assert!(registry.get_model("api::tag.tag").is_ok());
	/// ```
	pub fn from_json_documents(documents: &[&str]) -> Result<Self> {
		let mut builder = Self::builder();
		for document in documents {
			let schema: ModelSchema = serde_json::from_str(document)?;
			builder = builder.model(schema);
		}
		builder.build()
	}

	/// Look up a content type or component by UID
	pub fn get_model(&self, uid: &str) -> Result<&ModelSchema> {
		self.models
			.get(uid)
			.map(Arc::as_ref)
			.ok_or_else(|| SchemaError::UnknownModel(uid.to_string()))
	}

	/// Shared handle to a model
	pub fn model_arc(&self, uid: &str) -> Result<Arc<ModelSchema>> {
		self.models
			.get(uid)
			.cloned()
			.ok_or_else(|| SchemaError::UnknownModel(uid.to_string()))
	}

	pub fn contains(&self, uid: &str) -> bool {
		self.models.contains_key(uid)
	}

	/// Find a model by its table name
	pub fn find_by_collection(&self, collection_name: &str) -> Option<&ModelSchema> {
		self.models
			.values()
			.map(Arc::as_ref)
			.find(|model| model.collection_name == collection_name)
	}

	/// All models in registration order
	pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
		self.models.values().map(Arc::as_ref)
	}

	/// Component schemas only
	pub fn components(&self) -> impl Iterator<Item = &ModelSchema> {
		self.models().filter(|model| model.is_component())
	}

	pub fn custom_field(&self, uid: &str) -> Option<&CustomFieldDefinition> {
		self.custom_fields.get(uid)
	}

	/// Globally private attribute names
	pub fn private_attributes(&self) -> &[String] {
		&self.private_attributes
	}

	/// UID of the model that media attributes relate to
	pub fn upload_model(&self) -> &str {
		&self.upload_model
	}

	/// Attribute type after custom-field indirection
	pub fn effective_type(&self, attribute: &AttributeDefinition) -> Result<AttributeType> {
		match attribute.kind {
			AttributeType::CustomField => {
				let uid = attribute.custom_field.as_deref().unwrap_or_default();
				self.custom_fields
					.get(uid)
					.map(|definition| definition.kind)
					.ok_or_else(|| SchemaError::MissingCustomField {
						model: String::new(),
						attribute: String::new(),
						custom_field: uid.to_string(),
					})
			}
			kind => Ok(kind),
		}
	}

	/// The attribute with custom fields replaced by their underlying type
	pub fn resolve_attribute<'a>(
		&self,
		model: &str,
		name: &str,
		attribute: &'a AttributeDefinition,
	) -> Result<Cow<'a, AttributeDefinition>> {
		if attribute.kind != AttributeType::CustomField {
			return Ok(Cow::Borrowed(attribute));
		}
		let uid = attribute.custom_field.as_deref().unwrap_or_default();
		let definition =
			self.custom_fields
				.get(uid)
				.ok_or_else(|| SchemaError::MissingCustomField {
					model: model.to_string(),
					attribute: name.to_string(),
					custom_field: uid.to_string(),
				})?;
		let mut resolved = attribute.clone();
		resolved.kind = definition.kind;
		resolved.custom_field = None;
		Ok(Cow::Owned(resolved))
	}
}

/// Collects models and custom fields, then validates them as a whole
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
	models: Vec<ModelSchema>,
	custom_fields: Vec<CustomFieldDefinition>,
	private_attributes: Vec<String>,
	upload_model: Option<String>,
}

impl SchemaRegistryBuilder {
	pub fn model(mut self, schema: ModelSchema) -> Self {
		self.models.push(schema);
		self
	}

	pub fn models<I: IntoIterator<Item = ModelSchema>>(mut self, schemas: I) -> Self {
		self.models.extend(schemas);
		self
	}

	pub fn custom_field(mut self, definition: CustomFieldDefinition) -> Self {
		self.custom_fields.push(definition);
		self
	}

	pub fn private_attributes<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.private_attributes
			.extend(names.into_iter().map(Into::into));
		self
	}

	pub fn upload_model(mut self, uid: impl Into<String>) -> Self {
		self.upload_model = Some(uid.into());
		self
	}

	/// Validate and freeze the registry
	pub fn build(self) -> Result<SchemaRegistry> {
		let mut models = IndexMap::new();
		let mut tables = HashSet::new();
		for schema in self.models {
			if !tables.insert(schema.collection_name.clone()) {
				return Err(SchemaError::Duplicate {
					what: "collection name",
					value: schema.collection_name,
				});
			}
			if models.contains_key(&schema.uid) {
				return Err(SchemaError::Duplicate {
					what: "model uid",
					value: schema.uid,
				});
			}
			models.insert(schema.uid.clone(), Arc::new(schema));
		}

		let mut custom_fields = IndexMap::new();
		for definition in self.custom_fields {
			if !definition.kind.is_scalar() {
				return Err(SchemaError::UnsupportedType(format!(
					"{} (custom field {})",
					definition.kind, definition.uid
				)));
			}
			if custom_fields.contains_key(&definition.uid) {
				return Err(SchemaError::Duplicate {
					what: "custom field",
					value: definition.uid,
				});
			}
			custom_fields.insert(definition.uid.clone(), definition);
		}

		let registry = SchemaRegistry {
			models,
			custom_fields,
			private_attributes: self.private_attributes,
			upload_model: self
				.upload_model
				.unwrap_or_else(|| DEFAULT_UPLOAD_MODEL.to_string()),
		};

		for model in registry.models() {
			registry.check_model(model)?;
		}

		debug!(
			models = registry.models.len(),
			custom_fields = registry.custom_fields.len(),
			"schema registry loaded"
		);
		Ok(registry)
	}
}

impl SchemaRegistry {
	fn check_model(&self, model: &ModelSchema) -> Result<()> {
		for (name, attribute) in &model.attributes {
			attribute.check(&model.uid, name)?;
			let resolved = self.resolve_attribute(&model.uid, name, attribute)?;
			if attribute.kind == AttributeType::CustomField {
				resolved.check(&model.uid, name)?;
			}

			let unknown = |target: &str| SchemaError::UnknownTarget {
				model: model.uid.clone(),
				attribute: name.clone(),
				target: target.to_string(),
			};

			match resolved.kind {
				AttributeType::Relation => {
					let target = resolved.target.as_deref().unwrap_or_default();
					if target != "*" && !self.contains(target) {
						return Err(unknown(target));
					}
				}
				AttributeType::Component => {
					let uid = resolved.component.as_deref().unwrap_or_default();
					match self.models.get(uid) {
						Some(component) if component.is_component() => {}
						Some(_) => {
							return Err(SchemaError::InvalidRelation {
								model: model.uid.clone(),
								attribute: name.clone(),
								reason: format!("\"{}\" is not a component", uid),
							});
						}
						None => return Err(unknown(uid)),
					}
				}
				AttributeType::DynamicZone => {
					for uid in resolved.components.iter().flatten() {
						match self.models.get(uid) {
							Some(component) if component.is_component() => {}
							Some(_) => {
								return Err(SchemaError::InvalidRelation {
									model: model.uid.clone(),
									attribute: name.clone(),
									reason: format!("\"{}\" is not a component", uid),
								});
							}
							None => return Err(unknown(uid)),
						}
					}
				}
				AttributeType::Media => {
					if !self.contains(&self.upload_model) {
						return Err(unknown(&self.upload_model));
					}
				}
				_ => {}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::nature::Nature;
	use rstest::rstest;

	fn article() -> ModelSchema {
		ModelSchema::new("api::article.article", "articles")
			.attribute("title", AttributeDefinition::new(AttributeType::String))
	}

	#[rstest]
	fn test_duplicate_uid_is_rejected() {
		let result = SchemaRegistry::builder()
			.model(article())
			.model(ModelSchema::new("api::article.article", "other_articles"))
			.build();
		assert!(matches!(result, Err(SchemaError::Duplicate { .. })));
	}

	#[rstest]
	fn test_unknown_relation_target_fails_fast() {
		let schema = article().attribute(
			"author",
			AttributeDefinition::relation(Nature::ManyToOne, "api::writer.writer"),
		);
		let err = SchemaRegistry::builder().model(schema).build().unwrap_err();
		assert!(err.to_string().contains("api::writer.writer"));
	}

	#[rstest]
	fn test_custom_field_resolves_to_underlying_type() {
		let mut color = AttributeDefinition::new(AttributeType::CustomField);
		color.custom_field = Some("plugin::color-picker.color".to_string());
		let registry = SchemaRegistry::builder()
			.model(article().attribute("color", color))
			.custom_field(CustomFieldDefinition::new(
				"plugin::color-picker.color",
				AttributeType::String,
			))
			.build()
			.unwrap();

		let model = registry.get_model("api::article.article").unwrap();
		let attr = registry
			.resolve_attribute(&model.uid, "color", &model.attributes["color"])
			.unwrap();
		assert_eq!(attr.kind, AttributeType::String);
	}

	#[rstest]
	fn test_missing_custom_field_is_a_configuration_error() {
		let mut color = AttributeDefinition::new(AttributeType::CustomField);
		color.custom_field = Some("plugin::color-picker.color".to_string());
		let err = SchemaRegistry::builder()
			.model(article().attribute("color", color))
			.build()
			.unwrap_err();
		assert!(matches!(err, SchemaError::MissingCustomField { .. }));
	}

	#[rstest]
	fn test_media_requires_upload_model() {
		let mut cover = AttributeDefinition::new(AttributeType::Media);
		cover.multiple = false;
		let err = SchemaRegistry::builder()
			.model(article().attribute("cover", cover))
			.build()
			.unwrap_err();
		assert!(err.to_string().contains(DEFAULT_UPLOAD_MODEL));
	}
}
