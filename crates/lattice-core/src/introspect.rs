//! Attribute classification
//!
//! Splits a schema's attributes into *scalar* fields, stored as one column of
//! the owning table, and *populatable* fields (relations, media, components,
//! dynamic zones) that need a join or an embed to resolve. Scalar fields are
//! the sortable and filterable set; populatable fields are the ones a caller
//! may request through `populate`.

use indexmap::IndexMap;

use crate::exception::Result;
use crate::schema::{AttributeDefinition, ModelSchema, SENSITIVE_ATTRIBUTES, SchemaRegistry};

/// Which attributes a classification keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
	/// Every attribute, used for table and column generation
	Internal,
	/// Private attributes removed, used for outward-facing validators
	Public,
}

/// Attributes of one schema split by storage
#[derive(Debug, Clone, Default)]
pub struct Classification {
	pub scalar: IndexMap<String, AttributeDefinition>,
	pub populatable: IndexMap<String, AttributeDefinition>,
}

impl Classification {
	pub fn scalar_names(&self) -> Vec<String> {
		self.scalar.keys().cloned().collect()
	}

	pub fn populatable_names(&self) -> Vec<String> {
		self.populatable.keys().cloned().collect()
	}

	/// Drop attributes declared with `writable: false`
	pub fn writable(mut self) -> Self {
		self.scalar.retain(|_, attribute| attribute.is_writable());
		self.populatable.retain(|_, attribute| attribute.is_writable());
		self
	}

	pub fn is_empty(&self) -> bool {
		self.scalar.is_empty() && self.populatable.is_empty()
	}
}

/// Classifies schemas held by a registry
#[derive(Debug, Clone, Copy)]
pub struct SchemaIntrospector<'r> {
	registry: &'r SchemaRegistry,
}

impl<'r> SchemaIntrospector<'r> {
	pub fn new(registry: &'r SchemaRegistry) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &'r SchemaRegistry {
		self.registry
	}

	/// Classify the model registered under `uid`
	pub fn classify(&self, uid: &str, visibility: Visibility) -> Result<Classification> {
		let schema = self.registry.get_model(uid)?;
		self.classify_schema(schema, visibility)
	}

	/// Classify a schema value
	///
	/// Custom fields are resolved to their underlying type, so the returned
	/// definitions never carry the `customField` tag.
	pub fn classify_schema(
		&self,
		schema: &ModelSchema,
		visibility: Visibility,
	) -> Result<Classification> {
		let mut classification = Classification::default();
		for (name, attribute) in &schema.attributes {
			if visibility == Visibility::Public && self.is_private(schema, name, attribute) {
				continue;
			}
			let resolved = self
				.registry
				.resolve_attribute(&schema.uid, name, attribute)?
				.into_owned();
			if resolved.kind.is_scalar() {
				classification.scalar.insert(name.clone(), resolved);
			} else {
				classification.populatable.insert(name.clone(), resolved);
			}
		}
		Ok(classification)
	}

	/// Whether an attribute is hidden from API consumers
	pub fn is_private(&self, schema: &ModelSchema, name: &str, attribute: &AttributeDefinition) -> bool {
		attribute.private
			|| schema.options.private_attributes.iter().any(|p| p == name)
			|| self.registry.private_attributes().iter().any(|p| p == name)
			|| SENSITIVE_ATTRIBUTES.contains(&name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{AttributeType, Nature};
	use rstest::{fixture, rstest};

	#[fixture]
	fn registry() -> SchemaRegistry {
		let author = ModelSchema::new("api::author.author", "authors")
			.attribute("name", AttributeDefinition::new(AttributeType::String));
		let article = ModelSchema::new("api::article.article", "articles")
			.attribute("title", AttributeDefinition::new(AttributeType::String))
			.attribute("views", AttributeDefinition::new(AttributeType::Integer).read_only())
			.attribute("secret", AttributeDefinition::new(AttributeType::String).private())
			.attribute("internal_note", AttributeDefinition::new(AttributeType::Text))
			.attribute(
				"author",
				AttributeDefinition::relation(Nature::OneWay, "api::author.author"),
			)
			.attribute("created_by", AttributeDefinition::new(AttributeType::Integer));
		SchemaRegistry::builder()
			.model(author)
			.model(article)
			.private_attributes(["internal_note"])
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_internal_classification_keeps_private_fields(registry: SchemaRegistry) {
		let introspector = SchemaIntrospector::new(&registry);
		let classification = introspector
			.classify("api::article.article", Visibility::Internal)
			.unwrap();

		assert_eq!(
			classification.scalar_names(),
			vec!["title", "views", "secret", "internal_note", "created_by"]
		);
		assert_eq!(classification.populatable_names(), vec!["author"]);
	}

	#[rstest]
	fn test_public_classification_drops_private_fields(registry: SchemaRegistry) {
		let introspector = SchemaIntrospector::new(&registry);
		let classification = introspector
			.classify("api::article.article", Visibility::Public)
			.unwrap();

		assert_eq!(classification.scalar_names(), vec!["title", "views"]);
		assert_eq!(classification.populatable_names(), vec!["author"]);
	}

	#[rstest]
	fn test_writable_drops_read_only_fields(registry: SchemaRegistry) {
		let introspector = SchemaIntrospector::new(&registry);
		let classification = introspector
			.classify("api::article.article", Visibility::Public)
			.unwrap()
			.writable();

		assert_eq!(classification.scalar_names(), vec!["title"]);
	}
}
