//! Validator builder
//!
//! Composes attribute rules into whole-entity schemas: the read document,
//! the input body, its partial variant, and the query-parameter schemas.
//! Model schemas are memoised in a [`SchemaCache`] owned by the builder;
//! call [`ValidatorBuilder::invalidate`] after swapping the registry.

use indexmap::IndexMap;
use lattice_core::introspect::{SchemaIntrospector, Visibility};
use lattice_core::schema::{AttributeType, ModelSchema, PrimaryKeyType, SchemaRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheKey, SchemaCache};
use crate::error::{Result, ValidationErrors};
use crate::mapper::{MappingContext, map_to_validation};
use crate::query_params::{self, QueryParam};
use crate::rule::{FieldRule, IdKind, Mode, NumberRule, ObjectRule, Rule, SharedSchema, StringRule, UnknownKeys};

/// Key under which documents expose their stable string identifier
pub const DOCUMENT_ID: &str = "documentId";

/// A named validation schema
#[derive(Debug, Clone)]
pub struct Schema {
	name: String,
	rule: Rule,
}

impl Schema {
	pub fn new(name: impl Into<String>, rule: Rule) -> Self {
		Self {
			name: name.into(),
			rule,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn rule(&self) -> &Rule {
		&self.rule
	}

	/// Validate and normalise a value
	pub fn validate(&self, value: &Value) -> std::result::Result<Value, ValidationErrors> {
		self.rule.validate(value)
	}

	fn with_object<T>(&self, f: impl FnOnce(&ObjectRule) -> T) -> Option<T> {
		match &self.rule {
			Rule::Object(object) => Some(f(object)),
			Rule::Shared(shared) => shared.get().map(|object| f(&object)),
			_ => None,
		}
	}

	/// Declared field names, empty for non-object schemas
	pub fn field_names(&self) -> Vec<String> {
		self.with_object(|object| object.fields.keys().cloned().collect())
			.unwrap_or_default()
	}

	/// Field names not marked read-only
	pub fn writable_field_names(&self) -> Vec<String> {
		self.with_object(|object| {
			object
				.fields
				.iter()
				.filter(|(_, field)| !field.read_only)
				.map(|(name, _)| name.clone())
				.collect()
		})
		.unwrap_or_default()
	}

	/// Every field optional and no defaults applied
	pub fn partial(&self) -> Schema {
		self.with_object(|object| Schema::new(format!("{}.partial", self.name), Rule::Object(object.partial())))
			.unwrap_or_else(|| self.clone())
	}
}

/// Builds validators from a schema registry
#[derive(Debug)]
pub struct ValidatorBuilder {
	registry: Arc<SchemaRegistry>,
	cache: SchemaCache,
	build_lock: Mutex<()>,
}

impl ValidatorBuilder {
	pub fn new(registry: Arc<SchemaRegistry>) -> Self {
		Self {
			registry,
			cache: SchemaCache::new(),
			build_lock: Mutex::new(()),
		}
	}

	pub fn registry(&self) -> &SchemaRegistry {
		&self.registry
	}

	pub fn cache(&self) -> &SchemaCache {
		&self.cache
	}

	/// Drop every memoised schema
	pub fn invalidate(&self) {
		self.cache.invalidate();
	}

	/// Read schema of one entry: public attributes embedded, passwords
	/// stripped, `id` and `documentId` injected
	pub fn document(&self, uid: &str) -> Result<Schema> {
		let shared = self.run(|pass| pass.shared(uid, Mode::Read))?;
		Ok(Schema::new("document", Rule::Shared(shared)))
	}

	/// Read schema of a list of entries
	pub fn documents(&self, uid: &str) -> Result<Schema> {
		let shared = self.run(|pass| pass.shared(uid, Mode::Read))?;
		Ok(Schema::new("documents", Rule::array(Rule::Shared(shared))))
	}

	/// Write schema: writable public attributes, relations by ID, unknown keys rejected
	pub fn input(&self, uid: &str) -> Result<Schema> {
		let shared = self.run(|pass| pass.shared(uid, Mode::Input))?;
		Ok(Schema::new("data", Rule::Shared(shared)))
	}

	/// Input schema for partial updates
	pub fn partial_input(&self, uid: &str) -> Result<Schema> {
		let mut schema = self.input(uid)?.partial();
		schema.name = "partialBody".to_string();
		Ok(schema)
	}

	/// Schemas for the requested query parameters, keyed by parameter name
	pub fn query_params(&self, uid: &str, params: &[QueryParam]) -> Result<IndexMap<String, Schema>> {
		let model = self.registry.get_model(uid)?;
		let classification = SchemaIntrospector::new(&self.registry).classify_schema(model, Visibility::Public)?;

		let mut sortable = vec![model.primary_key.clone()];
		sortable.extend(classification.scalar_names());
		if let Some((created, updated)) = model.options.timestamps.columns() {
			sortable.push(created.to_string());
			sortable.push(updated.to_string());
		}
		let populatable = classification.populatable_names();

		let mut schemas = IndexMap::new();
		for param in params {
			let rule = query_params::rule_for(*param, &classification.scalar_names(), &sortable, &populatable);
			schemas.insert(param.name().to_string(), Schema::new(param.name(), rule));
		}
		Ok(schemas)
	}

	fn run<T>(&self, f: impl FnOnce(&BuildPass<'_>) -> Result<T>) -> Result<T> {
		let _guard = self.build_lock.lock();
		let pass = BuildPass {
			builder: self,
			installed: RefCell::new(Vec::new()),
		};
		let result = f(&pass);
		if result.is_err() {
			self.cache.discard(&pass.installed.into_inner());
		}
		result
	}
}

/// State of one top-level build call
struct BuildPass<'b> {
	builder: &'b ValidatorBuilder,
	installed: RefCell<Vec<CacheKey>>,
}

impl BuildPass<'_> {
	fn registry(&self) -> &SchemaRegistry {
		&self.builder.registry
	}

	fn shared(&self, uid: &str, mode: Mode) -> Result<SharedSchema> {
		let (schema, fresh) = self.builder.cache.lookup_or_install(uid, mode);
		if fresh {
			self.installed.borrow_mut().push((uid.to_string(), mode));
			let model = self.registry().get_model(uid)?;
			let object = match mode {
				Mode::Read => self.read_object(model)?,
				Mode::Input => self.input_object(model)?,
			};
			debug!(uid, ?mode, fields = object.fields.len(), "validator schema built");
			schema.fill(object);
		}
		Ok(schema)
	}

	fn read_object(&self, model: &ModelSchema) -> Result<ObjectRule> {
		let mut object = ObjectRule::new(UnknownKeys::Strip);

		let id = FieldRule {
			required: !model.is_component(),
			read_only: true,
			..FieldRule::optional(id_rule(model.primary_key_type))
		};
		object = object.field(model.primary_key.clone(), id);
		if !model.is_component() {
			object = object.field(DOCUMENT_ID, read_only(Rule::String(StringRule::default())));
		}

		let classification = SchemaIntrospector::new(self.registry()).classify_schema(model, Visibility::Public)?;
		for (name, attribute) in classification.scalar.iter().chain(classification.populatable.iter()) {
			if attribute.kind == AttributeType::Password {
				continue;
			}
			let field = map_to_validation(&model.uid, name, attribute, Mode::Read, self)?;
			object = object.field(name.clone(), field);
		}

		if let Some((created, updated)) = model.options.timestamps.columns() {
			for column in [created, updated] {
				if !object.fields.contains_key(column) {
					object = object.field(column, read_only(Rule::Any));
				}
			}
		}
		if model.options.draft_and_publish && !object.fields.contains_key("published_at") {
			object = object.field("published_at", read_only(Rule::Any));
		}
		Ok(object)
	}

	fn input_object(&self, model: &ModelSchema) -> Result<ObjectRule> {
		let classification = SchemaIntrospector::new(self.registry())
			.classify_schema(model, Visibility::Public)?
			.writable();

		let mut object = ObjectRule::new(UnknownKeys::Reject);
		for (name, attribute) in classification.scalar.iter().chain(classification.populatable.iter()) {
			let field = map_to_validation(&model.uid, name, attribute, Mode::Input, self)?;
			object = object.field(name.clone(), field);
		}
		Ok(object)
	}
}

impl MappingContext for BuildPass<'_> {
	fn embedded_schema(&self, uid: &str) -> Result<Rule> {
		self.shared(uid, Mode::Read).map(Rule::Shared)
	}

	fn id_kind(&self, uid: &str) -> Result<IdKind> {
		let model = self.registry().get_model(uid)?;
		Ok(match model.primary_key_type {
			PrimaryKeyType::Integer => IdKind::Integer,
			PrimaryKeyType::Uuid => IdKind::Uuid,
		})
	}

	fn custom_field_type(&self, uid: &str) -> Option<AttributeType> {
		self.registry().custom_field(uid).map(|definition| definition.kind)
	}

	fn upload_model(&self) -> &str {
		self.registry().upload_model()
	}
}

fn read_only(rule: Rule) -> FieldRule {
	FieldRule {
		read_only: true,
		..FieldRule::optional(rule)
	}
}

fn id_rule(kind: PrimaryKeyType) -> Rule {
	match kind {
		PrimaryKeyType::Integer => Rule::Number(NumberRule {
			integer: true,
			min: Some(1.0),
			max: None,
		}),
		PrimaryKeyType::Uuid => Rule::Reference(IdKind::Uuid),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lattice_core::schema::{AttributeDefinition, Nature};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn builder() -> ValidatorBuilder {
		let author = ModelSchema::new("api::author.author", "authors")
			.attribute("name", AttributeDefinition::new(AttributeType::String).required())
			.attribute("password", AttributeDefinition::new(AttributeType::Password))
			.attribute(
				"articles",
				AttributeDefinition::relation(Nature::OneToMany, "api::article.article").with_via("author"),
			);
		let article = ModelSchema::new("api::article.article", "articles")
			.with_timestamps()
			.attribute("title", AttributeDefinition::new(AttributeType::String).required())
			.attribute("views", AttributeDefinition::new(AttributeType::Integer).read_only())
			.attribute(
				"author",
				AttributeDefinition::relation(Nature::ManyToOne, "api::author.author").with_via("articles"),
			);
		let registry = SchemaRegistry::builder().model(author).model(article).build().unwrap();
		ValidatorBuilder::new(Arc::new(registry))
	}

	#[rstest]
	fn test_document_strips_passwords_and_injects_ids(builder: ValidatorBuilder) {
		let document = builder.document("api::author.author").unwrap();
		assert_eq!(document.field_names(), vec!["id", "documentId", "name", "articles"]);

		let output = document
			.validate(&json!({ "id": 1, "name": "Ada", "password": "secret" }))
			.unwrap();
		assert_eq!(output, json!({ "id": 1, "name": "Ada" }));
	}

	#[rstest]
	fn test_mutual_references_terminate(builder: ValidatorBuilder) {
		let document = builder.document("api::article.article").unwrap();
		let output = document
			.validate(&json!({
				"id": 1,
				"title": "Hello",
				"author": { "id": 2, "name": "Ada", "articles": [{ "id": 1, "title": "Hello" }] }
			}))
			.unwrap();
		assert_eq!(output["author"]["articles"][0]["title"], json!("Hello"));
		assert_eq!(builder.cache().len(), 2);
	}

	#[rstest]
	fn test_input_excludes_read_only_and_rejects_unknown(builder: ValidatorBuilder) {
		let input = builder.input("api::article.article").unwrap();
		assert_eq!(input.field_names(), vec!["title", "author"]);

		let errors = input
			.validate(&json!({ "title": "Hi", "views": 3 }))
			.unwrap_err();
		assert_eq!(errors.paths(), vec!["views"]);
	}

	#[rstest]
	fn test_partial_input_accepts_empty_body(builder: ValidatorBuilder) {
		let partial = builder.partial_input("api::article.article").unwrap();
		assert_eq!(partial.name(), "partialBody");
		assert_eq!(partial.validate(&json!({})).unwrap(), json!({}));
	}

	#[rstest]
	fn test_failed_build_leaves_no_placeholder(builder: ValidatorBuilder) {
		assert!(builder.document("api::missing.missing").is_err());
		assert!(builder.cache().is_empty());
	}

	#[rstest]
	fn test_invalidate_rebuilds(builder: ValidatorBuilder) {
		builder.document("api::author.author").unwrap();
		assert!(!builder.cache().is_empty());
		builder.invalidate();
		assert!(builder.cache().is_empty());
	}

	#[rstest]
	fn test_invalidate_frees_mutually_referencing_schemas(builder: ValidatorBuilder) {
		let document = builder.document("api::article.article").unwrap();
		let author = builder.cache().get("api::author.author", Mode::Read).unwrap();
		assert_eq!(author.handle_count(), 3);

		builder.invalidate();
		assert_eq!(author.handle_count(), 1);
		assert!(!author.is_filled());
		let errors = document.validate(&json!({ "id": 1, "title": "Hello" })).unwrap_err();
		assert_eq!(errors.iter().next().unwrap().code, crate::error::ErrorCode::Unresolved);
	}
}
