//! Validation rules
//!
//! A [`Rule`] describes the accepted shape of a JSON value. Validation is
//! parse-don't-validate: a successful run returns the normalised value
//! (defaults filled, unknown keys stripped, big integers as strings) and a
//! failed run returns every field-addressable error found.

use indexmap::IndexMap;
use lattice_core::schema::DefaultValue;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{ErrorCode, FieldPath, ValidationError, ValidationErrors};
use crate::formats::{StringFormat, is_integer_string};

/// Read schemas embed related entities, input schemas reference them by ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
	Read,
	Input,
}

/// Accepted identifier form for references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
	/// Positive integer, or a string of digits
	Integer,
	Uuid,
}

/// String constraints
#[derive(Debug, Clone, Default)]
pub struct StringRule {
	pub min_length: Option<usize>,
	pub max_length: Option<usize>,
	pub format: Option<StringFormat>,
	pub pattern: Option<Regex>,
}

/// Numeric constraints
#[derive(Debug, Clone, Default)]
pub struct NumberRule {
	pub integer: bool,
	pub min: Option<f64>,
	pub max: Option<f64>,
}

/// Homogeneous list
#[derive(Debug, Clone)]
pub struct ArrayRule {
	pub item: Box<Rule>,
	pub min_items: Option<usize>,
	pub max_items: Option<usize>,
}

/// What to do with keys an object rule does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
	Strip,
	Reject,
	Passthrough,
}

/// One field of an object rule
#[derive(Debug, Clone)]
pub struct FieldRule {
	pub rule: Rule,
	pub required: bool,
	pub default: Option<DefaultValue>,
	/// Informational in read schemas; read-only fields are absent from input schemas
	pub read_only: bool,
}

impl FieldRule {
	pub fn optional(rule: Rule) -> Self {
		Self {
			rule,
			required: false,
			default: None,
			read_only: false,
		}
	}

	pub fn required(rule: Rule) -> Self {
		Self {
			rule,
			required: true,
			default: None,
			read_only: false,
		}
	}
}

/// Object with declared fields
#[derive(Debug, Clone)]
pub struct ObjectRule {
	pub fields: IndexMap<String, FieldRule>,
	pub unknown_keys: UnknownKeys,
}

impl ObjectRule {
	pub fn new(unknown_keys: UnknownKeys) -> Self {
		Self {
			fields: IndexMap::new(),
			unknown_keys,
		}
	}

	pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
		self.fields.insert(name.into(), rule);
		self
	}

	/// Every field optional and no defaults applied, constraints kept
	pub fn partial(&self) -> Self {
		let fields = self
			.fields
			.iter()
			.map(|(name, field)| {
				let mut field = field.clone();
				field.required = false;
				field.default = None;
				(name.clone(), field)
			})
			.collect();
		Self {
			fields,
			unknown_keys: self.unknown_keys,
		}
	}
}

/// A schema memoised by UID, possibly still being built.
///
/// The slot is empty between the moment a build pass installs the
/// placeholder and the moment it fills it; recursive references created in
/// between share the same slot. A filled recursive schema points back at
/// its own slot, so the slot is emptied with [`SharedSchema::clear`] when
/// the cache forgets it.
#[derive(Debug, Clone)]
pub struct SharedSchema {
	uid: String,
	slot: Arc<RwLock<Option<Arc<ObjectRule>>>>,
}

impl SharedSchema {
	pub fn placeholder(uid: impl Into<String>) -> Self {
		Self {
			uid: uid.into(),
			slot: Arc::new(RwLock::new(None)),
		}
	}

	pub fn uid(&self) -> &str {
		&self.uid
	}

	pub fn get(&self) -> Option<Arc<ObjectRule>> {
		self.slot.read().clone()
	}

	pub fn is_filled(&self) -> bool {
		self.slot.read().is_some()
	}

	/// Fill the placeholder; a second fill is ignored
	pub fn fill(&self, rule: ObjectRule) {
		let mut slot = self.slot.write();
		if slot.is_none() {
			*slot = Some(Arc::new(rule));
		}
	}

	/// Empty the slot, releasing the links held by the built rule
	pub fn clear(&self) {
		self.slot.write().take();
	}

	pub fn same_as(&self, other: &SharedSchema) -> bool {
		Arc::ptr_eq(&self.slot, &other.slot)
	}

	/// Handles sharing this slot, including those nested in built rules
	pub fn handle_count(&self) -> usize {
		Arc::strong_count(&self.slot)
	}
}

/// Accepted shape of a JSON value
#[derive(Debug, Clone)]
pub enum Rule {
	Any,
	String(StringRule),
	Number(NumberRule),
	/// Integer number or digit string, normalised to a string
	BigInteger(NumberRule),
	Boolean,
	Enumeration(Vec<String>),
	Array(ArrayRule),
	Object(ObjectRule),
	Shared(SharedSchema),
	/// Identifier of a related row; `{ "id": x }` is unwrapped
	Reference(IdKind),
	/// Object discriminated by a string key
	Tagged {
		discriminator: String,
		variants: IndexMap<String, Rule>,
	},
	/// First matching alternative wins
	Union(Vec<Rule>),
	/// `field`, `field:asc` or `field:desc`
	SortKey(Vec<String>),
	/// `{ field: "asc" | "desc" }`
	SortMap(Vec<String>),
	/// Filter object keyed by field names and logical operators
	Filters(Arc<Vec<String>>),
}

impl Rule {
	pub fn array(item: Rule) -> Self {
		Rule::Array(ArrayRule {
			item: Box::new(item),
			min_items: None,
			max_items: None,
		})
	}

	/// Wrap in an array when `many` is set
	pub fn many_if(self, many: bool) -> Self {
		if many { Rule::array(self) } else { self }
	}

	/// Validate `value`, returning the normalised value
	pub fn validate(&self, value: &Value) -> Result<Value, ValidationErrors> {
		let mut errors = ValidationErrors::new();
		let output = self.check(value, &FieldPath::root(), &mut errors);
		if errors.is_empty() {
			Ok(output)
		} else {
			Err(errors)
		}
	}

	pub(crate) fn check(&self, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
		match self {
			Rule::Any => value.clone(),
			Rule::String(rule) => check_string(rule, value, path, errors),
			Rule::Number(rule) => check_number(rule, value, path, errors),
			Rule::BigInteger(rule) => check_big_integer(rule, value, path, errors),
			Rule::Boolean => {
				if !value.is_boolean() {
					errors.push(invalid_type(path, "boolean", value));
				}
				value.clone()
			}
			Rule::Enumeration(allowed) => {
				match value.as_str() {
					Some(s) if allowed.iter().any(|a| a == s) => {}
					Some(s) => errors.push(ValidationError::new(
						path.clone(),
						ErrorCode::NotAllowed,
						format!("\"{}\" is not one of [{}]", s, allowed.join(", ")),
					)),
					None => errors.push(invalid_type(path, "string", value)),
				}
				value.clone()
			}
			Rule::Array(rule) => check_array(rule, value, path, errors),
			Rule::Object(rule) => check_object(rule, value, path, errors),
			Rule::Shared(shared) => match shared.get() {
				Some(rule) => check_object(&rule, value, path, errors),
				None => {
					errors.push(ValidationError::new(
						path.clone(),
						ErrorCode::Unresolved,
						format!("schema for \"{}\" is not built yet", shared.uid()),
					));
					value.clone()
				}
			},
			Rule::Reference(kind) => check_reference(*kind, value, path, errors),
			Rule::Tagged {
				discriminator,
				variants,
			} => check_tagged(discriminator, variants, value, path, errors),
			Rule::Union(alternatives) => {
				for alternative in alternatives {
					let mut attempt = ValidationErrors::new();
					let output = alternative.check(value, path, &mut attempt);
					if attempt.is_empty() {
						return output;
					}
				}
				errors.push(ValidationError::new(
					path.clone(),
					ErrorCode::NoMatch,
					"does not match any accepted form",
				));
				value.clone()
			}
			Rule::SortKey(fields) => {
				match value.as_str() {
					Some(raw) => check_sort_key(fields, raw, path, errors),
					None => errors.push(invalid_type(path, "string", value)),
				}
				value.clone()
			}
			Rule::SortMap(fields) => check_sort_map(fields, value, path, errors),
			Rule::Filters(fields) => check_filters(fields, value, path, errors),
		}
	}
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn invalid_type(path: &FieldPath, expected: &str, value: &Value) -> ValidationError {
	ValidationError::new(
		path.clone(),
		ErrorCode::InvalidType,
		format!("expected {}, received {}", expected, type_name(value)),
	)
}

fn check_string(rule: &StringRule, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	let Some(s) = value.as_str() else {
		errors.push(invalid_type(path, "string", value));
		return value.clone();
	};
	let length = s.chars().count();
	if let Some(min) = rule.min_length {
		if length < min {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooShort,
				format!("must contain at least {} character(s)", min),
			));
		}
	}
	if let Some(max) = rule.max_length {
		if length > max {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooLong,
				format!("must contain at most {} character(s)", max),
			));
		}
	}
	if let Some(format) = rule.format {
		if !format.matches(s) {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::InvalidFormat,
				format!("must be a valid {}", format.name()),
			));
		}
	}
	if let Some(pattern) = &rule.pattern {
		if !pattern.is_match(s) {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::InvalidFormat,
				format!("must match {}", pattern.as_str()),
			));
		}
	}
	value.clone()
}

fn check_bounds(rule: &NumberRule, n: f64, path: &FieldPath, errors: &mut ValidationErrors) {
	if let Some(min) = rule.min {
		if n < min {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooSmall,
				format!("must be greater than or equal to {}", min),
			));
		}
	}
	if let Some(max) = rule.max {
		if n > max {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooLarge,
				format!("must be less than or equal to {}", max),
			));
		}
	}
}

fn check_number(rule: &NumberRule, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	let Some(n) = value.as_f64() else {
		errors.push(invalid_type(path, "number", value));
		return value.clone();
	};
	if rule.integer && value.as_i64().is_none() && value.as_u64().is_none() {
		errors.push(invalid_type(path, "integer", value));
		return value.clone();
	}
	check_bounds(rule, n, path, errors);
	value.clone()
}

fn check_big_integer(
	rule: &NumberRule,
	value: &Value,
	path: &FieldPath,
	errors: &mut ValidationErrors,
) -> Value {
	let digits = match value {
		Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
		Value::String(s) if is_integer_string(s) => s.clone(),
		_ => {
			errors.push(invalid_type(path, "integer or integer string", value));
			return value.clone();
		}
	};
	if let Ok(n) = digits.parse::<f64>() {
		check_bounds(rule, n, path, errors);
	}
	Value::String(digits)
}

fn check_array(rule: &ArrayRule, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	let Some(items) = value.as_array() else {
		errors.push(invalid_type(path, "array", value));
		return value.clone();
	};
	if let Some(min) = rule.min_items {
		if items.len() < min {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooShort,
				format!("must contain at least {} item(s)", min),
			));
		}
	}
	if let Some(max) = rule.max_items {
		if items.len() > max {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::TooLong,
				format!("must contain at most {} item(s)", max),
			));
		}
	}
	Value::Array(
		items
			.iter()
			.enumerate()
			.map(|(index, item)| rule.item.check(item, &path.index(index), errors))
			.collect(),
	)
}

fn check_object(rule: &ObjectRule, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	let Some(object) = value.as_object() else {
		errors.push(invalid_type(path, "object", value));
		return value.clone();
	};

	let mut output = Map::new();
	for (name, field) in &rule.fields {
		let field_path = path.key(name);
		match object.get(name) {
			None => {
				if let Some(default) = &field.default {
					output.insert(name.clone(), default.resolve());
				} else if field.required {
					errors.push(ValidationError::new(
						field_path,
						ErrorCode::Required,
						"is required",
					));
				}
			}
			Some(Value::Null) => {
				if field.required {
					errors.push(ValidationError::new(
						field_path,
						ErrorCode::Required,
						"is required and cannot be null",
					));
				} else {
					output.insert(name.clone(), Value::Null);
				}
			}
			Some(inner) => {
				let checked = field.rule.check(inner, &field_path, errors);
				output.insert(name.clone(), checked);
			}
		}
	}

	for (key, inner) in object {
		if rule.fields.contains_key(key) {
			continue;
		}
		match rule.unknown_keys {
			UnknownKeys::Strip => {}
			UnknownKeys::Passthrough => {
				output.insert(key.clone(), inner.clone());
			}
			UnknownKeys::Reject => errors.push(ValidationError::new(
				path.key(key),
				ErrorCode::UnknownKey,
				"is not an allowed key",
			)),
		}
	}
	Value::Object(output)
}

fn check_reference(kind: IdKind, value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	if let Some(id) = value.as_object().and_then(|object| object.get("id")) {
		return check_reference(kind, id, &path.key("id"), errors);
	}
	match (kind, value) {
		(IdKind::Integer, Value::Number(n)) if n.as_u64().is_some_and(|id| id > 0) => value.clone(),
		(IdKind::Integer, Value::String(s)) if is_integer_string(s) && !s.starts_with('-') => {
			match s.parse::<u64>() {
				Ok(id) => Value::from(id),
				Err(_) => Value::String(s.clone()),
			}
		}
		(IdKind::Uuid, Value::String(s)) if StringFormat::Uuid.matches(s) => value.clone(),
		(IdKind::Integer, _) => {
			errors.push(invalid_type(path, "positive integer id", value));
			value.clone()
		}
		(IdKind::Uuid, _) => {
			errors.push(invalid_type(path, "uuid", value));
			value.clone()
		}
	}
}

fn check_tagged(
	discriminator: &str,
	variants: &IndexMap<String, Rule>,
	value: &Value,
	path: &FieldPath,
	errors: &mut ValidationErrors,
) -> Value {
	let Some(object) = value.as_object() else {
		errors.push(invalid_type(path, "object", value));
		return value.clone();
	};
	let tag_path = path.key(discriminator);
	let Some(tag) = object.get(discriminator).and_then(Value::as_str) else {
		errors.push(ValidationError::new(tag_path, ErrorCode::Required, "is required"));
		return value.clone();
	};
	let Some(variant) = variants.get(tag) else {
		let allowed: Vec<&str> = variants.keys().map(String::as_str).collect();
		errors.push(ValidationError::new(
			tag_path,
			ErrorCode::NotAllowed,
			format!("\"{}\" is not one of [{}]", tag, allowed.join(", ")),
		));
		return value.clone();
	};

	let mut body = object.clone();
	body.remove(discriminator);
	let mut output = variant.check(&Value::Object(body), path, errors);
	if let Value::Object(map) = &mut output {
		map.insert(discriminator.to_string(), Value::String(tag.to_string()));
	}
	output
}

fn check_sort_key(fields: &[String], raw: &str, path: &FieldPath, errors: &mut ValidationErrors) {
	let (field, direction) = match raw.split_once(':') {
		Some((field, direction)) => (field, Some(direction)),
		None => (raw, None),
	};
	if !fields.iter().any(|f| f == field) {
		errors.push(ValidationError::new(
			path.clone(),
			ErrorCode::NotAllowed,
			format!("\"{}\" is not a sortable field", field),
		));
	}
	if let Some(direction) = direction {
		if !is_direction(direction) {
			errors.push(ValidationError::new(
				path.clone(),
				ErrorCode::NotAllowed,
				format!("\"{}\" is not a sort direction (asc, desc)", direction),
			));
		}
	}
}

fn is_direction(raw: &str) -> bool {
	raw.eq_ignore_ascii_case("asc") || raw.eq_ignore_ascii_case("desc")
}

fn check_sort_map(fields: &[String], value: &Value, path: &FieldPath, errors: &mut ValidationErrors) -> Value {
	let Some(object) = value.as_object() else {
		errors.push(invalid_type(path, "object", value));
		return value.clone();
	};
	for (field, direction) in object {
		let field_path = path.key(field);
		if !fields.iter().any(|f| f == field) {
			errors.push(ValidationError::new(
				field_path.clone(),
				ErrorCode::NotAllowed,
				format!("\"{}\" is not a sortable field", field),
			));
		}
		if !direction.as_str().is_some_and(is_direction) {
			errors.push(ValidationError::new(
				field_path,
				ErrorCode::NotAllowed,
				"must be \"asc\" or \"desc\"",
			));
		}
	}
	value.clone()
}

fn check_filters(
	fields: &Arc<Vec<String>>,
	value: &Value,
	path: &FieldPath,
	errors: &mut ValidationErrors,
) -> Value {
	let Some(object) = value.as_object() else {
		errors.push(invalid_type(path, "object", value));
		return value.clone();
	};
	for (key, inner) in object {
		let key_path = path.key(key);
		match key.as_str() {
			"$and" | "$or" => match inner.as_array() {
				Some(items) => {
					for (index, item) in items.iter().enumerate() {
						check_filters(fields, item, &key_path.index(index), errors);
					}
				}
				None => errors.push(invalid_type(&key_path, "array", inner)),
			},
			"$not" => {
				check_filters(fields, inner, &key_path, errors);
			}
			field if fields.iter().any(|f| f == field) => {}
			field => errors.push(ValidationError::new(
				key_path,
				ErrorCode::NotAllowed,
				format!("\"{}\" is not a filterable field", field),
			)),
		}
	}
	value.clone()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn title_object() -> ObjectRule {
		ObjectRule::new(UnknownKeys::Reject).field(
			"title",
			FieldRule::required(Rule::String(StringRule {
				min_length: Some(2),
				max_length: Some(5),
				..Default::default()
			})),
		)
	}

	#[rstest]
	#[case(json!({ "title": "ab" }), true)]
	#[case(json!({ "title": "abcde" }), true)]
	#[case(json!({ "title": "a" }), false)]
	#[case(json!({ "title": "abcdef" }), false)]
	fn test_string_length_bounds(#[case] value: Value, #[case] ok: bool) {
		let rule = Rule::Object(title_object());
		assert_eq!(rule.validate(&value).is_ok(), ok);
	}

	#[rstest]
	fn test_unknown_key_rejected_with_path() {
		let rule = Rule::Object(title_object());
		let errors = rule
			.validate(&json!({ "title": "abc", "extra": 1 }))
			.unwrap_err();
		assert_eq!(errors.paths(), vec!["extra"]);
	}

	#[rstest]
	fn test_default_applied_when_absent() {
		let rule = Rule::Object(ObjectRule::new(UnknownKeys::Strip).field(
			"status",
			FieldRule {
				rule: Rule::Enumeration(vec!["draft".into(), "published".into()]),
				required: true,
				default: Some(DefaultValue::Literal(json!("draft"))),
				read_only: false,
			},
		));
		assert_eq!(rule.validate(&json!({})).unwrap(), json!({ "status": "draft" }));
	}

	#[rstest]
	fn test_reference_unwraps_objects_and_digit_strings() {
		let rule = Rule::array(Rule::Reference(IdKind::Integer));
		assert_eq!(
			rule.validate(&json!([1, "2", { "id": 3 }])).unwrap(),
			json!([1, 2, 3])
		);
		assert!(rule.validate(&json!([0])).is_err());
	}

	#[rstest]
	fn test_big_integer_normalised_to_string() {
		let rule = Rule::BigInteger(NumberRule::default());
		assert_eq!(rule.validate(&json!(42)).unwrap(), json!("42"));
		assert_eq!(
			rule.validate(&json!("9007199254740993")).unwrap(),
			json!("9007199254740993")
		);
		assert!(rule.validate(&json!(1.5)).is_err());
	}

	#[rstest]
	fn test_tagged_union_dispatches_on_discriminator() {
		let mut variants = IndexMap::new();
		variants.insert("default.hero".to_string(), Rule::Object(title_object()));
		let rule = Rule::Tagged {
			discriminator: "__component".into(),
			variants,
		};

		let ok = rule
			.validate(&json!({ "__component": "default.hero", "title": "abc" }))
			.unwrap();
		assert_eq!(ok["__component"], json!("default.hero"));

		let errors = rule
			.validate(&json!({ "__component": "default.quote", "title": "abc" }))
			.unwrap_err();
		assert_eq!(errors.paths(), vec!["__component"]);
	}

	#[rstest]
	fn test_unfilled_shared_schema_reports_unresolved() {
		let rule = Rule::Shared(SharedSchema::placeholder("default.hero"));
		let errors = rule.validate(&json!({})).unwrap_err();
		assert_eq!(errors.iter().next().unwrap().code, ErrorCode::Unresolved);
	}
}
