//! Attribute type mapper
//!
//! Turns one [`AttributeDefinition`] into a [`FieldRule`]. Scalar types map
//! to primitive rules directly. Media, components, dynamic zones and
//! relations need the target schema, which they obtain through a
//! [`MappingContext`] so that the builder can memoise it and break cycles.

use indexmap::IndexMap;
use lattice_core::SchemaError;
use lattice_core::schema::{AttributeDefinition, AttributeType};
use regex::Regex;

use crate::error::{BuildError, Result};
use crate::formats::StringFormat;
use crate::rule::{
	ArrayRule, FieldRule, IdKind, Mode, NumberRule, ObjectRule, Rule, StringRule, UnknownKeys,
};

/// Discriminator carried by dynamic-zone entries
pub const COMPONENT_KEY: &str = "__component";

/// Discriminator carried by polymorphic relation entries
pub const TYPE_KEY: &str = "__type";

/// Lookups the mapper needs for structurally recursive types
pub trait MappingContext {
	/// Read-mode schema of a model, possibly still being built
	fn embedded_schema(&self, uid: &str) -> Result<Rule>;

	/// Identifier form of a model's primary key
	fn id_kind(&self, uid: &str) -> Result<IdKind>;

	/// Underlying type of a custom field
	fn custom_field_type(&self, uid: &str) -> Option<AttributeType>;

	/// UID of the model media attributes point at
	fn upload_model(&self) -> &str;
}

/// Map one attribute to its validation rule
pub fn map_to_validation(
	model: &str,
	name: &str,
	attribute: &AttributeDefinition,
	mode: Mode,
	ctx: &dyn MappingContext,
) -> Result<FieldRule> {
	let kind = match attribute.kind {
		AttributeType::CustomField => {
			let uid = attribute.custom_field.as_deref().unwrap_or_default();
			ctx.custom_field_type(uid)
				.ok_or_else(|| SchemaError::MissingCustomField {
					model: model.to_string(),
					attribute: name.to_string(),
					custom_field: uid.to_string(),
				})?
		}
		kind => kind,
	};

	let rule = match kind {
		AttributeType::String
		| AttributeType::Text
		| AttributeType::RichText
		| AttributeType::Password => Rule::String(string_rule(model, name, attribute, None)?),
		AttributeType::Email => {
			Rule::String(string_rule(model, name, attribute, Some(StringFormat::Email))?)
		}
		AttributeType::Uid => {
			Rule::String(string_rule(model, name, attribute, Some(StringFormat::Uid))?)
		}
		AttributeType::Integer => Rule::Number(NumberRule {
			integer: true,
			min: Some(attribute.min.unwrap_or(i32::MIN as f64)),
			max: Some(attribute.max.unwrap_or(i32::MAX as f64)),
		}),
		AttributeType::BigInteger => Rule::BigInteger(NumberRule {
			integer: true,
			min: attribute.min,
			max: attribute.max,
		}),
		AttributeType::Float | AttributeType::Decimal => Rule::Number(NumberRule {
			integer: false,
			min: attribute.min,
			max: attribute.max,
		}),
		AttributeType::Boolean => Rule::Boolean,
		AttributeType::Date => formatted(StringFormat::Date),
		AttributeType::Time => formatted(StringFormat::Time),
		AttributeType::DateTime | AttributeType::Timestamp => formatted(StringFormat::DateTime),
		AttributeType::Json => Rule::Any,
		AttributeType::Blocks => Rule::Array(ArrayRule {
			item: Box::new(Rule::Object(ObjectRule::new(UnknownKeys::Passthrough))),
			min_items: None,
			max_items: None,
		}),
		AttributeType::Enumeration => {
			let values = attribute.enum_values.clone().unwrap_or_default();
			if values.is_empty() {
				return Err(SchemaError::EmptyEnumeration {
					model: model.to_string(),
					attribute: name.to_string(),
				}
				.into());
			}
			Rule::Enumeration(values)
		}
		AttributeType::Media => {
			let upload = ctx.upload_model();
			target_rule(upload, mode, ctx)?.many_if(attribute.multiple)
		}
		AttributeType::Component => {
			let uid = attribute.component.as_deref().unwrap_or_default();
			target_rule(uid, mode, ctx)?.many_if(attribute.repeatable)
		}
		AttributeType::DynamicZone => dynamic_zone_rule(attribute, mode, ctx)?,
		AttributeType::Relation => relation_rule(model, name, attribute, mode, ctx)?,
		// Custom fields were resolved above and may only wrap scalar types
		AttributeType::CustomField => {
			return Err(SchemaError::UnsupportedType(format!(
				"{} (custom field on {}.{})",
				kind, model, name
			))
			.into());
		}
	};

	let populatable = !kind.is_scalar();
	Ok(FieldRule {
		rule,
		required: attribute.required && !(mode == Mode::Read && populatable),
		default: attribute.default.clone(),
		read_only: mode == Mode::Read && !attribute.is_writable(),
	})
}

fn formatted(format: StringFormat) -> Rule {
	Rule::String(StringRule {
		format: Some(format),
		..Default::default()
	})
}

fn string_rule(
	model: &str,
	name: &str,
	attribute: &AttributeDefinition,
	format: Option<StringFormat>,
) -> Result<StringRule> {
	let pattern = match &attribute.regex {
		Some(raw) => Some(Regex::new(raw).map_err(|e| BuildError::InvalidPattern {
			model: model.to_string(),
			attribute: name.to_string(),
			reason: e.to_string(),
		})?),
		None => None,
	};
	Ok(StringRule {
		min_length: attribute.min_length,
		max_length: attribute.max_length,
		format,
		pattern,
	})
}

/// Embedded schema in read mode, identifier in input mode
fn target_rule(uid: &str, mode: Mode, ctx: &dyn MappingContext) -> Result<Rule> {
	match mode {
		Mode::Read => ctx.embedded_schema(uid),
		Mode::Input => Ok(Rule::Reference(ctx.id_kind(uid)?)),
	}
}

fn dynamic_zone_rule(
	attribute: &AttributeDefinition,
	mode: Mode,
	ctx: &dyn MappingContext,
) -> Result<Rule> {
	let mut variants = IndexMap::new();
	for uid in attribute.components.iter().flatten() {
		let variant = match mode {
			Mode::Read => ctx.embedded_schema(uid)?,
			Mode::Input => Rule::Object(
				ObjectRule::new(UnknownKeys::Reject)
					.field("id", FieldRule::required(Rule::Reference(ctx.id_kind(uid)?))),
			),
		};
		variants.insert(uid.clone(), variant);
	}
	Ok(Rule::array(Rule::Tagged {
		discriminator: COMPONENT_KEY.to_string(),
		variants,
	}))
}

fn relation_rule(
	model: &str,
	name: &str,
	attribute: &AttributeDefinition,
	mode: Mode,
	ctx: &dyn MappingContext,
) -> Result<Rule> {
	let nature = attribute.relation.ok_or_else(|| SchemaError::MissingConstraint {
		model: model.to_string(),
		attribute: name.to_string(),
		kind: AttributeType::Relation.to_string(),
		constraint: "relation".to_string(),
	})?;
	let target = attribute.target.as_deref().unwrap_or_default();

	let single = if attribute.is_polymorphic_target() {
		polymorphic_entry(mode)
	} else {
		target_rule(target, mode, ctx)?
	};
	Ok(single.many_if(nature.is_collection()))
}

/// `{ __type, id, field? }` entry of a relation whose target varies per row
fn polymorphic_entry(mode: Mode) -> Rule {
	let id = Rule::Union(vec![
		Rule::Reference(IdKind::Integer),
		Rule::Reference(IdKind::Uuid),
	]);
	let unknown_keys = match mode {
		Mode::Read => UnknownKeys::Passthrough,
		Mode::Input => UnknownKeys::Reject,
	};
	Rule::Object(
		ObjectRule::new(unknown_keys)
			.field(TYPE_KEY, FieldRule::required(Rule::String(StringRule::default())))
			.field("id", FieldRule::required(id))
			.field("field", FieldRule::optional(Rule::String(StringRule::default()))),
	)
}
