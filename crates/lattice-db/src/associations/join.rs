//! Join descriptors for traversing associations

use super::{Association, Strategy};

/// A column qualified by a table alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
	pub alias: String,
	pub column: String,
}

impl ColumnRef {
	pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
		Self {
			alias: alias.into(),
			column: column.into(),
		}
	}
}

/// One `LEFT JOIN <table> AS <alias> ON <on.0> = <on.1> [AND <extra>...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
	pub table: String,
	pub alias: String,
	pub on: (ColumnRef, ColumnRef),
	/// Additional equality constraints against literal values
	pub extra: Vec<(ColumnRef, String)>,
}

/// Joins needed to reach the rows of an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
	pub steps: Vec<JoinStep>,
	/// Whether the last step joins the target table itself
	///
	/// Polymorphic associations stop at the morph table because the target
	/// table varies per row.
	pub reaches_target: bool,
}

impl JoinSpec {
	/// Alias of the last joined table
	pub fn last_alias(&self) -> Option<&str> {
		self.steps.last().map(|step| step.alias.as_str())
	}
}

/// Describe the joins from `origin_alias` to `dest_alias` along `association`
///
/// Intermediate pivot and morph tables are aliased `<dest_alias>_pivot` and
/// `<dest_alias>_morph`.
///
/// # Examples
///
/// ```
/// use lattice_core::schema::{AttributeDefinition, ModelSchema, Nature, SchemaRegistry};
/// use lattice_db::associations::{AssociationTable, resolve_join};
///
/// let registry = SchemaRegistry::builder()
///     .model(ModelSchema::new("api::author.author", "authors"))
///     .model(
///         ModelSchema::new("api::article.article", "articles")
///             .attribute("author", AttributeDefinition::relation(Nature::OneWay, "api::author.author")),
///     )
///     .build()
///     .unwrap();
/// let table = AssociationTable::build(&registry).unwrap();
///
/// let spec = resolve_join(table.get("api::article.article", "author").unwrap(), "articles", "authors_1");
/// assert_eq!(spec.steps.len(), 1);
/// assert_eq!(spec.steps[0].on.0.column, "author");
/// assert_eq!(spec.steps[0].on.1.column, "id");
/// ```
pub fn resolve_join(association: &Association, origin_alias: &str, dest_alias: &str) -> JoinSpec {
	let target_table = association.target_table.clone().unwrap_or_default();
	let target_pk = association.target_primary_key.as_str();
	let origin_pk = association.primary_key.as_str();

	let steps = match &association.strategy {
		Strategy::Column { column } => vec![JoinStep {
			table: target_table,
			alias: dest_alias.to_string(),
			on: (
				ColumnRef::new(origin_alias, column.as_str()),
				ColumnRef::new(dest_alias, target_pk),
			),
			extra: Vec::new(),
		}],
		Strategy::ForeignKey { column } => vec![JoinStep {
			table: target_table,
			alias: dest_alias.to_string(),
			on: (
				ColumnRef::new(origin_alias, origin_pk),
				ColumnRef::new(dest_alias, column.as_str()),
			),
			extra: Vec::new(),
		}],
		Strategy::Pivot(pivot) => {
			let pivot_alias = format!("{}_pivot", dest_alias);
			vec![
				JoinStep {
					table: pivot.name.clone(),
					alias: pivot_alias.clone(),
					on: (
						ColumnRef::new(origin_alias, origin_pk),
						ColumnRef::new(pivot_alias.as_str(), pivot.origin_column.as_str()),
					),
					extra: Vec::new(),
				},
				JoinStep {
					table: target_table,
					alias: dest_alias.to_string(),
					on: (
						ColumnRef::new(pivot_alias.as_str(), pivot.target_column.as_str()),
						ColumnRef::new(dest_alias, target_pk),
					),
					extra: Vec::new(),
				},
			]
		}
		Strategy::Morph(columns) => {
			let morph_alias = format!("{}_morph", dest_alias);
			if association.is_polymorphic() {
				vec![JoinStep {
					table: columns.table.clone(),
					alias: morph_alias.clone(),
					on: (
						ColumnRef::new(origin_alias, origin_pk),
						ColumnRef::new(morph_alias.as_str(), columns.owner_id.as_str()),
					),
					extra: Vec::new(),
				}]
			} else {
				vec![
					JoinStep {
						table: columns.table.clone(),
						alias: morph_alias.clone(),
						on: (
							ColumnRef::new(origin_alias, origin_pk),
							ColumnRef::new(morph_alias.as_str(), columns.related_id.as_str()),
						),
						extra: vec![
							(
								ColumnRef::new(morph_alias.as_str(), columns.related_type.as_str()),
								association.table.clone(),
							),
							(
								ColumnRef::new(morph_alias.as_str(), columns.field.as_str()),
								association.alias.clone(),
							),
						],
					},
					JoinStep {
						table: target_table,
						alias: dest_alias.to_string(),
						on: (
							ColumnRef::new(morph_alias.as_str(), columns.owner_id.as_str()),
							ColumnRef::new(dest_alias, target_pk),
						),
						extra: Vec::new(),
					},
				]
			}
		}
	};

	JoinSpec {
		reaches_target: !association.is_polymorphic(),
		steps,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::associations::AssociationTable;
	use lattice_core::schema::{
		AttributeDefinition, AttributeType, ModelSchema, MorphKind, Nature, SchemaRegistry,
	};
	use rstest::{fixture, rstest};

	#[fixture]
	fn table() -> AssociationTable {
		let file = ModelSchema::new("plugin::upload.file", "upload_file").attribute(
			"related",
			AttributeDefinition::relation(Nature::Morph(MorphKind::ManyMorphToMany), "*"),
		);
		let tag = ModelSchema::new("api::tag.tag", "tags");
		let article = ModelSchema::new("api::article.article", "articles")
			.attribute(
				"tags",
				AttributeDefinition::relation(Nature::ManyWay, "api::tag.tag"),
			)
			.attribute("cover", AttributeDefinition::new(AttributeType::Media));
		let registry = SchemaRegistry::builder()
			.models([file, tag, article])
			.build()
			.unwrap();
		AssociationTable::build(&registry).unwrap()
	}

	#[rstest]
	fn test_pivot_join_goes_through_aliased_pivot(table: AssociationTable) {
		let spec = resolve_join(
			table.get("api::article.article", "tags").unwrap(),
			"articles",
			"tags_1",
		);
		assert!(spec.reaches_target);
		assert_eq!(spec.steps.len(), 2);
		assert_eq!(spec.steps[0].table, "articles_tags");
		assert_eq!(spec.steps[0].alias, "tags_1_pivot");
		assert_eq!(spec.steps[0].on.1, ColumnRef::new("tags_1_pivot", "article_id"));
		assert_eq!(spec.steps[1].on.0, ColumnRef::new("tags_1_pivot", "tag_id"));
		assert_eq!(spec.last_alias(), Some("tags_1"));
	}

	#[rstest]
	fn test_morph_join_constrains_type_and_field(table: AssociationTable) {
		let spec = resolve_join(
			table.get("api::article.article", "cover").unwrap(),
			"articles",
			"upload_file_1",
		);
		let morph = &spec.steps[0];
		assert_eq!(morph.table, "upload_file_morph");
		assert_eq!(morph.on.1.column, "related_id");
		assert_eq!(
			morph.extra,
			vec![
				(ColumnRef::new("upload_file_1_morph", "related_type"), "articles".to_string()),
				(ColumnRef::new("upload_file_1_morph", "field"), "cover".to_string()),
			]
		);
		assert_eq!(spec.steps[1].on.0.column, "upload_file_id");
	}

	#[rstest]
	fn test_polymorphic_join_stops_at_morph_table(table: AssociationTable) {
		let spec = resolve_join(
			table.get("plugin::upload.file", "related").unwrap(),
			"upload_file",
			"related_1",
		);
		assert!(!spec.reaches_target);
		assert_eq!(spec.steps.len(), 1);
		assert_eq!(spec.last_alias(), Some("related_1_morph"));
	}
}
