//! Relation resolution
//!
//! Every relation-typed and media attribute of every model becomes an
//! [`Association`] describing where its rows live: an owning column, a
//! foreign key on the target, a pivot table, or a polymorphic morph table.
//! [`AssociationTable::build`] computes them for the whole registry in one
//! pass and rejects inconsistent pairings, so later stages can rely on every
//! `via` cross-reference being valid.

pub mod join;

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use lattice_core::naming::{singularize, to_snake_case};
use lattice_core::schema::{
	AttributeDefinition, AttributeType, ModelSchema, MorphKind, Nature, PrimaryKeyType,
	SchemaRegistry,
};
use lattice_core::{Result, SchemaError};

pub use join::{ColumnRef, JoinSpec, JoinStep, resolve_join};

/// Whether an association holds one target or a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
	Single,
	Collection,
}

/// Many-to-many join table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
	pub name: String,
	/// Column pointing at the declaring model
	pub origin_column: String,
	/// Column pointing at the target model
	pub target_column: String,
	pub with_pivot: Vec<String>,
	/// Whether the declaring side creates the table
	pub owner: bool,
}

/// Polymorphic join table and its discriminator columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphColumns {
	pub table: String,
	/// Column pointing at the model that declares the polymorphic attribute
	pub owner_id: String,
	/// Column holding the related row's primary key
	pub related_id: String,
	/// Column holding the related row's table name
	pub related_type: String,
	pub field: String,
	pub order: String,
}

impl MorphColumns {
	fn new(owner: &ModelSchema, alias: &str) -> Self {
		let alias = to_snake_case(alias);
		Self {
			table: format!("{}_morph", owner.collection_name),
			owner_id: format!("{}_{}", singularize(&owner.collection_name), owner.primary_key),
			related_id: format!("{}_id", alias),
			related_type: format!("{}_type", alias),
			field: "field".to_string(),
			order: "order".to_string(),
		}
	}
}

/// Where the rows of an association are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
	/// The declaring table holds `column` with the target's primary key
	Column { column: String },
	/// The target table holds `column` with the declaring row's primary key
	ForeignKey { column: String },
	Pivot(PivotTable),
	Morph(MorphColumns),
}

/// One relation or media attribute resolved against the registry
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
	/// UID of the declaring model
	pub model: String,
	/// Table of the declaring model
	pub table: String,
	pub primary_key: String,
	/// Attribute name
	pub alias: String,
	pub nature: Nature,
	pub kind: AssociationKind,
	/// Target UID; `None` on the polymorphic side
	pub target: Option<String>,
	pub target_table: Option<String>,
	pub target_primary_key: String,
	pub via: Option<String>,
	pub plugin: Option<String>,
	pub dominant: bool,
	pub strategy: Strategy,
}

impl Association {
	pub fn pivot(&self) -> Option<&PivotTable> {
		match &self.strategy {
			Strategy::Pivot(pivot) => Some(pivot),
			_ => None,
		}
	}

	pub fn morph(&self) -> Option<&MorphColumns> {
		match &self.strategy {
			Strategy::Morph(columns) => Some(columns),
			_ => None,
		}
	}

	/// Whether this is a `manyMorphTo*` attribute whose target varies per row
	pub fn is_polymorphic(&self) -> bool {
		self.nature
			.morph()
			.is_some_and(|kind| kind.is_polymorphic_side())
	}

	pub fn is_collection(&self) -> bool {
		self.kind == AssociationKind::Collection
	}

	/// Owning column on the declaring table, if any
	pub fn owning_column(&self) -> Option<&str> {
		match &self.strategy {
			Strategy::Column { column } => Some(column),
			_ => None,
		}
	}
}

/// A model reachable through a polymorphic attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphTarget {
	pub model: String,
	/// Value stored in the `<alias>_type` column
	pub table: String,
	/// Value stored in the `field` column
	pub field: String,
}

/// A morph table together with the model that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphTable {
	pub owner: String,
	pub name: String,
	/// Discriminator columns of each polymorphic attribute sharing the table
	pub aliases: Vec<MorphColumns>,
}

/// Associations of every model, keyed by model UID then attribute name
#[derive(Debug, Clone, Default)]
pub struct AssociationTable {
	by_model: IndexMap<String, IndexMap<String, Arc<Association>>>,
}

impl AssociationTable {
	/// Resolve every association in the registry
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::{AttributeDefinition, ModelSchema, Nature, SchemaRegistry};
	/// use lattice_db::associations::AssociationTable;
	///
	/// let registry = SchemaRegistry::builder()
	///     .model(ModelSchema::new("api::tag.tag", "tags"))
	///     .model(
	///         ModelSchema::new("api::post.post", "posts")
	///             .attribute("tags", AttributeDefinition::relation(Nature::ManyWay, "api::tag.tag")),
	///     )
	///     .build()
	///     .unwrap();
	///
	/// let table = AssociationTable::build(&registry).unwrap();
	/// let pivot = table.get("api::post.post", "tags").unwrap().pivot().unwrap();
	/// assert_eq!(pivot.name, "posts_tags");
	/// assert_eq!((pivot.origin_column.as_str(), pivot.target_column.as_str()), ("post_id", "tag_id"));
	/// ```
	pub fn build(registry: &SchemaRegistry) -> Result<Self> {
		let mut by_model = IndexMap::new();
		let mut count = 0;
		for model in registry.models() {
			let mut entries = IndexMap::new();
			for (name, attribute) in &model.attributes {
				let attribute = registry.resolve_attribute(&model.uid, name, attribute)?;
				let association = match attribute.kind {
					AttributeType::Relation => relation_association(registry, model, name, &attribute)?,
					AttributeType::Media => media_association(registry, model, name, &attribute)?,
					_ => continue,
				};
				entries.insert(name.clone(), Arc::new(association));
			}
			count += entries.len();
			by_model.insert(model.uid.clone(), entries);
		}
		let table = Self { by_model };
		for association in table.all().filter(|association| association.is_polymorphic()) {
			if let Some(columns) = association.morph() {
				table.related_key_type(registry, columns).map_err(|reason| SchemaError::InvalidRelation {
					model: association.model.clone(),
					attribute: association.alias.clone(),
					reason,
				})?;
			}
		}
		debug!(associations = count, "association table built");
		Ok(table)
	}

	pub fn get(&self, model: &str, alias: &str) -> Option<&Arc<Association>> {
		self.by_model.get(model).and_then(|entries| entries.get(alias))
	}

	/// Associations declared by `model`
	pub fn for_model(&self, model: &str) -> impl Iterator<Item = &Arc<Association>> {
		self.by_model.get(model).into_iter().flat_map(|entries| entries.values())
	}

	pub fn all(&self) -> impl Iterator<Item = &Arc<Association>> {
		self.by_model.values().flat_map(|entries| entries.values())
	}

	/// Associations of other models whose target is `model`
	pub fn targeting<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a Arc<Association>> + 'a {
		self.all()
			.filter(move |association| association.target.as_deref() == Some(model))
	}

	/// Models reachable through a polymorphic association
	///
	/// Recovered by scanning the associations that point back at the
	/// polymorphic attribute through `via`.
	pub fn morph_targets(&self, association: &Association) -> Vec<MorphTarget> {
		let Some(columns) = association.morph() else {
			return Vec::new();
		};
		self.all()
			.filter(|candidate| !candidate.is_polymorphic())
			.filter(|candidate| candidate.target.as_deref() == Some(association.model.as_str()))
			.filter(|candidate| candidate.morph() == Some(columns))
			.map(|candidate| MorphTarget {
				model: candidate.model.clone(),
				table: candidate.table.clone(),
				field: candidate.alias.clone(),
			})
			.collect()
	}

	/// Pivot tables, each listed once from its owning side
	pub fn pivot_tables(&self) -> Vec<(&Association, &PivotTable)> {
		let mut seen = Vec::<&str>::new();
		let mut pivots = Vec::new();
		for association in self.all() {
			if let Some(pivot) = association.pivot() {
				if pivot.owner && !seen.contains(&pivot.name.as_str()) {
					seen.push(&pivot.name);
					pivots.push((association.as_ref(), pivot));
				}
			}
		}
		pivots
	}

	/// Morph tables, each listed once with every alias stored in it
	pub fn morph_tables(&self) -> Vec<MorphTable> {
		let mut tables: Vec<MorphTable> = Vec::new();
		for association in self.all() {
			let Some(columns) = association.morph() else {
				continue;
			};
			match tables.iter_mut().find(|table| table.name == columns.table) {
				Some(table) => {
					if !table.aliases.contains(columns) {
						table.aliases.push(columns.clone());
					}
				}
				None => {
					let owner = if association.is_polymorphic() {
						association.model.clone()
					} else {
						association.target.clone().unwrap_or_default()
					};
					tables.push(MorphTable {
						owner,
						name: columns.table.clone(),
						aliases: vec![columns.clone()],
					});
				}
			}
		}
		tables
	}

	/// Primary key type of the rows `columns.related_id` can point at
	///
	/// Every model linked through the same polymorphic attribute must share
	/// one key type; models with no link default to integer keys.
	pub fn related_key_type(
		&self,
		registry: &SchemaRegistry,
		columns: &MorphColumns,
	) -> std::result::Result<PrimaryKeyType, String> {
		let mut key_type: Option<(PrimaryKeyType, &str)> = None;
		for association in self.all() {
			if association.is_polymorphic() || association.morph() != Some(columns) {
				continue;
			}
			let Ok(model) = registry.get_model(&association.model) else {
				continue;
			};
			match key_type {
				None => key_type = Some((model.primary_key_type, &association.model)),
				Some((seen, first)) if seen != model.primary_key_type => {
					return Err(format!(
						"{} and {} link through it with different primary key types",
						first, association.model
					));
				}
				Some(_) => {}
			}
		}
		Ok(key_type.map(|(key_type, _)| key_type).unwrap_or_default())
	}
}

fn invalid(model: &ModelSchema, name: &str, reason: impl Into<String>) -> SchemaError {
	SchemaError::InvalidRelation {
		model: model.uid.clone(),
		attribute: name.to_string(),
		reason: reason.into(),
	}
}

fn kind_of(nature: Nature) -> AssociationKind {
	if nature.is_collection() {
		AssociationKind::Collection
	} else {
		AssociationKind::Single
	}
}

fn fk_column(model: &ModelSchema) -> String {
	format!("{}_{}", singularize(&model.collection_name), model.primary_key)
}

fn relation_association(
	registry: &SchemaRegistry,
	model: &ModelSchema,
	name: &str,
	attribute: &AttributeDefinition,
) -> Result<Association> {
	let nature = attribute
		.relation
		.ok_or_else(|| invalid(model, name, "missing relation nature"))?;
	let target_uid = attribute
		.target
		.as_deref()
		.ok_or_else(|| invalid(model, name, "missing relation target"))?;

	let mut association = Association {
		model: model.uid.clone(),
		table: model.collection_name.clone(),
		primary_key: model.primary_key.clone(),
		alias: name.to_string(),
		nature,
		kind: kind_of(nature),
		target: None,
		target_table: None,
		target_primary_key: "id".to_string(),
		via: attribute.via.clone(),
		plugin: None,
		dominant: attribute.dominant,
		strategy: Strategy::Column {
			column: name.to_string(),
		},
	};

	if target_uid == "*" {
		if !nature.morph().is_some_and(|kind| kind.is_polymorphic_side()) {
			return Err(invalid(
				model,
				name,
				format!("{} relations cannot target \"*\"", nature),
			));
		}
		association.strategy = Strategy::Morph(MorphColumns::new(model, name));
		return Ok(association);
	}

	let target = registry
		.get_model(target_uid)
		.map_err(|_| SchemaError::UnknownTarget {
			model: model.uid.clone(),
			attribute: name.to_string(),
			target: target_uid.to_string(),
		})?;
	association.target = Some(target.uid.clone());
	association.target_table = Some(target.collection_name.clone());
	association.target_primary_key = target.primary_key.clone();
	association.plugin = target.plugin().map(str::to_string);

	association.strategy = match nature {
		Nature::Morph(kind) if kind.is_polymorphic_side() => {
			return Err(invalid(
				model,
				name,
				format!("{} relations must target \"*\"", nature),
			));
		}
		Nature::Morph(kind) => {
			let (via, inverse) = inverse_of(model, name, attribute, target)?;
			let expected = match kind {
				MorphKind::OneToOneMorph => Nature::Morph(MorphKind::ManyMorphToOne),
				_ => Nature::Morph(MorphKind::ManyMorphToMany),
			};
			if inverse.relation != Some(expected) || !inverse.is_polymorphic_target() {
				return Err(invalid(
					model,
					name,
					format!("{} requires {}.{} to be a {} relation to \"*\"", nature, target.uid, via, expected),
				));
			}
			Strategy::Morph(MorphColumns::new(target, via))
		}
		Nature::OneToOne | Nature::OneToMany | Nature::ManyToOne | Nature::ManyToMany => {
			let (via, inverse) = inverse_of(model, name, attribute, target)?;
			check_pair(model, name, nature, target, via, inverse)?;
			match nature {
				Nature::OneToMany => Strategy::ForeignKey {
					column: via.to_string(),
				},
				Nature::ManyToMany => Strategy::Pivot(many_to_many_pivot(
					model, name, attribute, target, via, inverse,
				)?),
				_ => Strategy::Column {
					column: name.to_string(),
				},
			}
		}
		Nature::OneWay => Strategy::Column {
			column: name.to_string(),
		},
		Nature::ManyWay => {
			let target_column = if target.uid == model.uid {
				format!("related_{}", fk_column(target))
			} else {
				fk_column(target)
			};
			Strategy::Pivot(PivotTable {
				name: attribute.collection_name.clone().unwrap_or_else(|| {
					format!("{}_{}", model.collection_name, to_snake_case(name))
				}),
				origin_column: fk_column(model),
				target_column,
				with_pivot: attribute.with_pivot.clone(),
				owner: true,
			})
		}
	};
	Ok(association)
}

fn inverse_of<'a>(
	model: &ModelSchema,
	name: &str,
	attribute: &'a AttributeDefinition,
	target: &'a ModelSchema,
) -> Result<(&'a str, &'a AttributeDefinition)> {
	let via = attribute
		.via
		.as_deref()
		.ok_or_else(|| invalid(model, name, format!("{} relations require \"via\"", attribute.relation.map(|n| n.as_str()).unwrap_or("bidirectional"))))?;
	let inverse = target.get_attribute(via).ok_or_else(|| {
		invalid(
			model,
			name,
			format!("\"via\" names {}.{}, which does not exist", target.uid, via),
		)
	})?;
	Ok((via, inverse))
}

fn check_pair(
	model: &ModelSchema,
	name: &str,
	nature: Nature,
	target: &ModelSchema,
	via: &str,
	inverse: &AttributeDefinition,
) -> Result<()> {
	let inverse_nature = inverse
		.relation
		.ok_or_else(|| invalid(model, name, format!("{}.{} is not a relation", target.uid, via)))?;
	if inverse.target.as_deref() != Some(model.uid.as_str()) {
		return Err(invalid(
			model,
			name,
			format!("{}.{} does not target {}", target.uid, via, model.uid),
		));
	}
	if inverse.via.as_deref() != Some(name) {
		return Err(invalid(
			model,
			name,
			format!("{}.{} must declare \"via\": \"{}\"", target.uid, via, name),
		));
	}
	let inferred = Nature::infer(nature.is_collection(), Some(inverse_nature.is_collection()));
	if !inverse_nature.is_bidirectional() || inferred != nature {
		return Err(invalid(
			model,
			name,
			format!(
				"{} cannot pair with {}.{} declared as {}",
				nature, target.uid, via, inverse_nature
			),
		));
	}
	Ok(())
}

fn many_to_many_pivot(
	model: &ModelSchema,
	name: &str,
	attribute: &AttributeDefinition,
	target: &ModelSchema,
	via: &str,
	inverse: &AttributeDefinition,
) -> Result<PivotTable> {
	let this_side_dominant = match (attribute.dominant, inverse.dominant) {
		(true, true) => {
			return Err(invalid(
				model,
				name,
				format!("both {} and {}.{} are dominant", name, target.uid, via),
			));
		}
		(true, false) => true,
		(false, true) => false,
		// neither side chose; the lexically smaller side owns the table
		(false, false) => (model.uid.as_str(), name) <= (target.uid.as_str(), via),
	};

	let (dominant, dominant_alias, dominant_attr, other, other_attr) = if this_side_dominant {
		(model, name, attribute, target, inverse)
	} else {
		(target, via, inverse, model, attribute)
	};
	let table_name = dominant_attr
		.collection_name
		.clone()
		.or_else(|| other_attr.collection_name.clone())
		.unwrap_or_else(|| {
			format!(
				"{}_{}",
				dominant.collection_name,
				to_snake_case(dominant_alias)
			)
		});

	let dominant_column = fk_column(dominant);
	let other_column = if dominant.uid == other.uid {
		format!("related_{}", fk_column(other))
	} else {
		fk_column(other)
	};
	let (origin_column, target_column) = if this_side_dominant {
		(dominant_column, other_column)
	} else {
		(other_column, dominant_column)
	};

	Ok(PivotTable {
		name: table_name,
		origin_column,
		target_column,
		with_pivot: dominant_attr.with_pivot.clone(),
		owner: this_side_dominant,
	})
}

fn media_association(
	registry: &SchemaRegistry,
	model: &ModelSchema,
	name: &str,
	attribute: &AttributeDefinition,
) -> Result<Association> {
	let upload = registry
		.get_model(registry.upload_model())
		.map_err(|_| SchemaError::UnknownTarget {
			model: model.uid.clone(),
			attribute: name.to_string(),
			target: registry.upload_model().to_string(),
		})?;
	let via = upload
		.attributes
		.iter()
		.find(|(_, candidate)| {
			candidate.is_polymorphic_target()
				&& candidate
					.relation
					.is_some_and(|nature| nature == Nature::Morph(MorphKind::ManyMorphToMany))
		})
		.map(|(via, _)| via.as_str())
		.unwrap_or("related");
	let nature = if attribute.multiple {
		Nature::Morph(MorphKind::ManyToManyMorph)
	} else {
		Nature::Morph(MorphKind::OneToManyMorph)
	};

	Ok(Association {
		model: model.uid.clone(),
		table: model.collection_name.clone(),
		primary_key: model.primary_key.clone(),
		alias: name.to_string(),
		nature,
		kind: kind_of(nature),
		target: Some(upload.uid.clone()),
		target_table: Some(upload.collection_name.clone()),
		target_primary_key: upload.primary_key.clone(),
		via: Some(via.to_string()),
		plugin: upload.plugin().map(str::to_string),
		dominant: false,
		strategy: Strategy::Morph(MorphColumns::new(upload, via)),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	const ARTICLE: &str = "api::article.article";
	const AUTHOR: &str = "api::author.author";
	const FILE: &str = "plugin::upload.file";

	fn file() -> ModelSchema {
		ModelSchema::new(FILE, "upload_file")
			.attribute("name", AttributeDefinition::new(AttributeType::String))
			.attribute(
				"related",
				AttributeDefinition::relation(Nature::Morph(MorphKind::ManyMorphToMany), "*"),
			)
	}

	#[fixture]
	fn registry() -> SchemaRegistry {
		let author = ModelSchema::new(AUTHOR, "authors")
			.attribute("name", AttributeDefinition::new(AttributeType::String))
			.attribute(
				"articles",
				AttributeDefinition::relation(Nature::ManyToMany, ARTICLE).with_via("authors"),
			)
			.attribute(
				"posts",
				AttributeDefinition::relation(Nature::OneToMany, ARTICLE).with_via("writer"),
			);
		let mut gallery = AttributeDefinition::new(AttributeType::Media);
		gallery.multiple = true;
		let article = ModelSchema::new(ARTICLE, "articles")
			.attribute("title", AttributeDefinition::new(AttributeType::String))
			.attribute(
				"authors",
				AttributeDefinition::relation(Nature::ManyToMany, AUTHOR)
					.with_via("articles")
					.dominant(),
			)
			.attribute(
				"writer",
				AttributeDefinition::relation(Nature::ManyToOne, AUTHOR).with_via("posts"),
			)
			.attribute(
				"related",
				AttributeDefinition::relation(Nature::ManyWay, ARTICLE),
			)
			.attribute("cover", AttributeDefinition::new(AttributeType::Media))
			.attribute("gallery", gallery);
		SchemaRegistry::builder()
			.models([file(), author, article])
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_many_to_many_pivot_from_both_sides(registry: SchemaRegistry) {
		let table = AssociationTable::build(&registry).unwrap();
		let owning = table.get(ARTICLE, "authors").unwrap().pivot().unwrap().clone();
		let inverse = table.get(AUTHOR, "articles").unwrap().pivot().unwrap().clone();

		assert_eq!(owning.name, "articles_authors");
		assert_eq!(inverse.name, owning.name);
		assert_eq!(owning.origin_column, "article_id");
		assert_eq!(owning.target_column, "author_id");
		assert_eq!(inverse.origin_column, "author_id");
		assert_eq!(inverse.target_column, "article_id");
		assert!(owning.owner);
		assert!(!inverse.owner);
		assert_eq!(table.pivot_tables().len(), 2);
	}

	#[rstest]
	fn test_self_referencing_pivot_prefixes_target(registry: SchemaRegistry) {
		let table = AssociationTable::build(&registry).unwrap();
		let pivot = table.get(ARTICLE, "related").unwrap().pivot().unwrap();
		assert_eq!(pivot.name, "articles_related");
		assert_eq!(pivot.origin_column, "article_id");
		assert_eq!(pivot.target_column, "related_article_id");
	}

	#[rstest]
	fn test_one_to_many_uses_target_foreign_key(registry: SchemaRegistry) {
		let table = AssociationTable::build(&registry).unwrap();
		assert_eq!(
			table.get(AUTHOR, "posts").unwrap().strategy,
			Strategy::ForeignKey {
				column: "writer".to_string()
			}
		);
		assert_eq!(
			table.get(ARTICLE, "writer").unwrap().owning_column(),
			Some("writer")
		);
	}

	#[rstest]
	fn test_media_becomes_morph_association(registry: SchemaRegistry) {
		let table = AssociationTable::build(&registry).unwrap();
		let cover = table.get(ARTICLE, "cover").unwrap();
		let gallery = table.get(ARTICLE, "gallery").unwrap();
		assert_eq!(cover.nature, Nature::Morph(MorphKind::OneToManyMorph));
		assert_eq!(gallery.nature, Nature::Morph(MorphKind::ManyToManyMorph));

		let columns = cover.morph().unwrap();
		assert_eq!(columns.table, "upload_file_morph");
		assert_eq!(columns.owner_id, "upload_file_id");
		assert_eq!(columns.related_id, "related_id");
		assert_eq!(columns.related_type, "related_type");
	}

	#[rstest]
	fn test_morph_targets_scan_sibling_associations(registry: SchemaRegistry) {
		let table = AssociationTable::build(&registry).unwrap();
		let related = table.get(FILE, "related").unwrap();
		assert!(related.is_polymorphic());
		let targets = table.morph_targets(related);
		let fields: Vec<_> = targets.iter().map(|t| t.field.as_str()).collect();
		assert_eq!(fields, vec!["cover", "gallery"]);
		assert!(targets.iter().all(|t| t.table == "articles"));
		assert_eq!(table.morph_tables().len(), 1);
	}

	#[rstest]
	#[case(Nature::OneToMany, "manyToMany")]
	#[case(Nature::OneToOne, "manyToMany")]
	fn test_mismatched_pair_is_rejected(#[case] nature: Nature, #[case] expected: &str) {
		let author = ModelSchema::new(AUTHOR, "authors").attribute(
			"articles",
			AttributeDefinition::relation(nature, ARTICLE).with_via("authors"),
		);
		let article = ModelSchema::new(ARTICLE, "articles").attribute(
			"authors",
			AttributeDefinition::relation(Nature::ManyToMany, AUTHOR).with_via("articles"),
		);
		let registry = SchemaRegistry::builder()
			.models([author, article])
			.build()
			.unwrap();
		let err = AssociationTable::build(&registry).unwrap_err();
		assert!(matches!(err, SchemaError::InvalidRelation { .. }));
		assert!(err.to_string().contains(expected));
	}

	#[rstest]
	fn test_both_dominant_is_rejected() {
		let author = ModelSchema::new(AUTHOR, "authors").attribute(
			"articles",
			AttributeDefinition::relation(Nature::ManyToMany, ARTICLE)
				.with_via("authors")
				.dominant(),
		);
		let article = ModelSchema::new(ARTICLE, "articles").attribute(
			"authors",
			AttributeDefinition::relation(Nature::ManyToMany, AUTHOR)
				.with_via("articles")
				.dominant(),
		);
		let registry = SchemaRegistry::builder()
			.models([author, article])
			.build()
			.unwrap();
		let err = AssociationTable::build(&registry).unwrap_err();
		assert!(err.to_string().contains("dominant"));
	}

	#[rstest]
	fn test_missing_via_attribute_is_rejected() {
		let author = ModelSchema::new(AUTHOR, "authors").attribute(
			"articles",
			AttributeDefinition::relation(Nature::OneToMany, ARTICLE).with_via("writer"),
		);
		let article = ModelSchema::new(ARTICLE, "articles");
		let registry = SchemaRegistry::builder()
			.models([author, article])
			.build()
			.unwrap();
		let err = AssociationTable::build(&registry).unwrap_err();
		assert!(err.to_string().contains("does not exist"));
	}

	#[rstest]
	fn test_undecided_dominance_is_deterministic() {
		let author = ModelSchema::new(AUTHOR, "authors").attribute(
			"articles",
			AttributeDefinition::relation(Nature::ManyToMany, ARTICLE).with_via("authors"),
		);
		let article = ModelSchema::new(ARTICLE, "articles").attribute(
			"authors",
			AttributeDefinition::relation(Nature::ManyToMany, AUTHOR).with_via("articles"),
		);
		let registry = SchemaRegistry::builder()
			.models([author, article])
			.build()
			.unwrap();
		let table = AssociationTable::build(&registry).unwrap();
		// "api::article.article" sorts before "api::author.author"
		assert!(table.get(ARTICLE, "authors").unwrap().pivot().unwrap().owner);
		assert!(!table.get(AUTHOR, "articles").unwrap().pivot().unwrap().owner);
		assert_eq!(table.pivot_tables()[0].1.name, "articles_authors");
	}
}
