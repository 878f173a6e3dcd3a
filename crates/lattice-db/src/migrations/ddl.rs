//! Table definitions and DDL rendering
//!
//! A [`TableDef`] is the declared shape of one table: model tables, pivot
//! tables, morph tables and component link tables all use it. It is also the
//! snapshot stored in `core_store`, so two definitions comparing equal means
//! the table needs no alteration.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use lattice_core::naming::singularize;
use lattice_core::schema::{
	AttributeType, DefaultValue, ModelSchema, PrimaryKeyType, SchemaRegistry,
};
use lattice_core::Result;

use crate::associations::{Association, AssociationTable, MorphTable, PivotTable};
use crate::backends::DatabaseType;

use super::column::{ColumnKind, primary_key_sql};

/// One declared column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
	pub name: String,
	pub kind: ColumnKind,
	#[serde(default)]
	pub not_null: bool,
	#[serde(default)]
	pub unique: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<JsonValue>,
}

impl ColumnDef {
	pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
		Self {
			name: name.into(),
			kind,
			not_null: false,
			unique: false,
			default: None,
		}
	}
}

/// Declared shape of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
	pub name: String,
	pub primary_key: String,
	pub primary_key_type: PrimaryKeyType,
	pub columns: Vec<ColumnDef>,
}

/// Link table storing the components attached to a model's rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLinks {
	pub table: String,
	/// Column pointing at the owning row
	pub owner_column: String,
}

impl ComponentLinks {
	pub const FIELD: &'static str = "field";
	pub const ORDER: &'static str = "order";
	pub const COMPONENT_TYPE: &'static str = "component_type";
	pub const COMPONENT_ID: &'static str = "component_id";

	/// `<collection>_components`, if the model has component or dynamic-zone fields
	pub fn for_model(model: &ModelSchema) -> Option<Self> {
		let has_components = model.attributes.values().any(|attribute| {
			matches!(
				attribute.kind,
				AttributeType::Component | AttributeType::DynamicZone
			)
		});
		has_components.then(|| Self {
			table: format!("{}_components", model.collection_name),
			owner_column: format!(
				"{}_{}",
				singularize(&model.collection_name),
				model.primary_key
			),
		})
	}
}

impl TableDef {
	fn with_id(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			primary_key: "id".to_string(),
			primary_key_type: PrimaryKeyType::Integer,
			columns: Vec::new(),
		}
	}

	pub fn column(&self, name: &str) -> Option<&ColumnDef> {
		self.columns.iter().find(|column| column.name == name)
	}

	/// Every column name, primary key first
	pub fn column_names(&self) -> Vec<&str> {
		std::iter::once(self.primary_key.as_str())
			.chain(self.columns.iter().map(|column| column.name.as_str()))
			.collect()
	}

	/// Columns covered by search indexes
	pub fn searchable(&self) -> impl Iterator<Item = &ColumnDef> {
		self.columns.iter().filter(|column| column.kind.is_searchable())
	}

	/// Table of a content type or component
	///
	/// Holds one column per stored attribute, one per owning relation side
	/// and the timestamp columns.
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::{AttributeDefinition, AttributeType, ModelSchema, Nature, SchemaRegistry};
	/// use lattice_db::associations::AssociationTable;
	/// use lattice_db::migrations::ddl::TableDef;
	///
	/// let registry = SchemaRegistry::builder()
	///     .model(ModelSchema::new("api::author.author", "authors"))
	///     .model(
	///         ModelSchema::new("api::article.article", "articles")
	///             .with_timestamps()
	///             .attribute("title", AttributeDefinition::new(AttributeType::String).required())
	///             .attribute("author", AttributeDefinition::relation(Nature::OneWay, "api::author.author")),
	///     )
	///     .build()
	///     .unwrap();
	/// let associations = AssociationTable::build(&registry).unwrap();
	/// let model = registry.get_model("api::article.article").unwrap();
	///
	/// let table = TableDef::for_model(&registry, &associations, model).unwrap();
	/// assert_eq!(table.column_names(), vec!["id", "title", "author", "created_at", "updated_at"]);
	/// assert!(table.column("title").unwrap().not_null);
	/// ```
	pub fn for_model(
		registry: &SchemaRegistry,
		associations: &AssociationTable,
		model: &ModelSchema,
	) -> Result<Self> {
		let mut table = Self {
			name: model.collection_name.clone(),
			primary_key: model.primary_key.clone(),
			primary_key_type: model.primary_key_type,
			columns: Vec::new(),
		};

		for (name, attribute) in &model.attributes {
			let attribute = registry.resolve_attribute(&model.uid, name, attribute)?;
			if let Some(kind) = ColumnKind::for_attribute(attribute.kind) {
				table.columns.push(ColumnDef {
					name: name.clone(),
					kind,
					not_null: attribute.required,
					unique: attribute.unique,
					default: match &attribute.default {
						Some(DefaultValue::Literal(value)) if !value.is_null() => Some(value.clone()),
						_ => None,
					},
				});
				continue;
			}
			let Some(association) = associations.get(&model.uid, name) else {
				continue;
			};
			if let Some(column) = association.owning_column() {
				table.columns.push(ColumnDef::new(
					column,
					ColumnKind::Reference(target_pk_type(registry, association)),
				));
			}
		}

		if let Some((created, updated)) = model.options.timestamps.columns() {
			table.columns.push(ColumnDef::new(created, ColumnKind::DateTime));
			table.columns.push(ColumnDef::new(updated, ColumnKind::DateTime));
		}
		Ok(table)
	}

	/// Pivot table of a many-to-many or many-way association
	pub fn pivot(registry: &SchemaRegistry, association: &Association, pivot: &PivotTable) -> Self {
		let mut table = Self::with_id(&pivot.name);
		let origin_type = registry
			.get_model(&association.model)
			.map(|model| model.primary_key_type)
			.unwrap_or_default();
		table.columns.push(ColumnDef::new(
			&pivot.origin_column,
			ColumnKind::Reference(origin_type),
		));
		table.columns.push(ColumnDef::new(
			&pivot.target_column,
			ColumnKind::Reference(target_pk_type(registry, association)),
		));
		for extra in &pivot.with_pivot {
			table.columns.push(ColumnDef::new(extra, ColumnKind::String));
		}
		table
	}

	/// Morph table shared by the polymorphic attributes of one owner
	///
	/// Each attribute gets its own `<alias>_id` and `<alias>_type` pair;
	/// `<alias>_id` takes the key type of the models linked through it.
	pub fn morph(registry: &SchemaRegistry, associations: &AssociationTable, morph: &MorphTable) -> Self {
		let owner_type = registry
			.get_model(&morph.owner)
			.map(|model| model.primary_key_type)
			.unwrap_or_default();
		let mut table = Self::with_id(&morph.name);
		let Some(first) = morph.aliases.first() else {
			return table;
		};
		table
			.columns
			.push(ColumnDef::new(&first.owner_id, ColumnKind::Reference(owner_type)));
		for columns in &morph.aliases {
			let related_type = associations
				.related_key_type(registry, columns)
				.unwrap_or_default();
			table.columns.push(ColumnDef::new(
				&columns.related_id,
				ColumnKind::Reference(related_type),
			));
			table
				.columns
				.push(ColumnDef::new(&columns.related_type, ColumnKind::String));
		}
		table.columns.push(ColumnDef::new(&first.field, ColumnKind::String));
		table.columns.push(ColumnDef::new(&first.order, ColumnKind::Integer));
		table
	}

	/// Component link table of `model`
	pub fn component_links(model: &ModelSchema, links: &ComponentLinks) -> Self {
		let mut table = Self::with_id(&links.table);
		table.columns = vec![
			ColumnDef::new(ComponentLinks::FIELD, ColumnKind::String),
			ColumnDef::new(ComponentLinks::ORDER, ColumnKind::Integer),
			ColumnDef::new(ComponentLinks::COMPONENT_TYPE, ColumnKind::String),
			ColumnDef::new(
				ComponentLinks::COMPONENT_ID,
				ColumnKind::Reference(PrimaryKeyType::Integer),
			),
			ColumnDef::new(
				&links.owner_column,
				ColumnKind::Reference(model.primary_key_type),
			),
		];
		table
	}

	/// `CREATE TABLE` followed by one `CREATE UNIQUE INDEX` per unique column
	pub fn create_sql(&self, db: DatabaseType) -> Vec<String> {
		let mut definitions = vec![format!(
			"{} {}",
			db.quote(&self.primary_key),
			primary_key_sql(db, self.primary_key_type)
		)];
		definitions.extend(self.columns.iter().map(|column| column_sql(db, column, true)));

		let mut statements = vec![format!(
			"CREATE TABLE {} ({})",
			db.quote(&self.name),
			definitions.join(", ")
		)];
		statements.extend(
			self.columns
				.iter()
				.filter(|column| column.unique)
				.map(|column| create_unique_index_sql(db, &self.name, &column.name)),
		);
		statements
	}

	/// `ALTER TABLE ... ADD COLUMN` for a column missing from an existing table
	///
	/// SQLite cannot add a NOT NULL column without a default, and its
	/// `ADD COLUMN` rejects inline UNIQUE, so the constraint is left out there
	/// and uniqueness is added through an index.
	pub fn add_column_sql(&self, db: DatabaseType, column: &ColumnDef) -> Vec<String> {
		let enforce_not_null = db != DatabaseType::Sqlite;
		let mut statements = vec![format!(
			"ALTER TABLE {} ADD COLUMN {}",
			db.quote(&self.name),
			column_sql(db, column, enforce_not_null)
		)];
		if column.unique {
			statements.push(create_unique_index_sql(db, &self.name, &column.name));
		}
		statements
	}

	/// Statements turning `previous` into `column` on Postgres or MySQL
	pub fn alter_column_sql(
		&self,
		db: DatabaseType,
		previous: &ColumnDef,
		column: &ColumnDef,
	) -> Vec<String> {
		let table = db.quote(&self.name);
		let name = db.quote(&column.name);
		let mut statements = Vec::new();
		match db {
			DatabaseType::Postgres => {
				let sql_type = column.kind.sql_type(db);
				if previous.kind != column.kind {
					statements.push(format!(
						"ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
						table, name, sql_type, name, sql_type
					));
				}
				if previous.not_null != column.not_null {
					let action = if column.not_null { "SET" } else { "DROP" };
					statements.push(format!(
						"ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
						table, name, action
					));
				}
				if previous.default != column.default {
					match column.default.as_ref().and_then(|value| default_sql(db, value)) {
						Some(default) => statements.push(format!(
							"ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
							table, name, default
						)),
						None => statements.push(format!(
							"ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
							table, name
						)),
					}
				}
			}
			DatabaseType::Mysql => {
				if previous.kind != column.kind
					|| previous.not_null != column.not_null
					|| previous.default != column.default
				{
					statements.push(format!(
						"ALTER TABLE {} MODIFY {}",
						table,
						column_sql(db, column, true)
					));
				}
			}
			DatabaseType::Sqlite => {}
		}
		if previous.unique != column.unique {
			if column.unique {
				statements.push(create_unique_index_sql(db, &self.name, &column.name));
			} else {
				statements.push(drop_unique_index_sql(db, &self.name, &column.name));
			}
		}
		statements
	}
}

fn target_pk_type(registry: &SchemaRegistry, association: &Association) -> PrimaryKeyType {
	association
		.target
		.as_deref()
		.and_then(|uid| registry.get_model(uid).ok())
		.map(|model| model.primary_key_type)
		.unwrap_or_default()
}

/// `<table>_<column>_unique`
pub fn unique_index_name(table: &str, column: &str) -> String {
	format!("{}_{}_unique", table, column)
}

pub(crate) fn create_unique_index_sql(db: DatabaseType, table: &str, column: &str) -> String {
	format!(
		"CREATE UNIQUE INDEX {} ON {} ({})",
		db.quote(&unique_index_name(table, column)),
		db.quote(table),
		db.quote(column)
	)
}

pub(crate) fn drop_unique_index_sql(db: DatabaseType, table: &str, column: &str) -> String {
	let index = db.quote(&unique_index_name(table, column));
	match db {
		DatabaseType::Mysql => format!("DROP INDEX {} ON {}", index, db.quote(table)),
		_ => format!("DROP INDEX IF EXISTS {}", index),
	}
}

fn column_sql(db: DatabaseType, column: &ColumnDef, enforce_not_null: bool) -> String {
	let mut sql = format!("{} {}", db.quote(&column.name), column.kind.sql_type(db));
	if column.not_null && enforce_not_null {
		sql.push_str(" NOT NULL");
	}
	if let Some(default) = column.default.as_ref().and_then(|value| default_sql(db, value)) {
		sql.push_str(" DEFAULT ");
		sql.push_str(&default);
	}
	sql
}

/// SQL literal for a default value
fn default_sql(db: DatabaseType, value: &JsonValue) -> Option<String> {
	let quote = |text: &str| format!("'{}'", text.replace('\'', "''"));
	match value {
		JsonValue::Null => None,
		JsonValue::Bool(flag) => Some(match (db, flag) {
			(DatabaseType::Postgres, true) => "TRUE".to_string(),
			(DatabaseType::Postgres, false) => "FALSE".to_string(),
			(_, true) => "1".to_string(),
			(_, false) => "0".to_string(),
		}),
		JsonValue::Number(number) => Some(number.to_string()),
		JsonValue::String(text) => Some(quote(text)),
		JsonValue::Array(_) | JsonValue::Object(_) => Some(quote(&value.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lattice_core::schema::{AttributeDefinition, MorphKind, Nature};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn registry() -> SchemaRegistry {
		SchemaRegistry::builder()
			.model(ModelSchema::new("api::tag.tag", "tags").with_primary_key_type(PrimaryKeyType::Uuid))
			.model(ModelSchema::component("shared.quote", "components_shared_quotes"))
			.model(
				ModelSchema::new("api::article.article", "articles")
					.attribute(
						"slug",
						AttributeDefinition::new(AttributeType::Uid).required().unique(),
					)
					.attribute(
						"published",
						AttributeDefinition::new(AttributeType::Boolean).with_default(json!(false)),
					)
					.attribute(
						"tags",
						AttributeDefinition::relation(Nature::ManyWay, "api::tag.tag"),
					)
					.attribute("quote", AttributeDefinition::component("shared.quote", true)),
			)
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_create_sql_per_dialect(registry: SchemaRegistry) {
		let associations = AssociationTable::build(&registry).unwrap();
		let model = registry.get_model("api::article.article").unwrap();
		let table = TableDef::for_model(&registry, &associations, model).unwrap();

		let sqlite = table.create_sql(DatabaseType::Sqlite);
		assert_eq!(
			sqlite[0],
			r#"CREATE TABLE "articles" ("id" integer PRIMARY KEY AUTOINCREMENT, "slug" varchar(255) NOT NULL, "published" boolean DEFAULT 0)"#
		);
		assert_eq!(
			sqlite[1],
			r#"CREATE UNIQUE INDEX "articles_slug_unique" ON "articles" ("slug")"#
		);

		let postgres = table.create_sql(DatabaseType::Postgres);
		assert!(postgres[0].contains(r#""id" serial PRIMARY KEY"#));
		assert!(postgres[0].contains(r#""published" boolean DEFAULT FALSE"#));

		let mysql = table.create_sql(DatabaseType::Mysql);
		assert!(mysql[0].starts_with("CREATE TABLE `articles` (`id` int unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY"));
	}

	#[rstest]
	fn test_pivot_columns_follow_primary_key_types(registry: SchemaRegistry) {
		let associations = AssociationTable::build(&registry).unwrap();
		let association = associations.get("api::article.article", "tags").unwrap();
		let table = TableDef::pivot(&registry, association, association.pivot().unwrap());
		assert_eq!(table.name, "articles_tags");
		assert_eq!(
			table.column("tag_id").unwrap().kind,
			ColumnKind::Reference(PrimaryKeyType::Uuid)
		);
		assert_eq!(
			table.column("tag_id").unwrap().kind.sql_type(DatabaseType::Postgres),
			"uuid"
		);
	}

	fn morph_registry(article_key: PrimaryKeyType, page_key: PrimaryKeyType) -> SchemaRegistry {
		let file = ModelSchema::new("plugin::upload.file", "upload_file")
			.attribute(
				"related",
				AttributeDefinition::relation(Nature::Morph(MorphKind::ManyMorphToMany), "*"),
			)
			.attribute(
				"holder",
				AttributeDefinition::relation(Nature::Morph(MorphKind::ManyMorphToOne), "*"),
			);
		let article = ModelSchema::new("api::article.article", "articles")
			.with_primary_key_type(article_key)
			.attribute("cover", AttributeDefinition::new(AttributeType::Media))
			.attribute(
				"banner",
				AttributeDefinition::relation(
					Nature::Morph(MorphKind::OneToOneMorph),
					"plugin::upload.file",
				)
				.with_via("holder"),
			);
		let page = ModelSchema::new("api::page.page", "pages")
			.with_primary_key_type(page_key)
			.attribute("cover", AttributeDefinition::new(AttributeType::Media));
		SchemaRegistry::builder()
			.models([file, article, page])
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_morph_table_holds_every_alias_once() {
		let registry = morph_registry(PrimaryKeyType::Integer, PrimaryKeyType::Integer);
		let associations = AssociationTable::build(&registry).unwrap();
		let morphs = associations.morph_tables();
		assert_eq!(morphs.len(), 1);
		assert_eq!(morphs[0].name, "upload_file_morph");
		assert_eq!(morphs[0].aliases.len(), 2);

		let table = TableDef::morph(&registry, &associations, &morphs[0]);
		assert_eq!(
			table.column_names(),
			vec![
				"id",
				"upload_file_id",
				"related_id",
				"related_type",
				"holder_id",
				"holder_type",
				"field",
				"order"
			]
		);
	}

	#[rstest]
	fn test_morph_related_id_follows_linked_key_type() {
		let registry = morph_registry(PrimaryKeyType::Uuid, PrimaryKeyType::Uuid);
		let associations = AssociationTable::build(&registry).unwrap();
		let table = TableDef::morph(&registry, &associations, &associations.morph_tables()[0]);
		assert_eq!(
			table.column("related_id").unwrap().kind.sql_type(DatabaseType::Postgres),
			"uuid"
		);
		assert_eq!(
			table.column("holder_id").unwrap().kind,
			ColumnKind::Reference(PrimaryKeyType::Uuid)
		);
		assert_eq!(
			table.column("upload_file_id").unwrap().kind,
			ColumnKind::Reference(PrimaryKeyType::Integer)
		);
	}

	#[rstest]
	fn test_mixed_key_types_behind_one_alias_are_rejected() {
		let registry = morph_registry(PrimaryKeyType::Uuid, PrimaryKeyType::Integer);
		let err = AssociationTable::build(&registry).unwrap_err();
		assert!(err.to_string().contains("different primary key types"), "{}", err);
	}

	#[rstest]
	fn test_component_links(registry: SchemaRegistry) {
		let model = registry.get_model("api::article.article").unwrap();
		let links = ComponentLinks::for_model(model).unwrap();
		assert_eq!(links.table, "articles_components");
		assert_eq!(links.owner_column, "article_id");
		let table = TableDef::component_links(model, &links);
		assert_eq!(
			table.column_names(),
			vec!["id", "field", "order", "component_type", "component_id", "article_id"]
		);
		assert!(ComponentLinks::for_model(registry.get_model("api::tag.tag").unwrap()).is_none());
	}

	#[rstest]
	fn test_add_column_skips_not_null_on_sqlite() {
		let table = TableDef::with_id("articles");
		let mut column = ColumnDef::new("summary", ColumnKind::Text);
		column.not_null = true;
		column.unique = true;

		let sqlite = table.add_column_sql(DatabaseType::Sqlite, &column);
		assert_eq!(sqlite[0], r#"ALTER TABLE "articles" ADD COLUMN "summary" text"#);
		assert_eq!(
			sqlite[1],
			r#"CREATE UNIQUE INDEX "articles_summary_unique" ON "articles" ("summary")"#
		);

		let postgres = table.add_column_sql(DatabaseType::Postgres, &column);
		assert_eq!(postgres[0], r#"ALTER TABLE "articles" ADD COLUMN "summary" text NOT NULL"#);
	}

	#[rstest]
	fn test_alter_column_touches_only_changes() {
		let table = TableDef::with_id("articles");
		let previous = ColumnDef::new("rating", ColumnKind::Integer);
		let mut column = previous.clone();
		column.kind = ColumnKind::BigInteger;

		assert_eq!(
			table.alter_column_sql(DatabaseType::Postgres, &previous, &column),
			vec![r#"ALTER TABLE "articles" ALTER COLUMN "rating" TYPE bigint USING "rating"::bigint"#]
		);
		assert_eq!(
			table.alter_column_sql(DatabaseType::Mysql, &previous, &column),
			vec!["ALTER TABLE `articles` MODIFY `rating` bigint"]
		);
		assert!(table
			.alter_column_sql(DatabaseType::Postgres, &previous, &previous)
			.is_empty());
	}
}
