//! Records and relation reads
//!
//! A [`Record`] is one row as a JSON object. [`RecordReader`] loads a row
//! by primary key and fills every relation attribute with the IDs stored
//! wherever its association lives.

use sea_query::{Alias, Expr, ExprTrait, Order, Query, SelectStatement};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;

use lattice_core::schema::{AttributeType, ModelSchema, PrimaryKeyType, SchemaRegistry};

use crate::associations::{Association, AssociationTable, Strategy};
use crate::backends::values::{query_value_to_json, to_sea_value};
use crate::backends::{DatabaseConnection, QueryValue, Row};
use crate::migrations::{ColumnKind, ComponentLinks, TableDef};

use super::mutator::{MutationError, Result};

/// One row, keyed by column or attribute name
pub type Record = Map<String, JsonValue>;

/// Key naming the related model in polymorphic entries
pub const MORPH_TYPE_KEY: &str = "__type";

/// Key naming the component of a dynamic-zone entry
pub const COMPONENT_KEY: &str = "__component";

/// One row of a polymorphic relation, seen from the polymorphic side
#[derive(Debug, Clone, PartialEq)]
pub struct MorphRef {
	pub id: QueryValue,
	/// UID of the related model
	pub model: String,
	/// Table of the related model
	pub table: String,
	/// Attribute of the related model holding the relation
	pub field: String,
}

impl MorphRef {
	/// Parse `{"id": .., "__type": "<uid>", "field": ".."}`
	pub fn from_json(registry: &SchemaRegistry, field: &str, value: &JsonValue) -> Result<Self> {
		let invalid = |reason: &str| MutationError::InvalidValue {
			field: field.to_string(),
			reason: reason.to_string(),
		};
		let object = value
			.as_object()
			.ok_or_else(|| invalid("polymorphic entries must be objects"))?;
		let model = object
			.get(MORPH_TYPE_KEY)
			.and_then(JsonValue::as_str)
			.ok_or_else(|| invalid("missing related model"))?;
		let schema = registry.get_model(model)?;
		let id = object
			.get("id")
			.and_then(|id| id_value(id, schema.primary_key_type))
			.ok_or_else(|| invalid("missing related id"))?;
		Ok(Self {
			id,
			model: schema.uid.clone(),
			table: schema.collection_name.clone(),
			field: object
				.get("field")
				.and_then(JsonValue::as_str)
				.unwrap_or_default()
				.to_string(),
		})
	}

	pub fn to_json(&self) -> JsonValue {
		json!({
			"id": query_value_to_json(&self.id),
			MORPH_TYPE_KEY: self.model,
			"field": self.field,
		})
	}

	/// Identity used to diff polymorphic rows
	pub fn key(&self) -> String {
		format!(
			"{}:{}:{}",
			self.table,
			self.id.key().unwrap_or_default(),
			self.field
		)
	}
}

/// Bound value for a relation ID given as a number, string or `{"id": ..}`
pub fn id_value(value: &JsonValue, pk_type: PrimaryKeyType) -> Option<QueryValue> {
	match value {
		JsonValue::Number(number) => number.as_i64().map(QueryValue::Int),
		JsonValue::String(text) => match pk_type {
			PrimaryKeyType::Uuid => Some(
				uuid::Uuid::parse_str(text)
					.map(QueryValue::Uuid)
					.unwrap_or_else(|_| QueryValue::String(text.clone())),
			),
			PrimaryKeyType::Integer => Some(
				text.parse::<i64>()
					.map(QueryValue::Int)
					.unwrap_or_else(|_| QueryValue::String(text.clone())),
			),
		},
		JsonValue::Object(object) => object.get("id").and_then(|id| id_value(id, pk_type)),
		_ => None,
	}
}

/// Loads records and their relation IDs
#[derive(Debug, Clone)]
pub struct RecordReader {
	conn: DatabaseConnection,
	registry: Arc<SchemaRegistry>,
	associations: Arc<AssociationTable>,
}

impl RecordReader {
	pub fn new(
		conn: DatabaseConnection,
		registry: Arc<SchemaRegistry>,
		associations: Arc<AssociationTable>,
	) -> Self {
		Self {
			conn,
			registry,
			associations,
		}
	}

	/// Row `id` of `uid` with relations populated
	pub async fn find(&self, uid: &str, id: &QueryValue) -> Result<Option<Record>> {
		let model = self.registry.get_model(uid)?;
		let table = TableDef::for_model(&self.registry, &self.associations, model)?;
		let statement = self.conn.prepare(&select_where(
			&table.name,
			&table.column_names()[..],
			&[(table.primary_key.as_str(), id)],
			None,
		))?;
		let Some(row) = self.conn.query_optional(statement).await? else {
			return Ok(None);
		};

		let mut record = to_record(&table, &row);
		self.populate(model, id, &mut record).await?;
		Ok(Some(record))
	}

	async fn populate(&self, model: &ModelSchema, id: &QueryValue, record: &mut Record) -> Result<()> {
		for association in self.associations.for_model(&model.uid) {
			let value = match &association.strategy {
				Strategy::Column { .. } => continue,
				Strategy::Morph(_) if association.is_polymorphic() => {
					let refs: Vec<JsonValue> = self
						.morph_refs(association, id)
						.await?
						.iter()
						.map(MorphRef::to_json)
						.collect();
					shape(association, refs)
				}
				_ => {
					let ids: Vec<JsonValue> = self
						.related_ids(association, id)
						.await?
						.iter()
						.map(query_value_to_json)
						.collect();
					shape(association, ids)
				}
			};
			record.insert(association.alias.clone(), value);
		}

		if let Some(links) = ComponentLinks::for_model(model) {
			self.populate_components(model, &links, id, record).await?;
		}
		Ok(())
	}

	/// IDs of the rows `id` is related to through `association`, in stored order
	///
	/// Not meaningful for the polymorphic side; see [`Self::morph_refs`].
	pub async fn related_ids(&self, association: &Association, id: &QueryValue) -> Result<Vec<QueryValue>> {
		let Some(statement) = related_select(association, id)
			.map(|select| self.conn.prepare(&select))
			.transpose()?
		else {
			return Ok(Vec::new());
		};
		let rows = self.conn.query_all(statement).await?;
		let column = match &association.strategy {
			Strategy::Column { column } => column.as_str(),
			Strategy::ForeignKey { .. } => association.target_primary_key.as_str(),
			Strategy::Pivot(pivot) => pivot.target_column.as_str(),
			Strategy::Morph(columns) => columns.owner_id.as_str(),
		};
		Ok(rows
			.iter()
			.filter_map(|row| row.value(column).cloned())
			.filter(|value| !value.is_null())
			.collect())
	}

	/// Rows owned by `id` through a polymorphic association
	pub async fn morph_refs(&self, association: &Association, id: &QueryValue) -> Result<Vec<MorphRef>> {
		let Some(columns) = association.morph() else {
			return Ok(Vec::new());
		};
		let statement = self.conn.prepare(&select_where(
			&columns.table,
			&[&columns.related_id, &columns.related_type, &columns.field],
			&[(columns.owner_id.as_str(), id)],
			Some(columns.order.as_str()),
		))?;
		let rows = self.conn.query_all(statement).await?;

		let mut refs = Vec::with_capacity(rows.len());
		for row in rows {
			// rows of sibling aliases sharing the table
			let Some(QueryValue::String(table)) = row.value(&columns.related_type).cloned() else {
				continue;
			};
			// rows of models no longer registered are skipped
			let Some(model) = self.registry.find_by_collection(&table) else {
				continue;
			};
			refs.push(MorphRef {
				id: row.value(&columns.related_id).cloned().unwrap_or(QueryValue::Null),
				model: model.uid.clone(),
				table,
				field: row.get(&columns.field)?,
			});
		}
		Ok(refs)
	}

	async fn populate_components(
		&self,
		model: &ModelSchema,
		links: &ComponentLinks,
		id: &QueryValue,
		record: &mut Record,
	) -> Result<()> {
		let statement = self.conn.prepare(&select_where(
			&links.table,
			&[
				ComponentLinks::FIELD,
				ComponentLinks::COMPONENT_TYPE,
				ComponentLinks::COMPONENT_ID,
			],
			&[(links.owner_column.as_str(), id)],
			Some(ComponentLinks::ORDER),
		))?;
		let rows = self.conn.query_all(statement).await?;

		for (name, attribute) in &model.attributes {
			let entries = rows.iter().filter(|row| {
				matches!(row.value(ComponentLinks::FIELD), Some(QueryValue::String(field)) if field == name)
			});
			let value = match attribute.kind {
				AttributeType::Component if attribute.repeatable => JsonValue::Array(
					entries
						.map(|row| component_id(row))
						.collect(),
				),
				AttributeType::Component => entries
					.map(component_id)
					.next()
					.unwrap_or(JsonValue::Null),
				AttributeType::DynamicZone => JsonValue::Array(
					entries
						.map(|row| {
							json!({
								COMPONENT_KEY: row
									.value(ComponentLinks::COMPONENT_TYPE)
									.map(query_value_to_json)
									.unwrap_or(JsonValue::Null),
								"id": component_id(row),
							})
						})
						.collect(),
				),
				_ => continue,
			};
			record.insert(name.clone(), value);
		}
		Ok(())
	}
}

fn related_select(association: &Association, id: &QueryValue) -> Option<SelectStatement> {
	let select = match &association.strategy {
		Strategy::Column { column } => select_where(
			&association.table,
			&[column],
			&[(association.primary_key.as_str(), id)],
			None,
		),
		Strategy::ForeignKey { column } => {
			let target_table = association.target_table.as_deref()?;
			let pk = association.target_primary_key.as_str();
			select_where(target_table, &[pk], &[(column.as_str(), id)], Some(pk))
		}
		Strategy::Pivot(pivot) => select_where(
			&pivot.name,
			&[&pivot.target_column],
			&[(pivot.origin_column.as_str(), id)],
			Some("id"),
		),
		Strategy::Morph(columns) => {
			let related_type = QueryValue::String(association.table.clone());
			let field = QueryValue::String(association.alias.clone());
			select_where(
				&columns.table,
				&[&columns.owner_id],
				&[
					(columns.related_id.as_str(), id),
					(columns.related_type.as_str(), &related_type),
					(columns.field.as_str(), &field),
				],
				Some(columns.order.as_str()),
			)
		}
	};
	Some(select)
}

fn component_id(row: &Row) -> JsonValue {
	row.value(ComponentLinks::COMPONENT_ID)
		.map(query_value_to_json)
		.unwrap_or(JsonValue::Null)
}

fn shape(association: &Association, values: Vec<JsonValue>) -> JsonValue {
	if association.is_collection() {
		JsonValue::Array(values)
	} else {
		values.into_iter().next().unwrap_or(JsonValue::Null)
	}
}

/// `SELECT columns FROM table WHERE c1 = v1 AND .. [ORDER BY order]`
pub(crate) fn select_where<C: AsRef<str>>(
	table: &str,
	columns: &[C],
	conditions: &[(&str, &QueryValue)],
	order: Option<&str>,
) -> SelectStatement {
	let mut select = Query::select();
	select
		.columns(columns.iter().map(|column| Alias::new(column.as_ref())))
		.from(Alias::new(table));
	for (column, value) in conditions {
		select.and_where(Expr::col(Alias::new(*column)).eq(to_sea_value(value)));
	}
	if let Some(order) = order {
		select.order_by(Alias::new(order), Order::Asc);
	}
	select.to_owned()
}

/// JSON record of a row, columns in table order
fn to_record(table: &TableDef, row: &Row) -> Record {
	let mut record = Record::new();
	let pk = row.value(&table.primary_key).map(query_value_to_json);
	record.insert(table.primary_key.clone(), pk.unwrap_or(JsonValue::Null));
	for column in &table.columns {
		let value = match (row.value(&column.name), &column.kind) {
			(None, _) | (Some(QueryValue::Null), _) => JsonValue::Null,
			(Some(QueryValue::Int(flag)), ColumnKind::Boolean) => JsonValue::Bool(*flag != 0),
			(Some(QueryValue::String(text)), ColumnKind::Json) => {
				serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.clone()))
			}
			(Some(value), _) => query_value_to_json(value),
		};
		record.insert(column.name.clone(), value);
	}
	record
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::DatabaseType;
	use crate::backends::values::render;
	use rstest::rstest;

	#[rstest]
	#[case(json!(3), PrimaryKeyType::Integer, Some(QueryValue::Int(3)))]
	#[case(json!("3"), PrimaryKeyType::Integer, Some(QueryValue::Int(3)))]
	#[case(json!({"id": 4}), PrimaryKeyType::Integer, Some(QueryValue::Int(4)))]
	#[case(json!(null), PrimaryKeyType::Integer, None)]
	#[case(
		json!("67e55044-10b1-426f-9247-bb680e5fe0c8"),
		PrimaryKeyType::Uuid,
		Some(QueryValue::Uuid(uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()))
	)]
	fn test_id_value(
		#[case] value: JsonValue,
		#[case] pk_type: PrimaryKeyType,
		#[case] expected: Option<QueryValue>,
	) {
		assert_eq!(id_value(&value, pk_type), expected);
	}

	#[rstest]
	fn test_select_where_orders_by_column() {
		let id = QueryValue::Int(1);
		let select = select_where("articles_tags", &["tag_id"], &[("article_id", &id)], Some("id"));
		let (sql, params) = render(DatabaseType::Sqlite, &select).unwrap();
		assert_eq!(
			sql,
			r#"SELECT "tag_id" FROM "articles_tags" WHERE "article_id" = ? ORDER BY "id" ASC"#
		);
		assert_eq!(params, vec![QueryValue::Int(1)]);
	}

	#[rstest]
	fn test_to_record_coerces_by_column_kind() {
		let table = TableDef {
			name: "articles".into(),
			primary_key: "id".into(),
			primary_key_type: PrimaryKeyType::Integer,
			columns: vec![
				crate::migrations::ColumnDef::new("published", ColumnKind::Boolean),
				crate::migrations::ColumnDef::new("meta", ColumnKind::Json),
				crate::migrations::ColumnDef::new("title", ColumnKind::String),
			],
		};
		let mut row = Row::new();
		row.insert("id".into(), QueryValue::Int(1));
		row.insert("published".into(), QueryValue::Int(1));
		row.insert("meta".into(), QueryValue::String(r#"{"a":1}"#.into()));

		let record = to_record(&table, &row);
		assert_eq!(
			JsonValue::Object(record),
			json!({"id": 1, "published": true, "meta": {"a": 1}, "title": null})
		);
	}

	#[rstest]
	fn test_morph_ref_key_ignores_id_type() {
		let numeric = MorphRef {
			id: QueryValue::Int(2),
			model: "api::article.article".into(),
			table: "articles".into(),
			field: "cover".into(),
		};
		let textual = MorphRef {
			id: QueryValue::String("2".into()),
			..numeric.clone()
		};
		assert_eq!(numeric.key(), textual.key());
		assert_eq!(
			numeric.to_json(),
			json!({"id": 2, "__type": "api::article.article", "field": "cover"})
		);
	}
}
