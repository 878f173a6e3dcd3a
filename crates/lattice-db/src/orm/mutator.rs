//! Relation synchronisation on writes
//!
//! [`RelationMutator`] writes records and keeps every row that stores their
//! relations in line with the submitted values. Writes for different
//! relation attributes run concurrently and are awaited together before the
//! record's own row is saved. Within one pivot-backed attribute, removed
//! links are deleted before new links are inserted so that re-adding an ID
//! in the same request never collides with its old row.
//!
//! ## Example
//!
//! ```no_run
//! use lattice_db::orm::mutator::RelationMutator;
//! use serde_json::json;
//!
//! # async fn example(mutator: RelationMutator) -> Result<(), Box<dyn std::error::Error>> {
//! let mut desired = serde_json::Map::new();
//! desired.insert("authors".into(), json!([2, 3]));
//! let record = mutator
//!     .apply_relation_update("api::article.article", 1, desired)
//!     .await?;
//! assert_eq!(record["authors"], json!([2, 3]));
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use futures::future::join_all;
use sea_query::{
	Alias, Condition, DeleteStatement, Expr, ExprTrait, InsertStatement, Query, UpdateStatement,
};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use lattice_core::SchemaError;
use lattice_core::schema::{
	AttributeType, ModelSchema, MorphKind, Nature, PrimaryKeyType, SchemaRegistry,
};

use crate::associations::{Association, AssociationTable, Strategy};
use crate::backends::values::{json_to_query_value, to_sea_value, value_expr};
use crate::backends::{DatabaseConnection, DatabaseError, DatabaseType, QueryValue, Statement};
use crate::migrations::ComponentLinks;

use super::lifecycle::{HookAbort, HookPoint, LifecycleRegistry};
use super::record::{COMPONENT_KEY, MorphRef, Record, RecordReader, id_value};

/// One relation attribute that could not be synchronised
#[derive(Debug, Error)]
#[error("{field}: {error}")]
pub struct RelationFailure {
	pub field: String,
	pub error: MutationError,
}

#[derive(Debug, Error)]
pub enum MutationError {
	/// Relation writes failed; the record's own row was not saved
	#[error("Relation update failed on {model}: {}", failed_fields(.failures))]
	Relations {
		model: String,
		failures: Vec<RelationFailure>,
	},

	#[error("{model} {id} not found")]
	NotFound { model: String, id: String },

	#[error("{hook} hook aborted the operation on {model}: {reason}")]
	Aborted {
		model: String,
		hook: HookPoint,
		reason: anyhow::Error,
	},

	#[error("Invalid value for {field}: {reason}")]
	InvalidValue { field: String, reason: String },

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	Database(#[from] DatabaseError),
}

fn failed_fields(failures: &[RelationFailure]) -> String {
	failures
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}

pub type Result<T> = std::result::Result<T, MutationError>;

fn aborted(model: &str, abort: HookAbort) -> MutationError {
	MutationError::Aborted {
		model: model.to_string(),
		hook: abort.hook,
		reason: abort.reason,
	}
}

fn not_found(model: &str, id: &QueryValue) -> MutationError {
	MutationError::NotFound {
		model: model.to_string(),
		id: id.key().unwrap_or_default(),
	}
}

/// Write planned for one relation or component attribute
#[derive(Debug)]
enum RelationChange {
	/// Point the new target back at the record and release its old holders
	OneToOne {
		association: Arc<Association>,
		target: Option<QueryValue>,
	},
	/// Children holding a foreign key to the record
	Children {
		association: Arc<Association>,
		ids: Vec<QueryValue>,
	},
	Pivot {
		association: Arc<Association>,
		ids: Vec<QueryValue>,
	},
	/// Morph rows seen from the related side, e.g. media
	Morph {
		association: Arc<Association>,
		ids: Vec<QueryValue>,
	},
	Polymorphic {
		association: Arc<Association>,
		targets: Vec<MorphRef>,
	},
	Components {
		field: String,
		links: ComponentLinks,
		entries: Vec<(String, QueryValue)>,
	},
}

impl RelationChange {
	fn field(&self) -> &str {
		match self {
			Self::OneToOne { association, .. }
			| Self::Children { association, .. }
			| Self::Pivot { association, .. }
			| Self::Morph { association, .. }
			| Self::Polymorphic { association, .. } => &association.alias,
			Self::Components { field, .. } => field,
		}
	}
}

/// Submitted values split into row columns and relation writes
#[derive(Debug, Default)]
struct Plan {
	columns: Vec<(String, QueryValue)>,
	changes: Vec<RelationChange>,
}

/// Writes records and synchronises their relation rows
#[derive(Debug, Clone)]
pub struct RelationMutator {
	conn: DatabaseConnection,
	registry: Arc<SchemaRegistry>,
	associations: Arc<AssociationTable>,
	lifecycles: Arc<LifecycleRegistry>,
	reader: RecordReader,
}

impl RelationMutator {
	pub fn new(
		conn: DatabaseConnection,
		registry: Arc<SchemaRegistry>,
		associations: Arc<AssociationTable>,
	) -> Self {
		Self::with_lifecycles(conn, registry, associations, Arc::new(LifecycleRegistry::new()))
	}

	pub fn with_lifecycles(
		conn: DatabaseConnection,
		registry: Arc<SchemaRegistry>,
		associations: Arc<AssociationTable>,
		lifecycles: Arc<LifecycleRegistry>,
	) -> Self {
		let reader = RecordReader::new(conn.clone(), registry.clone(), associations.clone());
		Self {
			conn,
			registry,
			associations,
			lifecycles,
			reader,
		}
	}

	pub fn lifecycles(&self) -> &Arc<LifecycleRegistry> {
		&self.lifecycles
	}

	pub fn reader(&self) -> &RecordReader {
		&self.reader
	}

	/// Record `id` of `uid` with relation IDs, after `after_fetch` hooks
	pub async fn find_one(&self, uid: &str, id: impl Into<QueryValue>) -> Result<Option<Record>> {
		let id = id.into();
		let Some(mut record) = self.reader.find(uid, &id).await? else {
			return Ok(None);
		};
		self.lifecycles
			.after_fetch(uid, &mut record)
			.await
			.map_err(|abort| aborted(uid, abort))?;
		Ok(Some(record))
	}

	/// Insert a record, then write its relations
	pub async fn create(&self, uid: &str, mut values: Record) -> Result<Record> {
		let model = self.registry.get_model(uid)?;
		self.lifecycles
			.before_create(uid, &mut values)
			.await
			.map_err(|abort| aborted(uid, abort))?;

		let plan = self.plan(model, &values)?;
		let id = self.insert_row(model, plan.columns).await?;
		self.sync_relations(uid, &id, &Record::new(), &plan.changes)
			.await?;

		let record = self
			.reader
			.find(uid, &id)
			.await?
			.ok_or_else(|| not_found(uid, &id))?;
		self.lifecycles
			.after_create(uid, &record)
			.await
			.map_err(|abort| aborted(uid, abort))?;
		debug!(model = uid, id = ?id.key(), "record created");
		Ok(record)
	}

	/// Update record `id` so its relations match `desired`
	///
	/// Relation attributes are synchronised first, all of them concurrently.
	/// If any of them fails, the failures are returned together and the
	/// record's own columns are left untouched. Plain columns are written
	/// afterwards and the record is read back with its relations.
	pub async fn apply_relation_update(
		&self,
		uid: &str,
		id: impl Into<QueryValue>,
		mut desired: Record,
	) -> Result<Record> {
		let id = id.into();
		let model = self.registry.get_model(uid)?;
		let current = self
			.reader
			.find(uid, &id)
			.await?
			.ok_or_else(|| not_found(uid, &id))?;
		self.lifecycles
			.before_update(uid, &id.key().unwrap_or_default(), &mut desired)
			.await
			.map_err(|abort| aborted(uid, abort))?;

		let mut plan = self.plan(model, &desired)?;
		self.sync_relations(uid, &id, &current, &plan.changes)
			.await?;

		if let Some((_, updated)) = model.options.timestamps.columns() {
			plan.columns
				.push((updated.to_string(), QueryValue::Timestamp(Utc::now())));
		}
		if !plan.columns.is_empty() {
			let statement = self.conn.prepare(&update_where(
				&model.collection_name,
				&plan.columns,
				Condition::all().add(eq(&model.primary_key, &id)),
			))?;
			self.conn.run(statement).await?;
		}

		let record = self
			.reader
			.find(uid, &id)
			.await?
			.ok_or_else(|| not_found(uid, &id))?;
		self.lifecycles
			.after_update(uid, &record)
			.await
			.map_err(|abort| aborted(uid, abort))?;
		Ok(record)
	}

	/// Detach every relation of record `id`, then delete its row
	///
	/// Returns the record as it was before deletion.
	pub async fn delete(&self, uid: &str, id: impl Into<QueryValue>) -> Result<Record> {
		let id = id.into();
		let key = id.key().unwrap_or_default();
		let model = self.registry.get_model(uid)?;
		let record = self
			.reader
			.find(uid, &id)
			.await?
			.ok_or_else(|| not_found(uid, &id))?;
		self.lifecycles
			.before_delete(uid, &key)
			.await
			.map_err(|abort| aborted(uid, abort))?;

		let cleanup = self.cleanup_statements(model, &id)?;
		let results = join_all(
			cleanup
				.into_iter()
				.map(|(field, statement)| async move { (field, self.conn.run(statement).await) }),
		)
		.await;
		let failures: Vec<RelationFailure> = results
			.into_iter()
			.filter_map(|(field, result)| {
				result.err().map(|error| RelationFailure {
					field,
					error: error.into(),
				})
			})
			.collect();
		if !failures.is_empty() {
			return Err(MutationError::Relations {
				model: uid.to_string(),
				failures,
			});
		}

		let statement = self.conn.prepare(
			&Query::delete()
				.from_table(Alias::new(&model.collection_name))
				.cond_where(Condition::all().add(eq(&model.primary_key, &id)))
				.to_owned(),
		)?;
		self.conn.run(statement).await?;

		self.lifecycles
			.after_delete(uid, &key)
			.await
			.map_err(|abort| aborted(uid, abort))?;
		debug!(model = uid, id = %key, "record deleted");
		Ok(record)
	}

	/// Split `values` into row columns and relation writes
	fn plan(&self, model: &ModelSchema, values: &Record) -> Result<Plan> {
		let mut plan = Plan::default();
		for (name, value) in values {
			if *name == model.primary_key {
				continue;
			}
			if let Some(attribute) = model.attributes.get(name) {
				if matches!(
					attribute.kind,
					AttributeType::Component | AttributeType::DynamicZone
				) {
					let links = ComponentLinks::for_model(model).ok_or_else(|| {
						MutationError::InvalidValue {
							field: name.clone(),
							reason: "model has no component links".to_string(),
						}
					})?;
					plan.changes.push(RelationChange::Components {
						field: name.clone(),
						links,
						entries: component_entries(name, attribute.kind, attribute.component.as_deref(), value)?,
					});
					continue;
				}
			}

			let Some(association) = self.associations.get(&model.uid, name) else {
				plan.columns.push((name.clone(), json_to_query_value(value)));
				continue;
			};
			let association = association.clone();
			let change = match &association.strategy {
				Strategy::Column { column } => {
					let target = self.single_id(&association, name, value)?;
					plan.columns
						.push((column.clone(), target.clone().unwrap_or(QueryValue::Null)));
					if association.nature != Nature::OneToOne {
						continue;
					}
					RelationChange::OneToOne {
						association,
						target,
					}
				}
				Strategy::ForeignKey { .. } => RelationChange::Children {
					ids: self.ids(&association, name, value)?,
					association,
				},
				Strategy::Pivot(_) => RelationChange::Pivot {
					ids: self.ids(&association, name, value)?,
					association,
				},
				Strategy::Morph(_) if association.is_polymorphic() => RelationChange::Polymorphic {
					targets: self.morph_refs(name, value)?,
					association,
				},
				Strategy::Morph(_) => RelationChange::Morph {
					ids: self.ids(&association, name, value)?,
					association,
				},
			};
			plan.changes.push(change);
		}
		Ok(plan)
	}

	fn target_pk_type(&self, association: &Association) -> PrimaryKeyType {
		association
			.target
			.as_deref()
			.and_then(|uid| self.registry.get_model(uid).ok())
			.map(|model| model.primary_key_type)
			.unwrap_or_default()
	}

	fn single_id(&self, association: &Association, field: &str, value: &JsonValue) -> Result<Option<QueryValue>> {
		if value.is_null() {
			return Ok(None);
		}
		id_value(value, self.target_pk_type(association))
			.map(Some)
			.ok_or_else(|| MutationError::InvalidValue {
				field: field.to_string(),
				reason: format!("{} is not a valid id", value),
			})
	}

	/// Desired IDs in submitted order, duplicates removed
	fn ids(&self, association: &Association, field: &str, value: &JsonValue) -> Result<Vec<QueryValue>> {
		let items: Vec<&JsonValue> = match value {
			JsonValue::Null => Vec::new(),
			JsonValue::Array(items) => items.iter().collect(),
			other => vec![other],
		};
		let mut seen = HashSet::new();
		let mut ids = Vec::with_capacity(items.len());
		for item in items {
			if let Some(id) = self.single_id(association, field, item)? {
				if seen.insert(id.key()) {
					ids.push(id);
				}
			}
		}
		Ok(ids)
	}

	fn morph_refs(&self, field: &str, value: &JsonValue) -> Result<Vec<MorphRef>> {
		match value {
			JsonValue::Null => Ok(Vec::new()),
			JsonValue::Array(items) => items
				.iter()
				.map(|item| MorphRef::from_json(&self.registry, field, item))
				.collect(),
			other => Ok(vec![MorphRef::from_json(&self.registry, field, other)?]),
		}
	}

	/// Apply every change concurrently and collect the failures
	async fn sync_relations(
		&self,
		uid: &str,
		id: &QueryValue,
		current: &Record,
		changes: &[RelationChange],
	) -> Result<()> {
		let results = join_all(changes.iter().map(|change| async move {
			(change.field(), self.apply_change(id, current, change).await)
		}))
		.await;

		let failures: Vec<RelationFailure> = results
			.into_iter()
			.filter_map(|(field, result)| {
				result.err().map(|error| RelationFailure {
					field: field.to_string(),
					error,
				})
			})
			.collect();
		if failures.is_empty() {
			return Ok(());
		}
		for failure in &failures {
			warn!(model = uid, field = %failure.field, error = %failure.error, "relation update failed");
		}
		Err(MutationError::Relations {
			model: uid.to_string(),
			failures,
		})
	}

	async fn apply_change(&self, id: &QueryValue, current: &Record, change: &RelationChange) -> Result<()> {
		match change {
			RelationChange::OneToOne {
				association,
				target,
			} => self.sync_one_to_one(association, id, current, target.as_ref()).await,
			RelationChange::Children { association, ids } => {
				self.sync_children(association, id, ids).await
			}
			RelationChange::Pivot { association, ids } => self.sync_pivot(association, id, ids).await,
			RelationChange::Morph { association, ids } => self.sync_morph(association, id, ids).await,
			RelationChange::Polymorphic {
				association,
				targets,
			} => self.sync_polymorphic(association, id, targets).await,
			RelationChange::Components {
				field,
				links,
				entries,
			} => self.sync_components(field, links, id, entries).await,
		}
	}

	async fn sync_one_to_one(
		&self,
		association: &Association,
		id: &QueryValue,
		current: &Record,
		target: Option<&QueryValue>,
	) -> Result<()> {
		let previous = current
			.get(&association.alias)
			.and_then(|value| id_value(value, self.target_pk_type(association)));
		if previous.as_ref().and_then(QueryValue::key) == target.and_then(QueryValue::key) {
			return Ok(());
		}

		if let (Some(via), Some(target_table)) =
			(association.via.as_deref(), association.target_table.as_deref())
		{
			// the previous target no longer points back
			let statement = self.conn.prepare(&update_where(
				target_table,
				&[(via.to_string(), QueryValue::Null)],
				Condition::all().add(eq(via, id)),
			))?;
			self.conn.run(statement).await?;

			if let Some(target) = target {
				let statement = self.conn.prepare(&update_where(
					target_table,
					&[(via.to_string(), id.clone())],
					Condition::all().add(eq(&association.target_primary_key, target)),
				))?;
				self.conn.run(statement).await?;
			}
		}

		if let (Some(target), Some(column)) = (target, association.owning_column()) {
			// any other record holding the target releases it
			let statement = self.conn.prepare(&update_where(
				&association.table,
				&[(column.to_string(), QueryValue::Null)],
				Condition::all()
					.add(eq(column, target))
					.add(Expr::col(Alias::new(&association.primary_key)).ne(to_sea_value(id))),
			))?;
			self.conn.run(statement).await?;
		}
		Ok(())
	}

	async fn sync_children(&self, association: &Association, id: &QueryValue, ids: &[QueryValue]) -> Result<()> {
		let (Strategy::ForeignKey { column }, Some(table)) =
			(&association.strategy, association.target_table.as_deref())
		else {
			return Ok(());
		};
		let current = self.reader.related_ids(association, id).await?;
		let removed = missing(&current, ids);
		let added = missing(ids, &current);
		let pk = association.target_primary_key.as_str();

		if !removed.is_empty() {
			let statement = self.conn.prepare(&update_where(
				table,
				&[(column.clone(), QueryValue::Null)],
				Condition::all().add(is_in(pk, &removed)).add(eq(column, id)),
			))?;
			self.conn.run(statement).await?;
		}
		if !added.is_empty() {
			let statement = self.conn.prepare(&update_where(
				table,
				&[(column.clone(), id.clone())],
				Condition::all().add(is_in(pk, &added)),
			))?;
			self.conn.run(statement).await?;
		}
		Ok(())
	}

	/// Detach removed IDs, then attach new ones
	async fn sync_pivot(&self, association: &Association, id: &QueryValue, ids: &[QueryValue]) -> Result<()> {
		let Some(pivot) = association.pivot() else {
			return Ok(());
		};
		let current = self.reader.related_ids(association, id).await?;
		let removed = missing(&current, ids);
		let added = missing(ids, &current);

		if !removed.is_empty() {
			let statement = self.conn.prepare(&delete_where(
				&pivot.name,
				Condition::all()
					.add(eq(&pivot.origin_column, id))
					.add(is_in(&pivot.target_column, &removed)),
			))?;
			self.conn.run(statement).await?;
		}
		if !added.is_empty() {
			let rows = added
				.into_iter()
				.map(|target| vec![id.clone(), target])
				.collect();
			let statement = self.conn.prepare(&insert_rows(
				&pivot.name,
				&[&pivot.origin_column, &pivot.target_column],
				rows,
			)?)?;
			self.conn.run(statement).await?;
		}
		debug!(pivot = %pivot.name, field = %association.alias, "pivot synchronised");
		Ok(())
	}

	/// Keep the morph rows pointing at `id` in the submitted order
	async fn sync_morph(&self, association: &Association, id: &QueryValue, ids: &[QueryValue]) -> Result<()> {
		let Some(columns) = association.morph() else {
			return Ok(());
		};
		let current = self.reader.related_ids(association, id).await?;
		let current_keys: Vec<Option<String>> = current.iter().map(QueryValue::key).collect();
		let desired_keys: Vec<Option<String>> = ids.iter().map(QueryValue::key).collect();
		if current_keys == desired_keys {
			return Ok(());
		}

		let related_type = QueryValue::String(association.table.clone());
		let field = QueryValue::String(association.alias.clone());
		let scope = || {
			Condition::all()
				.add(eq(&columns.related_id, id))
				.add(eq(&columns.related_type, &related_type))
				.add(eq(&columns.field, &field))
		};

		let removed = missing(&current, ids);
		if !removed.is_empty() {
			let statement = self.conn.prepare(&delete_where(
				&columns.table,
				scope().add(is_in(&columns.owner_id, &removed)),
			))?;
			self.conn.run(statement).await?;
		}

		let mut inserts = Vec::new();
		for (index, target) in ids.iter().enumerate() {
			let order = QueryValue::Int(index as i64 + 1);
			match current_keys.iter().position(|key| *key == target.key()) {
				Some(position) if position == index => {}
				Some(_) => {
					let statement = self.conn.prepare(&update_where(
						&columns.table,
						&[(columns.order.clone(), order)],
						scope().add(eq(&columns.owner_id, target)),
					))?;
					self.conn.run(statement).await?;
				}
				None => inserts.push(vec![
					target.clone(),
					id.clone(),
					related_type.clone(),
					field.clone(),
					order,
				]),
			}
		}
		if !inserts.is_empty() {
			let statement = self.conn.prepare(&insert_rows(
				&columns.table,
				&[
					&columns.owner_id,
					&columns.related_id,
					&columns.related_type,
					&columns.field,
					&columns.order,
				],
				inserts,
			)?)?;
			self.conn.run(statement).await?;
		}
		Ok(())
	}

	async fn sync_polymorphic(&self, association: &Association, id: &QueryValue, targets: &[MorphRef]) -> Result<()> {
		let Some(columns) = association.morph() else {
			return Ok(());
		};
		let target_row = |target: &MorphRef| -> Condition {
			Condition::all()
				.add(eq(&columns.related_id, &target.id))
				.add(eq(&columns.related_type, &QueryValue::String(target.table.clone())))
				.add(eq(&columns.field, &QueryValue::String(target.field.clone())))
		};

		let added: Vec<&MorphRef> = if association.nature == Nature::Morph(MorphKind::ManyMorphToOne) {
			// one row per owner, and the target leaves any previous owner;
			// rows of sibling aliases leave this alias's type column NULL
			let statement = self.conn.prepare(&delete_where(
				&columns.table,
				Condition::all()
					.add(eq(&columns.owner_id, id))
					.add(Expr::col(Alias::new(&columns.related_type)).is_not_null()),
			))?;
			self.conn.run(statement).await?;
			if let Some(target) = targets.first() {
				let statement = self
					.conn
					.prepare(&delete_where(&columns.table, target_row(target)))?;
				self.conn.run(statement).await?;
			}
			targets.iter().take(1).collect()
		} else {
			let current = self.reader.morph_refs(association, id).await?;
			let desired: HashSet<String> = targets.iter().map(MorphRef::key).collect();
			let existing: HashSet<String> = current.iter().map(MorphRef::key).collect();
			let mut removed = Condition::any();
			let mut has_removed = false;
			for entry in current.iter().filter(|entry| !desired.contains(&entry.key())) {
				removed = removed.add(target_row(entry));
				has_removed = true;
			}
			if has_removed {
				let statement = self.conn.prepare(&delete_where(
					&columns.table,
					Condition::all().add(eq(&columns.owner_id, id)).add(removed),
				))?;
				self.conn.run(statement).await?;
			}
			targets
				.iter()
				.filter(|entry| !existing.contains(&entry.key()))
				.collect()
		};

		if added.is_empty() {
			return Ok(());
		}
		let rows = added
			.iter()
			.enumerate()
			.map(|(index, target)| {
				vec![
					id.clone(),
					target.id.clone(),
					QueryValue::String(target.table.clone()),
					QueryValue::String(target.field.clone()),
					QueryValue::Int(index as i64 + 1),
				]
			})
			.collect();
		let statement = self.conn.prepare(&insert_rows(
			&columns.table,
			&[
				&columns.owner_id,
				&columns.related_id,
				&columns.related_type,
				&columns.field,
				&columns.order,
			],
			rows,
		)?)?;
		self.conn.run(statement).await?;
		Ok(())
	}

	/// Rewrite the link rows of one component attribute
	async fn sync_components(
		&self,
		field: &str,
		links: &ComponentLinks,
		id: &QueryValue,
		entries: &[(String, QueryValue)],
	) -> Result<()> {
		let field_value = QueryValue::String(field.to_string());
		let statement = self.conn.prepare(&delete_where(
			&links.table,
			Condition::all()
				.add(eq(&links.owner_column, id))
				.add(eq(ComponentLinks::FIELD, &field_value)),
		))?;
		self.conn.run(statement).await?;

		if entries.is_empty() {
			return Ok(());
		}
		let rows = entries
			.iter()
			.enumerate()
			.map(|(index, (component, component_id))| {
				vec![
					field_value.clone(),
					QueryValue::Int(index as i64 + 1),
					QueryValue::String(component.clone()),
					component_id.clone(),
					id.clone(),
				]
			})
			.collect();
		let statement = self.conn.prepare(&insert_rows(
			&links.table,
			&[
				ComponentLinks::FIELD,
				ComponentLinks::ORDER,
				ComponentLinks::COMPONENT_TYPE,
				ComponentLinks::COMPONENT_ID,
				&links.owner_column,
			],
			rows,
		)?)?;
		self.conn.run(statement).await?;
		Ok(())
	}

	/// Statements removing every reference to record `id`, labelled by attribute
	fn cleanup_statements(&self, model: &ModelSchema, id: &QueryValue) -> Result<Vec<(String, Statement)>> {
		let mut statements = Vec::new();
		for association in self.associations.for_model(&model.uid) {
			let statement = match &association.strategy {
				Strategy::Column { .. } => {
					let (Some(via), Some(table), Nature::OneToOne) = (
						association.via.as_deref(),
						association.target_table.as_deref(),
						association.nature,
					) else {
						continue;
					};
					self.conn.prepare(&update_where(
						table,
						&[(via.to_string(), QueryValue::Null)],
						Condition::all().add(eq(via, id)),
					))?
				}
				Strategy::ForeignKey { column } => {
					let Some(table) = association.target_table.as_deref() else {
						continue;
					};
					self.conn.prepare(&update_where(
						table,
						&[(column.clone(), QueryValue::Null)],
						Condition::all().add(eq(column, id)),
					))?
				}
				Strategy::Pivot(pivot) => self.conn.prepare(&delete_where(
					&pivot.name,
					Condition::all().add(eq(&pivot.origin_column, id)),
				))?,
				Strategy::Morph(columns) if association.is_polymorphic() => self.conn.prepare(
					&delete_where(&columns.table, Condition::all().add(eq(&columns.owner_id, id))),
				)?,
				Strategy::Morph(columns) => self.conn.prepare(&delete_where(
					&columns.table,
					Condition::all()
						.add(eq(&columns.related_id, id))
						.add(eq(
							&columns.related_type,
							&QueryValue::String(association.table.clone()),
						))
						.add(eq(&columns.field, &QueryValue::String(association.alias.clone()))),
				))?,
			};
			statements.push((association.alias.clone(), statement));
		}

		// unidirectional relations of other models pointing here
		for inbound in self.associations.targeting(&model.uid) {
			if inbound.via.is_some() {
				continue;
			}
			let label = format!("{}.{}", inbound.model, inbound.alias);
			let statement = match &inbound.strategy {
				Strategy::Column { column } => self.conn.prepare(&update_where(
					&inbound.table,
					&[(column.clone(), QueryValue::Null)],
					Condition::all().add(eq(column, id)),
				))?,
				Strategy::Pivot(pivot) => self.conn.prepare(&delete_where(
					&pivot.name,
					Condition::all().add(eq(&pivot.target_column, id)),
				))?,
				_ => continue,
			};
			statements.push((label, statement));
		}

		if let Some(links) = ComponentLinks::for_model(model) {
			let statement = self.conn.prepare(&delete_where(
				&links.table,
				Condition::all().add(eq(&links.owner_column, id)),
			))?;
			statements.push((links.table.clone(), statement));
		}
		Ok(statements)
	}

	/// Insert the row and return its primary key
	async fn insert_row(&self, model: &ModelSchema, mut columns: Vec<(String, QueryValue)>) -> Result<QueryValue> {
		if let Some((created, updated)) = model.options.timestamps.columns() {
			let now = QueryValue::Timestamp(Utc::now());
			for column in [created, updated] {
				if !columns.iter().any(|(name, _)| name == column) {
					columns.push((column.to_string(), now.clone()));
				}
			}
		}
		let table = model.collection_name.as_str();
		let pk = model.primary_key.as_str();

		if model.primary_key_type == PrimaryKeyType::Uuid {
			let id = QueryValue::Uuid(uuid::Uuid::new_v4());
			columns.retain(|(name, _)| name != pk);
			columns.insert(0, (pk.to_string(), id.clone()));
			let statement = self.conn.prepare(&insert_statement(table, &columns, None)?)?;
			self.conn.run(statement).await?;
			return Ok(id);
		}

		match self.conn.database_type() {
			DatabaseType::Mysql => {
				let statement = self.conn.prepare(&insert_statement(table, &columns, None)?)?;
				let mut tx = self.conn.begin().await?;
				tx.execute(&statement.sql, statement.params).await?;
				let row = tx.fetch_one("SELECT LAST_INSERT_ID() AS id", vec![]).await?;
				tx.commit().await?;
				Ok(row.value("id").cloned().unwrap_or(QueryValue::Null))
			}
			DatabaseType::Postgres | DatabaseType::Sqlite => {
				let statement = self.conn.prepare(&insert_statement(table, &columns, Some(pk))?)?;
				let row = self.conn.query_one(statement).await?;
				Ok(row.value(pk).cloned().unwrap_or(QueryValue::Null))
			}
		}
	}
}

/// `(component uid, id)` pairs for a component or dynamic-zone value
fn component_entries(
	field: &str,
	kind: AttributeType,
	component: Option<&str>,
	value: &JsonValue,
) -> Result<Vec<(String, QueryValue)>> {
	let invalid = |reason: String| MutationError::InvalidValue {
		field: field.to_string(),
		reason,
	};
	let items: Vec<&JsonValue> = match value {
		JsonValue::Null => return Ok(Vec::new()),
		JsonValue::Array(items) => items.iter().collect(),
		other => vec![other],
	};
	items
		.into_iter()
		.map(|item| -> Result<(String, QueryValue)> {
			let uid = match kind {
				AttributeType::DynamicZone => item
					.get(COMPONENT_KEY)
					.and_then(JsonValue::as_str)
					.ok_or_else(|| invalid(format!("entry is missing {}", COMPONENT_KEY)))?,
				_ => component.unwrap_or_default(),
			};
			let id = id_value(item, PrimaryKeyType::Integer)
				.ok_or_else(|| invalid(format!("{} is not a valid component id", item)))?;
			Ok((uid.to_string(), id))
		})
		.collect()
}

/// Entries of `from` whose key does not appear in `other`
fn missing(from: &[QueryValue], other: &[QueryValue]) -> Vec<QueryValue> {
	let keys: HashSet<String> = other.iter().filter_map(QueryValue::key).collect();
	from.iter()
		.filter(|value| value.key().is_some_and(|key| !keys.contains(&key)))
		.cloned()
		.collect()
}

fn eq(column: &str, value: &QueryValue) -> Expr {
	Expr::col(Alias::new(column)).eq(to_sea_value(value))
}

fn is_in(column: &str, values: &[QueryValue]) -> Expr {
	Expr::col(Alias::new(column)).is_in(values.iter().map(to_sea_value))
}

fn update_where(table: &str, values: &[(String, QueryValue)], condition: Condition) -> UpdateStatement {
	let mut update = Query::update();
	update.table(Alias::new(table));
	for (column, value) in values {
		update.value(Alias::new(column), value_expr(value));
	}
	update.cond_where(condition);
	update.to_owned()
}

fn delete_where(table: &str, condition: Condition) -> DeleteStatement {
	Query::delete()
		.from_table(Alias::new(table))
		.cond_where(condition)
		.to_owned()
}

fn insert_rows(
	table: &str,
	columns: &[&str],
	rows: Vec<Vec<QueryValue>>,
) -> std::result::Result<InsertStatement, DatabaseError> {
	let mut insert = Query::insert();
	insert
		.into_table(Alias::new(table))
		.columns(columns.iter().map(|column| Alias::new(*column)));
	for row in rows {
		insert.values(row.iter().map(value_expr))?;
	}
	Ok(insert.to_owned())
}

fn insert_statement(
	table: &str,
	columns: &[(String, QueryValue)],
	returning: Option<&str>,
) -> std::result::Result<InsertStatement, DatabaseError> {
	let mut insert = Query::insert();
	insert.into_table(Alias::new(table));
	if columns.is_empty() {
		insert.or_default_values();
	} else {
		insert.columns(columns.iter().map(|(column, _)| Alias::new(column)));
		insert.values(columns.iter().map(|(_, value)| value_expr(value)))?;
	}
	if let Some(pk) = returning {
		insert.returning_col(Alias::new(pk));
	}
	Ok(insert.to_owned())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::values::render;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_missing_compares_stringified_ids() {
		let current = vec![QueryValue::Int(1), QueryValue::Int(2), QueryValue::Int(3)];
		let desired = vec![
			QueryValue::String("2".into()),
			QueryValue::Int(3),
			QueryValue::Int(4),
		];
		assert_eq!(missing(&current, &desired), vec![QueryValue::Int(1)]);
		assert_eq!(missing(&desired, &current), vec![QueryValue::Int(4)]);
	}

	#[rstest]
	fn test_insert_rows_renders_one_statement() {
		let insert = insert_rows(
			"articles_authors",
			&["article_id", "author_id"],
			vec![
				vec![QueryValue::Int(1), QueryValue::Int(4)],
				vec![QueryValue::Int(1), QueryValue::Int(5)],
			],
		)
		.unwrap();
		let (sql, params) = render(DatabaseType::Sqlite, &insert).unwrap();
		assert_eq!(
			sql,
			r#"INSERT INTO "articles_authors" ("article_id", "author_id") VALUES (?, ?), (?, ?)"#
		);
		assert_eq!(params.len(), 4);
	}

	#[rstest]
	fn test_update_writes_null_inline() {
		let update = update_where(
			"profiles",
			&[("article".to_string(), QueryValue::Null)],
			Condition::all().add(eq("article", &QueryValue::Int(7))),
		);
		let (sql, params) = render(DatabaseType::Postgres, &update).unwrap();
		assert_eq!(
			sql,
			r#"UPDATE "profiles" SET "article" = NULL WHERE "article" = $1"#
		);
		assert_eq!(params, vec![QueryValue::Int(7)]);
	}

	#[rstest]
	#[case(json!([{"__component": "shared.quote", "id": 3}, {"__component": "shared.media", "id": "4"}]))]
	fn test_dynamic_zone_entries(#[case] value: JsonValue) {
		let entries = component_entries("blocks", AttributeType::DynamicZone, None, &value).unwrap();
		assert_eq!(
			entries,
			vec![
				("shared.quote".to_string(), QueryValue::Int(3)),
				("shared.media".to_string(), QueryValue::Int(4)),
			]
		);
	}

	#[rstest]
	fn test_dynamic_zone_entry_requires_component() {
		let error = component_entries("blocks", AttributeType::DynamicZone, None, &json!([{"id": 3}]))
			.unwrap_err();
		assert!(matches!(error, MutationError::InvalidValue { ref field, .. } if field == "blocks"));
	}

	#[rstest]
	fn test_relation_failures_name_fields() {
		let error = MutationError::Relations {
			model: "api::article.article".into(),
			failures: vec![RelationFailure {
				field: "authors".into(),
				error: MutationError::Database(DatabaseError::NotFound("pivot".into())),
			}],
		};
		assert!(error.to_string().starts_with("Relation update failed on api::article.article: authors:"));
	}
}
