//! Schema reconciliation
//!
//! [`SchemaMigrator`] brings every table declared by the registry in line
//! with the live database. It is idempotent and meant to run on every boot:
//!
//! - a missing table is created, then its search indexes are built;
//! - missing columns are added;
//! - column definitions are compared with the snapshot stored in
//!   `core_store`, and only differing columns are altered. SQLite has no
//!   `ALTER COLUMN`, so a change there rebuilds the table inside one
//!   transaction.
//!
//! A table whose migration fails is reported and skipped; the remaining
//! tables are still migrated.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use lattice_conf::MigrationSettings;
use lattice_core::schema::{ModelSchema, SchemaRegistry};

use crate::associations::AssociationTable;
use crate::backends::{DatabaseConnection, DatabaseError, DatabaseType};

use super::ddl::{ColumnDef, ComponentLinks, TableDef, drop_unique_index_sql};
use super::error::Result;
use super::indexes::regenerate_search_indexes;
use super::introspect::{columns, has_table};
use super::store::CoreStore;

/// What reconciling one table did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
	Created,
	Altered,
	Unchanged,
	/// Migration failed and was rolled back where the dialect allows it
	Failed(String),
}

/// Outcome of [`SchemaMigrator::reconcile_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
	pub created: Vec<String>,
	pub altered: Vec<String>,
	pub unchanged: Vec<String>,
	/// `(table, reason)` for every table that could not be migrated
	pub failed: Vec<(String, String)>,
}

impl MigrationReport {
	pub fn is_success(&self) -> bool {
		self.failed.is_empty()
	}

	fn record(&mut self, table: &str, outcome: TableOutcome) {
		let table = table.to_string();
		match outcome {
			TableOutcome::Created => self.created.push(table),
			TableOutcome::Altered => self.altered.push(table),
			TableOutcome::Unchanged => self.unchanged.push(table),
			TableOutcome::Failed(reason) => self.failed.push((table, reason)),
		}
	}
}

/// Reconciles declared tables with the database
pub struct SchemaMigrator {
	conn: DatabaseConnection,
	registry: Arc<SchemaRegistry>,
	associations: Arc<AssociationTable>,
	store: CoreStore,
	search_indexes: bool,
}

impl SchemaMigrator {
	pub fn new(
		conn: DatabaseConnection,
		registry: Arc<SchemaRegistry>,
		associations: Arc<AssociationTable>,
	) -> Self {
		Self::from_settings(conn, registry, associations, &MigrationSettings::default())
	}

	pub fn from_settings(
		conn: DatabaseConnection,
		registry: Arc<SchemaRegistry>,
		associations: Arc<AssociationTable>,
		settings: &MigrationSettings,
	) -> Self {
		Self {
			store: CoreStore::new(conn.clone(), settings.environment.clone()),
			conn,
			registry,
			associations,
			search_indexes: settings.search_indexes,
		}
	}

	pub fn store(&self) -> &CoreStore {
		&self.store
	}

	/// Tables owned by `model`: its own table, its component link table
	/// and the pivot and morph tables its associations create
	pub fn tables_for(&self, model: &ModelSchema) -> Result<Vec<TableDef>> {
		let mut tables = vec![TableDef::for_model(&self.registry, &self.associations, model)?];
		if let Some(links) = ComponentLinks::for_model(model) {
			tables.push(TableDef::component_links(model, &links));
		}
		for (association, pivot) in self.associations.pivot_tables() {
			if association.model == model.uid {
				tables.push(TableDef::pivot(&self.registry, association, pivot));
			}
		}
		for morph in self.associations.morph_tables() {
			if morph.owner == model.uid {
				tables.push(TableDef::morph(&self.registry, &self.associations, &morph));
			}
		}
		Ok(tables)
	}

	/// Every declared table, each listed once
	pub fn declared_tables(&self) -> Result<Vec<TableDef>> {
		let mut tables: Vec<TableDef> = Vec::new();
		for model in self.registry.models() {
			for table in self.tables_for(model)? {
				if !tables.iter().any(|known| known.name == table.name) {
					tables.push(table);
				}
			}
		}
		// morph tables whose owner model is not registered
		for morph in self.associations.morph_tables() {
			if !tables.iter().any(|known| known.name == morph.name) {
				tables.push(TableDef::morph(&self.registry, &self.associations, &morph));
			}
		}
		Ok(tables)
	}

	/// Reconcile the tables of one model
	///
	/// Returns `false` when any of them could not be migrated; the failure
	/// is logged and the other tables are still processed.
	pub async fn reconcile(&self, uid: &str) -> Result<bool> {
		let model = self.registry.get_model(uid)?;
		self.store.ensure().await?;
		let mut ok = true;
		for table in self.tables_for(model)? {
			match self.reconcile_table(&table).await {
				Ok(TableOutcome::Failed(_)) => ok = false,
				Ok(_) => {}
				Err(err) => {
					error!(table = %table.name, error = %err, "table migration failed");
					ok = false;
				}
			}
		}
		Ok(ok)
	}

	/// Reconcile every declared table
	pub async fn reconcile_all(&self) -> Result<MigrationReport> {
		self.store.ensure().await?;
		let mut report = MigrationReport::default();
		for table in self.declared_tables()? {
			let outcome = match self.reconcile_table(&table).await {
				Ok(outcome) => outcome,
				Err(err) => {
					error!(table = %table.name, error = %err, "table migration failed");
					TableOutcome::Failed(err.to_string())
				}
			};
			report.record(&table.name, outcome);
		}
		info!(
			created = report.created.len(),
			altered = report.altered.len(),
			unchanged = report.unchanged.len(),
			failed = report.failed.len(),
			"schema reconciled"
		);
		Ok(report)
	}

	/// Bring one table in line with `table`
	pub async fn reconcile_table(&self, table: &TableDef) -> Result<TableOutcome> {
		let db = self.conn.database_type();

		if !has_table(&self.conn, &table.name).await? {
			for sql in table.create_sql(db) {
				self.conn.execute(&sql, vec![]).await?;
			}
			self.store.save_snapshot(table).await?;
			self.after_change(table).await;
			info!(table = %table.name, "table created");
			return Ok(TableOutcome::Created);
		}

		let existing = columns(&self.conn, &table.name).await?;
		let missing: Vec<&ColumnDef> = table
			.columns
			.iter()
			.filter(|column| !existing.contains(&column.name))
			.collect();
		for column in &missing {
			for sql in table.add_column_sql(db, column) {
				self.conn.execute(&sql, vec![]).await?;
			}
			debug!(table = %table.name, column = %column.name, "column added");
		}

		let previous = self.store.snapshot(&table.name).await?;
		let changed: Vec<(&ColumnDef, &ColumnDef)> = match &previous {
			Some(previous) => table
				.columns
				.iter()
				.filter(|column| existing.contains(&column.name))
				.filter_map(|column| {
					previous
						.column(&column.name)
						.filter(|before| **before != *column)
						.map(|before| (before, column))
				})
				.collect(),
			None => Vec::new(),
		};

		if !changed.is_empty() {
			if db == DatabaseType::Sqlite {
				let old_table = previous.as_ref().unwrap_or(table);
				if let Err(err) = self.rebuild_sqlite(table, old_table, &existing).await {
					return Ok(self.rebuild_failed(table, err));
				}
			} else {
				for (before, column) in &changed {
					for sql in table.alter_column_sql(db, before, column) {
						self.conn.execute(&sql, vec![]).await?;
					}
				}
			}
			info!(table = %table.name, columns = changed.len(), "columns altered");
		}

		if previous.as_ref() != Some(table) {
			self.store.save_snapshot(table).await?;
		}
		if missing.is_empty() && changed.is_empty() {
			debug!(table = %table.name, "table unchanged");
			return Ok(TableOutcome::Unchanged);
		}
		self.after_change(table).await;
		Ok(TableOutcome::Altered)
	}

	async fn after_change(&self, table: &TableDef) {
		if self.search_indexes {
			regenerate_search_indexes(&self.conn, table).await;
		}
	}

	/// Recreate `table` and copy the surviving columns, all in one transaction
	async fn rebuild_sqlite(
		&self,
		table: &TableDef,
		previous: &TableDef,
		existing: &[String],
	) -> std::result::Result<(), DatabaseError> {
		let db = DatabaseType::Sqlite;
		let temp = format!("tmp_{}", table.name);
		let copied: Vec<String> = table
			.column_names()
			.into_iter()
			.filter(|name| existing.iter().any(|column| column == name))
			.map(|name| db.quote(name))
			.collect();

		let mut statements = vec![format!(
			"ALTER TABLE {} RENAME TO {}",
			db.quote(&table.name),
			db.quote(&temp)
		)];
		for column in previous.columns.iter().chain(table.columns.iter()) {
			if column.unique {
				statements.push(drop_unique_index_sql(db, &table.name, &column.name));
			}
		}
		statements.extend(table.create_sql(db));
		statements.push(format!(
			"INSERT INTO {} ({}) SELECT {} FROM {}",
			db.quote(&table.name),
			copied.join(", "),
			copied.join(", "),
			db.quote(&temp)
		));
		statements.push(format!("DROP TABLE {}", db.quote(&temp)));

		let mut tx = self.conn.begin().await?;
		for sql in &statements {
			if let Err(err) = tx.execute(sql, vec![]).await {
				if let Err(rollback) = tx.rollback().await {
					warn!(table = %table.name, error = %rollback, "rollback failed");
				}
				return Err(err);
			}
		}
		tx.commit().await
	}

	fn rebuild_failed(&self, table: &TableDef, err: DatabaseError) -> TableOutcome {
		if err.is_unique_violation() {
			error!(
				table = %table.name,
				error = %err,
				"existing rows violate a unique constraint; remove duplicates and restart to apply the new schema"
			);
		} else {
			error!(table = %table.name, error = %err, "table rebuild failed; the previous table was kept");
		}
		TableOutcome::Failed(err.to_string())
	}
}
