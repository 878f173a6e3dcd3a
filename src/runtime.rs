//! Application bootstrap
//!
//! [`Lattice`] wires one frozen schema registry to a database connection:
//! associations are resolved once, tables are reconciled when
//! `migrations.auto_migrate` is set, and the validator builder, query
//! builder and relation mutator all share the same registry.

use std::sync::Arc;

use lattice_conf::{ConfError, Settings};
use lattice_core::schema::{SchemaRegistry, SchemaRegistryBuilder};
use lattice_core::SchemaError;
use lattice_db::migrations::{MigrationError, MigrationReport, SchemaMigrator};
use lattice_db::orm::{LifecycleRegistry, QueryBuilder, RelationMutator};
use lattice_db::{AssociationTable, DatabaseConnection, DatabaseError};
use lattice_validators::ValidatorBuilder;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LatticeError {
	#[error("Configuration error: {0}")]
	Conf(#[from] ConfError),

	#[error("Schema error: {0}")]
	Schema(#[from] SchemaError),

	#[error("Database error: {0}")]
	Database(#[from] DatabaseError),

	#[error("Migration error: {0}")]
	Migration(#[from] MigrationError),
}

pub type Result<T> = std::result::Result<T, LatticeError>;

/// A running schema runtime
#[derive(Debug)]
pub struct Lattice {
	settings: Settings,
	registry: Arc<SchemaRegistry>,
	associations: Arc<AssociationTable>,
	conn: DatabaseConnection,
	lifecycles: Arc<LifecycleRegistry>,
	validators: ValidatorBuilder,
	queries: QueryBuilder,
	mutator: RelationMutator,
}

impl Lattice {
	/// Registry builder preloaded with the `[schema]` settings
	pub fn registry_builder(settings: &Settings) -> SchemaRegistryBuilder {
		SchemaRegistry::builder()
			.private_attributes(settings.schema.private_attributes.iter().cloned())
			.upload_model(settings.schema.upload_model.clone())
	}

	/// Connect with `settings.database` and bootstrap over it
	pub async fn start(settings: Settings, registry: SchemaRegistry) -> Result<Self> {
		settings.check()?;
		let conn = DatabaseConnection::from_config(&settings.database).await?;
		Self::with_connection(settings, registry, conn).await
	}

	/// Bootstrap over an existing connection
	pub async fn with_connection(
		settings: Settings,
		registry: SchemaRegistry,
		conn: DatabaseConnection,
	) -> Result<Self> {
		let associations = Arc::new(AssociationTable::build(&registry)?);
		let registry = Arc::new(registry);
		let lifecycles = Arc::new(LifecycleRegistry::new());

		let lattice = Self {
			validators: ValidatorBuilder::new(registry.clone()),
			queries: QueryBuilder::new(registry.clone(), associations.clone()),
			mutator: RelationMutator::with_lifecycles(
				conn.clone(),
				registry.clone(),
				associations.clone(),
				lifecycles.clone(),
			),
			settings,
			registry,
			associations,
			conn,
			lifecycles,
		};

		if lattice.settings.migrations.auto_migrate {
			let report = lattice.migrate().await?;
			for (table, reason) in &report.failed {
				warn!(table = %table, reason = %reason, "table left at its previous definition");
			}
		}
		info!(
			models = lattice.registry.models().count(),
			database = ?lattice.conn.database_type(),
			"lattice started"
		);
		Ok(lattice)
	}

	/// Reconcile every declared table
	pub async fn migrate(&self) -> Result<MigrationReport> {
		Ok(self.migrator().reconcile_all().await?)
	}

	pub fn migrator(&self) -> SchemaMigrator {
		SchemaMigrator::from_settings(
			self.conn.clone(),
			self.registry.clone(),
			self.associations.clone(),
			&self.settings.migrations,
		)
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn registry(&self) -> &Arc<SchemaRegistry> {
		&self.registry
	}

	pub fn associations(&self) -> &Arc<AssociationTable> {
		&self.associations
	}

	pub fn connection(&self) -> &DatabaseConnection {
		&self.conn
	}

	/// Hooks consulted by [`Self::mutator`]
	pub fn lifecycles(&self) -> &Arc<LifecycleRegistry> {
		&self.lifecycles
	}

	pub fn validators(&self) -> &ValidatorBuilder {
		&self.validators
	}

	pub fn queries(&self) -> &QueryBuilder {
		&self.queries
	}

	pub fn mutator(&self) -> &RelationMutator {
		&self.mutator
	}
}
