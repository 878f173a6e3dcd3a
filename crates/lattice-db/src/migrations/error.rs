//! Migration errors

use thiserror::Error;

use crate::backends::DatabaseError;
use lattice_core::SchemaError;

#[derive(Debug, Error)]
pub enum MigrationError {
	#[error("Database error: {0}")]
	Database(#[from] DatabaseError),

	#[error("Schema error: {0}")]
	Schema(#[from] SchemaError),

	#[error("Snapshot error: {0}")]
	Snapshot(#[from] serde_json::Error),

	#[error("Introspection error: {0}")]
	Introspection(String),

	/// One table could not be migrated; other tables are unaffected
	#[error("Migration of table \"{table}\" failed: {reason}")]
	TableFailed { table: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MigrationError>;
