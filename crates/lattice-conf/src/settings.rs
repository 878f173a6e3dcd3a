//! Top-level settings document

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::database::DatabaseConfig;
use crate::error::{ConfError, Result};

/// Everything an embedding application configures
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub database: DatabaseConfig,

	#[serde(default)]
	pub schema: SchemaSettings,

	#[serde(default)]
	pub migrations: MigrationSettings,
}

/// Schema registry options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
	/// Attribute names hidden from every public schema
	#[serde(default)]
	pub private_attributes: Vec<String>,

	/// Model media attributes relate to
	#[serde(default = "default_upload_model")]
	pub upload_model: String,
}

fn default_upload_model() -> String {
	"plugin::upload.file".to_string()
}

impl Default for SchemaSettings {
	fn default() -> Self {
		Self {
			private_attributes: Vec::new(),
			upload_model: default_upload_model(),
		}
	}
}

/// Schema migrator options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MigrationSettings {
	/// Run reconciliation at startup
	#[serde(default = "default_true")]
	pub auto_migrate: bool,

	/// Create full-text or trigram search indexes on text columns
	#[serde(default = "default_true")]
	pub search_indexes: bool,

	/// Value of the `environment` column of stored snapshots
	#[serde(default = "default_environment")]
	pub environment: String,
}

fn default_true() -> bool {
	true
}

fn default_environment() -> String {
	"development".to_string()
}

impl Default for MigrationSettings {
	fn default() -> Self {
		Self {
			auto_migrate: true,
			search_indexes: true,
			environment: default_environment(),
		}
	}
}

impl Settings {
	/// Parse settings from TOML text
	///
	/// # Examples
	///
	/// ```
	/// use lattice_conf::{Engine, Settings};
	///
	/// let settings = Settings::from_toml_str(r#"
	///     [database]
	///     engine = "postgres"
	///     name = "cms"
	///     host = "db"
	///     port = 5432
	/// "#).unwrap();
	///
	/// assert_eq!(settings.database.engine, Engine::Postgres);
	/// assert!(settings.migrations.auto_migrate);
	/// ```
	pub fn from_toml_str(raw: &str) -> Result<Self> {
		let settings: Settings = toml::from_str(raw)?;
		settings.check()?;
		Ok(settings)
	}

	/// Read and parse a TOML settings file
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(|source| ConfError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&raw)
	}

	/// Reject values no connection or migration could work with
	pub fn check(&self) -> Result<()> {
		if self.database.name.trim().is_empty() {
			return Err(ConfError::Invalid {
				key: "database.name",
				reason: "must not be empty".to_string(),
			});
		}
		if self.database.max_connections == 0 {
			return Err(ConfError::Invalid {
				key: "database.max_connections",
				reason: "must be at least 1".to_string(),
			});
		}
		if self.schema.upload_model.is_empty() {
			return Err(ConfError::Invalid {
				key: "schema.upload_model",
				reason: "must not be empty".to_string(),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_empty_document_yields_defaults() {
		let settings = Settings::from_toml_str("").unwrap();
		assert_eq!(settings, Settings::default());
		assert_eq!(settings.schema.upload_model, "plugin::upload.file");
	}

	#[rstest]
	fn test_zero_connections_rejected() {
		let err = Settings::from_toml_str(
			r#"
			[database]
			engine = "sqlite"
			name = ":memory:"
			max_connections = 0
			"#,
		)
		.unwrap_err();
		assert!(matches!(
			err,
			ConfError::Invalid {
				key: "database.max_connections",
				..
			}
		));
	}

	#[rstest]
	fn test_unknown_engine_is_a_parse_error() {
		let err = Settings::from_toml_str(
			r#"
			[database]
			engine = "oracle"
			name = "cms"
			"#,
		)
		.unwrap_err();
		assert!(matches!(err, ConfError::Parse(_)));
	}
}
