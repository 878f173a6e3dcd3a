//! Configuration loading errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfError {
	#[error("Failed to read settings file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Invalid settings: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid value for {key}: {reason}")]
	Invalid { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfError>;
