//! # Lattice Conf
//!
//! TOML settings for applications embedding Lattice: the database
//! connection, schema registry options and schema migrator behaviour.
//!
//! ```toml
//! [database]
//! engine = "sqlite"
//! name = "content.db"
//!
//! [schema]
//! private_attributes = ["internal_notes"]
//!
//! [migrations]
//! environment = "production"
//! ```

pub mod database;
pub mod error;
pub mod settings;

pub use database::{DatabaseConfig, Engine};
pub use error::{ConfError, Result};
pub use settings::{MigrationSettings, SchemaSettings, Settings};
