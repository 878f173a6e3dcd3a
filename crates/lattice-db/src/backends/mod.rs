//! Database backends
//!
//! A [`DatabaseBackend`] wraps one sqlx pool per dialect. Everything above
//! this module talks to the database through [`DatabaseConnection`], which
//! also renders sea-query statements for the connected dialect.

pub mod backend;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod recording;
pub mod types;
pub mod values;

pub use backend::{DatabaseBackend, TransactionExecutor};
pub use connection::DatabaseConnection;
pub use error::{DatabaseError, Result};
pub use recording::{RecordingBackend, StatementLog};
pub use types::{DatabaseType, QueryResult, QueryValue, Row, Statement};
