//! Per-dialect backends over sqlx pools

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
