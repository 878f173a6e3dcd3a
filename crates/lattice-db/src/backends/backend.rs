//! Database backend abstraction

use async_trait::async_trait;

use super::error::Result;
use super::types::{DatabaseType, QueryResult, QueryValue, Row};

/// A pooled connection to one database
///
/// Statements are plain SQL strings with dialect placeholders; values are
/// bound in order.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
	fn database_type(&self) -> DatabaseType;

	/// Placeholder for the 1-based parameter `index`
	fn placeholder(&self, index: usize) -> String;

	/// Whether `INSERT ... RETURNING` is available
	fn supports_returning(&self) -> bool;

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;

	async fn fetch_one(&self, sql: &str, params: Vec<QueryValue>) -> Result<Row>;

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;

	async fn fetch_optional(&self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>>;

	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>>;

	fn as_any(&self) -> &dyn std::any::Any;
}

/// Statements executed on one connection inside an open transaction
#[async_trait]
pub trait TransactionExecutor: Send {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult>;

	async fn fetch_one(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Row>;

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>>;

	async fn fetch_optional(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>>;

	async fn commit(self: Box<Self>) -> Result<()>;

	async fn rollback(self: Box<Self>) -> Result<()>;
}
