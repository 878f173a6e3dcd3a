//! Statement-recording backend wrapper
//!
//! [`RecordingBackend`] forwards every call to an inner backend and appends
//! the SQL and bound values to a shared [`StatementLog`], including
//! statements issued inside transactions. It is used to assert statement
//! ordering and to confirm that idempotent operations issue no writes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{
	backend::{DatabaseBackend, TransactionExecutor},
	error::Result,
	types::{DatabaseType, QueryResult, QueryValue, Row, Statement},
};

/// Shared, append-only list of executed statements
#[derive(Debug, Clone, Default)]
pub struct StatementLog {
	entries: Arc<Mutex<Vec<Statement>>>,
}

impl StatementLog {
	pub fn new() -> Self {
		Self::default()
	}

	fn push(&self, sql: &str, params: &[QueryValue]) {
		self.entries.lock().push(Statement::new(sql, params.to_vec()));
	}

	/// Snapshot of every statement so far
	pub fn statements(&self) -> Vec<Statement> {
		self.entries.lock().clone()
	}

	/// Statements whose SQL starts with one of `prefixes`, case-insensitively
	pub fn matching(&self, prefixes: &[&str]) -> Vec<Statement> {
		self.entries
			.lock()
			.iter()
			.filter(|statement| {
				let head = statement.sql.trim_start().to_uppercase();
				prefixes
					.iter()
					.any(|prefix| head.starts_with(&prefix.to_uppercase()))
			})
			.cloned()
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}
}

/// Backend wrapper that records every statement it forwards
pub struct RecordingBackend {
	inner: Arc<dyn DatabaseBackend>,
	log: StatementLog,
}

impl RecordingBackend {
	pub fn new(inner: Arc<dyn DatabaseBackend>) -> Self {
		Self {
			inner,
			log: StatementLog::new(),
		}
	}

	pub fn log(&self) -> StatementLog {
		self.log.clone()
	}
}

#[async_trait]
impl DatabaseBackend for RecordingBackend {
	fn database_type(&self) -> DatabaseType {
		self.inner.database_type()
	}

	fn placeholder(&self, index: usize) -> String {
		self.inner.placeholder(index)
	}

	fn supports_returning(&self) -> bool {
		self.inner.supports_returning()
	}

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		self.log.push(sql, &params);
		self.inner.execute(sql, params).await
	}

	async fn fetch_one(&self, sql: &str, params: Vec<QueryValue>) -> Result<Row> {
		self.log.push(sql, &params);
		self.inner.fetch_one(sql, params).await
	}

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.log.push(sql, &params);
		self.inner.fetch_all(sql, params).await
	}

	async fn fetch_optional(&self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		self.log.push(sql, &params);
		self.inner.fetch_optional(sql, params).await
	}

	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>> {
		let inner = self.inner.begin().await?;
		Ok(Box::new(RecordingTransaction {
			inner,
			log: self.log.clone(),
		}))
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

struct RecordingTransaction {
	inner: Box<dyn TransactionExecutor>,
	log: StatementLog,
}

#[async_trait]
impl TransactionExecutor for RecordingTransaction {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		self.log.push(sql, &params);
		self.inner.execute(sql, params).await
	}

	async fn fetch_one(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Row> {
		self.log.push(sql, &params);
		self.inner.fetch_one(sql, params).await
	}

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.log.push(sql, &params);
		self.inner.fetch_all(sql, params).await
	}

	async fn fetch_optional(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		self.log.push(sql, &params);
		self.inner.fetch_optional(sql, params).await
	}

	async fn commit(self: Box<Self>) -> Result<()> {
		self.log.push("COMMIT", &[]);
		self.inner.commit().await
	}

	async fn rollback(self: Box<Self>) -> Result<()> {
		self.log.push("ROLLBACK", &[]);
		self.inner.rollback().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backends::dialect::SqliteBackend;
	use rstest::rstest;
	use sqlx::sqlite::SqlitePoolOptions;

	#[rstest]
	#[tokio::test]
	async fn test_records_pool_and_transaction_statements() {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		let backend = RecordingBackend::new(Arc::new(SqliteBackend::new(pool)));
		let log = backend.log();

		backend
			.execute("CREATE TABLE tags (id integer primary key, name text)", vec![])
			.await
			.unwrap();
		let mut tx = backend.begin().await.unwrap();
		tx.execute("INSERT INTO tags (name) VALUES (?)", vec!["rust".into()])
			.await
			.unwrap();
		tx.commit().await.unwrap();

		let statements = log.statements();
		assert_eq!(statements.len(), 3);
		assert_eq!(statements[1].params, vec![QueryValue::String("rust".into())]);
		assert_eq!(log.matching(&["insert"]).len(), 1);
		assert_eq!(statements[2].sql, "COMMIT");
	}
}
