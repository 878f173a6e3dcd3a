//! SQLite dialect implementation

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as SqlxRow, Sqlite, SqlitePool, Transaction, TypeInfo, ValueRef};
use std::sync::Arc;

use crate::backends::{
	backend::{DatabaseBackend, TransactionExecutor},
	error::{DatabaseError, Result},
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn build_query<'q>(sql: &'q str, params: &'q [QueryValue]) -> SqliteQuery<'q> {
	let mut query = sqlx::query(sql);
	for param in params {
		query = bind_value(query, param);
	}
	query
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q QueryValue) -> SqliteQuery<'q> {
	match value {
		QueryValue::Null => query.bind(None::<i32>),
		QueryValue::Bool(b) => query.bind(b),
		QueryValue::Int(i) => query.bind(i),
		QueryValue::Float(f) => query.bind(f),
		QueryValue::String(s) => query.bind(s),
		QueryValue::Bytes(b) => query.bind(b),
		QueryValue::Timestamp(dt) => query.bind(dt),
		// stored as text so that it compares equal to string filters
		QueryValue::Uuid(u) => query.bind(u.to_string()),
	}
}

fn convert_row(sqlite_row: SqliteRow) -> Result<Row> {
	let mut row = Row::new();
	for column in sqlite_row.columns() {
		let column_name = column.name();
		let type_name = column.type_info().name().to_uppercase();

		let is_null = sqlite_row
			.try_get_raw(column_name)
			.map(|raw| raw.is_null())
			.unwrap_or(true);
		if is_null {
			row.insert(column_name.to_string(), QueryValue::Null);
			continue;
		}

		// booleans are stored as 0/1 and only recognisable by the declared type
		let value = if type_name.contains("BOOL") {
			match sqlite_row.try_get::<i64, _>(column_name) {
				Ok(value) => QueryValue::Bool(value != 0),
				Err(_) => sqlite_row
					.try_get::<bool, _>(column_name)
					.map(QueryValue::Bool)
					.unwrap_or(QueryValue::Null),
			}
		} else if let Ok(value) = sqlite_row.try_get::<i64, _>(column_name) {
			QueryValue::Int(value)
		} else if let Ok(value) = sqlite_row.try_get::<f64, _>(column_name) {
			QueryValue::Float(value)
		} else if let Ok(value) = sqlite_row.try_get::<String, _>(column_name) {
			QueryValue::String(value)
		} else if let Ok(value) = sqlite_row.try_get::<Vec<u8>, _>(column_name) {
			QueryValue::Bytes(value)
		} else if let Ok(value) = sqlite_row.try_get::<chrono::NaiveDateTime, _>(column_name) {
			QueryValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(value, chrono::Utc))
		} else {
			QueryValue::Null
		};
		row.insert(column_name.to_string(), value);
	}
	Ok(row)
}

/// SQLite database backend
pub struct SqliteBackend {
	pool: Arc<SqlitePool>,
}

impl SqliteBackend {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool: Arc::new(pool),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Sqlite
	}

	fn placeholder(&self, _index: usize) -> String {
		"?".to_string()
	}

	fn supports_returning(&self) -> bool {
		true
	}

	async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let result = build_query(sql, &params).execute(self.pool.as_ref()).await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_one(&self, sql: &str, params: Vec<QueryValue>) -> Result<Row> {
		let row = build_query(sql, &params).fetch_one(self.pool.as_ref()).await?;
		convert_row(row)
	}

	async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		let rows = build_query(sql, &params).fetch_all(self.pool.as_ref()).await?;
		rows.into_iter().map(convert_row).collect()
	}

	async fn fetch_optional(&self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		let row = build_query(sql, &params)
			.fetch_optional(self.pool.as_ref())
			.await?;
		row.map(convert_row).transpose()
	}

	async fn begin(&self) -> Result<Box<dyn TransactionExecutor>> {
		let tx = self.pool.begin().await?;
		Ok(Box::new(SqliteTransactionExecutor::new(tx)))
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

/// SQLite transaction executor
pub struct SqliteTransactionExecutor {
	tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTransactionExecutor {
	pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
		Self { tx: Some(tx) }
	}

	fn open(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
		self.tx.as_mut().ok_or_else(|| {
			DatabaseError::TransactionError("Transaction already consumed".to_string())
		})
	}
}

#[async_trait]
impl TransactionExecutor for SqliteTransactionExecutor {
	async fn execute(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		let tx = self.open()?;
		let result = build_query(sql, &params).execute(&mut **tx).await?;
		Ok(QueryResult {
			rows_affected: result.rows_affected(),
		})
	}

	async fn fetch_one(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Row> {
		let tx = self.open()?;
		let row = build_query(sql, &params).fetch_one(&mut **tx).await?;
		convert_row(row)
	}

	async fn fetch_all(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		let tx = self.open()?;
		let rows = build_query(sql, &params).fetch_all(&mut **tx).await?;
		rows.into_iter().map(convert_row).collect()
	}

	async fn fetch_optional(&mut self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		let tx = self.open()?;
		let row = build_query(sql, &params).fetch_optional(&mut **tx).await?;
		row.map(convert_row).transpose()
	}

	async fn commit(mut self: Box<Self>) -> Result<()> {
		let tx = self.tx.take().ok_or_else(|| {
			DatabaseError::TransactionError("Transaction already consumed".to_string())
		})?;
		tx.commit().await?;
		Ok(())
	}

	async fn rollback(mut self: Box<Self>) -> Result<()> {
		let tx = self.tx.take().ok_or_else(|| {
			DatabaseError::TransactionError("Transaction already consumed".to_string())
		})?;
		tx.rollback().await?;
		Ok(())
	}
}
