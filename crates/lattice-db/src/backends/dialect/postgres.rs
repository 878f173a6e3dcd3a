//! PostgreSQL dialect implementation

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Postgres, Row as SqlxRow, Transaction, ValueRef};
use std::sync::Arc;
use uuid::Uuid;

use crate::backends::{
	backend::{DatabaseBackend, TransactionExecutor},
	error::{DatabaseError, Result},
	types::{DatabaseType, QueryResult, QueryValue, Row},
};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn build_query<'q>(sql: &'q str, params: &'q [QueryValue]) -> PgQuery<'q> {
	let mut query = sqlx::query(sql);
	for param in params {
		query = bind_value(query, param);
	}
	query
}

fn bind_value<'q>(query: PgQuery<'q>, value: &'q QueryValue) -> PgQuery<'q> {
	match value {
		QueryValue::Null => query.bind(None::<i32>),
		QueryValue::Bool(b) => query.bind(b),
		QueryValue::Int(i) => query.bind(i),
		QueryValue::Float(f) => query.bind(f),
		QueryValue::String(s) => query.bind(s),
		QueryValue::Bytes(b) => query.bind(b),
		QueryValue::Timestamp(dt) => query.bind(dt),
		QueryValue::Uuid(u) => query.bind(u),
	}
}

fn convert_row(pg_row: PgRow) -> Result<Row> {
	let mut row = Row::new();
	for column in pg_row.columns() {
		let column_name = column.name();

		let is_null = pg_row
			.try_get_raw(column_name)
			.map(|raw| raw.is_null())
			.unwrap_or(true);
		if is_null {
			row.insert(column_name.to_string(), QueryValue::Null);
			continue;
		}

		let value = if let Ok(value) = pg_row.try_get::<Uuid, _>(column_name) {
			QueryValue::Uuid(value)
		} else if let Ok(value) = pg_row.try_get::<bool, _>(column_name) {
			QueryValue::Bool(value)
		} else if let Ok(value) = pg_row.try_get::<i64, _>(column_name) {
			QueryValue::Int(value)
		} else if let Ok(value) = pg_row.try_get::<i32, _>(column_name) {
			QueryValue::Int(value as i64)
		} else if let Ok(value) = pg_row.try_get::<i16, _>(column_name) {
			QueryValue::Int(value as i64)
		} else if let Ok(value) = pg_row.try_get::<rust_decimal::Decimal, _>(column_name) {
			value.to_f64().map(QueryValue::Float).unwrap_or(QueryValue::Null)
		} else if let Ok(value) = pg_row.try_get::<f64, _>(column_name) {
			QueryValue::Float(value)
		} else if let Ok(value) = pg_row.try_get::<f32, _>(column_name) {
			QueryValue::Float(value as f64)
		} else if let Ok(value) = pg_row.try_get::<String, _>(column_name) {
			QueryValue::String(value)
		} else if let Ok(value) = pg_row.try_get::<serde_json::Value, _>(column_name) {
			QueryValue::String(value.to_string())
		} else if let Ok(value) = pg_row.try_get::<chrono::DateTime<chrono::Utc>, _>(column_name) {
			QueryValue::Timestamp(value)
		} else if let Ok(value) = pg_row.try_get::<chrono::NaiveDateTime, _>(column_name) {
			QueryValue::Timestamp(chrono::DateTime::from_naive_utc_and_offset(value, chrono::Utc))
		} else if let Ok(value) = pg_row.try_get::<chrono::NaiveDate, _>(column_name) {
			QueryValue::String(value.to_string())
		} else if let Ok(value) = pg_row.try_get::<chrono::NaiveTime, _>(column_name) {
			QueryValue::String(value.to_string())
		} else if let Ok(value) = pg_row.try_get::<Vec<u8>, _>(column_name) {
			QueryValue::Bytes(value)
		} else {
			QueryValue::Null
		};
		row.insert(column_name.to_string(), value);
	}
	Ok(row)
}

/// PostgreSQL database backend
pub struct PostgresBackend {
	pool: Arc<PgPool>,
}

impl PostgresBackend {
	pub fn new(pool: PgPool) -> Self {
		Self {
			pool: Arc::new(pool),
		}
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
	fn database_type(&self) -> DatabaseType {
		DatabaseType::Postgres
	}

	fn placeholder(&self, index: usize) -> String {
		format!("${}", index)
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
		Ok(Box::new(PgTransactionExecutor::new(tx)))
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

/// PostgreSQL transaction executor
pub struct PgTransactionExecutor {
	tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransactionExecutor {
	pub fn new(tx: Transaction<'static, Postgres>) -> Self {
		Self { tx: Some(tx) }
	}

	fn open(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
		self.tx.as_mut().ok_or_else(|| {
			DatabaseError::TransactionError("Transaction already consumed".to_string())
		})
	}
}

#[async_trait]
impl TransactionExecutor for PgTransactionExecutor {
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
