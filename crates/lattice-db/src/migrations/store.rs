//! Key-value configuration table holding table snapshots

use sea_query::{Alias, Expr, ExprTrait, Query};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::backends::{DatabaseConnection, DatabaseError};

use super::column::ColumnKind;
use super::ddl::{ColumnDef, TableDef};
use super::error::Result;
use super::introspect::has_table;

pub const CORE_STORE_TABLE: &str = "core_store";

/// Access to the `core_store` table
#[derive(Debug, Clone)]
pub struct CoreStore {
	conn: DatabaseConnection,
	environment: String,
}

impl CoreStore {
	pub fn new(conn: DatabaseConnection, environment: impl Into<String>) -> Self {
		Self {
			conn,
			environment: environment.into(),
		}
	}

	fn definition() -> TableDef {
		TableDef {
			name: CORE_STORE_TABLE.to_string(),
			primary_key: "id".to_string(),
			primary_key_type: Default::default(),
			columns: vec![
				ColumnDef::new("key", ColumnKind::String),
				ColumnDef::new("value", ColumnKind::Text),
				ColumnDef::new("type", ColumnKind::String),
				ColumnDef::new("environment", ColumnKind::String),
				ColumnDef::new("tag", ColumnKind::String),
			],
		}
	}

	/// Create the table when it does not exist yet
	pub async fn ensure(&self) -> Result<()> {
		if has_table(&self.conn, CORE_STORE_TABLE).await? {
			return Ok(());
		}
		for sql in Self::definition().create_sql(self.conn.database_type()) {
			self.conn.execute(&sql, vec![]).await?;
		}
		debug!(table = CORE_STORE_TABLE, "created");
		Ok(())
	}

	/// Stored value for `key`, parsed as JSON
	pub async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
		let statement = self.conn.prepare(
			&Query::select()
				.column(Alias::new("value"))
				.from(Alias::new(CORE_STORE_TABLE))
				.and_where(Expr::col(Alias::new("key")).eq(key))
				.and_where(Expr::col(Alias::new("environment")).eq(self.environment.as_str()))
				.to_owned(),
		)?;
		let Some(row) = self.conn.query_optional(statement).await? else {
			return Ok(None);
		};
		let raw: String = row.get("value")?;
		Ok(Some(serde_json::from_str(&raw)?))
	}

	/// Insert or replace `key`
	pub async fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
		let raw = value.to_string();
		if self.get(key).await?.is_some() {
			let statement = self.conn.prepare(
				&Query::update()
					.table(Alias::new(CORE_STORE_TABLE))
					.value(Alias::new("value"), raw.as_str())
					.and_where(Expr::col(Alias::new("key")).eq(key))
					.and_where(Expr::col(Alias::new("environment")).eq(self.environment.as_str()))
					.to_owned(),
			)?;
			self.conn.run(statement).await?;
			return Ok(());
		}

		let statement = self.conn.prepare(
			&Query::insert()
				.into_table(Alias::new(CORE_STORE_TABLE))
				.columns([
					Alias::new("key"),
					Alias::new("value"),
					Alias::new("type"),
					Alias::new("environment"),
				])
				.values([
					key.into(),
					raw.into(),
					"object".into(),
					self.environment.clone().into(),
				])
				.map_err(DatabaseError::from)?
				.to_owned(),
		)?;
		self.conn.run(statement).await?;
		Ok(())
	}

	fn snapshot_key(table: &str) -> String {
		format!("db_model_{}", table)
	}

	/// Last stored definition of `table`
	pub async fn snapshot(&self, table: &str) -> Result<Option<TableDef>> {
		match self.get(&Self::snapshot_key(table)).await? {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	pub async fn save_snapshot(&self, definition: &TableDef) -> Result<()> {
		let value = serde_json::to_value(definition)?;
		self.set(&Self::snapshot_key(&definition.name), &value).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use sqlx::sqlite::SqlitePoolOptions;

	#[rstest]
	#[tokio::test]
	async fn test_snapshot_round_trip_replaces_previous_value() {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		let store = CoreStore::new(DatabaseConnection::from_sqlite_pool(pool), "test");
		store.ensure().await.unwrap();
		store.ensure().await.unwrap();

		let mut definition = TableDef {
			name: "tags".into(),
			primary_key: "id".into(),
			primary_key_type: Default::default(),
			columns: vec![ColumnDef::new("name", ColumnKind::String)],
		};
		assert!(store.snapshot("tags").await.unwrap().is_none());

		store.save_snapshot(&definition).await.unwrap();
		definition.columns[0].unique = true;
		store.save_snapshot(&definition).await.unwrap();

		assert_eq!(store.snapshot("tags").await.unwrap(), Some(definition));
	}
}
