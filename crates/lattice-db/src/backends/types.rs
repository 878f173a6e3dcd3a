//! Values, rows and statements exchanged with the drivers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::error::DatabaseError;
use lattice_conf::Engine;

/// SQL dialect of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
	Postgres,
	Sqlite,
	Mysql,
}

impl DatabaseType {
	/// Quote an identifier for this dialect
	pub fn quote(&self, ident: &str) -> String {
		match self {
			DatabaseType::Mysql => format!("`{}`", ident.replace('`', "``")),
			DatabaseType::Postgres | DatabaseType::Sqlite => {
				format!("\"{}\"", ident.replace('"', "\"\""))
			}
		}
	}
}

impl From<Engine> for DatabaseType {
	fn from(engine: Engine) -> Self {
		match engine {
			Engine::Sqlite => DatabaseType::Sqlite,
			Engine::Postgres => DatabaseType::Postgres,
			Engine::Mysql => DatabaseType::Mysql,
		}
	}
}

/// A bound parameter or a column read back from a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(DateTime<Utc>),
	Uuid(Uuid),
}

impl QueryValue {
	pub fn is_null(&self) -> bool {
		matches!(self, QueryValue::Null)
	}

	/// Text form used when comparing identifiers across types
	///
	/// `Int(2)` and `String("2")` share the key `"2"`, so ID sets read back
	/// from different drivers can be diffed.
	pub fn key(&self) -> Option<String> {
		match self {
			QueryValue::Null => None,
			QueryValue::Bool(b) => Some(b.to_string()),
			QueryValue::Int(i) => Some(i.to_string()),
			QueryValue::Float(f) => Some(f.to_string()),
			QueryValue::String(s) => Some(s.clone()),
			QueryValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
			QueryValue::Timestamp(dt) => Some(dt.to_rfc3339()),
			QueryValue::Uuid(u) => Some(u.to_string()),
		}
	}

	fn type_error(&self, target: &str) -> DatabaseError {
		DatabaseError::TypeError(format!("Cannot read {:?} as {}", self, target))
	}
}

// Record IDs are passed as integers, UUIDs or their text form
impl From<i64> for QueryValue {
	fn from(id: i64) -> Self {
		QueryValue::Int(id)
	}
}

impl From<Uuid> for QueryValue {
	fn from(id: Uuid) -> Self {
		QueryValue::Uuid(id)
	}
}

impl From<&str> for QueryValue {
	fn from(id: &str) -> Self {
		QueryValue::String(id.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(id: String) -> Self {
		QueryValue::String(id)
	}
}

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
	pub rows_affected: u64,
}

/// Rendered SQL with its bound values
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub params: Vec<QueryValue>,
}

impl Statement {
	pub fn new(sql: impl Into<String>, params: Vec<QueryValue>) -> Self {
		Self {
			sql: sql.into(),
			params,
		}
	}
}

/// One result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
	pub data: HashMap<String, QueryValue>,
}

impl Row {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: String, value: QueryValue) {
		self.data.insert(key, value);
	}

	/// Typed column access
	///
	/// # Examples
	///
	/// ```
	/// use lattice_db::backends::types::{QueryValue, Row};
	///
	/// let mut row = Row::new();
	/// row.insert("id".to_string(), QueryValue::Int(7));
	/// assert_eq!(row.get::<i64>("id").unwrap(), 7);
	/// assert!(row.get::<i64>("missing").is_err());
	/// ```
	pub fn get<T: TryFrom<QueryValue, Error = DatabaseError>>(&self, key: &str) -> Result<T, DatabaseError> {
		let value = self
			.data
			.get(key)
			.cloned()
			.ok_or_else(|| DatabaseError::ColumnNotFound(key.to_string()))?;
		T::try_from(value)
	}

	/// Raw column value
	pub fn value(&self, key: &str) -> Option<&QueryValue> {
		self.data.get(key)
	}
}

impl TryFrom<QueryValue> for i64 {
	type Error = DatabaseError;

	/// Integers, or their text form as returned for some key columns
	fn try_from(value: QueryValue) -> Result<Self, Self::Error> {
		match &value {
			QueryValue::Int(i) => Ok(*i),
			QueryValue::String(s) => s.parse().map_err(|_| value.type_error("i64")),
			_ => Err(value.type_error("i64")),
		}
	}
}

impl TryFrom<QueryValue> for u64 {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> Result<Self, Self::Error> {
		match &value {
			QueryValue::Int(i) => u64::try_from(*i).map_err(|_| value.type_error("u64")),
			_ => Err(value.type_error("u64")),
		}
	}
}

impl TryFrom<QueryValue> for String {
	type Error = DatabaseError;

	fn try_from(value: QueryValue) -> Result<Self, Self::Error> {
		match value {
			QueryValue::String(s) => Ok(s),
			QueryValue::Uuid(u) => Ok(u.to_string()),
			other => Err(other.type_error("String")),
		}
	}
}

impl TryFrom<QueryValue> for bool {
	type Error = DatabaseError;

	/// SQLite and MySQL store booleans as 0 and 1
	fn try_from(value: QueryValue) -> Result<Self, Self::Error> {
		match value {
			QueryValue::Bool(b) => Ok(b),
			QueryValue::Int(i) => Ok(i != 0),
			other => Err(other.type_error("bool")),
		}
	}
}
