//! Conversions between driver values, sea-query values and JSON

use sea_query::{
	Expr, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder,
	Value,
};
use serde_json::Value as JsonValue;

use super::error::{DatabaseError, Result};
use super::types::{DatabaseType, QueryValue};

/// sea-query value for a bound parameter
///
/// `Null` has no typed counterpart; use [`value_expr`] where a NULL literal
/// must be written.
pub fn to_sea_value(value: &QueryValue) -> Value {
	match value {
		QueryValue::Null => Value::BigInt(None),
		QueryValue::Bool(b) => Value::Bool(Some(*b)),
		QueryValue::Int(i) => Value::BigInt(Some(*i)),
		QueryValue::Float(f) => Value::Double(Some(*f)),
		QueryValue::String(s) => Value::String(Some(s.clone())),
		QueryValue::Bytes(b) => Value::Bytes(Some(b.clone())),
		QueryValue::Timestamp(dt) => Value::ChronoDateTimeUtc(Some(*dt)),
		QueryValue::Uuid(u) => Value::Uuid(Some(*u)),
	}
}

/// Expression writing `value`, with an untyped `NULL` for nulls
pub fn value_expr(value: &QueryValue) -> Expr {
	match value {
		QueryValue::Null => Expr::cust("NULL"),
		other => Expr::val(to_sea_value(other)),
	}
}

fn from_sea_value(value: Value) -> Result<QueryValue> {
	let converted = match value {
		Value::Bool(v) => v.map(QueryValue::Bool),
		Value::TinyInt(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::SmallInt(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::Int(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::BigInt(v) => v.map(QueryValue::Int),
		Value::TinyUnsigned(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::SmallUnsigned(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::Unsigned(v) => v.map(|i| QueryValue::Int(i.into())),
		Value::BigUnsigned(v) => match v {
			Some(i) => Some(QueryValue::Int(i64::try_from(i).map_err(|_| {
				DatabaseError::TypeError(format!("{} does not fit a signed integer", i))
			})?)),
			None => None,
		},
		Value::Float(v) => v.map(|f| QueryValue::Float(f.into())),
		Value::Double(v) => v.map(QueryValue::Float),
		Value::String(v) => v.map(QueryValue::String),
		Value::Bytes(v) => v.map(QueryValue::Bytes),
		Value::ChronoDateTimeUtc(v) => v.map(QueryValue::Timestamp),
		Value::Uuid(v) => v.map(QueryValue::Uuid),
		other => {
			return Err(DatabaseError::TypeError(format!(
				"Unsupported bound value {:?}",
				other
			)));
		}
	};
	Ok(converted.unwrap_or(QueryValue::Null))
}

/// Render a sea-query statement for `db`, returning SQL and bound values
pub fn render<S: QueryStatementWriter>(db: DatabaseType, statement: &S) -> Result<(String, Vec<QueryValue>)> {
	let (sql, values) = match db {
		DatabaseType::Postgres => statement.build(PostgresQueryBuilder),
		DatabaseType::Mysql => statement.build(MysqlQueryBuilder),
		DatabaseType::Sqlite => statement.build(SqliteQueryBuilder),
	};
	let params = values
		.0
		.into_iter()
		.map(from_sea_value)
		.collect::<Result<Vec<_>>>()?;
	Ok((sql, params))
}

/// Bound value for a JSON scalar
///
/// Arrays and objects are stored as their JSON text.
///
/// # Examples
///
/// ```
/// use lattice_db::backends::types::QueryValue;
/// use lattice_db::backends::values::json_to_query_value;
/// use serde_json::json;
///
/// assert_eq!(json_to_query_value(&json!(3)), QueryValue::Int(3));
/// assert_eq!(json_to_query_value(&json!("x")), QueryValue::String("x".into()));
/// assert_eq!(json_to_query_value(&json!({"a": 1})), QueryValue::String(r#"{"a":1}"#.into()));
/// ```
pub fn json_to_query_value(value: &JsonValue) -> QueryValue {
	match value {
		JsonValue::Null => QueryValue::Null,
		JsonValue::Bool(b) => QueryValue::Bool(*b),
		JsonValue::Number(n) => match n.as_i64() {
			Some(i) => QueryValue::Int(i),
			None => QueryValue::Float(n.as_f64().unwrap_or_default()),
		},
		JsonValue::String(s) => QueryValue::String(s.clone()),
		JsonValue::Array(_) | JsonValue::Object(_) => QueryValue::String(value.to_string()),
	}
}

/// JSON form of a column value
pub fn query_value_to_json(value: &QueryValue) -> JsonValue {
	match value {
		QueryValue::Null => JsonValue::Null,
		QueryValue::Bool(b) => JsonValue::Bool(*b),
		QueryValue::Int(i) => JsonValue::from(*i),
		QueryValue::Float(f) => serde_json::Number::from_f64(*f)
			.map(JsonValue::Number)
			.unwrap_or(JsonValue::Null),
		QueryValue::String(s) => JsonValue::String(s.clone()),
		QueryValue::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
		QueryValue::Timestamp(dt) => JsonValue::String(dt.to_rfc3339()),
		QueryValue::Uuid(u) => JsonValue::String(u.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use sea_query::{Alias, ExprTrait, Query};

	#[rstest]
	fn test_render_collects_bound_values() {
		let statement = Query::select()
			.column(Alias::new("id"))
			.from(Alias::new("articles"))
			.and_where(Expr::col(Alias::new("title")).eq("Hello"))
			.and_where(Expr::col(Alias::new("rating")).gt(3))
			.to_owned();

		let (sql, params) = render(DatabaseType::Postgres, &statement).unwrap();
		assert_eq!(
			sql,
			r#"SELECT "id" FROM "articles" WHERE "title" = $1 AND "rating" > $2"#
		);
		assert_eq!(params, vec![QueryValue::String("Hello".into()), QueryValue::Int(3)]);

		let (sql, _) = render(DatabaseType::Mysql, &statement).unwrap();
		assert_eq!(sql, "SELECT `id` FROM `articles` WHERE `title` = ? AND `rating` > ?");
	}

	#[rstest]
	fn test_null_is_written_inline() {
		let statement = Query::update()
			.table(Alias::new("articles"))
			.value(Alias::new("author"), value_expr(&QueryValue::Null))
			.and_where(Expr::col(Alias::new("id")).eq(1))
			.to_owned();
		let (sql, params) = render(DatabaseType::Sqlite, &statement).unwrap();
		assert_eq!(sql, r#"UPDATE "articles" SET "author" = NULL WHERE "id" = ?"#);
		assert_eq!(params, vec![QueryValue::Int(1)]);
	}

	#[rstest]
	#[case(QueryValue::Int(4), serde_json::json!(4))]
	#[case(QueryValue::Bool(true), serde_json::json!(true))]
	#[case(QueryValue::Null, serde_json::Value::Null)]
	fn test_query_value_to_json(#[case] value: QueryValue, #[case] expected: JsonValue) {
		assert_eq!(query_value_to_json(&value), expected);
	}
}
