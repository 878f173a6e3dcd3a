//! Live schema inspection

use crate::backends::{DatabaseConnection, DatabaseType, Result};

/// Whether `table` exists in the connected database
pub async fn has_table(conn: &DatabaseConnection, table: &str) -> Result<bool> {
	let sql = match conn.database_type() {
		DatabaseType::Sqlite => {
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?"
		}
		DatabaseType::Postgres => {
			"SELECT table_name FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1"
		}
		DatabaseType::Mysql => {
			"SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?"
		}
	};
	let row = conn.fetch_optional(sql, vec![table.into()]).await?;
	Ok(row.is_some())
}

/// Column names of `table`, in table order
pub async fn columns(conn: &DatabaseConnection, table: &str) -> Result<Vec<String>> {
	let sql = match conn.database_type() {
		DatabaseType::Sqlite => "SELECT name AS column_name FROM pragma_table_info(?) ORDER BY cid",
		DatabaseType::Postgres => {
			"SELECT column_name::text AS column_name FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position"
		}
		DatabaseType::Mysql => {
			"SELECT column_name AS column_name FROM information_schema.columns WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position"
		}
	};
	let rows = conn.fetch_all(sql, vec![table.into()]).await?;
	rows.iter()
		.map(|row| row.get::<String>("column_name"))
		.collect()
}

/// Whether `table` has `column`
pub async fn has_column(conn: &DatabaseConnection, table: &str, column: &str) -> Result<bool> {
	Ok(columns(conn, table).await?.iter().any(|name| name == column))
}
