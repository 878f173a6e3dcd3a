//! Search indexes over text columns
//!
//! MySQL gets one `FULLTEXT` index per table, Postgres one trigram GIN
//! index per column. SQLite has no equivalent and is skipped. Index
//! failures are logged and never fail the migration.

use tracing::{debug, warn};

use crate::backends::{DatabaseConnection, DatabaseType};

use super::ddl::TableDef;

/// Statements dropping and recreating the search indexes of `table`
pub fn search_index_sql(db: DatabaseType, table: &TableDef) -> Vec<String> {
	let columns: Vec<&str> = table.searchable().map(|column| column.name.as_str()).collect();
	if columns.is_empty() {
		return Vec::new();
	}
	match db {
		DatabaseType::Mysql => {
			let index = db.quote(&format!("SEARCH_{}", table.name.to_uppercase()));
			let quoted: Vec<String> = columns.iter().map(|column| db.quote(column)).collect();
			vec![
				format!("DROP INDEX {} ON {}", index, db.quote(&table.name)),
				format!(
					"CREATE FULLTEXT INDEX {} ON {} ({})",
					index,
					db.quote(&table.name),
					quoted.join(", ")
				),
			]
		}
		DatabaseType::Postgres => {
			let mut statements = vec!["CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string()];
			for column in columns {
				let index = db.quote(&format!("search_{}_{}", table.name, column));
				statements.push(format!("DROP INDEX IF EXISTS {}", index));
				statements.push(format!(
					"CREATE INDEX {} ON {} USING gin ({} gin_trgm_ops)",
					index,
					db.quote(&table.name),
					db.quote(column)
				));
			}
			statements
		}
		DatabaseType::Sqlite => Vec::new(),
	}
}

/// Regenerate the search indexes of `table`
///
/// Returns the number of statements that succeeded.
pub async fn regenerate_search_indexes(conn: &DatabaseConnection, table: &TableDef) -> usize {
	let mut applied = 0;
	for sql in search_index_sql(conn.database_type(), table) {
		match conn.execute(&sql, vec![]).await {
			Ok(_) => applied += 1,
			// the MySQL index does not exist on first creation
			Err(err) if sql.starts_with("DROP INDEX") => {
				debug!(table = %table.name, error = %err, "no search index to drop");
			}
			Err(err) => {
				warn!(table = %table.name, error = %err, sql = %sql, "search index creation failed");
			}
		}
	}
	applied
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::column::ColumnKind;
	use crate::migrations::ddl::ColumnDef;
	use rstest::{fixture, rstest};

	#[fixture]
	fn table() -> TableDef {
		TableDef {
			name: "articles".into(),
			primary_key: "id".into(),
			primary_key_type: Default::default(),
			columns: vec![
				ColumnDef::new("title", ColumnKind::String),
				ColumnDef::new("rating", ColumnKind::Integer),
				ColumnDef::new("body", ColumnKind::Text),
			],
		}
	}

	#[rstest]
	fn test_mysql_fulltext_covers_text_columns(table: TableDef) {
		let sql = search_index_sql(DatabaseType::Mysql, &table);
		assert_eq!(
			sql[1],
			"CREATE FULLTEXT INDEX `SEARCH_ARTICLES` ON `articles` (`title`, `body`)"
		);
	}

	#[rstest]
	fn test_postgres_trigram_index_per_column(table: TableDef) {
		let sql = search_index_sql(DatabaseType::Postgres, &table);
		assert_eq!(sql[0], "CREATE EXTENSION IF NOT EXISTS pg_trgm");
		assert!(sql.contains(
			&r#"CREATE INDEX "search_articles_title" ON "articles" USING gin ("title" gin_trgm_ops)"#
				.to_string()
		));
		assert_eq!(sql.len(), 5);
	}

	#[rstest]
	fn test_sqlite_has_no_search_indexes(table: TableDef) {
		assert!(search_index_sql(DatabaseType::Sqlite, &table).is_empty());
	}
}
