//! Column types per dialect

use serde::{Deserialize, Serialize};

use lattice_core::schema::{AttributeType, PrimaryKeyType};

use crate::backends::DatabaseType;

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
	String,
	Text,
	Json,
	Integer,
	BigInteger,
	Float,
	Decimal,
	Boolean,
	Date,
	Time,
	DateTime,
	/// Column holding another row's primary key
	Reference(PrimaryKeyType),
}

impl ColumnKind {
	/// Column kind for an attribute stored on its owning table
	///
	/// Returns `None` for types kept in other tables (relations, media,
	/// components, dynamic zones). Custom fields must be resolved first.
	///
	/// # Examples
	///
	/// ```
	/// use lattice_core::schema::AttributeType;
	/// use lattice_db::migrations::column::ColumnKind;
	///
	/// assert_eq!(ColumnKind::for_attribute(AttributeType::Email), Some(ColumnKind::String));
	/// assert_eq!(ColumnKind::for_attribute(AttributeType::Blocks), Some(ColumnKind::Json));
	/// assert_eq!(ColumnKind::for_attribute(AttributeType::Media), None);
	/// ```
	pub fn for_attribute(kind: AttributeType) -> Option<ColumnKind> {
		let column = match kind {
			AttributeType::String
			| AttributeType::Password
			| AttributeType::Email
			| AttributeType::Uid
			| AttributeType::Enumeration => ColumnKind::String,
			AttributeType::Text | AttributeType::RichText => ColumnKind::Text,
			AttributeType::Json | AttributeType::Blocks => ColumnKind::Json,
			AttributeType::Integer => ColumnKind::Integer,
			AttributeType::BigInteger => ColumnKind::BigInteger,
			AttributeType::Float => ColumnKind::Float,
			AttributeType::Decimal => ColumnKind::Decimal,
			AttributeType::Boolean => ColumnKind::Boolean,
			AttributeType::Date => ColumnKind::Date,
			AttributeType::Time => ColumnKind::Time,
			AttributeType::DateTime | AttributeType::Timestamp => ColumnKind::DateTime,
			AttributeType::Media
			| AttributeType::Component
			| AttributeType::DynamicZone
			| AttributeType::Relation
			| AttributeType::CustomField => return None,
		};
		Some(column)
	}

	/// Whether full-text search indexes cover this column
	pub fn is_searchable(&self) -> bool {
		matches!(self, ColumnKind::String | ColumnKind::Text)
	}

	/// SQL type for `db`
	///
	/// # Examples
	///
	/// ```
	/// use lattice_db::backends::DatabaseType;
	/// use lattice_db::migrations::column::ColumnKind;
	///
	/// assert_eq!(ColumnKind::Json.sql_type(DatabaseType::Postgres), "jsonb");
	/// assert_eq!(ColumnKind::Json.sql_type(DatabaseType::Mysql), "longtext");
	/// assert_eq!(ColumnKind::Text.sql_type(DatabaseType::Sqlite), "text");
	/// ```
	pub fn sql_type(&self, db: DatabaseType) -> &'static str {
		use DatabaseType::*;
		match (self, db) {
			(ColumnKind::String, _) => "varchar(255)",
			(ColumnKind::Text, Mysql) => "longtext",
			(ColumnKind::Text, _) => "text",
			(ColumnKind::Json, Postgres) => "jsonb",
			(ColumnKind::Json, Mysql) => "longtext",
			(ColumnKind::Json, Sqlite) => "text",
			(ColumnKind::Integer, Mysql) => "int",
			(ColumnKind::Integer, _) => "integer",
			(ColumnKind::BigInteger, _) => "bigint",
			(ColumnKind::Float, Postgres) => "double precision",
			(ColumnKind::Float, _) => "double",
			(ColumnKind::Decimal, _) => "decimal(10,2)",
			(ColumnKind::Boolean, _) => "boolean",
			(ColumnKind::Date, _) => "date",
			(ColumnKind::Time, _) => "time",
			(ColumnKind::DateTime, Postgres) => "timestamptz",
			(ColumnKind::DateTime, _) => "datetime",
			(ColumnKind::Reference(PrimaryKeyType::Integer), Mysql) => "int unsigned",
			(ColumnKind::Reference(PrimaryKeyType::Integer), _) => "integer",
			(ColumnKind::Reference(PrimaryKeyType::Uuid), Postgres) => "uuid",
			(ColumnKind::Reference(PrimaryKeyType::Uuid), _) => "char(36)",
		}
	}
}

/// Primary key column definition (type and constraints, without the name)
pub fn primary_key_sql(db: DatabaseType, pk_type: PrimaryKeyType) -> &'static str {
	match (db, pk_type) {
		(DatabaseType::Postgres, PrimaryKeyType::Integer) => "serial PRIMARY KEY",
		(DatabaseType::Postgres, PrimaryKeyType::Uuid) => {
			"uuid PRIMARY KEY DEFAULT gen_random_uuid()"
		}
		(DatabaseType::Mysql, PrimaryKeyType::Integer) => {
			"int unsigned NOT NULL AUTO_INCREMENT PRIMARY KEY"
		}
		(DatabaseType::Mysql, PrimaryKeyType::Uuid) => "char(36) NOT NULL PRIMARY KEY",
		(DatabaseType::Sqlite, PrimaryKeyType::Integer) => "integer PRIMARY KEY AUTOINCREMENT",
		(DatabaseType::Sqlite, PrimaryKeyType::Uuid) => "char(36) PRIMARY KEY",
	}
}
