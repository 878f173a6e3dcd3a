//! Database errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
	#[error("Database driver error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Query build error: {0}")]
	QueryBuild(String),

	#[error("Type conversion error: {0}")]
	TypeError(String),

	#[error("Column not found: {0}")]
	ColumnNotFound(String),

	#[error("Transaction error: {0}")]
	TransactionError(String),

	#[error("Record not found: {0}")]
	NotFound(String),

	#[error("Unsupported feature: {0}")]
	UnsupportedFeature(String),
}

impl From<sea_query::error::Error> for DatabaseError {
	fn from(err: sea_query::error::Error) -> Self {
		DatabaseError::QueryBuild(err.to_string())
	}
}

impl DatabaseError {
	/// Whether the driver reported a unique constraint violation
	pub fn is_unique_violation(&self) -> bool {
		match self {
			DatabaseError::Sqlx(sqlx::Error::Database(db)) => {
				matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
					|| db.message().contains("UNIQUE constraint failed")
			}
			_ => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
