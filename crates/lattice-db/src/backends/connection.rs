//! Database connection management

use sea_query::QueryStatementWriter;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use lattice_conf::{DatabaseConfig, Engine};

use super::{
	backend::{DatabaseBackend, TransactionExecutor},
	dialect::{MySqlBackend, PostgresBackend, SqliteBackend},
	error::{DatabaseError, Result},
	types::{DatabaseType, QueryResult, QueryValue, Row, Statement},
	values::render,
};

/// Database connection wrapper
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Clone)]
pub struct DatabaseConnection {
	backend: Arc<dyn DatabaseBackend>,
}

impl DatabaseConnection {
	pub fn new(backend: Arc<dyn DatabaseBackend>) -> Self {
		Self { backend }
	}

	/// Connect with the default pool size, choosing the driver from the URL scheme
	pub async fn connect(url: &str) -> Result<Self> {
		Self::connect_with(url, 5).await
	}

	/// Connect from settings
	///
	/// # Examples
	///
	/// ```
	/// use lattice_conf::DatabaseConfig;
	/// use lattice_db::backends::{DatabaseConnection, DatabaseType};
	///
	/// # tokio_test::block_on(async {
	/// let conn = DatabaseConnection::from_config(&DatabaseConfig::in_memory()).await.unwrap();
	/// assert_eq!(conn.database_type(), DatabaseType::Sqlite);
	/// # });
	/// ```
	pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
		Self::connect_with(&config.to_url(), config.max_connections).await
	}

	async fn connect_with(url: &str, max_connections: u32) -> Result<Self> {
		let engine = Engine::from_url(url).ok_or_else(|| {
			DatabaseError::UnsupportedFeature(format!("Unrecognised database URL scheme in {}", url))
		})?;
		let backend: Arc<dyn DatabaseBackend> = match engine {
			Engine::Sqlite => {
				let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
				let mut pool = SqlitePoolOptions::new().max_connections(max_connections);
				if url.contains(":memory:") {
					// a closed connection takes its in-memory database with it
					pool = pool.idle_timeout(None).max_lifetime(None);
				}
				Arc::new(SqliteBackend::new(pool.connect_with(options).await?))
			}
			Engine::Postgres => {
				let pool = PgPoolOptions::new()
					.max_connections(max_connections)
					.connect(url)
					.await?;
				Arc::new(PostgresBackend::new(pool))
			}
			Engine::Mysql => {
				let pool = MySqlPoolOptions::new()
					.max_connections(max_connections)
					.connect(url)
					.await?;
				Arc::new(MySqlBackend::new(pool))
			}
		};
		info!(engine = %engine, max_connections, "database connected");
		Ok(Self { backend })
	}

	pub fn from_sqlite_pool(pool: sqlx::SqlitePool) -> Self {
		Self {
			backend: Arc::new(SqliteBackend::new(pool)),
		}
	}

	pub fn backend(&self) -> Arc<dyn DatabaseBackend> {
		self.backend.clone()
	}

	pub fn database_type(&self) -> DatabaseType {
		self.backend.database_type()
	}

	pub async fn execute(&self, sql: &str, params: Vec<QueryValue>) -> Result<QueryResult> {
		self.backend.execute(sql, params).await
	}

	pub async fn fetch_one(&self, sql: &str, params: Vec<QueryValue>) -> Result<Row> {
		self.backend.fetch_one(sql, params).await
	}

	pub async fn fetch_all(&self, sql: &str, params: Vec<QueryValue>) -> Result<Vec<Row>> {
		self.backend.fetch_all(sql, params).await
	}

	pub async fn fetch_optional(&self, sql: &str, params: Vec<QueryValue>) -> Result<Option<Row>> {
		self.backend.fetch_optional(sql, params).await
	}

	pub async fn begin(&self) -> Result<Box<dyn TransactionExecutor>> {
		self.backend.begin().await
	}

	/// Render a sea-query statement for this connection's dialect
	pub fn prepare<S: QueryStatementWriter>(&self, statement: &S) -> Result<Statement> {
		let (sql, params) = render(self.database_type(), statement)?;
		Ok(Statement { sql, params })
	}

	pub async fn run(&self, statement: Statement) -> Result<QueryResult> {
		debug!(sql = %statement.sql, "execute");
		self.backend.execute(&statement.sql, statement.params).await
	}

	pub async fn query_all(&self, statement: Statement) -> Result<Vec<Row>> {
		debug!(sql = %statement.sql, "fetch_all");
		self.backend.fetch_all(&statement.sql, statement.params).await
	}

	pub async fn query_optional(&self, statement: Statement) -> Result<Option<Row>> {
		debug!(sql = %statement.sql, "fetch_optional");
		self.backend.fetch_optional(&statement.sql, statement.params).await
	}

	pub async fn query_one(&self, statement: Statement) -> Result<Row> {
		debug!(sql = %statement.sql, "fetch_one");
		self.backend.fetch_one(&statement.sql, statement.params).await
	}
}

impl std::fmt::Debug for DatabaseConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DatabaseConnection")
			.field("database_type", &self.database_type())
			.finish()
	}
}
