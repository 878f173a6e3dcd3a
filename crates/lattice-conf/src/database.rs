//! Database connection settings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
	#[serde(alias = "sqlite3")]
	Sqlite,
	#[serde(alias = "postgresql", alias = "pg")]
	Postgres,
	#[serde(alias = "mariadb")]
	Mysql,
}

impl Engine {
	/// URL scheme understood by the drivers
	pub fn scheme(&self) -> &'static str {
		match self {
			Engine::Sqlite => "sqlite",
			Engine::Postgres => "postgres",
			Engine::Mysql => "mysql",
		}
	}

	/// Engine of a connection URL, judged by its scheme
	pub fn from_url(url: &str) -> Option<Engine> {
		let scheme = url.split(':').next()?;
		match scheme {
			"sqlite" => Some(Engine::Sqlite),
			"postgres" | "postgresql" => Some(Engine::Postgres),
			"mysql" | "mariadb" => Some(Engine::Mysql),
			_ => None,
		}
	}
}

impl fmt::Display for Engine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.scheme())
	}
}

/// Database connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
	pub engine: Engine,

	/// Database name, or file path for SQLite
	pub name: String,

	#[serde(default)]
	pub user: Option<String>,

	#[serde(default)]
	pub password: Option<String>,

	#[serde(default)]
	pub host: Option<String>,

	#[serde(default)]
	pub port: Option<u16>,

	/// Extra URL query parameters
	#[serde(default)]
	pub options: BTreeMap<String, String>,

	/// Upper bound of pooled connections
	#[serde(default = "default_max_connections")]
	pub max_connections: u32,
}

fn default_max_connections() -> u32 {
	5
}

impl DatabaseConfig {
	/// SQLite database stored at `name`, or in memory for `:memory:`
	///
	/// # Examples
	///
	/// ```
	/// use lattice_conf::{DatabaseConfig, Engine};
	///
	/// let db = DatabaseConfig::sqlite("content.db");
	/// assert_eq!(db.engine, Engine::Sqlite);
	/// assert!(db.user.is_none());
	/// ```
	pub fn sqlite(name: impl Into<String>) -> Self {
		Self {
			engine: Engine::Sqlite,
			name: name.into(),
			user: None,
			password: None,
			host: None,
			port: None,
			options: BTreeMap::new(),
			max_connections: default_max_connections(),
		}
	}

	/// In-memory SQLite database
	pub fn in_memory() -> Self {
		let mut config = Self::sqlite(":memory:");
		// each pooled connection would otherwise see its own empty database
		config.max_connections = 1;
		config
	}

	/// PostgreSQL server database
	pub fn postgres(
		name: impl Into<String>,
		user: impl Into<String>,
		password: impl Into<String>,
		host: impl Into<String>,
		port: u16,
	) -> Self {
		Self::server(Engine::Postgres, name, user, password, host, port)
	}

	/// MySQL or MariaDB server database
	pub fn mysql(
		name: impl Into<String>,
		user: impl Into<String>,
		password: impl Into<String>,
		host: impl Into<String>,
		port: u16,
	) -> Self {
		Self::server(Engine::Mysql, name, user, password, host, port)
	}

	fn server(
		engine: Engine,
		name: impl Into<String>,
		user: impl Into<String>,
		password: impl Into<String>,
		host: impl Into<String>,
		port: u16,
	) -> Self {
		Self {
			engine,
			name: name.into(),
			user: Some(user.into()),
			password: Some(password.into()),
			host: Some(host.into()),
			port: Some(port),
			options: BTreeMap::new(),
			max_connections: default_max_connections(),
		}
	}

	pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.options.insert(key.into(), value.into());
		self
	}

	/// Connection URL
	///
	/// # Examples
	///
	/// ```
	/// use lattice_conf::DatabaseConfig;
	///
	/// assert_eq!(DatabaseConfig::sqlite("content.db").to_url(), "sqlite:content.db");
	/// assert_eq!(DatabaseConfig::in_memory().to_url(), "sqlite::memory:");
	/// assert_eq!(
	///     DatabaseConfig::postgres("cms", "app", "secret", "db", 5432).to_url(),
	///     "postgres://app:secret@db:5432/cms"
	/// );
	/// ```
	pub fn to_url(&self) -> String {
		let mut url = match self.engine {
			Engine::Sqlite if self.name == ":memory:" => "sqlite::memory:".to_string(),
			Engine::Sqlite if Path::new(&self.name).is_absolute() => format!("sqlite://{}", self.name),
			Engine::Sqlite => format!("sqlite:{}", self.name),
			Engine::Postgres | Engine::Mysql => {
				let mut url = format!("{}://", self.engine.scheme());
				if let Some(user) = &self.user {
					url.push_str(user);
					if let Some(password) = &self.password {
						url.push(':');
						url.push_str(password);
					}
					url.push('@');
				}
				url.push_str(self.host.as_deref().unwrap_or("localhost"));
				if let Some(port) = self.port {
					url.push(':');
					url.push_str(&port.to_string());
				}
				url.push('/');
				url.push_str(&self.name);
				url
			}
		};

		if !self.options.is_empty() {
			let query: Vec<String> = self
				.options
				.iter()
				.map(|(key, value)| format!("{}={}", key, value))
				.collect();
			url.push('?');
			url.push_str(&query.join("&"));
		}
		url
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self::sqlite("lattice.db")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("sqlite::memory:", Some(Engine::Sqlite))]
	#[case("postgresql://localhost/cms", Some(Engine::Postgres))]
	#[case("mariadb://localhost/cms", Some(Engine::Mysql))]
	#[case("redis://localhost", None)]
	fn test_engine_from_url(#[case] url: &str, #[case] expected: Option<Engine>) {
		assert_eq!(Engine::from_url(url), expected);
	}

	#[rstest]
	fn test_url_with_options_is_ordered() {
		let db = DatabaseConfig::mysql("cms", "root", "pw", "localhost", 3306)
			.with_option("ssl-mode", "required")
			.with_option("charset", "utf8mb4");
		assert_eq!(
			db.to_url(),
			"mysql://root:pw@localhost:3306/cms?charset=utf8mb4&ssl-mode=required"
		);
	}

	#[rstest]
	fn test_sqlite_absolute_path() {
		let db = DatabaseConfig::sqlite("/var/lib/cms.db");
		assert_eq!(db.to_url(), "sqlite:///var/lib/cms.db");
	}

	#[rstest]
	fn test_in_memory_uses_single_connection() {
		assert_eq!(DatabaseConfig::in_memory().max_connections, 1);
	}
}
