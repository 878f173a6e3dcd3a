//! Shared fixtures for Lattice integration tests
//!
//! Every test runs against its own in-memory SQLite database with an
//! author/article content model linked through `authorIds`.

use lattice::conf::DatabaseConfig;
use lattice::core::schema::{AttributeDefinition, AttributeType, ModelSchema, Nature};
use lattice::{Lattice, Record, Settings};
use serde_json::Value;

pub const ARTICLE: &str = "api::article.article";
pub const AUTHOR: &str = "api::author.author";

/// Default settings over an in-memory database
pub fn settings() -> Settings {
	let mut settings = Settings::default();
	settings.database = DatabaseConfig::in_memory();
	settings
}

/// Start a runtime with the author/article model
pub async fn start(settings: Settings) -> Lattice {
	let registry = Lattice::registry_builder(&settings)
		.model(
			ModelSchema::new(AUTHOR, "authors")
				.attribute("name", AttributeDefinition::new(AttributeType::String))
				.attribute(
					"articles",
					AttributeDefinition::relation(Nature::ManyToMany, ARTICLE).with_via("authorIds"),
				),
		)
		.model(
			ModelSchema::new(ARTICLE, "articles")
				.attribute(
					"title",
					AttributeDefinition::new(AttributeType::String).required(),
				)
				.attribute("rating", AttributeDefinition::new(AttributeType::Integer))
				.attribute(
					"authorIds",
					AttributeDefinition::relation(Nature::ManyToMany, AUTHOR)
						.with_via("articles")
						.dominant(),
				),
		)
		.build()
		.expect("author/article registry is valid");
	Lattice::start(settings, registry)
		.await
		.expect("runtime starts over an in-memory database")
}

/// JSON object as a record; panics on anything else
pub fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		other => panic!("not an object: {}", other),
	}
}

/// `(article, author)` rows of the pivot behind `authorIds`
pub async fn pivot_rows(lattice: &Lattice) -> Vec<(i64, i64)> {
	let association = lattice
		.associations()
		.get(ARTICLE, "authorIds")
		.expect("authorIds is resolved");
	let pivot = association.pivot().expect("authorIds has a pivot table");
	let sql = format!(
		"SELECT {origin}, {target} FROM {table} ORDER BY {origin}, {target}",
		origin = pivot.origin_column,
		target = pivot.target_column,
		table = pivot.name,
	);
	lattice
		.connection()
		.fetch_all(&sql, vec![])
		.await
		.expect("pivot table is readable")
		.iter()
		.map(|row| {
			(
				row.get::<i64>(&pivot.origin_column).expect("origin id"),
				row.get::<i64>(&pivot.target_column).expect("target id"),
			)
		})
		.collect()
}
