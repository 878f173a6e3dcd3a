//! Database module: associations, backends, migrations and the ORM layer.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lattice::db::orm::{Filter, QueryRequest};
//! use lattice::db::migrations::SchemaMigrator;
//! ```

pub use lattice_db::*;
