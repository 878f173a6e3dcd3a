//! Schema migrations
//!
//! Declared tables are derived from the registry ([`ddl`]), compared with
//! the live database ([`introspect`]) and the snapshots kept in
//! `core_store` ([`store`]), then created or altered by [`SchemaMigrator`].

pub mod column;
pub mod ddl;
pub mod error;
pub mod indexes;
pub mod introspect;
pub mod migrator;
pub mod store;

pub use column::ColumnKind;
pub use ddl::{ColumnDef, ComponentLinks, TableDef};
pub use error::{MigrationError, Result};
pub use migrator::{MigrationReport, SchemaMigrator, TableOutcome};
pub use store::{CORE_STORE_TABLE, CoreStore};
