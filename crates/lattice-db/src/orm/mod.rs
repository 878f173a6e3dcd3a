//! Reads and writes over the resolved schema
//!
//! - [`query`]: filter, sort and pagination input turned into SQL through a
//!   [`QueryTree`] of joins
//! - [`record`]: rows as JSON records with relation IDs
//! - [`mutator`]: writes that keep relation rows consistent
//! - [`lifecycle`]: typed hooks around those writes

pub mod lifecycle;
pub mod mutator;
pub mod query;
pub mod record;
pub mod tree;

pub use lifecycle::{HookAbort, HookPoint, Lifecycle, LifecycleRegistry, LifecycleResult};
pub use mutator::{MutationError, RelationFailure, RelationMutator};
pub use query::{
	ExecutableQuery, Filter, FilterExpr, Operator, Pagination, QueryBuilder, QueryError,
	QueryRequest, SortField, SortOrder, filters_from_json,
};
pub use record::{MorphRef, Record, RecordReader};
pub use tree::{AliasCounter, ClauseGroup, QueryTree, WhereClause};
