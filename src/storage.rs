//! Storage backends for the catalog.
//!
//! A backend receives composed queries (predicate trees, never query text) and
//! returns typed rows. `MemoryStore` evaluates the trees directly and backs the
//! tests and fixture mode; `PgStore` renders them to parameterized SQL.

use std::future::Future;

use crate::error::AppResult;
use crate::model::{DirectoryId, DirectoryListing, EntryRow};
use crate::query::compose::{DirectoryQuery, EntryQuery};

pub mod memory;
pub mod postgres;
pub mod sql;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read-only access to the entry and directory relations.
pub trait CatalogStore: Send + Sync {
    /// Id of the directory stored at exactly `path` within `collection`.
    fn find_directory(&self, collection: &str, path: &str) -> impl Future<Output = AppResult<Option<DirectoryId>>> + Send;

    fn fetch_directories(&self, query: &DirectoryQuery) -> impl Future<Output = AppResult<Vec<DirectoryListing>>> + Send;

    /// Rows for a row query, ordered and paged as the query says.
    fn fetch_entries(&self, query: &EntryQuery) -> impl Future<Output = AppResult<Vec<EntryRow>>> + Send;

    /// Cardinality of a count query's filtered set.
    fn count_entries(&self, query: &EntryQuery) -> impl Future<Output = AppResult<u64>> + Send;
}
