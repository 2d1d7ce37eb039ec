//! Request handling pipeline ahead of storage: raw params, validation, and
//! composition into storage-neutral predicate trees.

pub mod params;
pub mod predicate;
pub mod validate;
pub mod compose;

pub use compose::{DirectoryQuery, DirectoryRef, EntryQuery, ListPlan, QueryComposer, QueryPair};
pub use params::RawParams;
pub use validate::{ListQuery, SearchQuery, Validator};

#[cfg(test)]
mod tests;
