//! Directory resolution for listings.

use tracing::debug;

use crate::error::AppResult;
use crate::model::DirectoryId;
use crate::query::compose::DirectoryRef;
use crate::storage::CatalogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Root,
    Found(DirectoryId),
    /// Terminal: the listing does not exist, as opposed to existing and being empty.
    NotFound,
}

impl Resolution {
    pub fn directory_ref(&self) -> Option<DirectoryRef> {
        match self {
            Resolution::Root => Some(DirectoryRef::Root),
            Resolution::Found(id) => Some(DirectoryRef::Id(*id)),
            Resolution::NotFound => None,
        }
    }
}

/// `path` must already be normalized. Empty resolves to the root without touching storage;
/// anything else is an exact `(collection, path)` lookup.
pub async fn resolve<S: CatalogStore>(store: &S, collection: &str, path: &str) -> AppResult<Resolution> {
    if path.is_empty() {
        return Ok(Resolution::Root);
    }
    let res = match store.find_directory(collection, path).await? {
        Some(id) => Resolution::Found(id),
        None => Resolution::NotFound,
    };
    debug!(target: "wadarchive::exec", "resolve {}:{} -> {:?}", collection, path, res);
    Ok(res)
}
