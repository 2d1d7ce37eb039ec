#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use wadarchive::query::RawParams;
use wadarchive::storage::MemoryStore;
use wadarchive::{Catalog, FacetCatalog};

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join("catalog.json")
}

pub fn store() -> MemoryStore {
    MemoryStore::load(&fixture_path()).expect("fixture loads")
}

pub fn catalog() -> Catalog<MemoryStore> {
    Catalog::new(store(), Arc::new(FacetCatalog::builtin()))
}

pub fn params(pairs: &[(&str, &str)]) -> RawParams {
    pairs.iter().copied().collect()
}
