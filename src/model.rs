//! Read-only catalog data model and the serialized result envelope.
//!
//! Entries and directories are owned by the ingestion process; nothing in this
//! crate mutates them. Timestamps are epoch seconds as stored.

use serde::{Deserialize, Serialize};

use crate::facets::{FacetCatalog, FacetId};

pub type DirectoryId = i64;
pub type EntryId = i64;

/// Node of the directory tree of one collection. `parent_id == None` is a top-level directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: DirectoryId,
    pub collection: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub parent_id: Option<DirectoryId>,
}

/// Stored entry record, as loaded by the in-memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub collection: String,
    pub path: String,
    /// `None` for entries at the collection root.
    #[serde(default)]
    pub directory_id: Option<DirectoryId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub size: i64,
    pub created: i64,
    pub modified: i64,
    #[serde(default)]
    pub updated: i64,
    #[serde(default)]
    pub game: Option<FacetId>,
    #[serde(default)]
    pub engine: Option<FacetId>,
    #[serde(default)]
    pub singleplayer: bool,
    #[serde(default)]
    pub cooperative: bool,
    #[serde(default)]
    pub deathmatch: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Body of the accompanying text file, if one was extracted.
    #[serde(default)]
    pub textfile: Option<String>,
    #[serde(default)]
    pub map_count: u32,
}

/// One row returned by a storage backend for a row query.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRow {
    pub id: EntryId,
    pub collection: String,
    pub path: String,
    pub title: Option<String>,
    pub size: i64,
    pub created: i64,
    pub modified: i64,
    pub updated: i64,
    pub game: Option<FacetId>,
    pub engine: Option<FacetId>,
    pub singleplayer: bool,
    pub cooperative: bool,
    pub deathmatch: bool,
    pub description: Option<String>,
    pub map_count: u32,
    /// Summed relevance, present only when the row query selected a score.
    pub score: Option<f64>,
}

impl EntryRow {
    /// Title for display; entries without one fall back to their path.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or(&self.path)
    }
}

/// Reduced projection used in listings and search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryTeaser {
    pub collection: String,
    pub path: String,
    pub title: String,
    pub timestamp: i64,
    pub updated: i64,
    pub game: Option<String>,
    pub is_singleplayer: bool,
    pub is_cooperative: bool,
    pub is_deathmatch: bool,
    pub description: Option<String>,
    pub map_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl EntryTeaser {
    pub fn from_row(row: EntryRow, facets: &FacetCatalog) -> Self {
        let game = row.game.and_then(|id| facets.game_token(id)).map(str::to_string);
        Self {
            title: row.display_title().to_string(),
            collection: row.collection,
            path: row.path,
            timestamp: row.modified,
            updated: row.updated,
            game,
            is_singleplayer: row.singleplayer,
            is_cooperative: row.cooperative,
            is_deathmatch: row.deathmatch,
            description: row.description,
            map_count: row.map_count,
            score: row.score,
        }
    }
}

/// Full view of a single entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDetail {
    pub collection: String,
    pub path: String,
    pub title: String,
    pub size: i64,
    pub timestamp: i64,
    pub created: i64,
    pub game: Option<String>,
    pub engine: Option<String>,
    pub is_singleplayer: bool,
    pub is_cooperative: bool,
    pub is_deathmatch: bool,
    pub description: Option<String>,
    pub map_count: u32,
}

impl EntryDetail {
    pub fn from_row(row: EntryRow, facets: &FacetCatalog) -> Self {
        Self {
            title: row.display_title().to_string(),
            game: row.game.and_then(|id| facets.game_token(id)).map(str::to_string),
            engine: row.engine.and_then(|id| facets.engine_token(id)).map(str::to_string),
            collection: row.collection,
            path: row.path,
            size: row.size,
            timestamp: row.modified,
            created: row.created,
            is_singleplayer: row.singleplayer,
            is_cooperative: row.cooperative,
            is_deathmatch: row.deathmatch,
            description: row.description,
            map_count: row.map_count,
        }
    }
}

/// Immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub name: String,
    pub path: String,
}

/// Uniform paged envelope. `offset`/`limit` echo the validated request values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    #[serde(rename = "entries")]
    pub items: Vec<T>,
    #[serde(rename = "entries_total")]
    pub total_count: u64,
    pub offset: u64,
    pub limit: u32,
    /// Immediate subdirectories; only present for directory listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directories: Option<Vec<DirectoryListing>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(title: Option<&str>) -> EntryRow {
        EntryRow {
            id: 1,
            collection: "idgames".into(),
            path: "levels/doom2/a-c/av.zip".into(),
            title: title.map(str::to_string),
            size: 1024,
            created: 100,
            modified: 90,
            updated: 120,
            game: Some(2),
            engine: Some(99),
            singleplayer: true,
            cooperative: false,
            deathmatch: true,
            description: None,
            map_count: 32,
            score: None,
        }
    }

    #[test]
    fn title_falls_back_to_path() {
        assert_eq!(row(None).display_title(), "levels/doom2/a-c/av.zip");
        assert_eq!(row(Some("  ")).display_title(), "levels/doom2/a-c/av.zip");
        assert_eq!(row(Some("Alien Vendetta")).display_title(), "Alien Vendetta");
    }

    #[test]
    fn teaser_and_detail_decode_facets() {
        let facets = FacetCatalog::builtin();
        let teaser = EntryTeaser::from_row(row(Some("Alien Vendetta")), &facets);
        assert_eq!(teaser.game.as_deref(), Some("doom2"));
        assert_eq!(teaser.timestamp, 90);

        let detail = EntryDetail::from_row(row(None), &facets);
        assert_eq!(detail.game.as_deref(), Some("doom2"));
        assert_eq!(detail.engine, None, "unknown stored engine code decodes to unspecified");
        assert_eq!(detail.title, "levels/doom2/a-c/av.zip");
    }

    #[test]
    fn envelope_field_names_are_stable() {
        let page = PagedResult::<EntryTeaser> { items: vec![], total_count: 3, offset: 0, limit: 2, directories: None };
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["entries_total"], 3);
        assert_eq!(v["limit"], 2);
        assert!(v.get("directories").is_none());
        assert!(v["entries"].as_array().unwrap().is_empty());

        let page = PagedResult::<EntryTeaser> {
            items: vec![], total_count: 0, offset: 10, limit: 50,
            directories: Some(vec![DirectoryListing { name: "doom2".into(), path: "levels/doom2".into() }]),
        };
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["directories"][0]["path"], "levels/doom2");
    }
}
