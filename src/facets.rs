//! Facet catalog
//! -------------
//! Single source of truth for every controlled-vocabulary token a request may
//! carry: collections, game and engine codes, gameplay modes, sort fields,
//! search fields. Field-like facets are closed Rust enums (they map to storage
//! columns); data-like facets (collections, games, engines) come from a table
//! of `{token, id}` pairs that may be overridden from a JSON file at startup.
//!
//! Game and engine tables evolved over time, so each is stored as a list of
//! versioned enumerations. The most complete one is canonical and is the only
//! one user tokens are validated against. Decoding a stored id falls back to
//! older enumerations and finally to "unspecified".

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Violation, ViolationKind};
use crate::query::predicate::Column;

/// Internal storage identifier of a game or engine.
pub type FacetId = i64;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Collection,
    Game,
    Engine,
    Gameplay,
    SortField,
    SortOrder,
    SearchField,
}

impl Display for FacetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FacetKind::Collection => "collection",
            FacetKind::Game => "game",
            FacetKind::Engine => "engine",
            FacetKind::Gameplay => "gameplay",
            FacetKind::SortField => "sort field",
            FacetKind::SortOrder => "sort order",
            FacetKind::SearchField => "search field",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FacetError {
    #[error("unknown {kind} '{token}'")]
    UnknownToken { kind: FacetKind, token: String },
    #[error("invalid facet catalog: {0}")]
    Invalid(String),
    #[error("reading facet catalog {}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("parsing facet catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FacetError {
    /// Report against a request field. Only token errors are client errors.
    pub fn into_violation(self, field: &str) -> Violation {
        let kind = match &self {
            FacetError::UnknownToken { .. } => ViolationKind::UnknownFacet,
            _ => ViolationKind::Malformed,
        };
        Violation::new(field, kind, self.to_string())
    }
}

/// A closed enumeration addressed by a fixed lowercase token.
pub trait FacetToken: Sized + Copy + PartialEq + 'static {
    const KIND: FacetKind;
    const TABLE: &'static [(&'static str, Self)];

    fn from_token(token: &str) -> Option<Self> {
        Self::TABLE.iter().find(|(t, _)| *t == token).map(|(_, v)| *v)
    }

    fn parse_token(token: &str) -> Result<Self, FacetError> {
        Self::from_token(token).ok_or_else(|| FacetError::UnknownToken { kind: Self::KIND, token: token.to_string() })
    }

    fn token(&self) -> &'static str {
        Self::TABLE.iter().find(|(_, v)| v == self).map(|(t, _)| *t).unwrap_or("")
    }

    fn tokens() -> Vec<&'static str> {
        Self::TABLE.iter().map(|(t, _)| *t).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder { Asc, Desc }

impl FacetToken for SortOrder {
    const KIND: FacetKind = FacetKind::SortOrder;
    const TABLE: &'static [(&'static str, Self)] = &[("asc", SortOrder::Asc), ("desc", SortOrder::Desc)];
}

/// Sortable fields when browsing a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSortField { Title, Date }

impl FacetToken for ListSortField {
    const KIND: FacetKind = FacetKind::SortField;
    const TABLE: &'static [(&'static str, Self)] = &[("title", ListSortField::Title), ("date", ListSortField::Date)];
}

impl ListSortField {
    pub fn column(&self) -> Column {
        match self {
            ListSortField::Title => Column::Title,
            ListSortField::Date => Column::FileModified,
        }
    }
}

/// Sortable fields for search results. `Relevance` orders by the summed match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSortField { Relevance, Title, Updated }

impl FacetToken for SearchSortField {
    const KIND: FacetKind = FacetKind::SortField;
    const TABLE: &'static [(&'static str, Self)] = &[
        ("relevance", SearchSortField::Relevance),
        ("title", SearchSortField::Title),
        ("updated", SearchSortField::Updated),
    ];
}

impl SearchSortField {
    /// Column to order by; `None` for relevance.
    pub fn column(&self) -> Option<Column> {
        match self {
            SearchSortField::Relevance => None,
            SearchSortField::Title => Some(Column::Title),
            SearchSortField::Updated => Some(Column::EntryUpdated),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField { Title, Description, Filename, Textfile }

impl FacetToken for SearchField {
    const KIND: FacetKind = FacetKind::SearchField;
    const TABLE: &'static [(&'static str, Self)] = &[
        ("title", SearchField::Title),
        ("description", SearchField::Description),
        ("filename", SearchField::Filename),
        ("textfile", SearchField::Textfile),
    ];
}

impl SearchField {
    pub const DEFAULTS: [SearchField; 2] = [SearchField::Title, SearchField::Filename];

    pub fn column(&self) -> Column {
        match self {
            SearchField::Title => Column::Title,
            SearchField::Description => Column::Description,
            SearchField::Filename => Column::Path,
            SearchField::Textfile => Column::TextfileText,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gameplay { Singleplayer, Cooperative, Deathmatch }

impl FacetToken for Gameplay {
    const KIND: FacetKind = FacetKind::Gameplay;
    const TABLE: &'static [(&'static str, Self)] = &[
        ("singleplayer", Gameplay::Singleplayer),
        ("cooperative", Gameplay::Cooperative),
        ("deathmatch", Gameplay::Deathmatch),
    ];
}

impl Gameplay {
    pub fn column(&self) -> Column {
        match self {
            Gameplay::Singleplayer => Column::IsSingleplayer,
            Gameplay::Cooperative => Column::IsCooperative,
            Gameplay::Deathmatch => Column::IsDeathmatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortScope { List, Search }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub token: String,
    pub id: FacetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    pub version: u32,
    pub values: Vec<FacetValue>,
}

impl Enumeration {
    fn id_of(&self, token: &str) -> Option<FacetId> {
        self.values.iter().find(|v| v.token == token).map(|v| v.id)
    }

    fn token_of(&self, id: FacetId) -> Option<&str> {
        self.values.iter().find(|v| v.id == id).map(|v| v.token.as_str())
    }
}

/// Serialized form of the catalog data, as read from `WADARCHIVE_FACETS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetData {
    pub collections: Vec<String>,
    pub games: Vec<Enumeration>,
    pub engines: Vec<Enumeration>,
}

fn enumeration(version: u32, values: &[(FacetId, &str)]) -> Enumeration {
    Enumeration {
        version,
        values: values.iter().map(|(id, token)| FacetValue { token: token.to_string(), id: *id }).collect(),
    }
}

impl FacetData {
    /// Built-in tables. Version 1 is the older, shorter enumeration still found in stored data.
    pub fn builtin() -> Self {
        let games_v1: &[(FacetId, &str)] = &[
            (1, "doom"), (2, "doom2"), (3, "tnt"), (4, "plutonia"), (5, "heretic"),
            (6, "hexen"), (7, "strife"), (8, "chex_quest"), (9, "hacx"),
        ];
        let mut games_v2 = games_v1.to_vec();
        games_v2.push((10, "doom64"));

        let engines_v1: &[(FacetId, &str)] = &[
            (1, "doom"), (2, "heretic"), (3, "hexen"), (4, "strife"), (5, "no_limits"),
            (6, "boom"), (7, "mbf"), (8, "zdoom"), (9, "gzdoom"), (10, "doom_legacy"),
            (11, "skulltag"), (12, "zdaemon"), (13, "doomsday"), (14, "edge"), (15, "eternity"),
            (16, "doom_retro"), (17, "zandronum"),
        ];
        let mut engines_v2 = engines_v1.to_vec();
        engines_v2.extend_from_slice(&[(18, "odamex"), (19, "doom64"), (20, "doom64ex")]);

        Self {
            collections: vec!["idgames".to_string()],
            games: vec![enumeration(1, games_v1), enumeration(2, &games_v2)],
            engines: vec![enumeration(1, engines_v1), enumeration(2, &engines_v2)],
        }
    }
}

/// A facet with one or more versioned enumerations; `versions[0]` is canonical.
#[derive(Debug, Clone)]
struct VersionedFacet {
    kind: FacetKind,
    versions: Vec<Enumeration>,
}

impl VersionedFacet {
    fn new(kind: FacetKind, mut versions: Vec<Enumeration>) -> Result<Self, FacetError> {
        if versions.is_empty() {
            return Err(FacetError::Invalid(format!("no {kind} enumeration")));
        }
        for e in &versions {
            let mut tokens = HashSet::new();
            let mut ids = HashSet::new();
            for v in &e.values {
                if !TOKEN_RE.is_match(&v.token) {
                    return Err(FacetError::Invalid(format!("{kind} token '{}' in version {} is not lowercase [a-z0-9_]", v.token, e.version)));
                }
                if v.id <= 0 {
                    return Err(FacetError::Invalid(format!("{kind} id {} in version {} must be positive (0 means unspecified)", v.id, e.version)));
                }
                if !tokens.insert(v.token.as_str()) || !ids.insert(v.id) {
                    return Err(FacetError::Invalid(format!("duplicate {kind} '{}' in version {}", v.token, e.version)));
                }
            }
        }
        // Most complete first; newer version wins a tie.
        versions.sort_by(|a, b| b.values.len().cmp(&a.values.len()).then(b.version.cmp(&a.version)));
        Ok(Self { kind, versions })
    }

    fn canonical(&self) -> &Enumeration { &self.versions[0] }

    fn resolve(&self, token: &str) -> Result<FacetId, FacetError> {
        self.canonical()
            .id_of(token)
            .ok_or_else(|| FacetError::UnknownToken { kind: self.kind, token: token.to_string() })
    }

    fn decode(&self, id: FacetId) -> Option<&str> {
        if id == 0 { return None; }
        for e in &self.versions {
            if let Some(t) = e.token_of(id) { return Some(t); }
        }
        warn!(target: "wadarchive::facets", "stored {} code {} is not in any enumeration; treating as unspecified", self.kind, id);
        None
    }
}

/// Immutable after construction. Share as `Arc<FacetCatalog>`.
#[derive(Debug, Clone)]
pub struct FacetCatalog {
    collections: Vec<String>,
    games: VersionedFacet,
    engines: VersionedFacet,
}

impl FacetCatalog {
    pub fn builtin() -> Self {
        // Built-in data is validated by the unit tests below.
        Self::from_data(FacetData::builtin()).unwrap_or_else(|e| unreachable!("built-in facet data is invalid: {e}"))
    }

    pub fn from_data(data: FacetData) -> Result<Self, FacetError> {
        if data.collections.is_empty() {
            return Err(FacetError::Invalid("at least one collection is required".into()));
        }
        let mut seen = HashSet::new();
        for c in &data.collections {
            if !TOKEN_RE.is_match(c) {
                return Err(FacetError::Invalid(format!("collection '{c}' is not lowercase [a-z0-9_]")));
            }
            if !seen.insert(c.as_str()) {
                return Err(FacetError::Invalid(format!("duplicate collection '{c}'")));
            }
        }
        let catalog = Self {
            collections: data.collections,
            games: VersionedFacet::new(FacetKind::Game, data.games)?,
            engines: VersionedFacet::new(FacetKind::Engine, data.engines)?,
        };
        debug!(
            target: "wadarchive::facets",
            "facet catalog: collections={:?} games=v{} ({} values) engines=v{} ({} values)",
            catalog.collections,
            catalog.games.canonical().version, catalog.games.canonical().values.len(),
            catalog.engines.canonical().version, catalog.engines.canonical().values.len()
        );
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, FacetError> {
        let text = std::fs::read_to_string(path).map_err(|source| FacetError::Io { path: path.to_path_buf(), source })?;
        let data: FacetData = serde_json::from_str(&text)?;
        Self::from_data(data)
    }

    pub fn collections(&self) -> &[String] { &self.collections }

    pub fn resolve_collection(&self, token: &str) -> Result<&str, FacetError> {
        self.collections
            .iter()
            .find(|c| c.as_str() == token)
            .map(|c| c.as_str())
            .ok_or_else(|| FacetError::UnknownToken { kind: FacetKind::Collection, token: token.to_string() })
    }

    /// Map a user-facing game token to its storage id (canonical enumeration only).
    pub fn resolve_game(&self, token: &str) -> Result<FacetId, FacetError> {
        self.games.resolve(token)
    }

    /// Decode a stored game code. Unknown legacy codes decode to `None`.
    pub fn game_token(&self, id: FacetId) -> Option<&str> {
        self.games.decode(id)
    }

    pub fn engine_token(&self, id: FacetId) -> Option<&str> {
        self.engines.decode(id)
    }

    pub fn is_valid_sort_field(&self, scope: SortScope, token: &str) -> bool {
        match scope {
            SortScope::List => ListSortField::from_token(token).is_some(),
            SortScope::Search => SearchSortField::from_token(token).is_some(),
        }
    }

    pub fn is_valid_search_field(&self, token: &str) -> bool {
        SearchField::from_token(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_valid_and_canonical_is_most_complete() {
        let data = FacetData::builtin();
        let catalog = FacetCatalog::from_data(data).expect("builtin facets");
        assert_eq!(catalog.resolve_game("doom2").unwrap(), 2);
        assert_eq!(catalog.resolve_game("doom64").unwrap(), 10);
        assert_eq!(catalog.games.canonical().values.len(), 10);
        assert_eq!(catalog.engines.resolve("odamex").unwrap(), 18);
    }

    #[test]
    fn unknown_tokens_are_errors() {
        let catalog = FacetCatalog::builtin();
        match catalog.resolve_game("quake") {
            Err(FacetError::UnknownToken { kind, token }) => {
                assert_eq!(kind, FacetKind::Game);
                assert_eq!(token, "quake");
            }
            other => panic!("expected unknown token, got {:?}", other),
        }
        assert!(catalog.resolve_game("Doom2").is_err(), "tokens are case-sensitive");
        assert!(catalog.resolve_collection("cdrom").is_err());
        assert_eq!(catalog.resolve_collection("idgames").unwrap(), "idgames");
    }

    #[test]
    fn decode_falls_back_then_unspecified() {
        let data = FacetData {
            collections: vec!["idgames".into()],
            games: vec![
                enumeration(1, &[(1, "doom"), (11, "legacy_only")]),
                enumeration(2, &[(1, "doom"), (2, "doom2"), (3, "tnt")]),
            ],
            engines: vec![enumeration(1, &[(1, "doom")])],
        };
        let catalog = FacetCatalog::from_data(data).unwrap();
        assert_eq!(catalog.game_token(2), Some("doom2"));
        assert_eq!(catalog.game_token(11), Some("legacy_only"));
        assert_eq!(catalog.game_token(0), None);
        assert_eq!(catalog.game_token(99), None);
        // Legacy-only tokens are not accepted as user input.
        assert!(catalog.resolve_game("legacy_only").is_err());
    }

    #[test]
    fn field_whitelists() {
        let catalog = FacetCatalog::builtin();
        assert!(catalog.is_valid_sort_field(SortScope::List, "date"));
        assert!(!catalog.is_valid_sort_field(SortScope::List, "relevance"));
        assert!(catalog.is_valid_sort_field(SortScope::Search, "relevance"));
        assert!(catalog.is_valid_sort_field(SortScope::Search, "updated"));
        assert!(!catalog.is_valid_sort_field(SortScope::Search, "date"));
        assert!(catalog.is_valid_search_field("textfile"));
        assert!(!catalog.is_valid_search_field("author"));
        assert_eq!(SearchField::Filename.column(), Column::Path);
        assert_eq!(Gameplay::Deathmatch.token(), "deathmatch");
        assert_eq!(SortOrder::tokens(), vec!["asc", "desc"]);
    }

    #[test]
    fn rejects_bad_data() {
        let mut data = FacetData::builtin();
        data.collections.clear();
        assert!(matches!(FacetCatalog::from_data(data), Err(FacetError::Invalid(_))));

        let mut data = FacetData::builtin();
        data.games[0].values.push(FacetValue { token: "doom".into(), id: 42 });
        assert!(matches!(FacetCatalog::from_data(data), Err(FacetError::Invalid(_))));

        let mut data = FacetData::builtin();
        data.engines[1].values.push(FacetValue { token: "Bad Token".into(), id: 77 });
        assert!(matches!(FacetCatalog::from_data(data), Err(FacetError::Invalid(_))));

        let mut data = FacetData::builtin();
        data.games.clear();
        assert!(matches!(FacetCatalog::from_data(data), Err(FacetError::Invalid(_))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facets.json");
        let mut data = FacetData::builtin();
        data.collections.push("cdrom".into());
        std::fs::write(&path, serde_json::to_string_pretty(&data).unwrap()).unwrap();
        let catalog = FacetCatalog::load(&path).unwrap();
        assert_eq!(catalog.collections(), &["idgames".to_string(), "cdrom".to_string()]);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FacetCatalog::load(&path), Err(FacetError::Parse(_))));
        assert!(matches!(FacetCatalog::load(&dir.path().join("missing.json")), Err(FacetError::Io { .. })));
    }

    #[test]
    fn unknown_token_becomes_unknown_facet_violation() {
        let v = FacetCatalog::builtin().resolve_game("quake").unwrap_err().into_violation("filter_game");
        assert_eq!(v.kind, ViolationKind::UnknownFacet);
        assert_eq!(v.field, "filter_game");
        assert!(v.message.contains("quake"));
    }
}
