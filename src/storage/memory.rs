//! In-memory catalog store.
//!
//! Holds the entry and directory relations behind a `parking_lot::RwLock` and
//! evaluates composed predicate trees directly. Used in fixture mode and by the
//! tests. Full-text matching mirrors the SQL backend: a field is split into
//! lowercase word runs and a token matches a word it prefixes.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::facets::SortOrder;
use crate::model::{Directory, DirectoryId, DirectoryListing, Entry, EntryRow};
use crate::query::compose::{DirectoryQuery, DirectoryRef, EntryQuery, OrderKey};
use crate::query::predicate::{Column, CompOp, MatchTerm, Operand, Predicate, ScoreExpr, Value};
use crate::query::validate::WORD_RE;
use crate::storage::CatalogStore;

/// On-disk fixture layout: `{"directories": [...], "entries": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub directories: Vec<Directory>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Default)]
struct Tables {
    directories: Vec<Directory>,
    /// Insertion order is the store's natural order.
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

/// A single column value of one row. `None` is SQL NULL.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell<'a> {
    Text(Option<&'a str>),
    Int(Option<i64>),
    Bool(bool),
}

impl Cell<'_> {
    fn is_null(&self) -> bool {
        matches!(self, Cell::Text(None) | Cell::Int(None))
    }

    /// Three-valued comparison collapsed to `None` for NULL or mismatched types.
    fn compare(&self, other: &Cell<'_>) -> Option<Ordering> {
        match (self, other) {
            (Cell::Text(Some(a)), Cell::Text(Some(b))) => Some(a.cmp(b)),
            (Cell::Int(Some(a)), Cell::Int(Some(b))) => Some(a.cmp(b)),
            (Cell::Bool(a), Cell::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn value_cell(v: &Value) -> Cell<'_> {
    match v {
        Value::Text(s) => Cell::Text(Some(s.as_str())),
        Value::Int(i) => Cell::Int(Some(*i)),
        Value::Bool(b) => Cell::Bool(*b),
    }
}

fn cell(entry: &Entry, column: Column) -> Cell<'_> {
    match column {
        Column::EntryId => Cell::Int(Some(entry.id)),
        Column::Collection => Cell::Text(Some(&entry.collection)),
        Column::DirectoryId => Cell::Int(entry.directory_id),
        Column::Path => Cell::Text(Some(&entry.path)),
        Column::Title => Cell::Text(entry.title.as_deref()),
        Column::Description => Cell::Text(entry.description.as_deref()),
        Column::FileSize => Cell::Int(Some(entry.size)),
        Column::FileModified => Cell::Int(Some(entry.modified)),
        Column::EntryCreated => Cell::Int(Some(entry.created)),
        Column::EntryUpdated => Cell::Int(Some(entry.updated)),
        Column::Game => Cell::Int(entry.game),
        Column::Engine => Cell::Int(entry.engine),
        Column::IsSingleplayer => Cell::Bool(entry.singleplayer),
        Column::IsCooperative => Cell::Bool(entry.cooperative),
        Column::IsDeathmatch => Cell::Bool(entry.deathmatch),
        Column::TextfileText => Cell::Text(entry.textfile.as_deref()),
    }
}

/// Fraction of the term's tokens that prefix some word of the column. Zero for NULL.
fn term_score(entry: &Entry, term: &MatchTerm) -> f64 {
    let Cell::Text(Some(text)) = cell(entry, term.column) else { return 0.0 };
    if term.tokens.is_empty() { return 0.0; }
    let lower = text.to_lowercase();
    let words: HashSet<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();
    let hits = term
        .tokens
        .iter()
        .filter(|t| words.iter().any(|w| w.starts_with(t.as_str())))
        .count();
    hits as f64 / term.tokens.len() as f64
}

fn score(entry: &Entry, expr: &ScoreExpr) -> f64 {
    expr.terms.iter().map(|t| term_score(entry, t)).sum()
}

fn compare_op(ord: Ordering, op: CompOp) -> bool {
    match op {
        CompOp::Gt => ord == Ordering::Greater,
        CompOp::Ge => ord != Ordering::Less,
        CompOp::Lt => ord == Ordering::Less,
        CompOp::Le => ord != Ordering::Greater,
        CompOp::Eq => ord == Ordering::Equal,
        CompOp::Ne => ord != Ordering::Equal,
    }
}

fn eval(entry: &Entry, p: &Predicate) -> bool {
    match p {
        Predicate::Match(term) => term_score(entry, term) > 0.0,
        Predicate::Equals { column, value } => cell(entry, *column).compare(&value_cell(value)) == Some(Ordering::Equal),
        Predicate::IsNull(column) => cell(entry, *column).is_null(),
        Predicate::In { column, values } => {
            let c = cell(entry, *column);
            values.iter().any(|v| c.compare(&value_cell(v)) == Some(Ordering::Equal))
        }
        Predicate::Compare { column, op, rhs } => {
            let lhs = cell(entry, *column);
            let rhs = match rhs {
                Operand::Value(v) => value_cell(v),
                Operand::Column(other) => cell(entry, *other),
            };
            lhs.compare(&rhs).map(|ord| compare_op(ord, *op)).unwrap_or(false)
        }
        Predicate::And(children) => children.iter().all(|c| eval(entry, c)),
        Predicate::Or(children) => children.iter().any(|c| eval(entry, c)),
    }
}

/// Sort key cell. Title orders by the display title, like `COALESCE(title, path)`.
fn sort_cell(entry: &Entry, column: Column) -> Cell<'_> {
    match column {
        Column::Title => Cell::Text(Some(entry.title.as_deref().filter(|t| !t.trim().is_empty()).unwrap_or(&entry.path))),
        other => cell(entry, other),
    }
}

/// NULLs first ascending, last descending.
fn order_cells(a: &Cell<'_>, b: &Cell<'_>) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn directional(ord: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

fn to_row(entry: &Entry, score: Option<f64>) -> EntryRow {
    EntryRow {
        id: entry.id,
        collection: entry.collection.clone(),
        path: entry.path.clone(),
        title: entry.title.clone(),
        size: entry.size,
        created: entry.created,
        modified: entry.modified,
        updated: entry.updated,
        game: entry.game,
        engine: entry.engine,
        singleplayer: entry.singleplayer,
        cooperative: entry.cooperative,
        deathmatch: entry.deathmatch,
        description: entry.description.clone(),
        map_count: entry.map_count,
        score,
    }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let dirs: HashSet<DirectoryId> = fixture.directories.iter().map(|d| d.id).collect();
        for e in &fixture.entries {
            if let Some(d) = e.directory_id {
                if !dirs.contains(&d) {
                    warn!(target: "wadarchive::storage", "entry {} ({}) references missing directory {}", e.id, e.path, d);
                }
            }
        }
        let store = Self::new();
        {
            let mut t = store.tables.write();
            t.directories = fixture.directories;
            t.entries = fixture.entries;
        }
        store
    }

    /// Load a JSON fixture file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::storage("fixture_unreadable", format!("{}: {}", path.display(), e)))?;
        let fixture: Fixture = serde_json::from_str(&text)
            .map_err(|e| AppError::storage("fixture_invalid", format!("{}: {}", path.display(), e)))?;
        info!(
            target: "wadarchive::storage",
            "loaded fixture {}: {} directories, {} entries",
            path.display(), fixture.directories.len(), fixture.entries.len()
        );
        Ok(Self::from_fixture(fixture))
    }

    pub fn insert_directory(&self, dir: Directory) {
        self.tables.write().directories.push(dir);
    }

    pub fn insert_entry(&self, entry: Entry) {
        self.tables.write().entries.push(entry);
    }

    pub fn entry_count(&self) -> usize {
        self.tables.read().entries.len()
    }

    fn lookup_directory(&self, collection: &str, path: &str) -> Option<DirectoryId> {
        let t = self.tables.read();
        t.directories.iter().find(|d| d.collection == collection && d.path == path).map(|d| d.id)
    }

    fn select_directories(&self, q: &DirectoryQuery) -> Vec<DirectoryListing> {
        let parent = match q.parent {
            DirectoryRef::Root => None,
            DirectoryRef::Id(id) => Some(id),
        };
        let t = self.tables.read();
        let mut out: Vec<&Directory> = t
            .directories
            .iter()
            .filter(|d| d.collection == q.collection && d.parent_id == parent)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out.into_iter().map(|d| DirectoryListing { name: d.name.clone(), path: d.path.clone() }).collect()
    }

    fn select_entries(&self, q: &EntryQuery) -> Vec<EntryRow> {
        let t = self.tables.read();
        let score_expr = q.score();
        let mut hits: Vec<(&Entry, Option<f64>)> = t
            .entries
            .iter()
            .filter(|e| eval(e, &q.filter))
            .map(|e| (e, score_expr.map(|s| score(e, s))))
            .collect();

        // Stable: ties keep insertion order.
        hits.sort_by(|(a, sa), (b, sb)| {
            for ob in &q.order_by {
                let ord = match &ob.key {
                    OrderKey::Score => sa.unwrap_or(0.0).partial_cmp(&sb.unwrap_or(0.0)).unwrap_or(Ordering::Equal),
                    OrderKey::Column(c) => order_cells(&sort_cell(a, *c), &sort_cell(b, *c)),
                };
                let ord = directional(ord, ob.order);
                if ord != Ordering::Equal { return ord; }
            }
            Ordering::Equal
        });

        let (offset, limit) = match q.page {
            Some(p) => (usize::try_from(p.offset).unwrap_or(usize::MAX), p.limit as usize),
            None => (0, usize::MAX),
        };
        hits.into_iter().skip(offset).take(limit).map(|(e, s)| to_row(e, s)).collect()
    }

    fn count(&self, q: &EntryQuery) -> u64 {
        let t = self.tables.read();
        t.entries.iter().filter(|e| eval(e, &q.filter)).count() as u64
    }
}

impl CatalogStore for MemoryStore {
    async fn find_directory(&self, collection: &str, path: &str) -> AppResult<Option<DirectoryId>> {
        Ok(self.lookup_directory(collection, path))
    }

    async fn fetch_directories(&self, query: &DirectoryQuery) -> AppResult<Vec<DirectoryListing>> {
        Ok(self.select_directories(query))
    }

    async fn fetch_entries(&self, query: &EntryQuery) -> AppResult<Vec<EntryRow>> {
        let rows = self.select_entries(query);
        debug!(target: "wadarchive::storage", "memory fetch: {} rows", rows.len());
        Ok(rows)
    }

    async fn count_entries(&self, query: &EntryQuery) -> AppResult<u64> {
        Ok(self.count(query))
    }
}
