//! Parameter validation
//! --------------------
//! Turns untrusted `RawParams` into a fully typed `ListQuery` or `SearchQuery`.
//! Every field is checked before failing so a single `AppError::Validation`
//! reports all violations at once. Defaults apply only when a key is absent;
//! a present-but-invalid value is always an error.
//!
//! Path normalization lives here and only here.

use std::num::IntErrorKind;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{AppError, AppResult, Violation, ViolationKind};
use crate::facets::{FacetCatalog, FacetError, FacetId, FacetKind, FacetToken, Gameplay, ListSortField, SearchField, SearchSortField, SortOrder, SortScope};
use crate::query::params::{split_list, RawParams};

pub const MAX_LIMIT: u32 = 200;
pub const DEFAULT_LIMIT: u32 = 50;

/// Word runs for search keys and for the in-memory matcher alike.
pub(crate) static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

/// Validated directory browsing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub collection: String,
    /// Normalized; empty means the collection root.
    pub path: String,
    pub sort_field: ListSortField,
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u64,
}

/// Validated faceted search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub search_key: String,
    /// Lowercased prefix tokens derived from `search_key`; never empty.
    pub tokens: Vec<String>,
    /// Never empty; defaults to title and filename.
    pub search_fields: Vec<SearchField>,
    /// Empty means every collection.
    pub collections: Vec<String>,
    /// Storage ids of the requested games.
    pub filter_game: Vec<FacetId>,
    pub filter_gameplay: Vec<Gameplay>,
    pub sort_field: SearchSortField,
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u64,
}

/// Strip trailing slashes. `"levels/"` and `"levels"` name the same directory; `"/"` is the root.
/// Nothing else is rewritten; lookups are exact.
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

/// Lowercase the key and split it into word runs; each run becomes a prefix token.
/// Everything else (whitespace, punctuation, query operators) separates tokens.
pub fn tokenize_search_key(key: &str) -> Vec<String> {
    let lower = key.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(&lower) {
        let t = m.as_str().to_string();
        if !out.contains(&t) { out.push(t); }
    }
    out
}

fn push_unique<T: PartialEq>(out: &mut Vec<T>, v: T) {
    if !out.contains(&v) { out.push(v); }
}

pub struct Validator<'a> {
    facets: &'a FacetCatalog,
}

impl<'a> Validator<'a> {
    pub fn new(facets: &'a FacetCatalog) -> Self { Self { facets } }

    /// Validate a browsing request. `collection` and `path` are read from the params like every other key.
    pub fn list_query(&self, raw: &RawParams) -> AppResult<ListQuery> {
        let mut errs: Vec<Violation> = Vec::new();

        let collection = match raw.get("collection").map(str::trim) {
            None | Some("") => {
                errs.push(Violation::new("collection", ViolationKind::MissingField, "collection is required"));
                String::new()
            }
            Some(c) => match self.facets.resolve_collection(c) {
                Ok(c) => c.to_string(),
                Err(e) => {
                    errs.push(Violation::new("collection", ViolationKind::MissingField, e.to_string()));
                    String::new()
                }
            },
        };
        let path = raw.get("path").map(normalize_path).unwrap_or_default();
        let sort_field = enum_param(raw, "sort_field", ListSortField::Title, |t| self.facets.is_valid_sort_field(SortScope::List, t), &mut errs);
        let sort_order = enum_param(raw, "sort_order", SortOrder::Asc, |_| true, &mut errs);
        let limit = limit_param(raw, &mut errs);
        let offset = offset_param(raw, &mut errs);

        if !errs.is_empty() {
            debug!(target: "wadarchive::validate", "list request rejected: {:?}", errs);
            return Err(AppError::validation(errs));
        }
        let q = ListQuery { collection, path, sort_field, sort_order, limit, offset };
        debug!(target: "wadarchive::validate", "list request: {:?}", q);
        Ok(q)
    }

    /// Convenience for route-shaped input: collection and path come from the route, the rest from the query string.
    pub fn list_request(&self, collection: &str, path: Option<&str>, query: &RawParams) -> AppResult<ListQuery> {
        let mut raw = query.clone().with("collection", collection);
        match path {
            Some(p) => raw.insert("path", p),
            None => { raw.remove("path"); }
        }
        self.list_query(&raw)
    }

    pub fn search_query(&self, raw: &RawParams) -> AppResult<SearchQuery> {
        let mut errs: Vec<Violation> = Vec::new();

        let search_key = raw.get("search_key").map(str::trim).unwrap_or("").to_string();
        let tokens = tokenize_search_key(&search_key);
        if search_key.is_empty() {
            errs.push(Violation::new("search_key", ViolationKind::MissingField, "search_key is required"));
        } else if tokens.is_empty() {
            errs.push(Violation::new("search_key", ViolationKind::MissingField, "search_key contains no searchable words"));
        }

        let mut search_fields = facet_list(raw, "search_fields", &mut errs, |t| {
            if self.facets.is_valid_search_field(t) {
                SearchField::parse_token(t)
            } else {
                Err(FacetError::UnknownToken { kind: FacetKind::SearchField, token: t.to_string() })
            }
        });
        if search_fields.is_empty() {
            search_fields = SearchField::DEFAULTS.to_vec();
        }
        let collections = facet_list(raw, "collections", &mut errs, |t| self.facets.resolve_collection(t).map(str::to_string));
        let filter_game = facet_list(raw, "filter_game", &mut errs, |t| self.facets.resolve_game(t));
        let filter_gameplay = facet_list(raw, "filter_gameplay", &mut errs, Gameplay::parse_token);
        let sort_field = enum_param(raw, "sort_field", SearchSortField::Relevance, |t| self.facets.is_valid_sort_field(SortScope::Search, t), &mut errs);
        let sort_order = enum_param(raw, "sort_order", SortOrder::Desc, |_| true, &mut errs);
        let limit = limit_param(raw, &mut errs);
        let offset = offset_param(raw, &mut errs);

        if !errs.is_empty() {
            debug!(target: "wadarchive::validate", "search request rejected: {:?}", errs);
            return Err(AppError::validation(errs));
        }
        let q = SearchQuery {
            search_key, tokens, search_fields, collections, filter_game, filter_gameplay,
            sort_field, sort_order, limit, offset,
        };
        debug!(target: "wadarchive::validate", "search request: {:?}", q);
        Ok(q)
    }
}

/// Single closed-enum value. `accept` is the catalog's say on whether the token is allowed here.
fn enum_param<T, F>(raw: &RawParams, key: &str, default: T, accept: F, errs: &mut Vec<Violation>) -> T
where
    T: FacetToken,
    F: Fn(&str) -> bool,
{
    match raw.get(key) {
        None => default,
        Some(v) => match T::from_token(v).filter(|_| accept(v)) {
            Some(t) => t,
            None => {
                errs.push(Violation::new(key, ViolationKind::InvalidEnum, format!("'{}' is not one of {}", v, T::tokens().join(", "))));
                default
            }
        },
    }
}

fn is_overflow(e: &std::num::ParseIntError) -> bool {
    matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow)
}

/// Comma-delimited facet tokens. Any unknown token rejects the request; duplicates collapse.
fn facet_list<T, F>(raw: &RawParams, key: &str, errs: &mut Vec<Violation>, resolve: F) -> Vec<T>
where
    T: PartialEq,
    F: Fn(&str) -> Result<T, FacetError>,
{
    let mut out = Vec::new();
    if let Some(v) = raw.get(key) {
        for token in split_list(v) {
            match resolve(token) {
                Ok(item) => push_unique(&mut out, item),
                Err(e) => errs.push(e.into_violation(key)),
            }
        }
    }
    out
}

fn limit_param(raw: &RawParams, errs: &mut Vec<Violation>) -> u32 {
    let Some(v) = raw.get("limit") else { return DEFAULT_LIMIT };
    match v.trim().parse::<i64>() {
        Ok(n) if n > 0 && n <= MAX_LIMIT as i64 => n as u32,
        Ok(n) => {
            errs.push(Violation::new("limit", ViolationKind::OutOfRange, format!("limit {} is outside 1..={}", n, MAX_LIMIT)));
            DEFAULT_LIMIT
        }
        Err(e) if is_overflow(&e) => {
            errs.push(Violation::new("limit", ViolationKind::OutOfRange, format!("limit {} is outside 1..={}", v.trim(), MAX_LIMIT)));
            DEFAULT_LIMIT
        }
        Err(_) => {
            errs.push(Violation::new("limit", ViolationKind::Malformed, format!("limit '{}' is not an integer", v)));
            DEFAULT_LIMIT
        }
    }
}

fn offset_param(raw: &RawParams, errs: &mut Vec<Violation>) -> u64 {
    let Some(v) = raw.get("offset") else { return 0 };
    match v.trim().parse::<i64>() {
        Ok(n) if n >= 0 => n as u64,
        Ok(n) => {
            errs.push(Violation::new("offset", ViolationKind::OutOfRange, format!("offset {} is negative", n)));
            0
        }
        Err(e) if is_overflow(&e) => {
            errs.push(Violation::new("offset", ViolationKind::OutOfRange, format!("offset {} is outside 0..={}", v.trim(), i64::MAX)));
            0
        }
        Err(_) => {
            errs.push(Violation::new("offset", ViolationKind::Malformed, format!("offset '{}' is not an integer", v)));
            0
        }
    }
}
