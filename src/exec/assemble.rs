//! Result assembly: validated query in, `PagedResult` out.
//!
//! `Catalog` is the request-facing service. It owns a storage backend and the
//! shared, immutable facet catalog, and runs each request through
//! validate -> resolve -> compose -> execute. Row and count queries of one
//! request are issued concurrently; either failing fails the request.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::{try_join, try_join3};
use tracing::debug;

use crate::error::{AppError, AppResult, Violation, ViolationKind};
use crate::exec::resolve::resolve;
use crate::facets::FacetCatalog;
use crate::model::{EntryDetail, EntryRow, EntryTeaser, PagedResult};
use crate::query::compose::{EntryQuery, QueryComposer};
use crate::query::{ListQuery, RawParams, SearchQuery, Validator};
use crate::settings::FeedSettings;
use crate::storage::CatalogStore;

pub struct Catalog<S> {
    store: S,
    facets: Arc<FacetCatalog>,
    feeds: FeedSettings,
}

impl<S: CatalogStore> Catalog<S> {
    pub fn new(store: S, facets: Arc<FacetCatalog>) -> Self {
        Self { store, facets, feeds: FeedSettings::default() }
    }

    pub fn with_feeds(mut self, feeds: FeedSettings) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn facets(&self) -> &FacetCatalog { &self.facets }

    pub fn store(&self) -> &S { &self.store }

    fn validator(&self) -> Validator<'_> { Validator::new(&self.facets) }

    fn composer(&self) -> QueryComposer { QueryComposer::new() }

    fn teasers(&self, rows: Vec<EntryRow>) -> Vec<EntryTeaser> {
        rows.into_iter().map(|r| EntryTeaser::from_row(r, &self.facets)).collect()
    }

    /// Browse one directory: a page of its entries, the total, and all its immediate subdirectories.
    pub async fn list(&self, q: &ListQuery) -> AppResult<PagedResult<EntryTeaser>> {
        let resolution = resolve(&self.store, &q.collection, &q.path).await?;
        let Some(at) = resolution.directory_ref() else {
            return Err(AppError::not_found(
                "no_such_listing",
                format!("no directory '{}' in collection '{}'", q.path, q.collection),
            ));
        };
        let plan = self.composer().compose_list(q, at);
        let (rows, total, directories) = try_join3(
            self.store.fetch_entries(&plan.entries.rows),
            self.store.count_entries(&plan.entries.count),
            self.store.fetch_directories(&plan.directories),
        )
        .await?;
        debug!(
            target: "wadarchive::exec",
            "list {}:'{}' -> {} of {} entries, {} directories", q.collection, q.path, rows.len(), total, directories.len()
        );
        Ok(PagedResult {
            items: self.teasers(rows),
            total_count: total,
            offset: q.offset,
            limit: q.limit,
            directories: Some(directories),
        })
    }

    pub async fn list_raw(&self, raw: &RawParams) -> AppResult<PagedResult<EntryTeaser>> {
        let q = self.validator().list_query(raw)?;
        self.list(&q).await
    }

    /// Route-shaped listing: collection and path from the route, the rest from the query string.
    pub async fn list_at(&self, collection: &str, path: Option<&str>, query: &RawParams) -> AppResult<PagedResult<EntryTeaser>> {
        let q = self.validator().list_request(collection, path, query)?;
        self.list(&q).await
    }

    pub async fn search(&self, q: &SearchQuery) -> AppResult<PagedResult<EntryTeaser>> {
        let pair = self.composer().compose_search(q);
        let (rows, total) = try_join(self.store.fetch_entries(&pair.rows), self.store.count_entries(&pair.count)).await?;
        debug!(target: "wadarchive::exec", "search {:?} -> {} of {} entries", q.tokens, rows.len(), total);
        Ok(PagedResult {
            items: self.teasers(rows),
            total_count: total,
            offset: q.offset,
            limit: q.limit,
            directories: None,
        })
    }

    pub async fn search_raw(&self, raw: &RawParams) -> AppResult<PagedResult<EntryTeaser>> {
        let q = self.validator().search_query(raw)?;
        self.search(&q).await
    }

    pub async fn entry(&self, collection: &str, path: &str) -> AppResult<EntryDetail> {
        let mut errs = Vec::new();
        let collection = match self.facets.resolve_collection(collection.trim()) {
            Ok(c) => Some(c),
            Err(e) => {
                errs.push(Violation::new("collection", ViolationKind::MissingField, e.to_string()));
                None
            }
        };
        if path.trim().is_empty() {
            errs.push(Violation::new("path", ViolationKind::MissingField, "path is required"));
        }
        let Some(collection) = collection.filter(|_| errs.is_empty()) else {
            return Err(AppError::validation(errs));
        };

        let q = self.composer().compose_entry(collection, path);
        let row = self.store.fetch_entries(&q).await?.into_iter().next();
        match row {
            Some(row) => Ok(EntryDetail::from_row(row, &self.facets)),
            None => Err(AppError::not_found("no_such_entry", format!("no entry '{}' in collection '{}'", path, collection))),
        }
    }

    fn since(&self, now: DateTime<Utc>) -> i64 {
        (now - TimeDelta::days(i64::from(self.feeds.recent_days))).timestamp()
    }

    async fn feed(&self, q: EntryQuery) -> AppResult<Vec<EntryTeaser>> {
        let rows = self.store.fetch_entries(&q).await?;
        Ok(self.teasers(rows))
    }

    /// Entries added within the recent window, newest first.
    pub async fn latest(&self, now: DateTime<Utc>) -> AppResult<Vec<EntryTeaser>> {
        let q = self.composer().compose_latest(self.since(now), self.feeds.recent_limit);
        self.feed(q).await
    }

    /// Entries re-uploaded within the recent window.
    pub async fn updated(&self, now: DateTime<Utc>) -> AppResult<Vec<EntryTeaser>> {
        let q = self.composer().compose_updated(self.since(now), self.feeds.recent_limit);
        self.feed(q).await
    }
}
