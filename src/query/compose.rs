//! Query composition
//! -----------------
//! Builds the storage-neutral queries for browsing, search, and the entry
//! lookups. Browsing and search both produce a `QueryPair`: a row query and a
//! count query. The count query is always derived from the row query by
//! `EntryQuery::count_query`, which keeps the filter tree and drops the score,
//! ordering and paging. The two can therefore never filter differently.

use std::collections::BTreeSet;

use tracing::debug;

use crate::facets::{SearchSortField, SortOrder};
use crate::model::DirectoryId;
use crate::query::predicate::{Column, CompOp, Join, MatchTerm, Operand, Predicate, ScoreExpr, Value};
use crate::query::validate::{ListQuery, SearchQuery};

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Entry rows, optionally with the relevance score selected alongside.
    Rows { score: Option<ScoreExpr> },
    /// Cardinality of the filtered set.
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    Column(Column),
    Score,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryQuery {
    pub projection: Projection,
    pub filter: Predicate,
    /// Ties beyond these keys fall back to the store's natural order.
    pub order_by: Vec<OrderBy>,
    pub page: Option<Page>,
}

impl EntryQuery {
    /// Joins needed by the filter and (for row queries) the score.
    pub fn joins(&self) -> BTreeSet<Join> {
        let mut joins = self.filter.joins();
        if let Projection::Rows { score: Some(score) } = &self.projection {
            joins.extend(score.joins());
        }
        joins
    }

    pub fn score(&self) -> Option<&ScoreExpr> {
        match &self.projection {
            Projection::Rows { score } => score.as_ref(),
            Projection::Count => None,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self.projection, Projection::Count)
    }

    /// The matching count query: same filter, cardinality aggregate, no score, order, or page.
    pub fn count_query(&self) -> EntryQuery {
        EntryQuery { projection: Projection::Count, filter: self.filter.clone(), order_by: Vec::new(), page: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPair {
    pub rows: EntryQuery,
    pub count: EntryQuery,
}

impl QueryPair {
    fn from_rows(rows: EntryQuery) -> Self {
        let count = rows.count_query();
        Self { rows, count }
    }
}

/// Which directory a listing is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRef {
    Root,
    Id(DirectoryId),
}

/// Immediate children of `parent` within `collection`, ordered by name ascending, unpaginated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryQuery {
    pub collection: String,
    pub parent: DirectoryRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub entries: QueryPair,
    pub directories: DirectoryQuery,
}

/// Stateless; every facet token was already resolved by the validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryComposer;

impl QueryComposer {
    pub fn new() -> Self { Self }

    pub fn compose_list(&self, q: &ListQuery, at: DirectoryRef) -> ListPlan {
        let in_directory = match at {
            DirectoryRef::Root => Predicate::IsNull(Column::DirectoryId),
            DirectoryRef::Id(id) => Predicate::equals(Column::DirectoryId, id),
        };
        let rows = EntryQuery {
            projection: Projection::Rows { score: None },
            filter: Predicate::And(vec![Predicate::equals(Column::Collection, q.collection.as_str()), in_directory]),
            order_by: vec![OrderBy { key: OrderKey::Column(q.sort_field.column()), order: q.sort_order }],
            page: Some(Page { limit: q.limit, offset: q.offset }),
        };
        debug!(target: "wadarchive::compose", "list {}/{} at {:?}: {:?}", q.collection, q.path, at, rows.filter);
        ListPlan {
            entries: QueryPair::from_rows(rows),
            directories: DirectoryQuery { collection: q.collection.clone(), parent: at },
        }
    }

    pub fn compose_search(&self, q: &SearchQuery) -> QueryPair {
        let terms: Vec<MatchTerm> = q
            .search_fields
            .iter()
            .map(|f| MatchTerm { column: f.column(), tokens: q.tokens.clone() })
            .collect();

        let mut clauses = vec![Predicate::any(terms.iter().cloned().map(Predicate::Match).collect())];
        if !q.collections.is_empty() {
            let values = q.collections.iter().map(|c| Value::from(c.as_str())).collect();
            clauses.push(Predicate::In { column: Column::Collection, values });
        }
        if !q.filter_game.is_empty() {
            let values = q.filter_game.iter().map(|&id| Value::Int(id)).collect();
            clauses.push(Predicate::In { column: Column::Game, values });
        }
        if !q.filter_gameplay.is_empty() {
            let flags = q.filter_gameplay.iter().map(|g| Predicate::equals(g.column(), true)).collect();
            clauses.push(Predicate::any(flags));
        }

        let (score, order_by) = match q.sort_field {
            SearchSortField::Relevance => (
                Some(ScoreExpr { terms }),
                vec![OrderBy { key: OrderKey::Score, order: q.sort_order }],
            ),
            other => {
                let column = other.column().unwrap_or(Column::Title);
                (None, vec![OrderBy { key: OrderKey::Column(column), order: q.sort_order }])
            }
        };

        let rows = EntryQuery {
            projection: Projection::Rows { score },
            filter: Predicate::all(clauses),
            order_by,
            page: Some(Page { limit: q.limit, offset: q.offset }),
        };
        debug!(target: "wadarchive::compose", "search tokens={:?} fields={:?}: {:?}", q.tokens, q.search_fields, rows.filter);
        QueryPair::from_rows(rows)
    }

    /// Exact `(collection, path)` lookup of a single entry.
    pub fn compose_entry(&self, collection: &str, path: &str) -> EntryQuery {
        EntryQuery {
            projection: Projection::Rows { score: None },
            filter: Predicate::And(vec![Predicate::equals(Column::Collection, collection), Predicate::equals(Column::Path, path)]),
            order_by: Vec::new(),
            page: Some(Page { limit: 1, offset: 0 }),
        }
    }

    /// Entries created after `since`, newest first.
    pub fn compose_latest(&self, since: i64, limit: u32) -> EntryQuery {
        EntryQuery {
            projection: Projection::Rows { score: None },
            filter: Predicate::Compare { column: Column::EntryCreated, op: CompOp::Gt, rhs: Operand::Value(Value::Int(since)) },
            order_by: vec![
                OrderBy { key: OrderKey::Column(Column::EntryCreated), order: SortOrder::Desc },
                OrderBy { key: OrderKey::Column(Column::FileModified), order: SortOrder::Desc },
            ],
            page: Some(Page { limit, offset: 0 }),
        }
    }

    /// Entries whose file changed after `since` and after the entry was first cataloged.
    pub fn compose_updated(&self, since: i64, limit: u32) -> EntryQuery {
        EntryQuery {
            projection: Projection::Rows { score: None },
            filter: Predicate::And(vec![
                Predicate::Compare { column: Column::FileModified, op: CompOp::Gt, rhs: Operand::Value(Value::Int(since)) },
                Predicate::Compare { column: Column::FileModified, op: CompOp::Gt, rhs: Operand::Column(Column::EntryCreated) },
            ]),
            order_by: vec![OrderBy { key: OrderKey::Column(Column::FileModified), order: SortOrder::Desc }],
            page: Some(Page { limit, offset: 0 }),
        }
    }
}
