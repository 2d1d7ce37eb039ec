use super::compose::{OrderBy, OrderKey, Page, Projection};
use super::predicate::{Column, Join, Predicate, Value};
use super::*;
use crate::error::{AppError, ViolationKind};
use crate::facets::{FacetCatalog, Gameplay, ListSortField, SearchField, SearchSortField, SortOrder};

fn params(pairs: &[(&str, &str)]) -> RawParams {
    pairs.iter().copied().collect()
}

fn list(facets: &FacetCatalog, pairs: &[(&str, &str)]) -> Result<ListQuery, AppError> {
    Validator::new(facets).list_query(&params(pairs))
}

fn search(facets: &FacetCatalog, pairs: &[(&str, &str)]) -> Result<SearchQuery, AppError> {
    Validator::new(facets).search_query(&params(pairs))
}

#[test]
fn list_defaults_apply_only_when_absent() {
    let facets = FacetCatalog::builtin();
    let q = list(&facets, &[("collection", "idgames")]).unwrap();
    assert_eq!(q.path, "");
    assert_eq!(q.sort_field, ListSortField::Title);
    assert_eq!(q.sort_order, SortOrder::Asc);
    assert_eq!(q.limit, validate::DEFAULT_LIMIT);
    assert_eq!(q.offset, 0);

    let err = list(&facets, &[("collection", "idgames"), ("sort_order", "")]).unwrap_err();
    assert!(err.has_violation("sort_order", ViolationKind::InvalidEnum));
}

#[test]
fn list_path_is_normalized() {
    let facets = FacetCatalog::builtin();
    let a = list(&facets, &[("collection", "idgames"), ("path", "levels/doom2/")]).unwrap();
    let b = list(&facets, &[("collection", "idgames"), ("path", "levels/doom2")]).unwrap();
    assert_eq!(a, b);
    let root = list(&facets, &[("collection", "idgames"), ("path", "/")]).unwrap();
    assert_eq!(root.path, "");
    // No case folding.
    let upper = list(&facets, &[("collection", "idgames"), ("path", "Levels")]).unwrap();
    assert_eq!(upper.path, "Levels");
    // Only trailing slashes go; whitespace is part of the path.
    let spaced = list(&facets, &[("collection", "idgames"), ("path", " levels/")]).unwrap();
    assert_eq!(spaced.path, " levels");
    assert_eq!(validate::normalize_path("levels/doom2//"), "levels/doom2");
}

#[test]
fn list_collects_every_violation() {
    let facets = FacetCatalog::builtin();
    let err = list(&facets, &[("sort_field", "size"), ("sort_order", "sideways"), ("limit", "0"), ("offset", "-3")]).unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert!(err.has_violation("collection", ViolationKind::MissingField));
    assert!(err.has_violation("sort_field", ViolationKind::InvalidEnum));
    assert!(err.has_violation("sort_order", ViolationKind::InvalidEnum));
    assert!(err.has_violation("limit", ViolationKind::OutOfRange));
    assert!(err.has_violation("offset", ViolationKind::OutOfRange));
    assert_eq!(err.violations().len(), 5);
}

#[test]
fn list_unknown_collection_is_missing() {
    let facets = FacetCatalog::builtin();
    let err = list(&facets, &[("collection", "cdrom")]).unwrap_err();
    assert!(err.has_violation("collection", ViolationKind::MissingField));
    assert!(!err.is_unknown_facet());
}

#[test]
fn limit_bounds_and_malformed_numbers() {
    let facets = FacetCatalog::builtin();
    assert_eq!(list(&facets, &[("collection", "idgames"), ("limit", "200")]).unwrap().limit, 200);
    assert_eq!(list(&facets, &[("collection", "idgames"), ("limit", "1")]).unwrap().limit, 1);
    let err = list(&facets, &[("collection", "idgames"), ("limit", "201")]).unwrap_err();
    assert!(err.has_violation("limit", ViolationKind::OutOfRange));
    let err = list(&facets, &[("collection", "idgames"), ("limit", "ten"), ("offset", "1.5")]).unwrap_err();
    assert!(err.has_violation("limit", ViolationKind::Malformed));
    assert!(err.has_violation("offset", ViolationKind::Malformed));

    // Integers too wide for i64 are still integers, just out of range.
    let err = list(&facets, &[("collection", "idgames"), ("limit", "99999999999999999999"), ("offset", "-99999999999999999999")]).unwrap_err();
    assert!(err.has_violation("limit", ViolationKind::OutOfRange));
    assert!(err.has_violation("offset", ViolationKind::OutOfRange));
    assert!(!err.has_violation("limit", ViolationKind::Malformed));
    assert!(!err.has_violation("offset", ViolationKind::Malformed));
    let err = list(&facets, &[("collection", "idgames"), ("offset", "99999999999999999999")]).unwrap_err();
    assert!(err.has_violation("offset", ViolationKind::OutOfRange));
}

#[test]
fn list_request_takes_route_values() {
    let facets = FacetCatalog::builtin();
    let v = Validator::new(&facets);
    let qs = RawParams::from_query_string("path=ignored&limit=5");
    let q = v.list_request("idgames", None, &qs).unwrap();
    assert_eq!(q.path, "");
    assert_eq!(q.limit, 5);
    let q = v.list_request("idgames", Some("levels/"), &qs).unwrap();
    assert_eq!(q.path, "levels");
}

#[test]
fn search_defaults() {
    let facets = FacetCatalog::builtin();
    let q = search(&facets, &[("search_key", "Alien Vendetta")]).unwrap();
    assert_eq!(q.tokens, vec!["alien".to_string(), "vendetta".to_string()]);
    assert_eq!(q.search_fields, SearchField::DEFAULTS.to_vec());
    assert!(q.collections.is_empty());
    assert!(q.filter_game.is_empty());
    assert_eq!(q.sort_field, SearchSortField::Relevance);
    assert_eq!(q.sort_order, SortOrder::Desc);
}

#[test]
fn search_key_required() {
    let facets = FacetCatalog::builtin();
    let err = search(&facets, &[]).unwrap_err();
    assert!(err.has_violation("search_key", ViolationKind::MissingField));
    let err = search(&facets, &[("search_key", "   ")]).unwrap_err();
    assert!(err.has_violation("search_key", ViolationKind::MissingField));
    let err = search(&facets, &[("search_key", "&& || !")]).unwrap_err();
    assert!(err.has_violation("search_key", ViolationKind::MissingField));
}

#[test]
fn search_tokens_strip_operators() {
    assert_eq!(validate::tokenize_search_key("doom:* & (hell|HELL)"), vec!["doom", "hell"]);
    assert_eq!(validate::tokenize_search_key("Ünterwelt map01"), vec!["ünterwelt", "map01"]);
}

#[test]
fn search_unknown_facet_is_distinct() {
    let facets = FacetCatalog::builtin();
    let err = search(&facets, &[("search_key", "doom"), ("filter_game", "doom2,quake")]).unwrap_err();
    assert!(err.is_unknown_facet());
    assert_eq!(err.code_str(), "unknown_facet");
    assert!(err.has_violation("filter_game", ViolationKind::UnknownFacet));

    let err = search(&facets, &[("search_key", "doom"), ("collections", "cdrom")]).unwrap_err();
    assert!(err.has_violation("collections", ViolationKind::UnknownFacet));

    let err = search(&facets, &[("search_key", "doom"), ("search_fields", "author")]).unwrap_err();
    assert!(err.has_violation("search_fields", ViolationKind::UnknownFacet));

    // Sort fields are scoped: relevance only makes sense for search, date only for browsing.
    let err = search(&facets, &[("search_key", "doom"), ("sort_field", "date")]).unwrap_err();
    assert!(err.has_violation("sort_field", ViolationKind::InvalidEnum));
    let err = list(&facets, &[("collection", "idgames"), ("sort_field", "relevance")]).unwrap_err();
    assert!(err.has_violation("sort_field", ViolationKind::InvalidEnum));
}

#[test]
fn search_lists_dedupe() {
    let facets = FacetCatalog::builtin();
    let q = search(&facets, &[
        ("search_key", "doom"),
        ("filter_game", "doom2, doom2,tnt"),
        ("filter_gameplay", "deathmatch,cooperative,deathmatch"),
        ("search_fields", "textfile"),
    ]).unwrap();
    assert_eq!(q.filter_game, vec![facets.resolve_game("doom2").unwrap(), facets.resolve_game("tnt").unwrap()]);
    assert_eq!(q.filter_gameplay, vec![Gameplay::Deathmatch, Gameplay::Cooperative]);
    assert_eq!(q.search_fields, vec![SearchField::Textfile]);
}

#[test]
fn composed_list_pair_shares_filter() {
    let facets = FacetCatalog::builtin();
    let q = list(&facets, &[("collection", "idgames"), ("sort_field", "date"), ("sort_order", "desc"), ("limit", "2"), ("offset", "4")]).unwrap();
    let plan = QueryComposer::new().compose_list(&q, DirectoryRef::Root);
    let rows = &plan.entries.rows;
    let count = &plan.entries.count;
    assert_eq!(rows.filter, count.filter);
    assert_eq!(rows.page, Some(Page { limit: 2, offset: 4 }));
    assert_eq!(rows.order_by, vec![OrderBy { key: OrderKey::Column(Column::FileModified), order: SortOrder::Desc }]);
    assert!(count.is_count());
    assert!(count.order_by.is_empty());
    assert!(count.page.is_none());
    assert!(rows.filter.columns().contains(&Column::DirectoryId));
    assert_eq!(plan.directories, DirectoryQuery { collection: "idgames".into(), parent: DirectoryRef::Root });
}

#[test]
fn composed_list_root_vs_child() {
    let facets = FacetCatalog::builtin();
    let q = list(&facets, &[("collection", "idgames")]).unwrap();
    let composer = QueryComposer::new();
    let root = composer.compose_list(&q, DirectoryRef::Root);
    let child = composer.compose_list(&q, DirectoryRef::Id(7));
    assert_eq!(root.entries.rows.filter, Predicate::And(vec![
        Predicate::equals(Column::Collection, "idgames"),
        Predicate::IsNull(Column::DirectoryId),
    ]));
    assert_eq!(child.entries.rows.filter, Predicate::And(vec![
        Predicate::equals(Column::Collection, "idgames"),
        Predicate::equals(Column::DirectoryId, 7i64),
    ]));
}

#[test]
fn composed_search_filters_and_score() {
    let facets = FacetCatalog::builtin();
    let q = search(&facets, &[
        ("search_key", "vendetta"),
        ("search_fields", "title,textfile"),
        ("filter_game", "doom2,tnt"),
        ("filter_gameplay", "singleplayer,deathmatch"),
    ]).unwrap();
    let pair = QueryComposer::new().compose_search(&q);

    assert_eq!(pair.rows.filter, pair.count.filter);
    assert!(pair.rows.joins().contains(&Join::Textfile));
    assert!(pair.count.joins().contains(&Join::Textfile));
    assert!(pair.rows.score().is_some());
    assert!(pair.count.score().is_none());
    assert_eq!(pair.rows.order_by[0].key, OrderKey::Score);

    let Predicate::And(clauses) = &pair.rows.filter else { panic!("expected AND, got {:?}", pair.rows.filter) };
    assert_eq!(clauses.len(), 3);
    assert!(matches!(&clauses[0], Predicate::Or(terms) if terms.len() == 2));
    assert_eq!(clauses[1], Predicate::In { column: Column::Game, values: vec![Value::Int(2), Value::Int(3)] });
    assert_eq!(clauses[2], Predicate::Or(vec![
        Predicate::equals(Column::IsSingleplayer, true),
        Predicate::equals(Column::IsDeathmatch, true),
    ]));
}

#[test]
fn composed_search_without_optional_filters() {
    let facets = FacetCatalog::builtin();
    let q = search(&facets, &[("search_key", "doom"), ("sort_field", "title"), ("sort_order", "asc")]).unwrap();
    let pair = QueryComposer::new().compose_search(&q);
    assert!(matches!(pair.rows.filter, Predicate::Or(_)), "only the match clause remains");
    assert!(pair.rows.joins().is_empty());
    assert_eq!(pair.rows.projection, Projection::Rows { score: None });
    assert_eq!(pair.rows.order_by, vec![OrderBy { key: OrderKey::Column(Column::Title), order: SortOrder::Asc }]);
}

#[test]
fn composed_feeds() {
    let composer = QueryComposer::new();
    let latest = composer.compose_latest(1_000, 20);
    assert_eq!(latest.page, Some(Page { limit: 20, offset: 0 }));
    assert_eq!(latest.order_by.len(), 2);
    let updated = composer.compose_updated(1_000, 5);
    assert!(updated.filter.columns().contains(&Column::EntryCreated));
    let entry = composer.compose_entry("idgames", "levels/doom2/av.zip");
    assert_eq!(entry.page, Some(Page { limit: 1, offset: 0 }));
}
