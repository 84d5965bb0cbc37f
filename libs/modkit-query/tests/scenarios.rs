#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end request flows against the in-memory backend: raw parameters
//! through validation, composition, execution and metadata.

use modkit_query::{
    CursorMap, Direction, Error, FieldType, Filter, MemoryQuery, Operator, PaginationType,
    Parameters, QueryConfig, QueryOptions, RawParams, Registry, ViolationKind, memory,
};
use serde_json::{Value as Json, json};
use std::sync::Arc;

fn pets() -> Vec<Json> {
    vec![
        json!({"name": "Harry", "age": 4, "species": "dog", "family_name": "Potter", "given_name": "Harry", "owner": {"name": "Ann"}}),
        json!({"name": "Maggie", "age": 1, "species": "rabbit", "family_name": "Simpson", "given_name": "Maggie", "owner": {"name": "Bob"}}),
        json!({"name": "Patty", "age": 2, "species": "cat", "family_name": "Bouvier", "given_name": "Patty", "owner": {"name": "Ann"}}),
    ]
}

fn registry() -> Registry {
    Registry::builder()
        .field("name", FieldType::String)
        .field("age", FieldType::Integer)
        .field("species", FieldType::String)
        .field("family_name", FieldType::String)
        .field("given_name", FieldType::String)
        .compound("full_name", ["family_name", "given_name"])
        .join("owner_name", "owner", "name", FieldType::String)
        .filterable(["name", "age", "species", "full_name", "owner_name"])
        .sortable(["name", "age", "species", "owner_name"])
        .max_limit(100)
        .build()
        .unwrap()
}

fn json_params(value: Json) -> RawParams {
    serde_json::from_value(value).unwrap()
}

fn names(records: &[Json]) -> Vec<&str> {
    records.iter().filter_map(|r| r["name"].as_str()).collect()
}

fn run(raw: &RawParams) -> (Vec<Json>, modkit_query::Meta) {
    let registry = registry();
    let opts = QueryOptions::new();
    modkit_query::validate_and_run(
        MemoryQuery::new(pets()),
        raw,
        &registry,
        &opts,
        memory::extractor(&registry),
    )
    .unwrap()
}

#[test]
fn species_then_name_cursor_paging() {
    let raw = json_params(json!({"order_by": ["species", "name"], "first": 2}));
    let (records, meta) = run(&raw);
    assert_eq!(names(&records), vec!["Patty", "Harry"]);
    assert!(meta.has_next_page);
    assert!(!meta.has_previous_page);

    let raw = json_params(json!({
        "order_by": ["species", "name"],
        "first": 2,
        "after": meta.end_cursor.unwrap(),
    }));
    let (records, meta) = run(&raw);
    assert_eq!(names(&records), vec!["Maggie"]);
    assert!(!meta.has_next_page);
    assert!(meta.has_previous_page);
}

#[test]
fn backward_paging_from_the_end_cursor() {
    let raw = json_params(json!({"order_by": ["name"], "first": 3}));
    let (_, meta) = run(&raw);

    let raw = json_params(json!({
        "order_by": ["name"],
        "last": 1,
        "before": meta.end_cursor.unwrap(),
    }));
    let (records, meta) = run(&raw);
    assert_eq!(names(&records), vec!["Maggie"]);
    assert!(meta.has_previous_page);
    assert!(meta.has_next_page);
}

#[test]
fn limit_offset_over_seven_records() {
    let records: Vec<Json> = (0..7).map(|i| json!({"name": format!("pet{i}"), "age": i})).collect();
    let registry = registry();
    let opts = QueryOptions::new();
    let raw = json_params(json!({"limit": 2, "offset": 4, "order_by": ["age"]}));

    let (page, meta) = modkit_query::validate_and_run(
        MemoryQuery::new(records),
        &raw,
        &registry,
        &opts,
        memory::extractor(&registry),
    )
    .unwrap();

    assert_eq!(names(&page), vec!["pet4", "pet5"]);
    assert_eq!(meta.current_offset, Some(4));
    assert_eq!(meta.current_page, Some(3));
    assert!(meta.has_next_page);
    assert_eq!(meta.next_offset, Some(6));
    assert_eq!(meta.next_page, Some(4));
    assert_eq!(meta.total_pages, Some(4));
    assert_eq!(meta.total_count, Some(7));
}

#[test]
#[tracing_test::traced_test]
fn compound_equality_validates_but_filters_nothing() {
    let raw = json_params(json!({
        "filters": [{"field": "full_name", "op": "==", "value": "Potter"}]
    }));
    let (records, meta) = run(&raw);
    assert_eq!(records.len(), 3);
    assert_eq!(meta.total_count, Some(3));
    assert!(logs_contain("comparison operators are not supported on compound fields"));
}

#[test]
fn compound_text_search_spans_members() {
    let raw = json_params(json!({
        "filters": [{"field": "full_name", "op": "ilike_and", "value": "simp mag"}]
    }));
    let (records, _) = run(&raw);
    assert_eq!(names(&records), vec!["Maggie"]);
}

#[test]
fn join_fields_filter_and_order_through_the_binding() {
    let raw = json_params(json!({
        "filters": [{"field": "owner_name", "value": "Ann"}],
        "order_by": ["age"],
    }));
    let (records, _) = run(&raw);
    assert_eq!(names(&records), vec!["Patty", "Harry"]);

    let registry = registry();
    let params = modkit_query::validate(&raw, &registry, &QueryOptions::new()).unwrap();
    let plan = modkit_query::plan(&params, &registry, &QueryOptions::new()).unwrap();
    assert_eq!(plan.bindings, vec!["owner".to_owned()]);
}

#[test]
fn query_string_requests_run_like_json_requests() {
    let raw = RawParams::from_query_str(
        "filters[0][field]=age&filters[0][op]=>=&filters[0][value]=2&order_by[]=age&order_directions[]=desc&page=1&page_size=1",
    )
    .unwrap();
    let (records, meta) = run(&raw);
    assert_eq!(names(&records), vec!["Harry"]);
    assert_eq!(meta.total_pages, Some(2));
    assert_eq!(meta.next_page, Some(2));
}

#[test]
fn strict_validation_reports_every_violation() {
    let raw = json_params(json!({
        "first": 0,
        "order_by": ["nope"],
        "filters": [{"field": "age", "op": "=~", "value": "x"}],
    }));
    let err = modkit_query::validate_strict(&raw, &registry(), &QueryOptions::new()).unwrap_err();

    assert_eq!(err.params, raw);
    assert!(err.errors.kinds("first").contains(&ViolationKind::GreaterThan));
    assert!(err.errors.kinds("order_by").contains(&ViolationKind::Inclusion));
    assert_eq!(err.errors.kinds("filters[0].op"), vec![ViolationKind::Inclusion]);
}

#[test]
fn validate_and_run_wraps_validation_failures() {
    let registry = registry();
    let raw = json_params(json!({"limit": 1, "page": 1, "page_size": 1}));
    let err = modkit_query::validate_and_run(
        MemoryQuery::new(pets()),
        &raw,
        &registry,
        &QueryOptions::new(),
        memory::extractor(&registry),
    )
    .unwrap_err();
    match err {
        Error::InvalidParams(err) => {
            assert_eq!(err.errors.kinds("limit"), vec![ViolationKind::Exclusive]);
        }
        other => panic!("expected invalid params, got {other:?}"),
    }
}

#[test]
fn replace_mode_strips_conflicting_groups_and_applies_defaults() {
    let registry = registry();
    let opts = QueryOptions::new()
        .replace_invalid_params(true)
        .default_limit(2);
    let raw = json_params(json!({"first": 1, "offset": 3}));
    let params = modkit_query::validate(&raw, &registry, &opts).unwrap();
    assert_eq!(
        (params.first, params.offset, params.limit),
        (None, None, Some(2))
    );
}

#[test]
fn backend_config_supplies_defaults_below_call_site() {
    let registry = registry();
    let backend = QueryConfig {
        default_limit: Some(1),
        default_pagination_type: Some(PaginationType::Page),
        ..QueryConfig::default()
    };
    let opts = QueryOptions::new().backend(Arc::new(backend));
    let params = modkit_query::validate(&RawParams::default(), &registry, &opts).unwrap();
    assert_eq!((params.page, params.page_size), (Some(1), Some(1)));

    let (records, meta) = modkit_query::run(
        MemoryQuery::new(pets()),
        &params,
        &registry,
        &opts,
        memory::extractor(&registry),
    )
    .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(meta.total_pages, Some(3));
}

#[test]
fn stale_cursor_for_another_order_is_rejected() {
    let mut cursor = CursorMap::new();
    cursor.insert("age".to_owned(), 4i64.into());
    let token = modkit_query::cursor::encode(&cursor).unwrap();
    let raw = json_params(json!({"order_by": ["name"], "first": 1, "after": token}));
    let errors = modkit_query::validate(&raw, &registry(), &QueryOptions::new()).unwrap_err();
    assert_eq!(errors.kinds("after"), vec![ViolationKind::CursorMismatch]);
}

#[test]
fn navigation_links_feed_back_into_validation() {
    let registry = registry();
    let opts = QueryOptions::new();
    let params = Parameters {
        page: Some(1),
        page_size: Some(2),
        ..Parameters::default()
    }
    .push_order("age", None)
    .unwrap()
    .put_filter(Filter::new("species", Operator::NotIn, vec!["rabbit"]));

    let next = params.to_next_page(Some(2));
    let raw = RawParams::from_query_str(&next.to_query_string()).unwrap();
    let validated = modkit_query::validate(&raw, &registry, &opts).unwrap();
    assert_eq!(validated, next);

    let reversed = validated.push_order("age", None).unwrap();
    assert_eq!(reversed.order_directions, Some(vec![Direction::Desc]));
}

#[test]
fn filter_order_and_paginate_compose_stepwise() {
    let registry = registry();
    let opts = QueryOptions::new();
    let raw = json_params(json!({
        "filters": [{"field": "age", "op": "<", "value": 4}],
        "order_by": ["age"],
        "limit": 1,
    }));
    let params = modkit_query::validate(&raw, &registry, &opts).unwrap();

    let q = modkit_query::filter(MemoryQuery::new(pets()), &params, &registry, &opts).unwrap();
    let q = modkit_query::order(q, &params, &registry).unwrap();
    let q = modkit_query::paginate(q, &params, &registry).unwrap();
    let records = modkit_query::Executor::fetch(&q).unwrap();
    assert_eq!(names(&records), vec!["Maggie"]);

    let total = modkit_query::count(MemoryQuery::new(pets()), &params, &registry, &opts).unwrap();
    assert_eq!(total, 2);
}
