#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `ModKit` query parameter engine.
//!
//! Validates untrusted list-endpoint parameters (filters, ordering,
//! pagination) against a declared [`FieldRegistry`], turns them into abstract
//! [`Operation`]s an execution backend applies, and computes pagination
//! [`Meta`] from the fetched result.
//!
//! # Example
//! ```rust
//! use modkit_query::{
//!     Executor, FieldType, MemoryQuery, QueryOptions, RawParams, Registry, memory,
//! };
//! use serde_json::json;
//!
//! let registry = Registry::builder()
//!     .field("name", FieldType::String)
//!     .field("age", FieldType::Integer)
//!     .filterable(["name", "age"])
//!     .sortable(["name", "age"])
//!     .default_limit(20)
//!     .build()?;
//!
//! let raw = RawParams::from_query_str("filters[0][field]=age&filters[0][op]=>&filters[0][value]=3&order_by[]=name")?;
//! let opts = QueryOptions::new();
//! let params = modkit_query::validate(&raw, &registry, &opts)?;
//!
//! let pets = MemoryQuery::new([
//!     json!({"name": "Patty", "age": 2}),
//!     json!({"name": "Harry", "age": 4}),
//! ]);
//! let (records, meta) =
//!     modkit_query::run(pets, &params, &registry, &opts, memory::extractor(&registry))?;
//! assert_eq!(records, vec![json!({"name": "Harry", "age": 4})]);
//! assert_eq!(meta.total_count, Some(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cast;
pub mod compose;
pub mod config;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod meta;
mod nav;
pub mod operator;
pub mod order;
pub mod params;
pub mod predicate;
pub mod registry;
pub mod validate;
pub mod value;

pub use compose::{Executor, Operation, PageBound, QueryPlan, Queryable, bindings, plan};
pub use config::{OptionChain, OptionProvider, QueryConfig, QueryOptions, ResolvedOptions};
pub use cursor::CursorMap;
pub use error::{
    ConfigurationError, Error, InvalidDirectionsError, InvalidParamsError, ValidationErrors,
    Violation, ViolationKind,
};
pub use memory::MemoryQuery;
pub use meta::Meta;
pub use operator::Operator;
pub use order::{Direction, NullsOrder, OrderTerm};
pub use params::{Filter, PaginationType, Parameters, RawParams};
pub use predicate::{CompareOp, MatchMode, Predicate, Target};
pub use registry::{
    CustomField, CustomOptions, DefaultOrder, FieldDescriptor, FieldRegistry, FieldType, Registry,
    RegistryBuilder,
};
pub use value::Value;

/// Validate raw parameters, resolving options through the full chain.
///
/// # Errors
///
/// Every violation found, keyed by parameter path (for example
/// `filters[0].value`). Never fails in replace-invalid mode.
pub fn validate(
    raw: &RawParams,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Parameters, ValidationErrors> {
    validate::validate_with(raw, registry, &opts.resolve(registry))
}

/// [`validate`] for fail-fast call sites: the error carries the raw
/// parameters together with the violations.
///
/// # Errors
///
/// [`InvalidParamsError`] when validation fails.
pub fn validate_strict(
    raw: &RawParams,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Parameters, InvalidParamsError> {
    validate(raw, registry, opts).map_err(|errors| InvalidParamsError {
        params: raw.clone(),
        errors,
    })
}

/// Apply filters, ordering and the page bound.
///
/// # Errors
///
/// Composition failures (unknown field, undecodable cursor) and backend
/// failures while applying.
pub fn query<Q: Queryable>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Q, Error> {
    let plan = plan(params, registry, opts)?;
    queryable.apply_all(&plan.operations)
}

/// Apply the filter step only.
///
/// # Errors
///
/// Same as [`query`].
pub fn filter<Q: Queryable>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Q, Error> {
    match compose::filter_predicate(params, registry, opts)? {
        Some(predicate) => queryable.apply(&Operation::Filter(predicate)),
        None => Ok(queryable),
    }
}

/// Apply the order step only.
///
/// # Errors
///
/// Same as [`query`].
pub fn order<Q: Queryable>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
) -> Result<Q, Error> {
    let terms = compose::order_terms(params, registry)?;
    if terms.is_empty() {
        return Ok(queryable);
    }
    queryable.apply(&Operation::Order(terms))
}

/// Apply the page-bound step only.
///
/// # Errors
///
/// Same as [`query`].
pub fn paginate<Q: Queryable>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
) -> Result<Q, Error> {
    match compose::page_bound(params, registry)? {
        Some(bound) => queryable.apply(&Operation::PageBound(bound)),
        None => Ok(queryable),
    }
}

/// Total number of records matching the filters.
///
/// # Errors
///
/// Same as [`query`].
pub fn count<Q: Executor>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<u64, Error> {
    filter(queryable, params, registry, opts)?.count()
}

/// Compose, execute and compute metadata.
///
/// In cursor mode the window is trimmed and put in logical order and no count
/// is issued; otherwise the total count drives the offset/page metadata.
/// `extract` projects a record onto the order fields for cursor building.
///
/// # Errors
///
/// Same as [`query`], plus cursor encoding failures.
pub fn run<Q, F>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<(Vec<Q::Record>, Meta), Error>
where
    Q: Executor,
    F: Fn(&Q::Record, &[String]) -> CursorMap,
{
    let composed = query(queryable, params, registry, opts)?;
    if meta::is_cursor_mode(params) {
        let window = composed.fetch()?;
        meta::cursor_meta(params, window, extract)
    } else {
        let total = composed.count()?;
        let records = composed.fetch()?;
        Ok((records, meta::offset_meta(params, total)))
    }
}

/// [`run`] without the records.
///
/// # Errors
///
/// Same as [`run`].
pub fn meta<Q, F>(
    queryable: Q,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<Meta, Error>
where
    Q: Executor,
    F: Fn(&Q::Record, &[String]) -> CursorMap,
{
    run(queryable, params, registry, opts, extract).map(|(_, meta)| meta)
}

/// Validate, then [`run`].
///
/// # Errors
///
/// [`Error::InvalidParams`] when validation fails, otherwise as [`run`].
pub fn validate_and_run<Q, F>(
    queryable: Q,
    raw: &RawParams,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<(Vec<Q::Record>, Meta), Error>
where
    Q: Executor,
    F: Fn(&Q::Record, &[String]) -> CursorMap,
{
    let params = validate_strict(raw, registry, opts)?;
    run(queryable, &params, registry, opts, extract)
}
