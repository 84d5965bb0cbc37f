//! `SeaORM` select wrapper the query engine composes into, and the async
//! execution entry points built on it.

use modkit_query::{
    CursorMap, Error, FieldRegistry, Meta, Operation, Parameters, QueryOptions, Queryable,
    RawParams, meta as page_meta,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QuerySelect, Select,
};

use crate::columns::ColumnMap;
use crate::condition::{apply_order, to_condition};

/// A `Select<E>` plus the column lookup the engine resolves targets with.
///
/// Keeps a filter-only copy of the statement next to the full one so the
/// total count ignores ordering and the page window.
#[must_use]
pub struct SeaQuery<'a, E: EntityTrait> {
    select: Select<E>,
    filtered: Select<E>,
    columns: &'a ColumnMap<E>,
}

impl<'a, E> SeaQuery<'a, E>
where
    E: EntityTrait,
{
    pub fn new(select: Select<E>, columns: &'a ColumnMap<E>) -> Self {
        Self {
            filtered: select.clone(),
            select,
            columns,
        }
    }

    /// The composed statement.
    pub fn into_select(self) -> Select<E> {
        self.select
    }

    /// The statement with filters applied but no ordering or window.
    pub fn filtered(&self) -> &Select<E> {
        &self.filtered
    }
}

impl<E> Queryable for SeaQuery<'_, E>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    fn apply(mut self, operation: &Operation) -> Result<Self, Error> {
        match operation {
            Operation::Filter(predicate) => {
                let cond = to_condition(predicate, self.columns)?;
                self.filtered = self.filtered.filter(cond.clone());
                self.select = self.select.filter(cond);
            }
            Operation::Order(terms) => {
                self.select = apply_order(self.select, terms, self.columns)?;
            }
            Operation::PageBound(bound) => {
                if let Some(seek) = &bound.cursor {
                    self.select = self.select.filter(to_condition(seek, self.columns)?);
                }
                if let Some(offset) = bound.offset {
                    self.select = self.select.offset(offset);
                }
                if let Some(limit) = bound.limit {
                    self.select = self.select.limit(limit);
                }
            }
        }
        Ok(self)
    }
}

fn db_err(e: &sea_orm::DbErr) -> Error {
    Error::Backend(e.to_string())
}

/// Compose `params` onto `select` and fetch the rows in scan order.
///
/// In cursor mode the result is the raw window: up to one probe row past
/// `first`/`last`, and reversed for backward paging. Hand it to
/// [`modkit_query::meta::cursor_meta`] to trim it.
///
/// # Errors
///
/// Composition failures and database errors as [`Error::Backend`].
pub async fn fetch_window<E, C>(
    select: Select<E>,
    conn: &C,
    columns: &ColumnMap<E>,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Vec<E::Model>, Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait + Send + Sync,
{
    let query = modkit_query::query(SeaQuery::new(select, columns), params, registry, opts)?;
    let rows = query.select.all(conn).await.map_err(|e| db_err(&e))?;
    tracing::debug!(rows = rows.len(), "fetched window");
    Ok(rows)
}

/// Total number of rows matching the filters of `params`.
///
/// # Errors
///
/// Composition failures and database errors as [`Error::Backend`].
pub async fn count<E, C>(
    select: Select<E>,
    conn: &C,
    columns: &ColumnMap<E>,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<u64, Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait + Send + Sync,
{
    let query = modkit_query::filter(SeaQuery::new(select, columns), params, registry, opts)?;
    query
        .filtered
        .count(conn)
        .await
        .map_err(|e| db_err(&e))
}

/// Compose `params` onto `select`, execute it and compute page metadata.
///
/// Cursor pagination fetches one probe row past the window and issues no
/// count; offset and page pagination issue a `COUNT` over the filtered
/// statement before fetching the window.
///
/// # Errors
///
/// Composition failures, cursor encoding failures and database errors as
/// [`Error::Backend`].
pub async fn run<E, C, F>(
    select: Select<E>,
    conn: &C,
    columns: &ColumnMap<E>,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<(Vec<E::Model>, Meta), Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait + Send + Sync,
    F: Fn(&E::Model, &[String]) -> CursorMap,
{
    let query = modkit_query::query(SeaQuery::new(select, columns), params, registry, opts)?;

    if page_meta::is_cursor_mode(params) {
        let window = query.select.all(conn).await.map_err(|e| db_err(&e))?;
        tracing::debug!(rows = window.len(), "fetched cursor window");
        return page_meta::cursor_meta(params, window, extract);
    }

    let total = query
        .filtered
        .count(conn)
        .await
        .map_err(|e| db_err(&e))?;
    let rows = query.select.all(conn).await.map_err(|e| db_err(&e))?;
    tracing::debug!(rows = rows.len(), total, "fetched page");
    Ok((rows, page_meta::offset_meta(params, total)))
}

/// [`run`] without the rows.
///
/// # Errors
///
/// Same as [`run`].
pub async fn meta<E, C, F>(
    select: Select<E>,
    conn: &C,
    columns: &ColumnMap<E>,
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<Meta, Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait + Send + Sync,
    F: Fn(&E::Model, &[String]) -> CursorMap,
{
    run(select, conn, columns, params, registry, opts, extract)
        .await
        .map(|(_, meta)| meta)
}

/// Validate raw parameters, then [`run`].
///
/// # Errors
///
/// [`Error::InvalidParams`] when validation fails, otherwise as [`run`].
pub async fn validate_and_run<E, C, F>(
    select: Select<E>,
    conn: &C,
    columns: &ColumnMap<E>,
    raw: &RawParams,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
    extract: F,
) -> Result<(Vec<E::Model>, Meta), Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait + Send + Sync,
    F: Fn(&E::Model, &[String]) -> CursorMap,
{
    let params = modkit_query::validate_strict(raw, registry, opts)?;
    run(select, conn, columns, &params, registry, opts, extract).await
}
