#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `SeaORM` execution backend for `modkit-query`.
//!
//! Renders the engine's predicates and ordering terms onto a
//! `sea_orm::Select`, runs it and builds page metadata.
//!
//! Registry fields map to entity columns through a [`ColumnMap`]. Joined
//! fields render as `"<binding>"."<field>"`; the caller joins each relation
//! listed in [`modkit_query::QueryPlan::bindings`] under that alias before
//! handing the select over.
//!
//! Array containment (`contains`, `not_contains`) has no portable SQL form
//! and fails with [`modkit_query::Error::Backend`].

mod columns;
mod condition;
mod convert;
mod select;

pub use columns::ColumnMap;
pub use condition::{apply_order, to_condition};
pub use convert::{from_sea, to_sea};
pub use select::{SeaQuery, count, fetch_window, meta, run, validate_and_run};
