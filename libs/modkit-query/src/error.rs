//! Error types for validation, cursor handling and registry configuration.
//!
//! Request-data problems are collected into [`ValidationErrors`] and returned;
//! everything else is a variant of [`Error`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::params::RawParams;
use crate::value::Value;

/// Stable, machine-checkable violation tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The raw value could not be cast to the expected type or shape.
    Cast,
    Required,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
    /// The value is not a member of the permitted set (`allowed` param).
    Inclusion,
    /// More than one pagination strategy was requested.
    Exclusive,
    /// The pagination strategy is not enabled for this registry.
    NotAllowed,
    InvalidCursor,
    /// The cursor's keys differ from the active `order_by`.
    CursorMismatch,
}

impl ViolationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::Cast => "cast",
            ViolationKind::Required => "required",
            ViolationKind::GreaterThan => "greater_than",
            ViolationKind::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            ViolationKind::LessThanOrEqualTo => "less_than_or_equal_to",
            ViolationKind::Inclusion => "inclusion",
            ViolationKind::Exclusive => "exclusive",
            ViolationKind::NotAllowed => "not_allowed",
            ViolationKind::InvalidCursor => "invalid_cursor",
            ViolationKind::CursorMismatch => "cursor_mismatch",
        }
    }

    fn default_template(self) -> &'static str {
        match self {
            ViolationKind::Cast | ViolationKind::Inclusion | ViolationKind::InvalidCursor => {
                "is invalid"
            }
            ViolationKind::Required => "can't be blank",
            ViolationKind::GreaterThan => "must be greater than %{number}",
            ViolationKind::GreaterThanOrEqualTo => "must be greater than or equal to %{number}",
            ViolationKind::LessThanOrEqualTo => "must be less than or equal to %{number}",
            ViolationKind::Exclusive => "cannot combine multiple pagination types",
            ViolationKind::NotAllowed => "pagination type %{type} is not allowed",
            ViolationKind::CursorMismatch => "does not match order fields",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem with one request field.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Message template; `%{key}` placeholders refer to `params`.
    pub template: &'static str,
    pub params: BTreeMap<&'static str, Value>,
}

impl Violation {
    #[must_use]
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            template: kind.default_template(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: &'static str) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.params.insert(key, value.into());
        self
    }

    /// Render the template with its parameters.
    #[must_use]
    pub fn message(&self) -> String {
        let mut out = self.template.to_owned();
        for (key, value) in &self.params {
            out = out.replace(&format!("%{{{key}}}"), &value.to_string());
        }
        out
    }
}

impl Serialize for Violation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            kind: ViolationKind,
            message: String,
            params: &'a BTreeMap<&'static str, Value>,
        }
        Wire {
            kind: self.kind,
            message: self.message(),
            params: &self.params,
        }
        .serialize(serializer)
    }
}

/// All violations of one validation pass, keyed by field path
/// (`first`, `order_by`, `filters[2].op`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<Violation>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, violation: Violation) {
        self.0.entry(field.into()).or_default().push(violation);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[Violation]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Violation kinds recorded for `field`, in insertion order.
    #[must_use]
    pub fn kinds(&self, field: &str) -> Vec<ViolationKind> {
        self.get(field)
            .map(|vs| vs.iter().map(|v| v.kind).collect())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Violation)> {
        self.0
            .iter()
            .flat_map(|(field, vs)| vs.iter().map(move |v| (field.as_str(), v)))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, violation) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{field} {}", violation.message())?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Raised by the fail-fast entry points when validation does not succeed.
#[derive(Debug, Clone, Error)]
#[error("invalid query parameters: {errors}")]
pub struct InvalidParamsError {
    pub params: RawParams,
    pub errors: ValidationErrors,
}

/// A custom ascending/descending pair handed to [`crate::Parameters::push_order`]
/// does not consist of one ascending and one descending direction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid direction pair ({asc}, {desc}): expected one ascending and one descending direction")]
pub struct InvalidDirectionsError {
    pub asc: crate::order::Direction,
    pub desc: crate::order::Direction,
}

/// Inconsistent registry declarations, detected when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("{list} field `{field}` is not declared")]
    UnknownField { list: &'static str, field: String },

    #[error("alias field `{0}` cannot be filterable")]
    AliasFilterable(String),

    #[error("{kind} field `{field}` cannot be sortable")]
    NotSortable { kind: &'static str, field: String },

    #[error("compound field `{field}` references unusable member `{member}`")]
    InvalidCompoundMember { field: String, member: String },

    #[error("default order references non-sortable field `{0}`")]
    DefaultOrderNotSortable(String),

    #[error("default_limit {default_limit} exceeds max_limit {max_limit}")]
    DefaultLimitAboveMax { default_limit: u64, max_limit: u64 },

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("default pagination type `{0}` is not among the allowed pagination types")]
    DefaultPaginationTypeNotAllowed(crate::params::PaginationType),
}

/// Unified error type of the engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidParams(#[from] InvalidParamsError),

    /// Uniform cursor failure; the cause (encoding, payload shape, key
    /// types) is deliberately not exposed.
    #[error("invalid cursor")]
    InvalidCursor,

    #[error(transparent)]
    InvalidDirections(#[from] InvalidDirectionsError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A parameter references a field the registry does not know; only
    /// reachable when validation was skipped.
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn violation_message_interpolates_params() {
        let v = Violation::new(ViolationKind::LessThanOrEqualTo).with_param("number", 100i64);
        assert_eq!(v.message(), "must be less than or equal to 100");
    }

    #[test]
    fn errors_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("first", Violation::new(ViolationKind::GreaterThan).with_param("number", 0i64));
        errors.add("first", Violation::new(ViolationKind::Required));
        errors.add("order_by", Violation::new(ViolationKind::Inclusion));

        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.kinds("first"),
            vec![ViolationKind::GreaterThan, ViolationKind::Required]
        );
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["first", "order_by"]);
    }

    #[test]
    fn errors_serialize_with_stable_tags() {
        let mut errors = ValidationErrors::new();
        errors.add("limit", Violation::new(ViolationKind::Exclusive));
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["limit"][0]["kind"], "exclusive");
        assert_eq!(
            json["limit"][0]["message"],
            "cannot combine multiple pagination types"
        );
    }
}
