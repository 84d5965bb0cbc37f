//! Canonical parameters -> abstract operations for an execution backend.
//!
//! Three independent steps, each a no-op on empty input:
//! filter ([`filter_predicate`]), order ([`order_terms`]) and page bound
//! ([`page_bound`]). [`plan`] runs all three.

use crate::cast::words;
use crate::config::QueryOptions;
use crate::cursor::{self, CursorMap};
use crate::error::Error;
use crate::operator::Operator;
use crate::order::{NullsOrder, OrderTerm, zip_directions};
use crate::params::{Filter, PaginationType, Parameters};
use crate::predicate::{CompareOp, MatchMode, Predicate, Target};
use crate::registry::{CustomOptions, FieldDescriptor, FieldRegistry};
use crate::value::Value;

/// One transformation applied to a queryable.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Filter(Predicate),
    Order(Vec<OrderTerm>),
    PageBound(PageBound),
}

/// Window restriction. `limit` already includes the `+1` probe row in cursor
/// mode; `cursor` is the seek predicate for `after`/`before`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageBound {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub cursor: Option<Predicate>,
}

/// Ordered operation list plus the relations it needs joined.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryPlan {
    pub operations: Vec<Operation>,
    pub bindings: Vec<String>,
}

/// A data source handle that operations can be applied to.
pub trait Queryable: Sized {
    /// Apply one operation.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot express the operation.
    fn apply(self, operation: &Operation) -> Result<Self, Error>;

    /// Apply a list of operations in order.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Queryable::apply`] failure.
    fn apply_all(self, operations: &[Operation]) -> Result<Self, Error> {
        operations.iter().try_fold(self, Queryable::apply)
    }
}

/// Synchronous execution of a queryable.
pub trait Executor: Queryable {
    type Record;

    /// Number of records matching the applied filters, ignoring order and
    /// page bounds.
    ///
    /// # Errors
    ///
    /// Returns backend failures.
    fn count(&self) -> Result<u64, Error>;

    /// Records of the applied window.
    ///
    /// # Errors
    ///
    /// Returns backend failures.
    fn fetch(&self) -> Result<Vec<Self::Record>, Error>;
}

/// Resolve a field to the target it refers to.
///
/// # Errors
///
/// [`Error::UnknownField`] for undeclared fields and for compound or custom
/// fields, which have no single target.
pub fn target(registry: &dyn FieldRegistry, field: &str) -> Result<Target, Error> {
    match registry.resolve(field) {
        Some(FieldDescriptor::Normal { name, ty }) => Ok(Target::Column {
            name: name.clone(),
            ty: ty.clone(),
        }),
        Some(FieldDescriptor::Join { binding, field, ty }) => Ok(Target::Joined {
            binding: binding.clone(),
            field: field.clone(),
            ty: ty.clone(),
        }),
        Some(FieldDescriptor::Alias { name }) => Ok(Target::Alias(name.clone())),
        Some(FieldDescriptor::Compound { .. } | FieldDescriptor::Custom(_)) | None => {
            Err(Error::UnknownField(field.to_owned()))
        }
    }
}

/// Combined predicate of all filter clauses; `None` when nothing applies.
///
/// # Errors
///
/// [`Error::UnknownField`] when a clause references a field the registry
/// cannot resolve.
pub fn filter_predicate(
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Option<Predicate>, Error> {
    let mut parts = Vec::new();
    for clause in &params.filters {
        if let Some(p) = clause_predicate(clause, registry, &opts.custom)? {
            parts.push(p);
        }
    }
    Ok((!parts.is_empty()).then(|| Predicate::and(parts)))
}

fn clause_predicate(
    clause: &Filter,
    registry: &dyn FieldRegistry,
    caller_options: &CustomOptions,
) -> Result<Option<Predicate>, Error> {
    if clause.is_noop() {
        return Ok(None);
    }
    let Some(field) = clause.field.as_deref() else {
        return Ok(None);
    };
    let descriptor = registry
        .resolve(field)
        .ok_or_else(|| Error::UnknownField(field.to_owned()))?;

    match descriptor {
        FieldDescriptor::Normal { .. } | FieldDescriptor::Join { .. } => {
            let target = target(registry, field)?;
            Ok(Some(build_op(&target, clause.op, &clause.value)))
        }
        FieldDescriptor::Compound { members } => {
            if clause.op.is_comparison() {
                tracing::warn!(
                    field,
                    op = %clause.op,
                    "comparison operators are not supported on compound fields; clause ignored"
                );
                return Ok(None);
            }
            let targets = members
                .iter()
                .map(|m| target(registry, m))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(compound_op(&targets, clause.op, &clause.value)))
        }
        FieldDescriptor::Custom(custom) => {
            let mut merged = custom.options.clone();
            merged.extend(caller_options.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Some((custom.handler)(clause, &merged)))
        }
        FieldDescriptor::Alias { .. } => {
            tracing::warn!(field, "alias fields cannot be filtered; clause ignored");
            Ok(None)
        }
    }
}

fn text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_owned)
}

fn like(target: &Target, text: String, mode: MatchMode, ci: bool, negated: bool) -> Predicate {
    Predicate::Like {
        target: target.clone(),
        text,
        mode,
        case_insensitive: ci,
        negated,
    }
}

/// `empty: true` and `not_empty: false` select nulls.
fn wants_null(op: Operator, value: &Value) -> bool {
    value.as_bool().unwrap_or(true) == (op == Operator::Empty)
}

fn nullity(target: &Target, op: Operator, value: &Value) -> Predicate {
    if wants_null(op, value) {
        Predicate::IsNull(target.clone())
    } else {
        Predicate::IsNotNull(target.clone())
    }
}

/// Predicate for one operator on one target.
#[must_use]
pub fn build_op(target: &Target, op: Operator, value: &Value) -> Predicate {
    let cmp = |op| Predicate::compare(target.clone(), op, value.clone());
    let list = || value.as_list().map(<[Value]>::to_vec).unwrap_or_default();
    let word_set = || words(value).unwrap_or_default();
    match op {
        Operator::Eq => cmp(CompareOp::Eq),
        Operator::Ne => cmp(CompareOp::Ne),
        Operator::Lt => cmp(CompareOp::Lt),
        Operator::Le => cmp(CompareOp::Le),
        Operator::Gt => cmp(CompareOp::Gt),
        Operator::Ge => cmp(CompareOp::Ge),
        Operator::Empty | Operator::NotEmpty => nullity(target, op, value),
        Operator::In => Predicate::In {
            target: target.clone(),
            values: list(),
        },
        Operator::NotIn => Predicate::NotIn {
            target: target.clone(),
            values: list(),
        },
        Operator::Contains => Predicate::Contains {
            target: target.clone(),
            value: value.clone(),
        },
        Operator::NotContains => Predicate::NotContains {
            target: target.clone(),
            value: value.clone(),
        },
        Operator::Search | Operator::Ilike => {
            like(target, text(value), MatchMode::Contains, true, false)
        }
        Operator::Like => like(target, text(value), MatchMode::Contains, false, false),
        Operator::NotLike => like(target, text(value), MatchMode::Contains, false, true),
        Operator::NotIlike => like(target, text(value), MatchMode::Contains, true, true),
        Operator::StartsWith => like(target, text(value), MatchMode::StartsWith, true, false),
        Operator::EndsWith => like(target, text(value), MatchMode::EndsWith, true, false),
        Operator::LikeAnd | Operator::IlikeAnd => Predicate::and(
            word_set()
                .into_iter()
                .map(|w| like(target, w, MatchMode::Contains, op == Operator::IlikeAnd, false))
                .collect(),
        ),
        Operator::LikeOr | Operator::IlikeOr => Predicate::or(
            word_set()
                .into_iter()
                .map(|w| like(target, w, MatchMode::Contains, op == Operator::IlikeOr, false))
                .collect(),
        ),
    }
}

/// Text search across compound members: every word must match some member
/// for the "all words" operators; negated operators must hold on every
/// member; everything else matches on any member.
fn compound_op(members: &[Target], op: Operator, value: &Value) -> Predicate {
    let any_member = |op: Operator, value: &Value| {
        Predicate::or(members.iter().map(|t| build_op(t, op, value)).collect())
    };
    let all_members = |op: Operator, value: &Value| {
        Predicate::and(members.iter().map(|t| build_op(t, op, value)).collect())
    };
    match op {
        Operator::LikeAnd | Operator::IlikeAnd => {
            let single = if op == Operator::LikeAnd {
                Operator::Like
            } else {
                Operator::Ilike
            };
            Predicate::and(
                words(value)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|w| any_member(single, &Value::String(w)))
                    .collect(),
            )
        }
        Operator::Empty | Operator::NotEmpty => {
            // Empty means every member is null.
            if wants_null(op, value) {
                Predicate::and(members.iter().map(|t| Predicate::IsNull(t.clone())).collect())
            } else {
                Predicate::or(
                    members
                        .iter()
                        .map(|t| Predicate::IsNotNull(t.clone()))
                        .collect(),
                )
            }
        }
        op if op.is_negated() => all_members(op, value),
        op => any_member(op, value),
    }
}

/// Ordering terms, reversed for backward cursor paging.
///
/// # Errors
///
/// [`Error::UnknownField`] for fields without a single target.
pub fn order_terms(
    params: &Parameters,
    registry: &dyn FieldRegistry,
) -> Result<Vec<OrderTerm>, Error> {
    let Some(order_by) = params.order_by.as_deref() else {
        return Ok(Vec::new());
    };
    let backward = params.is_backward();
    zip_directions(order_by, params.order_directions.as_deref())
        .into_iter()
        .map(|(field, direction)| {
            Ok(OrderTerm {
                field: field.to_owned(),
                target: target(registry, field)?,
                direction: if backward {
                    direction.reverse()
                } else {
                    direction
                },
            })
        })
        .collect()
}

/// Page bound for the active pagination group; `None` without one.
///
/// # Errors
///
/// [`Error::InvalidCursor`] when a cursor has to be decoded and fails, or
/// lacks a value for an order field; [`Error::UnknownField`] from ordering.
pub fn page_bound(
    params: &Parameters,
    registry: &dyn FieldRegistry,
) -> Result<Option<PageBound>, Error> {
    let bound = match params.pagination_type() {
        Some(PaginationType::First) => PageBound {
            limit: params.first.map(|n| n.saturating_add(1)),
            offset: None,
            cursor: seek(params, registry, params.after.as_deref())?,
        },
        Some(PaginationType::Last) => PageBound {
            limit: params.last.map(|n| n.saturating_add(1)),
            offset: None,
            cursor: seek(params, registry, params.before.as_deref())?,
        },
        Some(PaginationType::Offset) => PageBound {
            limit: params.limit,
            offset: params.offset,
            cursor: None,
        },
        Some(PaginationType::Page) => {
            let page_size = params.page_size.unwrap_or(0);
            let page = params.page.unwrap_or(1).max(1);
            PageBound {
                limit: params.page_size,
                offset: Some((page - 1).saturating_mul(page_size)),
                cursor: None,
            }
        }
        None => return Ok(None),
    };
    Ok(Some(bound))
}

fn seek(
    params: &Parameters,
    registry: &dyn FieldRegistry,
    token: Option<&str>,
) -> Result<Option<Predicate>, Error> {
    let Some(token) = token else {
        return Ok(None);
    };
    let decoded = match &params.decoded_cursor {
        Some(decoded) => decoded.clone(),
        None => cursor::decode(token)?,
    };
    let terms = order_terms(params, registry)?;
    seek_predicate(&terms, &decoded).map(Some)
}

/// Strict lexicographic "after the boundary tuple" over `terms`, in the
/// terms' own directions and null placements.
///
/// # Errors
///
/// [`Error::InvalidCursor`] when the cursor lacks a value for a term.
pub fn seek_predicate(terms: &[OrderTerm], boundary: &CursorMap) -> Result<Predicate, Error> {
    let values = terms
        .iter()
        .map(|t| boundary.get(&t.field).ok_or(Error::InvalidCursor))
        .collect::<Result<Vec<_>, _>>()?;

    let mut alternatives = Vec::with_capacity(terms.len());
    for i in 0..terms.len() {
        let mut parts: Vec<Predicate> = terms[..i]
            .iter()
            .zip(&values)
            .map(|(t, v)| equal_to(&t.target, v))
            .collect();
        parts.push(strictly_after(&terms[i], values[i]));
        alternatives.push(Predicate::and(parts));
    }
    Ok(Predicate::or(alternatives))
}

fn equal_to(target: &Target, value: &Value) -> Predicate {
    if value.is_null() {
        Predicate::IsNull(target.clone())
    } else {
        Predicate::compare(target.clone(), CompareOp::Eq, value.clone())
    }
}

fn strictly_after(term: &OrderTerm, value: &Value) -> Predicate {
    let op = if term.direction.is_ascending() {
        CompareOp::Gt
    } else {
        CompareOp::Lt
    };
    let target = term.target.clone();
    match (term.direction.nulls(), value.is_null()) {
        // Nothing sorts after a trailing null.
        (NullsOrder::Last, true) => Predicate::False,
        (NullsOrder::Last, false) => Predicate::or(vec![
            Predicate::compare(target.clone(), op, value.clone()),
            Predicate::IsNull(target),
        ]),
        (NullsOrder::First, true) => Predicate::IsNotNull(target),
        (NullsOrder::First, false) => Predicate::compare(target, op, value.clone()),
    }
}

/// Relations required by the active filters and ordering.
///
/// # Errors
///
/// Same as [`filter_predicate`] and [`order_terms`].
pub fn bindings(
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<Vec<String>, Error> {
    let mut out = filter_predicate(params, registry, opts)?
        .map(|p| p.bindings())
        .unwrap_or_default();
    for term in order_terms(params, registry)? {
        if let Some(binding) = term.target.binding()
            && !out.iter().any(|b| b == binding)
        {
            out.push(binding.to_owned());
        }
    }
    Ok(out)
}

/// All three steps.
///
/// # Errors
///
/// Propagates failures of the individual steps.
pub fn plan(
    params: &Parameters,
    registry: &dyn FieldRegistry,
    opts: &QueryOptions,
) -> Result<QueryPlan, Error> {
    let mut operations = Vec::with_capacity(3);
    let mut bindings = Vec::new();
    if let Some(predicate) = filter_predicate(params, registry, opts)? {
        bindings = predicate.bindings();
        operations.push(Operation::Filter(predicate));
    }
    let terms = order_terms(params, registry)?;
    for binding in terms.iter().filter_map(|t| t.target.binding()) {
        if !bindings.iter().any(|b| b == binding) {
            bindings.push(binding.to_owned());
        }
    }
    if !terms.is_empty() {
        operations.push(Operation::Order(terms));
    }
    if let Some(bound) = page_bound(params, registry)? {
        operations.push(Operation::PageBound(bound));
    }
    tracing::trace!(
        operations = operations.len(),
        bindings = bindings.len(),
        "composed query plan"
    );
    Ok(QueryPlan {
        operations,
        bindings,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::order::Direction;
    use crate::registry::{CustomField, FieldType, Registry};

    fn registry() -> Registry {
        Registry::builder()
            .field("name", FieldType::String)
            .field("age", FieldType::Integer)
            .field_as("species", "species_name", FieldType::String)
            .field("family_name", FieldType::String)
            .field("given_name", FieldType::String)
            .compound("full_name", ["family_name", "given_name"])
            .join("owner_age", "owner", "age", FieldType::Integer)
            .custom(
                "tag",
                CustomField::new(|filter: &Filter, opts: &CustomOptions| {
                    let column = opts.get("column").and_then(Value::as_str).unwrap_or("tags");
                    Predicate::Contains {
                        target: Target::column(column, FieldType::Unknown),
                        value: filter.value.clone(),
                    }
                })
                .option("column", "labels")
                .option("mode", "strict"),
            )
            .filterable(["name", "age", "full_name", "owner_age", "tag"])
            .sortable(["name", "age", "species", "owner_age"])
            .build()
            .unwrap()
    }

    fn col(name: &str, ty: FieldType) -> Target {
        Target::column(name, ty)
    }

    fn params_with_filters(filters: Vec<Filter>) -> Parameters {
        Parameters {
            filters,
            ..Parameters::default()
        }
    }

    #[test]
    fn normal_and_join_filters() {
        let params = params_with_filters(vec![
            Filter::new("age", Operator::Ge, 2i64),
            Filter::new("owner_age", Operator::Lt, 40i64),
        ]);
        let p = filter_predicate(&params, &registry(), &QueryOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::compare(col("age", FieldType::Integer), CompareOp::Ge, Value::Int(2)),
                Predicate::compare(
                    Target::Joined {
                        binding: "owner".into(),
                        field: "age".into(),
                        ty: FieldType::Integer,
                    },
                    CompareOp::Lt,
                    Value::Int(40)
                ),
            ])
        );
        assert_eq!(p.bindings(), vec!["owner".to_owned()]);
    }

    #[test]
    fn noop_clauses_are_skipped() {
        let params = params_with_filters(vec![
            Filter::new("age", Operator::Eq, Value::Null),
            Filter {
                field: None,
                op: Operator::Eq,
                value: Value::Int(1),
            },
        ]);
        assert_eq!(
            filter_predicate(&params, &registry(), &QueryOptions::new()).unwrap(),
            None
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn compound_equality_is_ignored_with_warning() {
        let params = params_with_filters(vec![Filter::new("full_name", Operator::Eq, "Potter")]);
        assert_eq!(
            filter_predicate(&params, &registry(), &QueryOptions::new()).unwrap(),
            None
        );
        assert!(logs_contain("not supported on compound fields"));
    }

    #[test]
    fn compound_text_search_spans_members() {
        let family = col("family_name", FieldType::String);
        let given = col("given_name", FieldType::String);

        let p = build_compound("full_name", Operator::Ilike, Value::from("pot"));
        assert_eq!(
            p,
            Predicate::Or(vec![
                like(&family, "pot".into(), MatchMode::Contains, true, false),
                like(&given, "pot".into(), MatchMode::Contains, true, false),
            ])
        );

        let p = build_compound("full_name", Operator::NotLike, Value::from("x"));
        assert!(matches!(p, Predicate::And(ref parts) if parts.len() == 2));

        let p = build_compound("full_name", Operator::IlikeAnd, Value::from(vec!["harry", "pot"]));
        let Predicate::And(words) = p else {
            panic!("expected a conjunction over words");
        };
        assert_eq!(words.len(), 2);
        assert!(matches!(&words[0], Predicate::Or(members) if members.len() == 2));

        let p = build_compound("full_name", Operator::Empty, Value::Bool(true));
        assert_eq!(
            p,
            Predicate::And(vec![Predicate::IsNull(family.clone()), Predicate::IsNull(given.clone())])
        );
        let p = build_compound("full_name", Operator::NotEmpty, Value::Bool(true));
        assert_eq!(
            p,
            Predicate::Or(vec![Predicate::IsNotNull(family), Predicate::IsNotNull(given)])
        );
    }

    fn build_compound(field: &str, op: Operator, value: Value) -> Predicate {
        let params = params_with_filters(vec![Filter::new(field, op, value)]);
        filter_predicate(&params, &registry(), &QueryOptions::new())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn custom_handler_gets_caller_options_over_registry_options() {
        let params = params_with_filters(vec![Filter::new("tag", Operator::Eq, "red")]);
        let p = filter_predicate(&params, &registry(), &QueryOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(
            p,
            Predicate::Contains {
                target: col("labels", FieldType::Unknown),
                value: Value::from("red"),
            }
        );

        let opts = QueryOptions::new().custom_option("column", "topics");
        let p = filter_predicate(&params, &registry(), &opts).unwrap().unwrap();
        assert!(matches!(p, Predicate::Contains { target: Target::Column { ref name, .. }, .. } if name == "topics"));
    }

    #[test]
    fn order_uses_physical_names_and_reverses_backward() {
        let mut params = Parameters {
            order_by: Some(vec!["species".into(), "name".into()]),
            order_directions: Some(vec![Direction::AscNullsFirst]),
            first: Some(2),
            ..Parameters::default()
        };
        let terms = order_terms(&params, &registry()).unwrap();
        assert_eq!(terms[0].target, col("species_name", FieldType::String));
        assert_eq!(terms[0].direction, Direction::AscNullsFirst);
        assert_eq!(terms[1].direction, Direction::Asc);

        params.first = None;
        params.last = Some(2);
        let terms = order_terms(&params, &registry()).unwrap();
        assert_eq!(terms[0].direction, Direction::DescNullsLast);
        assert_eq!(terms[1].direction, Direction::Desc);
    }

    #[test]
    fn page_bounds() {
        let reg = registry();
        let bound = |params: Parameters| page_bound(&params, &reg).unwrap().unwrap();

        let b = bound(Parameters {
            page: Some(3),
            page_size: Some(10),
            ..Parameters::default()
        });
        assert_eq!((b.limit, b.offset), (Some(10), Some(20)));

        let b = bound(Parameters {
            first: Some(5),
            order_by: Some(vec!["name".into()]),
            ..Parameters::default()
        });
        assert_eq!((b.limit, b.offset, b.cursor), (Some(6), None, None));

        assert_eq!(page_bound(&Parameters::default(), &reg).unwrap(), None);
    }

    #[test]
    fn seek_predicate_is_lexicographic() {
        let terms = vec![
            OrderTerm {
                field: "species".into(),
                target: col("species_name", FieldType::String),
                direction: Direction::Asc,
            },
            OrderTerm {
                field: "age".into(),
                target: col("age", FieldType::Integer),
                direction: Direction::Desc,
            },
        ];
        let boundary = CursorMap::from([
            ("species".to_owned(), Value::from("cat")),
            ("age".to_owned(), Value::Int(4)),
        ]);
        let species = col("species_name", FieldType::String);
        let age = col("age", FieldType::Integer);

        assert_eq!(
            seek_predicate(&terms, &boundary).unwrap(),
            Predicate::Or(vec![
                Predicate::Or(vec![
                    Predicate::compare(species.clone(), CompareOp::Gt, Value::from("cat")),
                    Predicate::IsNull(species.clone()),
                ]),
                Predicate::And(vec![
                    Predicate::compare(species, CompareOp::Eq, Value::from("cat")),
                    Predicate::compare(age, CompareOp::Lt, Value::Int(4)),
                ]),
            ])
        );
    }

    #[test]
    fn seek_predicate_handles_null_boundaries() {
        let name = col("name", FieldType::String);
        let term = |direction| {
            vec![OrderTerm {
                field: "name".into(),
                target: name.clone(),
                direction,
            }]
        };
        let null_boundary = CursorMap::from([("name".to_owned(), Value::Null)]);

        assert_eq!(
            seek_predicate(&term(Direction::Asc), &null_boundary).unwrap(),
            Predicate::False
        );
        assert_eq!(
            seek_predicate(&term(Direction::DescNullsFirst), &null_boundary).unwrap(),
            Predicate::IsNotNull(name.clone())
        );
        assert!(matches!(
            seek_predicate(&term(Direction::Asc), &CursorMap::new()),
            Err(Error::InvalidCursor)
        ));
    }

    #[test]
    fn plan_collects_bindings_from_filters_and_order() {
        let params = Parameters {
            filters: vec![Filter::new("age", Operator::Gt, 1i64)],
            order_by: Some(vec!["owner_age".into()]),
            limit: Some(10),
            offset: Some(0),
            ..Parameters::default()
        };
        let plan = plan(&params, &registry(), &QueryOptions::new()).unwrap();
        assert_eq!(plan.operations.len(), 3);
        assert_eq!(plan.bindings, vec!["owner".to_owned()]);
    }

    #[test]
    fn unknown_fields_fail_composition() {
        let params = params_with_filters(vec![Filter::new("nope", Operator::Eq, 1i64)]);
        assert!(matches!(
            filter_predicate(&params, &registry(), &QueryOptions::new()),
            Err(Error::UnknownField(f)) if f == "nope"
        ));
    }
}
