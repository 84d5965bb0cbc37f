//! Predicate trees and ordering terms rendered as `SeaORM` conditions.

use modkit_query::{CompareOp, Error, NullsOrder, OrderTerm, Predicate, Target, Value};
use sea_orm::sea_query::{ColumnRef, Expr, Func, LikeExpr, NullOrdering, Order, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryOrder, Select};

use crate::columns::ColumnMap;
use crate::convert::to_sea;

fn always(holds: bool) -> Condition {
    Condition::all().add(Expr::cust(if holds { "1=1" } else { "1=0" }))
}

fn resolve<E>(columns: &ColumnMap<E>, target: &Target) -> Result<ColumnRef, Error>
where
    E: EntityTrait,
    E::Column: Copy,
{
    columns
        .column_ref(target)
        .ok_or_else(|| Error::UnknownField(target.to_string()))
}

fn bind_all(target: &Target, values: &[Value]) -> Result<Vec<sea_orm::Value>, Error> {
    values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| to_sea(target.ty(), v))
        .collect()
}

/// Render `predicate` against the columns of `E`.
///
/// Comparisons against null never match, mirroring SQL three-valued logic.
///
/// # Errors
///
/// [`Error::UnknownField`] for a target missing from `columns`,
/// [`Error::Backend`] for values that do not fit their column type and for
/// array containment, which has no portable SQL form.
pub fn to_condition<E>(predicate: &Predicate, columns: &ColumnMap<E>) -> Result<Condition, Error>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    Ok(match predicate {
        Predicate::True => always(true),
        Predicate::False => always(false),
        Predicate::Compare { target, op, value } => {
            if value.is_null() {
                return Ok(always(false));
            }
            let col = Expr::col(resolve(columns, target)?);
            let value = to_sea(target.ty(), value)?;
            let expr = match op {
                CompareOp::Eq => col.eq(value),
                CompareOp::Ne => col.ne(value),
                CompareOp::Lt => col.lt(value),
                CompareOp::Le => col.lte(value),
                CompareOp::Gt => col.gt(value),
                CompareOp::Ge => col.gte(value),
            };
            Condition::all().add(expr)
        }
        Predicate::IsNull(target) => {
            Condition::all().add(Expr::col(resolve(columns, target)?).is_null())
        }
        Predicate::IsNotNull(target) => {
            Condition::all().add(Expr::col(resolve(columns, target)?).is_not_null())
        }
        Predicate::In { target, values } => {
            let values = bind_all(target, values)?;
            if values.is_empty() {
                // IN () -> always false
                always(false)
            } else {
                Condition::all().add(Expr::col(resolve(columns, target)?).is_in(values))
            }
        }
        Predicate::NotIn { target, values } => {
            let values = bind_all(target, values)?;
            if values.is_empty() {
                always(true)
            } else {
                Condition::all().add(Expr::col(resolve(columns, target)?).is_not_in(values))
            }
        }
        Predicate::Like {
            target,
            text,
            mode,
            case_insensitive,
            negated,
        } => {
            let col = resolve(columns, target)?;
            let (subject, pattern) = if *case_insensitive {
                (
                    Expr::expr(Func::lower(Expr::col(col))),
                    mode.like_pattern(&text.to_lowercase()),
                )
            } else {
                (Expr::col(col), mode.like_pattern(text))
            };
            let pattern = LikeExpr::new(pattern).escape('\\');
            let expr = if *negated {
                subject.not_like(pattern)
            } else {
                subject.like(pattern)
            };
            Condition::all().add(expr)
        }
        Predicate::Contains { target, .. } | Predicate::NotContains { target, .. } => {
            return Err(Error::Backend(format!(
                "array containment on `{target}` is not supported by the SQL backend"
            )));
        }
        Predicate::And(parts) => parts.iter().try_fold(Condition::all(), |acc, p| {
            Ok::<_, Error>(acc.add(to_condition(p, columns)?))
        })?,
        Predicate::Or(parts) => parts.iter().try_fold(Condition::any(), |acc, p| {
            Ok::<_, Error>(acc.add(to_condition(p, columns)?))
        })?,
        Predicate::Not(inner) => Condition::all().add(to_condition(inner, columns)?).not(),
    })
}

/// Append `terms` to the `ORDER BY` of `select`, with explicit null
/// placement so every database sorts nulls the way the seek predicate
/// expects.
///
/// # Errors
///
/// [`Error::UnknownField`] for a target missing from `columns`.
pub fn apply_order<E>(
    select: Select<E>,
    terms: &[OrderTerm],
    columns: &ColumnMap<E>,
) -> Result<Select<E>, Error>
where
    E: EntityTrait,
    E::Column: Copy,
{
    terms.iter().try_fold(select, |select, term| {
        let col = resolve(columns, &term.target)?;
        let order = if term.direction.is_ascending() {
            Order::Asc
        } else {
            Order::Desc
        };
        let nulls = match term.direction.nulls() {
            NullsOrder::First => NullOrdering::First,
            NullsOrder::Last => NullOrdering::Last,
        };
        Ok(select.order_by_with_nulls(SimpleExpr::Column(col), order, nulls))
    })
}
