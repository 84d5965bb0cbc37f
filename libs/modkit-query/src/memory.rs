//! In-memory execution backend over JSON records.
//!
//! Interprets the operation list with SQL-like semantics: comparisons and
//! pattern matches against a null or missing value are false, ordering places
//! nulls according to each term's direction. Joined targets read
//! `record[binding][field]`, aliases read `record[alias]`.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::compose::{Executor, Operation, PageBound, Queryable, target};
use crate::cursor::CursorMap;
use crate::error::Error;
use crate::order::{NullsOrder, OrderTerm};
use crate::predicate::{CompareOp, Predicate, Target};
use crate::registry::{FieldRegistry, FieldType};
use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub struct MemoryQuery {
    records: Vec<serde_json::Value>,
    filters: Vec<Predicate>,
    order: Vec<OrderTerm>,
    bound: Option<PageBound>,
}

impl MemoryQuery {
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Self {
            records: records.into_iter().collect(),
            ..Self::default()
        }
    }

    fn filtered(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.records
            .iter()
            .filter(|r| self.filters.iter().all(|p| eval(p, r)))
    }
}

impl Queryable for MemoryQuery {
    fn apply(mut self, operation: &Operation) -> Result<Self, Error> {
        match operation {
            Operation::Filter(predicate) => self.filters.push(predicate.clone()),
            Operation::Order(terms) => self.order.extend(terms.iter().cloned()),
            Operation::PageBound(bound) => self.bound = Some(bound.clone()),
        }
        Ok(self)
    }
}

impl Executor for MemoryQuery {
    type Record = serde_json::Value;

    fn count(&self) -> Result<u64, Error> {
        u64::try_from(self.filtered().count()).map_err(|e| Error::Backend(e.to_string()))
    }

    fn fetch(&self) -> Result<Vec<serde_json::Value>, Error> {
        let seek = self.bound.as_ref().and_then(|b| b.cursor.as_ref());
        let mut rows: Vec<&serde_json::Value> = self
            .filtered()
            .filter(|r| seek.is_none_or(|p| eval(p, r)))
            .collect();
        rows.sort_by(|a, b| compare_rows(&self.order, a, b));

        let (offset, limit) = self
            .bound
            .as_ref()
            .map_or((None, None), |b| (b.offset, b.limit));
        let offset = offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Cursor extractor resolving each order field through `registry`, so that
/// renamed, joined and aliased fields read the same value the backend sorted
/// on.
pub fn extractor(
    registry: &dyn FieldRegistry,
) -> impl Fn(&serde_json::Value, &[String]) -> CursorMap + '_ {
    move |record, order_by| {
        order_by
            .iter()
            .map(|field| {
                let value = target(registry, field)
                    .ok()
                    .map_or(Value::Null, |t| read(record, &t));
                (field.clone(), value)
            })
            .collect()
    }
}

/// Value of `target` in `record`; `Null` when missing.
#[must_use]
pub fn read(record: &serde_json::Value, target: &Target) -> Value {
    let raw = match target {
        Target::Column { name, .. } => record.get(name),
        Target::Joined { binding, field, .. } => record.get(binding).and_then(|r| r.get(field)),
        Target::Alias(alias) => record.get(alias),
    };
    raw.cloned().map_or(Value::Null, Value::from)
}

/// Type-aware ordering: decimals and timestamps compare by value rather than
/// by their text form.
fn typed_cmp(ty: &FieldType, a: &Value, b: &Value) -> Option<Ordering> {
    match ty {
        FieldType::Decimal => decimal(a)?.partial_cmp(&decimal(b)?),
        FieldType::DateTime => timestamp(a)?.partial_cmp(&timestamp(b)?),
        _ => a.compare(b),
    }
}

fn decimal(v: &Value) -> Option<BigDecimal> {
    match v {
        Value::String(s) => BigDecimal::from_str(s).ok(),
        Value::Int(_) | Value::Float(_) => BigDecimal::from_str(&v.to_string()).ok(),
        _ => None,
    }
}

fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(v.as_str()?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn equal(ty: &FieldType, a: &Value, b: &Value) -> bool {
    typed_cmp(ty, a, b).map_or_else(|| a == b, Ordering::is_eq)
}

fn eval(predicate: &Predicate, record: &serde_json::Value) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::False => false,
        Predicate::Compare { target, op, value } => {
            let actual = read(record, target);
            if actual.is_null() || value.is_null() {
                return false;
            }
            let ty = target.ty();
            match op {
                CompareOp::Eq => equal(ty, &actual, value),
                CompareOp::Ne => !equal(ty, &actual, value),
                CompareOp::Lt => typed_cmp(ty, &actual, value).is_some_and(Ordering::is_lt),
                CompareOp::Le => typed_cmp(ty, &actual, value).is_some_and(Ordering::is_le),
                CompareOp::Gt => typed_cmp(ty, &actual, value).is_some_and(Ordering::is_gt),
                CompareOp::Ge => typed_cmp(ty, &actual, value).is_some_and(Ordering::is_ge),
            }
        }
        Predicate::IsNull(target) => read(record, target).is_null(),
        Predicate::IsNotNull(target) => !read(record, target).is_null(),
        Predicate::In { target, values } => {
            let actual = read(record, target);
            !actual.is_null() && values.iter().any(|v| equal(target.ty(), &actual, v))
        }
        Predicate::NotIn { target, values } => {
            let actual = read(record, target);
            !actual.is_null() && !values.iter().any(|v| equal(target.ty(), &actual, v))
        }
        Predicate::Like {
            target,
            text,
            mode,
            case_insensitive,
            negated,
        } => {
            let actual = read(record, target);
            let Some(haystack) = actual.as_str() else {
                return false;
            };
            let hit = if *case_insensitive {
                mode.matches(&haystack.to_lowercase(), &text.to_lowercase())
            } else {
                mode.matches(haystack, text)
            };
            hit != *negated
        }
        Predicate::Contains { target, value } => read(record, target)
            .as_list()
            .is_some_and(|items| items.contains(value)),
        Predicate::NotContains { target, value } => read(record, target)
            .as_list()
            .is_some_and(|items| !items.contains(value)),
        Predicate::And(parts) => parts.iter().all(|p| eval(p, record)),
        Predicate::Or(parts) => parts.iter().any(|p| eval(p, record)),
        Predicate::Not(inner) => !eval(inner, record),
    }
}

fn compare_rows(terms: &[OrderTerm], a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    for term in terms {
        let (x, y) = (read(a, &term.target), read(b, &term.target));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) | (false, true) => {
                let x_first = x.is_null() == (term.direction.nulls() == NullsOrder::First);
                if x_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {
                let ord = typed_cmp(term.target.ty(), &x, &y).unwrap_or(Ordering::Equal);
                if term.direction.is_ascending() {
                    ord
                } else {
                    ord.reverse()
                }
            }
        };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::order::Direction;
    use crate::predicate::MatchMode;

    fn col(name: &str, ty: FieldType) -> Target {
        Target::column(name, ty)
    }

    fn pets() -> MemoryQuery {
        MemoryQuery::new([
            json!({"name": "Harry", "age": 4, "price": "10.50", "owner": {"name": "Ann"}}),
            json!({"name": "Patty", "age": null, "price": "9.75", "owner": {"name": "Bob"}}),
            json!({"name": "maggie", "age": 2, "price": "100", "tags": ["cute"]}),
        ])
    }

    fn names(rows: &[serde_json::Value]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["name"].as_str()).collect()
    }

    fn order(name: &str, ty: FieldType, direction: Direction) -> Operation {
        Operation::Order(vec![OrderTerm {
            field: name.to_owned(),
            target: col(name, ty),
            direction,
        }])
    }

    #[test]
    fn comparisons_skip_nulls() {
        let q = pets()
            .apply(&Operation::Filter(Predicate::compare(
                col("age", FieldType::Integer),
                CompareOp::Ne,
                Value::Int(4),
            )))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["maggie"]);
        assert_eq!(q.count().unwrap(), 1);
    }

    #[test]
    fn decimals_compare_numerically() {
        let q = pets()
            .apply(&Operation::Filter(Predicate::compare(
                col("price", FieldType::Decimal),
                CompareOp::Gt,
                Value::from("10"),
            )))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["Harry", "maggie"]);
    }

    #[test]
    fn case_insensitive_patterns_and_joins() {
        let like = Predicate::Like {
            target: col("name", FieldType::String),
            text: "MAG".into(),
            mode: MatchMode::StartsWith,
            case_insensitive: true,
            negated: false,
        };
        let q = pets().apply(&Operation::Filter(like)).unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["maggie"]);

        let owner = Target::Joined {
            binding: "owner".into(),
            field: "name".into(),
            ty: FieldType::String,
        };
        let q = pets()
            .apply(&Operation::Filter(Predicate::compare(
                owner,
                CompareOp::Eq,
                Value::from("Bob"),
            )))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["Patty"]);
    }

    #[test]
    fn array_containment() {
        let q = pets()
            .apply(&Operation::Filter(Predicate::Contains {
                target: col("tags", FieldType::Array(Box::new(FieldType::String))),
                value: Value::from("cute"),
            }))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["maggie"]);
    }

    #[test]
    fn null_placement_follows_direction() {
        let q = pets()
            .apply(&order("age", FieldType::Integer, Direction::Asc))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["maggie", "Harry", "Patty"]);

        let q = pets()
            .apply(&order("age", FieldType::Integer, Direction::Desc))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["Patty", "Harry", "maggie"]);

        let q = pets()
            .apply(&order("age", FieldType::Integer, Direction::AscNullsFirst))
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["Patty", "maggie", "Harry"]);
    }

    #[test]
    fn page_bound_applies_after_ordering() {
        let q = pets()
            .apply_all(&[
                order("name", FieldType::String, Direction::Asc),
                Operation::PageBound(PageBound {
                    limit: Some(1),
                    offset: Some(1),
                    cursor: None,
                }),
            ])
            .unwrap();
        assert_eq!(names(&q.fetch().unwrap()), vec!["Patty"]);
        assert_eq!(q.count().unwrap(), 3);
    }
}
