//! Casting of untyped request values to field types and operator shapes.
//!
//! Casting normalizes as well as checks: decimals, UUIDs and temporal values
//! come out in one canonical string form so that backends compare like with
//! like.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::operator::{Operator, ValueShape};
use crate::registry::FieldType;
use crate::value::Value;

/// Cast `raw` to `ty`. Returns `None` when the value does not fit.
#[must_use]
pub fn cast(ty: &FieldType, raw: &Value) -> Option<Value> {
    match ty {
        FieldType::Unknown => Some(raw.clone()),
        FieldType::Id | FieldType::Integer => cast_integer(raw),
        FieldType::Float => cast_float(raw),
        FieldType::Decimal => cast_decimal(raw),
        FieldType::Uuid => {
            let parsed = Uuid::parse_str(raw.as_str()?.trim()).ok()?;
            Some(Value::String(parsed.hyphenated().to_string()))
        }
        FieldType::String => raw.as_str().map(Value::from),
        FieldType::Boolean => cast_bool(raw),
        FieldType::Date => {
            let parsed = NaiveDate::parse_from_str(raw.as_str()?, "%Y-%m-%d").ok()?;
            Some(Value::String(parsed.format("%Y-%m-%d").to_string()))
        }
        FieldType::Time => {
            let parsed = NaiveTime::from_str(raw.as_str()?).ok()?;
            Some(Value::String(parsed.format("%H:%M:%S%.f").to_string()))
        }
        FieldType::DateTime => {
            let parsed = DateTime::parse_from_rfc3339(raw.as_str()?).ok()?;
            Some(Value::String(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ))
        }
        FieldType::Enum(allowed) => {
            let s = raw.as_str()?;
            allowed.iter().any(|a| a == s).then(|| Value::from(s))
        }
        FieldType::Array(inner) => {
            let items = raw.as_list()?;
            items
                .iter()
                .map(|item| cast(inner, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::List)
        }
        FieldType::Map => matches!(raw, Value::Map(_)).then(|| raw.clone()),
    }
}

fn cast_integer(raw: &Value) -> Option<Value> {
    match raw {
        Value::Int(i) => Some(Value::Int(*i)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
        _ => None,
    }
}

fn cast_float(raw: &Value) -> Option<Value> {
    let f = match raw {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(Value::Float(f))
}

fn cast_decimal(raw: &Value) -> Option<Value> {
    let text = match raw {
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return None,
    };
    let parsed = BigDecimal::from_str(&text).ok()?;
    Some(Value::String(parsed.normalized().to_string()))
}

fn cast_bool(raw: &Value) -> Option<Value> {
    match raw {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Int(1) => Some(Value::Bool(true)),
        Value::Int(0) => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Cast a filter value for `op` on a field whose value type is `ty`.
///
/// A null value passes through unchanged (the clause is dropped at
/// composition); nullity operators default a null subject to `true`.
#[must_use]
pub fn cast_filter_value(op: Operator, ty: &FieldType, raw: &Value) -> Option<Value> {
    if raw.is_null() {
        return Some(if op.is_nullity() {
            Value::Bool(true)
        } else {
            Value::Null
        });
    }
    match op.shape() {
        ValueShape::Scalar => cast(ty, raw),
        ValueShape::List => raw
            .as_list()?
            .iter()
            .map(|item| cast(ty, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        ValueShape::Element => match ty {
            FieldType::Array(inner) => cast(inner, raw),
            _ => Some(raw.clone()),
        },
        ValueShape::Text => cast(&FieldType::String, raw),
        ValueShape::Words => words(raw).map(|w| Value::List(w.into_iter().map(Value::from).collect())),
        ValueShape::Boolean => cast_bool(raw),
    }
}

/// Split a "words" value: a string on whitespace, or a list of strings.
/// Returns `None` for an empty word set.
#[must_use]
pub fn words(raw: &Value) -> Option<Vec<String>> {
    let words: Vec<String> = match raw {
        Value::String(s) => s.split_whitespace().map(str::to_owned).collect(),
        Value::List(items) => items
            .iter()
            .map(|i| i.as_str().map(str::to_owned))
            .collect::<Option<_>>()?,
        _ => return None,
    };
    (!words.is_empty()).then_some(words)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn integers_accept_numeric_strings() {
        assert_eq!(cast(&FieldType::Integer, &Value::from("42")), Some(Value::Int(42)));
        assert_eq!(cast(&FieldType::Integer, &Value::from("4.2")), None);
        assert_eq!(cast(&FieldType::Integer, &Value::Bool(true)), None);
    }

    #[test]
    fn canonicalizes_uuid_decimal_and_datetime() {
        assert_eq!(
            cast(
                &FieldType::Uuid,
                &Value::from("67E55044-10B1-426F-9247-BB680E5FE0C8")
            ),
            Some(Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8"))
        );
        assert_eq!(
            cast(&FieldType::Decimal, &Value::from("10.500")),
            Some(Value::from("10.5"))
        );
        assert_eq!(
            cast(&FieldType::DateTime, &Value::from("2024-01-01T02:00:00+02:00")),
            Some(Value::from("2024-01-01T00:00:00Z"))
        );
        assert_eq!(cast(&FieldType::Date, &Value::from("2024-13-01")), None);
    }

    #[test]
    fn enum_requires_membership() {
        let ty = FieldType::Enum(vec!["cat".into(), "dog".into()]);
        assert_eq!(cast(&ty, &Value::from("dog")), Some(Value::from("dog")));
        assert_eq!(cast(&ty, &Value::from("cow")), None);
    }

    #[test]
    fn operator_shapes() {
        let int = FieldType::Integer;
        assert_eq!(
            cast_filter_value(Operator::In, &int, &Value::from(vec!["1", "2"])),
            Some(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(cast_filter_value(Operator::In, &int, &Value::Int(1)), None);
        assert_eq!(
            cast_filter_value(Operator::Empty, &int, &Value::Null),
            Some(Value::Bool(true))
        );
        assert_eq!(
            cast_filter_value(Operator::LikeAnd, &FieldType::String, &Value::from(" Harry  Potter ")),
            Some(Value::from(vec!["Harry", "Potter"]))
        );
        assert_eq!(
            cast_filter_value(Operator::LikeOr, &FieldType::String, &Value::from("   ")),
            None
        );
        let tags = FieldType::Array(Box::new(FieldType::Integer));
        assert_eq!(
            cast_filter_value(Operator::Contains, &tags, &Value::from("7")),
            Some(Value::Int(7))
        );
    }
}
