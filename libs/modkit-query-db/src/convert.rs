//! Engine values <-> `SeaORM` values.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use modkit_query::{Error, FieldType, Value};
use rust_decimal::Decimal;

fn mismatch(expected: &FieldType, got: &Value) -> Error {
    Error::Backend(format!(
        "type mismatch: expected {expected}, got {}",
        got.type_name()
    ))
}

/// Bind value for a column of type `ty`. Validated values are already in
/// canonical form; anything else is a type mismatch.
///
/// # Errors
///
/// [`Error::Backend`] when `value` does not fit `ty`.
pub fn to_sea(ty: &FieldType, value: &Value) -> Result<sea_orm::Value, Error> {
    use sea_orm::Value as V;

    let err = || mismatch(ty, value);
    Ok(match (ty, value) {
        (_, Value::Null) => return Err(err()),
        (FieldType::Id | FieldType::Integer, Value::Int(i)) => V::BigInt(Some(*i)),
        (FieldType::Float, Value::Float(f)) => V::Double(Some(*f)),
        #[allow(clippy::cast_precision_loss)]
        (FieldType::Float, Value::Int(i)) => V::Double(Some(*i as f64)),
        (FieldType::Decimal, Value::String(s)) => {
            let d = Decimal::from_str_exact(s)
                .or_else(|_| s.parse::<Decimal>())
                .or_else(|_| Decimal::from_scientific(s))
                .map_err(|_| err())?;
            V::Decimal(Some(Box::new(d)))
        }
        (FieldType::Uuid, Value::String(s)) => {
            V::Uuid(Some(Box::new(uuid::Uuid::parse_str(s).map_err(|_| err())?)))
        }
        (FieldType::String | FieldType::Enum(_), Value::String(s)) => {
            V::String(Some(Box::new(s.clone())))
        }
        (FieldType::Boolean, Value::Bool(b)) => V::Bool(Some(*b)),
        (FieldType::Date, Value::String(s)) => {
            V::ChronoDate(Some(Box::new(NaiveDate::from_str(s).map_err(|_| err())?)))
        }
        (FieldType::Time, Value::String(s)) => {
            V::ChronoTime(Some(Box::new(NaiveTime::from_str(s).map_err(|_| err())?)))
        }
        (FieldType::DateTime, Value::String(s)) => {
            let dt = DateTime::parse_from_rfc3339(s)
                .map_err(|_| err())?
                .with_timezone(&Utc);
            V::ChronoDateTimeUtc(Some(Box::new(dt)))
        }
        (FieldType::Array(_) | FieldType::Map, v) => V::Json(Some(Box::new(v.to_json()))),
        (FieldType::Unknown, v) => untyped(v),
        _ => return Err(err()),
    })
}

/// Bind value chosen from the value itself.
fn untyped(value: &Value) -> sea_orm::Value {
    use sea_orm::Value as V;

    match value {
        Value::Null => V::String(None),
        Value::Bool(b) => V::Bool(Some(*b)),
        Value::Int(i) => V::BigInt(Some(*i)),
        Value::Float(f) => V::Double(Some(*f)),
        Value::String(s) => V::String(Some(Box::new(s.clone()))),
        v @ (Value::List(_) | Value::Map(_)) => V::Json(Some(Box::new(v.to_json()))),
    }
}

/// Engine value of a model attribute, in the canonical form validation
/// produces for the matching field type.
#[must_use]
pub fn from_sea(value: sea_orm::Value) -> Value {
    use sea_orm::Value as V;

    match value {
        V::Bool(Some(b)) => Value::Bool(b),
        V::TinyInt(Some(i)) => Value::Int(i.into()),
        V::SmallInt(Some(i)) => Value::Int(i.into()),
        V::Int(Some(i)) => Value::Int(i.into()),
        V::BigInt(Some(i)) => Value::Int(i),
        V::TinyUnsigned(Some(u)) => Value::Int(u.into()),
        V::SmallUnsigned(Some(u)) => Value::Int(u.into()),
        V::Unsigned(Some(u)) => Value::Int(u.into()),
        V::BigUnsigned(Some(u)) => i64::try_from(u).map_or(Value::Null, Value::Int),
        V::Float(Some(f)) => Value::Float(f.into()),
        V::Double(Some(f)) => Value::Float(f),
        V::String(Some(s)) => Value::String(*s),
        V::Char(Some(c)) => Value::String(c.to_string()),
        V::Json(Some(json)) => Value::from(*json),
        V::ChronoDate(Some(d)) => Value::String(d.format("%Y-%m-%d").to_string()),
        V::ChronoTime(Some(t)) => Value::String(t.format("%H:%M:%S%.f").to_string()),
        V::ChronoDateTimeUtc(Some(dt)) => {
            Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        V::ChronoDateTimeWithTimeZone(Some(dt)) => Value::String(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        V::Uuid(Some(u)) => Value::String(u.hyphenated().to_string()),
        V::Decimal(Some(d)) => Value::String(d.normalize().to_string()),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn canonical_values_bind_to_typed_columns() {
        assert_eq!(
            to_sea(&FieldType::Integer, &Value::Int(4)).unwrap(),
            sea_orm::Value::BigInt(Some(4))
        );
        assert!(matches!(
            to_sea(&FieldType::Decimal, &Value::from("10.5")).unwrap(),
            sea_orm::Value::Decimal(Some(_))
        ));
        assert!(matches!(
            to_sea(&FieldType::DateTime, &Value::from("2024-01-01T00:00:00Z")).unwrap(),
            sea_orm::Value::ChronoDateTimeUtc(Some(_))
        ));
    }

    #[test]
    fn mismatches_are_backend_errors() {
        assert!(matches!(
            to_sea(&FieldType::Integer, &Value::from("x")),
            Err(Error::Backend(_))
        ));
        assert!(to_sea(&FieldType::String, &Value::Null).is_err());
    }

    #[test]
    fn model_values_come_back_canonical() {
        let uuid = uuid::Uuid::nil();
        assert_eq!(
            from_sea(sea_orm::Value::Uuid(Some(Box::new(uuid)))),
            Value::from("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(from_sea(sea_orm::Value::Int(Some(7))), Value::Int(7));
        assert_eq!(from_sea(sea_orm::Value::String(None)), Value::Null);
        let dec = Decimal::from_str("10.500").unwrap();
        assert_eq!(
            from_sea(sea_orm::Value::Decimal(Some(Box::new(dec)))),
            Value::from("10.5")
        );
    }
}
