//! Opaque cursor tokens.
//!
//! A cursor is the MessagePack encoding of a map from order field to the
//! boundary record's value, wrapped in unpadded URL-safe base64. Decoding is
//! strict: the payload must be a map with unique string keys whose values
//! stay inside the [`Value`] grammar. Binary blobs, extension types,
//! non-finite floats and integers outside the `i64` range are rejected, as is
//! nesting deeper than a fixed bound, which is checked while reading so a
//! hostile token cannot recurse without limit. Every failure is the same
//! [`Error::InvalidCursor`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::Error;
use crate::value::Value;

/// Decoded cursor payload: order field -> boundary value.
pub type CursorMap = BTreeMap<String, Value>;

const MAX_DEPTH: usize = 16;

// base64url helpers (no padding)
mod base64_url {
    use base64::Engine;

    pub fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
    }
}

/// Encode a cursor map into a URL-safe token.
///
/// # Errors
///
/// Returns [`Error::InvalidCursor`] if the map cannot be serialized.
pub fn encode(map: &CursorMap) -> Result<String, Error> {
    rmp_serde::to_vec(map)
        .map(|bytes| base64_url::encode(&bytes))
        .map_err(|_| Error::InvalidCursor)
}

/// Decode a token produced by [`encode`].
///
/// # Errors
///
/// Returns [`Error::InvalidCursor`] for malformed base64, undecodable
/// payloads, non-map payloads, non-string or duplicate keys and values
/// outside the accepted grammar.
pub fn decode(token: &str) -> Result<CursorMap, Error> {
    let bytes = base64_url::decode(token).map_err(|_| Error::InvalidCursor)?;
    let mut de = rmp_serde::Deserializer::new(bytes.as_slice());
    let raw = RawSeed { depth: 0 }
        .deserialize(&mut de)
        .map_err(|_| Error::InvalidCursor)?;
    let Raw::Map(pairs) = raw else {
        return Err(Error::InvalidCursor);
    };
    let mut out = CursorMap::new();
    for (key, value) in pairs {
        let Raw::Str(key) = key else {
            return Err(Error::InvalidCursor);
        };
        let value = sanitize(value).ok_or(Error::InvalidCursor)?;
        if out.insert(key, value).is_some() {
            return Err(Error::InvalidCursor);
        }
    }
    Ok(out)
}

/// Cursors for the first and last record of a (trimmed) window, built with
/// `extract` projecting a record onto the order fields.
///
/// Returns `(None, None)` for an empty window.
///
/// # Errors
///
/// Propagates [`encode`] failures.
pub fn get_cursors<T, F>(
    window: &[T],
    order_by: &[String],
    extract: F,
) -> Result<(Option<String>, Option<String>), Error>
where
    F: Fn(&T, &[String]) -> CursorMap,
{
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return Ok((None, None));
    };
    Ok((
        Some(encode(&extract(first, order_by))?),
        Some(encode(&extract(last, order_by))?),
    ))
}

/// Default extractor for JSON records: the record's top-level value for each
/// order field, `null` when absent.
#[must_use]
pub fn project(record: &serde_json::Value, order_by: &[String]) -> CursorMap {
    order_by
        .iter()
        .map(|field| {
            let value = record.get(field).cloned().map_or(Value::Null, Value::from);
            (field.clone(), value)
        })
        .collect()
}

/// Everything MessagePack can carry, including what cursors must reject.
enum Raw {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integer above `i64::MAX`.
    BigUint,
    Float(f64),
    Str(String),
    Seq(Vec<Raw>),
    Map(Vec<(Raw, Raw)>),
    /// Binary or extension payload.
    Opaque,
}

fn sanitize(raw: Raw) -> Option<Value> {
    Some(match raw {
        Raw::Null => Value::Null,
        Raw::Bool(b) => Value::Bool(b),
        Raw::Int(i) => Value::Int(i),
        Raw::Float(f) if f.is_finite() => Value::Float(f),
        Raw::Str(s) => Value::String(s),
        Raw::Seq(items) => Value::List(items.into_iter().map(sanitize).collect::<Option<_>>()?),
        Raw::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| Some((sanitize(k)?, sanitize(v)?)))
                .collect::<Option<_>>()?,
        ),
        Raw::Float(_) | Raw::BigUint | Raw::Opaque => return None,
    })
}

/// Reads one [`Raw`] at `depth`, refusing to descend past [`MAX_DEPTH`].
#[derive(Clone, Copy)]
struct RawSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for RawSeed {
    type Value = Raw;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Raw, D::Error> {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom("cursor nesting too deep"));
        }
        deserializer.deserialize_any(RawVisitor { depth: self.depth })
    }
}

struct RawVisitor {
    depth: usize,
}

impl RawVisitor {
    fn child(&self) -> RawSeed {
        RawSeed {
            depth: self.depth + 1,
        }
    }
}

impl<'de> Visitor<'de> for RawVisitor {
    type Value = Raw;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a MessagePack value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Raw, E> {
        Ok(Raw::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Raw, E> {
        Ok(Raw::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Raw, D::Error> {
        RawSeed { depth: self.depth }.deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Raw, E> {
        Ok(Raw::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Raw, E> {
        Ok(Raw::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Raw, E> {
        Ok(i64::try_from(v).map_or(Raw::BigUint, Raw::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Raw, E> {
        Ok(Raw::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Raw, E> {
        Ok(Raw::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Raw, E> {
        Ok(Raw::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, _v: &[u8]) -> Result<Raw, E> {
        Ok(Raw::Opaque)
    }

    fn visit_byte_buf<E: de::Error>(self, _v: Vec<u8>) -> Result<Raw, E> {
        Ok(Raw::Opaque)
    }

    // MessagePack extension types arrive as a newtype struct.
    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Raw, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Raw::Opaque)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Raw, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(256));
        while let Some(item) = seq.next_element_seed(self.child())? {
            items.push(item);
        }
        Ok(Raw::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Raw, A::Error> {
        let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0).min(256));
        while let Some(pair) = map.next_entry_seed(self.child(), self.child())? {
            pairs.push(pair);
        }
        Ok(Raw::Map(pairs))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn sample() -> CursorMap {
        CursorMap::from([
            ("name".to_owned(), Value::from("Harry")),
            ("age".to_owned(), Value::Int(4)),
            ("score".to_owned(), Value::Float(1.5)),
            ("nickname".to_owned(), Value::Null),
            ("tags".to_owned(), Value::from(vec!["a", "b"])),
        ])
    }

    #[test]
    fn round_trip() {
        let token = encode(&sample()).unwrap();
        assert!(!token.contains(['+', '/', '=']));
        assert_eq!(decode(&token).unwrap(), sample());
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn rejects_bad_base64_and_garbage() {
        assert!(matches!(decode("***"), Err(Error::InvalidCursor)));
        assert!(matches!(decode(""), Err(Error::InvalidCursor)));
        assert!(matches!(
            decode(&base64_url::encode(&[0xc1])),
            Err(Error::InvalidCursor)
        ));
    }

    #[test]
    fn rejects_non_map_payloads() {
        let token = base64_url::encode(&rmp_serde::to_vec(&vec![1, 2, 3]).unwrap());
        assert!(matches!(decode(&token), Err(Error::InvalidCursor)));
    }

    #[test]
    fn rejects_non_string_keys() {
        let map = BTreeMap::from([(1i64, "x")]);
        let token = base64_url::encode(&rmp_serde::to_vec(&map).unwrap());
        assert!(matches!(decode(&token), Err(Error::InvalidCursor)));
    }

    #[test]
    fn rejects_binary_values() {
        // fixmap(1) { "k": bin8(2) [0xde, 0xad] }
        let bytes = [0x81, 0xa1, b'k', 0xc4, 0x02, 0xde, 0xad];
        assert!(matches!(
            decode(&base64_url::encode(&bytes)),
            Err(Error::InvalidCursor)
        ));
    }

    #[test]
    fn rejects_extension_values() {
        // fixmap(1) { "k": fixext1(type 5, 0x01) }
        let bytes = [0x81, 0xa1, b'k', 0xd4, 0x05, 0x01];
        assert!(matches!(
            decode(&base64_url::encode(&bytes)),
            Err(Error::InvalidCursor)
        ));
    }

    #[test]
    fn rejects_duplicate_keys() {
        // fixmap(2) { "k": 1, "k": 2 }
        let bytes = [0x82, 0xa1, b'k', 0x01, 0xa1, b'k', 0x02];
        assert!(matches!(
            decode(&base64_url::encode(&bytes)),
            Err(Error::InvalidCursor)
        ));
    }

    #[test]
    fn nested_maps_may_use_any_accepted_keys() {
        // fixmap(1) { "k": fixmap(1) { 1: true } }
        let bytes = [0x81, 0xa1, b'k', 0x81, 0x01, 0xc3];
        let decoded = decode(&base64_url::encode(&bytes)).unwrap();
        assert_eq!(
            decoded["k"],
            Value::Map(vec![(Value::Int(1), Value::Bool(true))])
        );
    }

    fn nested_lists(depth: usize) -> Vec<u8> {
        // fixmap(1) { "k": fixarray(1) [ fixarray(1) [ ... nil ] ] }
        let mut bytes = vec![0x81, 0xa1, b'k'];
        bytes.extend(std::iter::repeat_n(0x91, depth));
        bytes.push(0xc0);
        bytes
    }

    #[test]
    fn bounded_nesting_is_accepted() {
        let decoded = decode(&base64_url::encode(&nested_lists(MAX_DEPTH - 1))).unwrap();
        assert!(matches!(decoded["k"], Value::List(_)));
    }

    #[test]
    fn deep_nesting_is_rejected_while_reading() {
        for depth in [MAX_DEPTH + 1, 100, 5_000, 100_000] {
            assert!(
                matches!(
                    decode(&base64_url::encode(&nested_lists(depth))),
                    Err(Error::InvalidCursor)
                ),
                "depth {depth}"
            );
        }
    }

    #[test]
    fn rejects_non_finite_floats() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            // fixmap(1) { "k": float64 }
            let mut bytes = vec![0x81, 0xa1, b'k', 0xcb];
            bytes.extend(f.to_be_bytes());
            assert!(matches!(
                decode(&base64_url::encode(&bytes)),
                Err(Error::InvalidCursor)
            ));
        }
    }

    #[test]
    fn get_cursors_uses_first_and_last_records() {
        let window = vec![
            serde_json::json!({"name": "Patty", "age": 2}),
            serde_json::json!({"name": "Harry", "age": 4}),
        ];
        let order_by = vec!["name".to_owned()];
        let (start, end) = get_cursors(&window, &order_by, project).unwrap();
        assert_eq!(decode(&start.unwrap()).unwrap()["name"], Value::from("Patty"));
        assert_eq!(decode(&end.unwrap()).unwrap()["name"], Value::from("Harry"));

        let empty: Vec<serde_json::Value> = Vec::new();
        assert_eq!(get_cursors(&empty, &order_by, project).unwrap(), (None, None));
    }
}
