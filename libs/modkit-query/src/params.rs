//! Raw and canonical request parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::CursorMap;
use crate::operator::Operator;
use crate::order::Direction;
use crate::value::Value;

/// One of the four mutually exclusive pagination strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// `limit` / `offset`
    Offset,
    /// `page` / `page_size`
    Page,
    /// `first` / `after`
    First,
    /// `last` / `before`
    Last,
}

impl PaginationType {
    pub const ALL: [PaginationType; 4] = [
        PaginationType::Offset,
        PaginationType::Page,
        PaginationType::First,
        PaginationType::Last,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaginationType::Offset => "offset",
            PaginationType::Page => "page",
            PaginationType::First => "first",
            PaginationType::Last => "last",
        }
    }

    /// Parameter names belonging to this strategy.
    #[must_use]
    pub fn fields(self) -> [&'static str; 2] {
        match self {
            PaginationType::Offset => ["limit", "offset"],
            PaginationType::Page => ["page", "page_size"],
            PaginationType::First => ["first", "after"],
            PaginationType::Last => ["last", "before"],
        }
    }

    #[must_use]
    pub fn is_cursor(self) -> bool {
        matches!(self, PaginationType::First | PaginationType::Last)
    }
}

impl fmt::Display for PaginationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untrusted request parameters, as they arrive.
///
/// Every field is an untyped [`Value`]; nothing has been checked yet.
/// Deserializes from JSON-shaped input (GraphQL arguments) and from bracket
/// notation query strings via [`RawParams::from_query_str`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "orderBy")]
    pub order_by: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "orderDirections")]
    pub order_directions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "pageSize")]
    pub page_size: Option<Value>,
}

impl RawParams {
    /// Parse an `application/x-www-form-urlencoded` query string in bracket
    /// notation: `order_by[]=name&filters[0][field]=age&filters[0][op]=>=`.
    ///
    /// # Errors
    ///
    /// Returns the decoding error when the string is not valid
    /// form-urlencoded data, or when the nested structure cannot be read as
    /// parameters.
    pub fn from_query_str(query: &str) -> Result<Self, QueryStringError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
        let mut root = serde_json::Value::Object(serde_json::Map::new());
        for (key, value) in pairs {
            let path = parse_key(&key);
            insert_path(&mut root, &path, value);
        }
        let root = listify(root);
        Ok(serde_json::from_value(root)?)
    }

    /// Value of a named parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match name {
            "filters" => self.filters.as_ref(),
            "order_by" => self.order_by.as_ref(),
            "order_directions" => self.order_directions.as_ref(),
            "first" => self.first.as_ref(),
            "after" => self.after.as_ref(),
            "last" => self.last.as_ref(),
            "before" => self.before.as_ref(),
            "limit" => self.limit.as_ref(),
            "offset" => self.offset.as_ref(),
            "page" => self.page.as_ref(),
            "page_size" => self.page_size.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn slot(&mut self, name: &str) -> Option<&mut Option<Value>> {
        match name {
            "first" => Some(&mut self.first),
            "after" => Some(&mut self.after),
            "last" => Some(&mut self.last),
            "before" => Some(&mut self.before),
            "limit" => Some(&mut self.limit),
            "offset" => Some(&mut self.offset),
            "page" => Some(&mut self.page),
            "page_size" => Some(&mut self.page_size),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryStringError {
    #[error("malformed query string: {0}")]
    Decode(#[from] serde_urlencoded::de::Error),
    #[error("unexpected query string structure: {0}")]
    Shape(#[from] serde_json::Error),
}

enum Segment {
    Key(String),
    Push,
}

fn parse_key(key: &str) -> Vec<Segment> {
    let (head, mut rest) = match key.find('[') {
        Some(i) => (&key[..i], &key[i..]),
        None => return vec![Segment::Key(key.to_owned())],
    };
    let mut path = vec![Segment::Key(head.to_owned())];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else {
            // Unbalanced bracket: the remainder is part of the last key.
            path.push(Segment::Key(stripped.to_owned()));
            return path;
        };
        let inner = &stripped[..end];
        path.push(if inner.is_empty() {
            Segment::Push
        } else {
            Segment::Key(inner.to_owned())
        });
        rest = &stripped[end + 1..];
    }
    path
}

fn insert_path(node: &mut serde_json::Value, path: &[Segment], value: String) {
    let Some((segment, tail)) = path.split_first() else {
        *node = serde_json::Value::String(value);
        return;
    };
    match segment {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(map) = node {
                let child = map.entry(key.clone()).or_insert(serde_json::Value::Null);
                insert_path(child, tail, value);
            }
        }
        Segment::Push => {
            if !node.is_array() {
                *node = serde_json::Value::Array(Vec::new());
            }
            if let serde_json::Value::Array(items) = node {
                let mut child = serde_json::Value::Null;
                insert_path(&mut child, tail, value);
                items.push(child);
            }
        }
    }
}

/// Turn objects keyed by decimal indices into arrays ordered by index.
fn listify(node: serde_json::Value) -> serde_json::Value {
    match node {
        serde_json::Value::Object(map) => {
            let indexed: Option<Vec<(usize, serde_json::Value)>> = map
                .iter()
                .map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v.clone())))
                .collect();
            match indexed {
                Some(mut items) if !items.is_empty() => {
                    items.sort_by_key(|(i, _)| *i);
                    serde_json::Value::Array(items.into_iter().map(|(_, v)| listify(v)).collect())
                }
                _ => serde_json::Value::Object(
                    map.into_iter().map(|(k, v)| (k, listify(v))).collect(),
                ),
            }
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(listify).collect())
        }
        other => other,
    }
}

/// One filter clause. A clause without a field, or with a null value for a
/// non-nullity operator, is dropped at composition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub field: Option<String>,
    pub op: Operator,
    pub value: Value,
}

impl Filter {
    #[must_use]
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: Some(field.into()),
            op,
            value: value.into(),
        }
    }

    /// Whether composition skips this clause.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.field.is_none() || (self.value.is_null() && !self.op.is_nullity())
    }
}

/// Validated, canonical parameters.
///
/// At most one pagination group carries values. `decoded_cursor` caches the
/// decoded `after`/`before` cursor between validation and composition; it is
/// never serialized.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_directions: Option<Vec<Direction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    #[serde(skip)]
    pub decoded_cursor: Option<CursorMap>,
}

impl Parameters {
    /// The populated pagination group, checked in `first`, `last`, `offset`,
    /// `page` order.
    #[must_use]
    pub fn pagination_type(&self) -> Option<PaginationType> {
        if self.first.is_some() || self.after.is_some() {
            Some(PaginationType::First)
        } else if self.last.is_some() || self.before.is_some() {
            Some(PaginationType::Last)
        } else if self.limit.is_some() || self.offset.is_some() {
            Some(PaginationType::Offset)
        } else if self.page.is_some() || self.page_size.is_some() {
            Some(PaginationType::Page)
        } else {
            None
        }
    }

    /// Backward cursor paging: `last`/`before` with none of `first`,
    /// `after` or `offset`.
    #[must_use]
    pub fn is_backward(&self) -> bool {
        (self.last.is_some() || self.before.is_some())
            && self.first.is_none()
            && self.after.is_none()
            && self.offset.is_none()
    }

    /// The cursor in effect for the active direction.
    #[must_use]
    pub fn active_cursor(&self) -> Option<&str> {
        if self.is_backward() {
            self.before.as_deref()
        } else {
            self.after.as_deref()
        }
    }

    /// Copy with the transient decoded cursor removed.
    #[must_use]
    pub fn without_decoded_cursor(&self) -> Self {
        Self {
            decoded_cursor: None,
            ..self.clone()
        }
    }

    pub(crate) fn clear_pagination(&mut self) {
        self.first = None;
        self.after = None;
        self.last = None;
        self.before = None;
        self.limit = None;
        self.offset = None;
        self.page = None;
        self.page_size = None;
        self.decoded_cursor = None;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn query_string_bracket_notation() {
        let raw = RawParams::from_query_str(
            "order_by[]=species&order_by[]=name&order_directions[]=desc\
             &filters[0][field]=age&filters[0][op]=%3E%3D&filters[0][value]=2\
             &filters[1][field]=name&filters[1][op]=in&filters[1][value][]=Harry&filters[1][value][]=Patty\
             &first=10",
        )
        .unwrap();

        assert_eq!(raw.order_by, Some(Value::from(vec!["species", "name"])));
        assert_eq!(raw.order_directions, Some(Value::from(vec!["desc"])));
        assert_eq!(raw.first, Some(Value::from("10")));
        let filters = raw.filters.unwrap();
        let filters = filters.as_list().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].get("op"), Some(&Value::from(">=")));
        assert_eq!(
            filters[1].get("value"),
            Some(&Value::from(vec!["Harry", "Patty"]))
        );
    }

    #[test]
    fn query_string_orders_filters_by_index() {
        let raw = RawParams::from_query_str(
            "filters[10][field]=b&filters[2][field]=a",
        )
        .unwrap();
        let filters = raw.filters.unwrap();
        let fields: Vec<_> = filters
            .as_list()
            .unwrap()
            .iter()
            .map(|f| f.get("field").and_then(Value::as_str).unwrap().to_owned())
            .collect();
        assert_eq!(fields, vec!["a", "b"]);
    }

    #[test]
    fn json_accepts_camel_case_aliases() {
        let raw: RawParams = serde_json::from_value(serde_json::json!({
            "pageSize": 10,
            "orderBy": ["name"],
        }))
        .unwrap();
        assert_eq!(raw.page_size, Some(Value::Int(10)));
        assert_eq!(raw.order_by, Some(Value::from(vec!["name"])));
    }

    #[test]
    fn pagination_type_and_direction() {
        let params = Parameters {
            last: Some(3),
            before: Some("abc".into()),
            ..Parameters::default()
        };
        assert_eq!(params.pagination_type(), Some(PaginationType::Last));
        assert!(params.is_backward());
        assert_eq!(params.active_cursor(), Some("abc"));

        let params = Parameters {
            last: Some(3),
            offset: Some(0),
            ..Parameters::default()
        };
        assert!(!params.is_backward());
    }

    #[test]
    fn filter_noop_rules() {
        assert!(Filter::new("name", Operator::Eq, Value::Null).is_noop());
        assert!(!Filter::new("name", Operator::Empty, Value::Null).is_noop());
        assert!(
            Filter {
                field: None,
                op: Operator::Eq,
                value: Value::from("x")
            }
            .is_noop()
        );
    }
}
