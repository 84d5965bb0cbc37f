//! Operator catalog: wire names, value shapes and per-type legality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::registry::{FieldDescriptor, FieldType};

/// Filter operator; a clause without one means [`Operator::Eq`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    /// Case-insensitive substring match.
    Search,
    Empty,
    NotEmpty,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    NotContains,
    Like,
    NotLike,
    LikeAnd,
    LikeOr,
    Ilike,
    NotIlike,
    IlikeAnd,
    IlikeOr,
    StartsWith,
    EndsWith,
}

/// Shape a clause value must be cast to for a given operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueShape {
    /// A single value of the field type.
    Scalar,
    /// A list of values of the field type.
    List,
    /// A single element of an array field's element type.
    Element,
    /// A string pattern.
    Text,
    /// A string split on whitespace, or a list of strings.
    Words,
    /// The boolean subject of a nullity test.
    Boolean,
}

const EQUALITY: &[Operator] = &[Operator::Eq, Operator::Ne];
const NULLITY: &[Operator] = &[Operator::Empty, Operator::NotEmpty];
const ORDERING: &[Operator] = &[Operator::Lt, Operator::Le, Operator::Gt, Operator::Ge];
const MEMBERSHIP: &[Operator] = &[Operator::In, Operator::NotIn];
const CONTAINMENT: &[Operator] = &[Operator::Contains, Operator::NotContains];
const TEXT_SEARCH: &[Operator] = &[
    Operator::Search,
    Operator::Like,
    Operator::NotLike,
    Operator::LikeAnd,
    Operator::LikeOr,
    Operator::Ilike,
    Operator::NotIlike,
    Operator::IlikeAnd,
    Operator::IlikeOr,
    Operator::StartsWith,
    Operator::EndsWith,
];

impl Operator {
    pub const ALL: [Operator; 23] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Search,
        Operator::Empty,
        Operator::NotEmpty,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::NotContains,
        Operator::Like,
        Operator::NotLike,
        Operator::LikeAnd,
        Operator::LikeOr,
        Operator::Ilike,
        Operator::NotIlike,
        Operator::IlikeAnd,
        Operator::IlikeOr,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Search => "=~",
            Operator::Empty => "empty",
            Operator::NotEmpty => "not_empty",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::LikeAnd => "like_and",
            Operator::LikeOr => "like_or",
            Operator::Ilike => "ilike",
            Operator::NotIlike => "not_ilike",
            Operator::IlikeAnd => "ilike_and",
            Operator::IlikeOr => "ilike_or",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        }
    }

    #[must_use]
    pub fn shape(self) -> ValueShape {
        match self {
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge => ValueShape::Scalar,
            Operator::In | Operator::NotIn => ValueShape::List,
            Operator::Contains | Operator::NotContains => ValueShape::Element,
            Operator::Empty | Operator::NotEmpty => ValueShape::Boolean,
            Operator::LikeAnd | Operator::LikeOr | Operator::IlikeAnd | Operator::IlikeOr => {
                ValueShape::Words
            }
            Operator::Search
            | Operator::Like
            | Operator::NotLike
            | Operator::Ilike
            | Operator::NotIlike
            | Operator::StartsWith
            | Operator::EndsWith => ValueShape::Text,
        }
    }

    /// Nullity operators take a boolean subject and are never no-ops on a
    /// null value.
    #[must_use]
    pub fn is_nullity(self) -> bool {
        matches!(self, Operator::Empty | Operator::NotEmpty)
    }

    /// Equality, ordering and membership comparisons. On compound fields
    /// these validate but contribute no predicate.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        EQUALITY.contains(&self) || ORDERING.contains(&self) || MEMBERSHIP.contains(&self)
    }

    #[must_use]
    pub fn is_text_search(self) -> bool {
        TEXT_SEARCH.contains(&self)
    }

    /// Negated operators combine across compound members with AND.
    #[must_use]
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Operator::Ne
                | Operator::NotIn
                | Operator::NotContains
                | Operator::NotLike
                | Operator::NotIlike
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or(())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|()| serde::de::Error::custom(format!("unknown operator `{s}`")))
    }
}

/// Operators legal for a value type.
#[must_use]
pub fn operators_for_type(ty: &FieldType) -> Vec<Operator> {
    let groups: &[&[Operator]] = match ty {
        FieldType::Id
        | FieldType::Integer
        | FieldType::Float
        | FieldType::Decimal
        | FieldType::Uuid
        | FieldType::Date
        | FieldType::Time
        | FieldType::DateTime
        | FieldType::Enum(_) => &[EQUALITY, NULLITY, ORDERING, MEMBERSHIP],
        FieldType::String => &[EQUALITY, NULLITY, ORDERING, MEMBERSHIP, TEXT_SEARCH],
        FieldType::Boolean | FieldType::Map => &[EQUALITY, NULLITY],
        FieldType::Array(_) => &[EQUALITY, ORDERING, NULLITY, CONTAINMENT],
        FieldType::Unknown => return Operator::ALL.to_vec(),
    };
    groups.iter().flat_map(|g| g.iter().copied()).collect()
}

/// Operators legal for a resolved field.
#[must_use]
pub fn allowed_operators(descriptor: &FieldDescriptor) -> Vec<Operator> {
    match descriptor {
        FieldDescriptor::Normal { ty, .. } | FieldDescriptor::Join { ty, .. } => {
            operators_for_type(ty)
        }
        FieldDescriptor::Compound { .. } => [TEXT_SEARCH, NULLITY, EQUALITY, ORDERING, MEMBERSHIP]
            .iter()
            .flat_map(|g| g.iter().copied())
            .collect(),
        FieldDescriptor::Custom(custom) => custom
            .operators
            .clone()
            .unwrap_or_else(|| Operator::ALL.to_vec()),
        FieldDescriptor::Alias { .. } => Vec::new(),
    }
}

#[must_use]
pub fn is_allowed(descriptor: &FieldDescriptor, op: Operator) -> bool {
    allowed_operators(descriptor).contains(&op)
}
