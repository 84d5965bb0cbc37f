//! Ordering primitives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::predicate::Target;

/// Sort direction, optionally pinning where nulls go.
///
/// Plain `Asc` sorts nulls last and plain `Desc` sorts nulls first, so every
/// direction has a definite null placement and backends apply it explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    AscNullsFirst,
    AscNullsLast,
    Desc,
    DescNullsFirst,
    DescNullsLast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Asc,
        Direction::AscNullsFirst,
        Direction::AscNullsLast,
        Direction::Desc,
        Direction::DescNullsFirst,
        Direction::DescNullsLast,
    ];

    #[must_use]
    pub fn is_ascending(self) -> bool {
        matches!(
            self,
            Direction::Asc | Direction::AscNullsFirst | Direction::AscNullsLast
        )
    }

    /// Where nulls end up for this direction.
    #[must_use]
    pub fn nulls(self) -> NullsOrder {
        match self {
            Direction::AscNullsFirst | Direction::Desc | Direction::DescNullsFirst => {
                NullsOrder::First
            }
            Direction::Asc | Direction::AscNullsLast | Direction::DescNullsLast => {
                NullsOrder::Last
            }
        }
    }

    /// Flip the primary direction; an explicit nulls placement flips with it
    /// (`asc_nulls_first` becomes `desc_nulls_last`).
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::AscNullsFirst => Direction::DescNullsLast,
            Direction::AscNullsLast => Direction::DescNullsFirst,
            Direction::Desc => Direction::Asc,
            Direction::DescNullsFirst => Direction::AscNullsLast,
            Direction::DescNullsLast => Direction::AscNullsFirst,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::AscNullsFirst => "asc_nulls_first",
            Direction::AscNullsLast => "asc_nulls_last",
            Direction::Desc => "desc",
            Direction::DescNullsFirst => "desc_nulls_first",
            Direction::DescNullsLast => "desc_nulls_last",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or(())
    }
}

/// One resolved `(direction, target)` pair handed to the execution layer.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTerm {
    /// Field identifier as it appears in `order_by`.
    pub field: String,
    pub target: Target,
    pub direction: Direction,
}

/// Zip `order_by` with `order_directions`, padding missing directions with
/// [`Direction::Asc`]. Surplus directions are ignored.
#[must_use]
pub fn zip_directions<'a>(
    order_by: &'a [String],
    directions: Option<&[Direction]>,
) -> Vec<(&'a str, Direction)> {
    let directions = directions.unwrap_or_default();
    order_by
        .iter()
        .enumerate()
        .map(|(i, field)| {
            (
                field.as_str(),
                directions.get(i).copied().unwrap_or(Direction::Asc),
            )
        })
        .collect()
}
