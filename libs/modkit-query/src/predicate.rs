//! Backend-neutral predicate tree produced by the filter and page-bound steps.

use std::fmt;

use crate::registry::FieldType;
use crate::value::Value;

/// What a predicate or ordering term refers to in the data source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A column of the queried source, by physical name.
    Column { name: String, ty: FieldType },
    /// `field` of the relation named `binding`.
    Joined {
        binding: String,
        field: String,
        ty: FieldType,
    },
    /// A projected (computed) column, by alias.
    Alias(String),
}

impl Target {
    #[must_use]
    pub fn column(name: impl Into<String>, ty: FieldType) -> Self {
        Target::Column {
            name: name.into(),
            ty,
        }
    }

    #[must_use]
    pub fn ty(&self) -> &FieldType {
        match self {
            Target::Column { ty, .. } | Target::Joined { ty, .. } => ty,
            Target::Alias(_) => &FieldType::Unknown,
        }
    }

    /// Relation the execution layer must join to reach this target.
    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        match self {
            Target::Joined { binding, .. } => Some(binding),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Column { name, .. } => write!(f, "{name}"),
            Target::Joined { binding, field, .. } => write!(f, "{binding}.{field}"),
            Target::Alias(alias) => write!(f, "{alias}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Which part of the value a text pattern must match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    StartsWith,
    EndsWith,
}

impl MatchMode {
    /// SQL `LIKE` pattern for `text`, with `%`, `_` and `\` escaped by `\`.
    #[must_use]
    pub fn like_pattern(self, text: &str) -> String {
        let escaped = like_escape(text);
        match self {
            MatchMode::Contains => format!("%{escaped}%"),
            MatchMode::StartsWith => format!("{escaped}%"),
            MatchMode::EndsWith => format!("%{escaped}"),
        }
    }

    /// Plain string matching with the same meaning as [`Self::like_pattern`].
    #[must_use]
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            MatchMode::Contains => haystack.contains(needle),
            MatchMode::StartsWith => haystack.starts_with(needle),
            MatchMode::EndsWith => haystack.ends_with(needle),
        }
    }
}

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    True,
    False,
    Compare {
        target: Target,
        op: CompareOp,
        value: Value,
    },
    IsNull(Target),
    IsNotNull(Target),
    In {
        target: Target,
        values: Vec<Value>,
    },
    NotIn {
        target: Target,
        values: Vec<Value>,
    },
    Like {
        target: Target,
        text: String,
        mode: MatchMode,
        case_insensitive: bool,
        negated: bool,
    },
    /// Array target holds `value` as an element.
    Contains { target: Target, value: Value },
    NotContains { target: Target, value: Value },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn compare(target: Target, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { target, op, value }
    }

    /// Conjunction with `True` operands dropped; a single operand is returned
    /// as is.
    #[must_use]
    pub fn and(parts: Vec<Predicate>) -> Self {
        let mut parts: Vec<_> = parts
            .into_iter()
            .filter(|p| *p != Predicate::True)
            .collect();
        if parts.iter().any(|p| *p == Predicate::False) {
            return Predicate::False;
        }
        match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Disjunction with `False` operands dropped.
    #[must_use]
    pub fn or(parts: Vec<Predicate>) -> Self {
        let mut parts: Vec<_> = parts
            .into_iter()
            .filter(|p| *p != Predicate::False)
            .collect();
        if parts.iter().any(|p| *p == Predicate::True) {
            return Predicate::True;
        }
        match parts.len() {
            0 => Predicate::False,
            1 => parts.remove(0),
            _ => Predicate::Or(parts),
        }
    }

    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(inner: Predicate) -> Self {
        match inner {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Relations referenced anywhere in the tree, in first-seen order.
    #[must_use]
    pub fn bindings(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings(&self, out: &mut Vec<String>) {
        let target = match self {
            Predicate::True | Predicate::False => None,
            Predicate::Compare { target, .. }
            | Predicate::In { target, .. }
            | Predicate::NotIn { target, .. }
            | Predicate::Like { target, .. }
            | Predicate::Contains { target, .. }
            | Predicate::NotContains { target, .. }
            | Predicate::IsNull(target)
            | Predicate::IsNotNull(target) => Some(target),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_bindings(out);
                }
                None
            }
            Predicate::Not(inner) => {
                inner.collect_bindings(out);
                None
            }
        };
        if let Some(binding) = target.and_then(Target::binding)
            && !out.iter().any(|b| b == binding)
        {
            out.push(binding.to_owned());
        }
    }
}
