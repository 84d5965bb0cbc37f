//! Raw parameters -> canonical [`Parameters`].
//!
//! The pipeline runs in a fixed order:
//!
//! 1. drop parameters of disabled features (filtering, ordering, pagination);
//! 2. reject pagination parameters of strategies that are not allowed;
//! 3. enforce that at most one pagination group is populated;
//! 4. apply the default order when `order_by` is absent;
//! 5. check `order_by` against the sortable fields;
//! 6. validate the selected pagination group and apply limit defaults;
//! 7. validate each filter clause.
//!
//! Violations accumulate. With `replace_invalid_params` every violation is
//! corrected or removed instead, and each correction is logged at `debug`.

use crate::config::ResolvedOptions;
use crate::cast::{cast, cast_filter_value};
use crate::cursor::{self, CursorMap};
use crate::error::{ValidationErrors, Violation, ViolationKind};
use crate::operator::{Operator, allowed_operators};
use crate::order::Direction;
use crate::params::{Filter, PaginationType, Parameters, RawParams};
use crate::registry::{FieldRegistry, FieldType};
use crate::value::Value;

/// Validate `raw` against `registry` with already resolved options.
///
/// # Errors
///
/// Returns every violation found, keyed by parameter path.
pub fn validate_with(
    raw: &RawParams,
    registry: &dyn FieldRegistry,
    opts: &ResolvedOptions,
) -> Result<Parameters, ValidationErrors> {
    let mut validator = Validator {
        registry,
        opts,
        raw: raw.clone(),
        params: Parameters::default(),
        errors: ValidationErrors::new(),
    };
    validator.run();
    if validator.errors.is_empty() {
        Ok(validator.params)
    } else {
        Err(validator.errors)
    }
}

enum Num {
    Absent,
    Valid(u64),
    Invalid,
}

struct Validator<'a> {
    registry: &'a dyn FieldRegistry,
    opts: &'a ResolvedOptions,
    raw: RawParams,
    params: Parameters,
    errors: ValidationErrors,
}

impl Validator<'_> {
    fn run(&mut self) {
        self.drop_disabled();
        self.drop_disallowed();
        let group = self.enforce_exclusivity();
        self.order();
        self.pagination(group);
        self.filters();
    }

    /// Record a violation, or in replace mode log that it was corrected.
    fn report(&mut self, path: impl Into<String>, violation: Violation) {
        let path = path.into();
        if self.opts.replace_invalid_params {
            tracing::debug!(
                field = %path,
                kind = %violation.kind,
                "replaced invalid query parameter"
            );
        } else {
            self.errors.add(path, violation);
        }
    }

    fn drop_disabled(&mut self) {
        if !self.opts.filtering {
            self.raw.filters = None;
        }
        if !self.opts.ordering {
            self.raw.order_by = None;
            self.raw.order_directions = None;
        }
        if !self.opts.pagination {
            for ty in PaginationType::ALL {
                for field in ty.fields() {
                    if let Some(slot) = self.raw.slot(field) {
                        *slot = None;
                    }
                }
            }
        }
    }

    fn drop_disallowed(&mut self) {
        for ty in PaginationType::ALL {
            if self.opts.allows(ty) {
                continue;
            }
            for field in ty.fields() {
                let Some(value) = self.raw.slot(field).and_then(Option::take) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                // An explicit zero offset is indistinguishable from no offset.
                if field == "offset" && is_zero(&value) {
                    continue;
                }
                self.report(
                    field,
                    Violation::new(ViolationKind::NotAllowed).with_param("type", ty.as_str()),
                );
            }
        }
    }

    fn populated(&self, ty: PaginationType) -> bool {
        ty.fields()
            .iter()
            .any(|f| self.raw.get(f).is_some_and(|v| !v.is_null()))
    }

    /// Returns the single populated pagination group, if any.
    fn enforce_exclusivity(&mut self) -> Option<PaginationType> {
        const ORDER: [PaginationType; 4] = [
            PaginationType::First,
            PaginationType::Last,
            PaginationType::Offset,
            PaginationType::Page,
        ];
        let populated: Vec<PaginationType> =
            ORDER.into_iter().filter(|ty| self.populated(*ty)).collect();
        match populated.as_slice() {
            [] => None,
            [single] => Some(*single),
            [first_group, ..] => {
                let field = first_group
                    .fields()
                    .into_iter()
                    .find(|f| self.raw.get(f).is_some_and(|v| !v.is_null()))
                    .unwrap_or(first_group.fields()[0]);
                self.report(field, Violation::new(ViolationKind::Exclusive));
                for ty in ORDER {
                    for f in ty.fields() {
                        if let Some(slot) = self.raw.slot(f) {
                            *slot = None;
                        }
                    }
                }
                None
            }
        }
    }

    fn order(&mut self) {
        let order_by = match self.raw.order_by.take() {
            None | Some(Value::Null) => None,
            Some(value) => match string_list(&value) {
                Some(fields) => Some(fields),
                None => {
                    self.report("order_by", Violation::new(ViolationKind::Cast));
                    None
                }
            },
        };

        let mut directions = match self.raw.order_directions.take() {
            None | Some(Value::Null) => None,
            Some(value) => {
                let parsed = string_list(&value).and_then(|items| {
                    items
                        .iter()
                        .map(|s| s.parse::<Direction>().ok())
                        .collect::<Option<Vec<_>>>()
                });
                if parsed.is_none() {
                    self.report(
                        "order_directions",
                        Violation::new(ViolationKind::Inclusion).with_param(
                            "allowed",
                            Direction::ALL.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                        ),
                    );
                }
                parsed
            }
        };

        let mut order_by = match order_by {
            Some(fields) => fields,
            None => match &self.opts.default_order {
                Some(default) => {
                    directions.clone_from(&default.order_directions);
                    default.order_by.clone()
                }
                None => {
                    self.params.order_directions = directions;
                    return;
                }
            },
        };

        let sortable = self.registry.sortable_fields().to_vec();
        let mut i = 0;
        while i < order_by.len() {
            if self.registry.is_sortable(&order_by[i]) {
                i += 1;
                continue;
            }
            let field = order_by.remove(i);
            if let Some(dirs) = directions.as_mut()
                && i < dirs.len()
            {
                dirs.remove(i);
            }
            self.report(
                "order_by",
                Violation::new(ViolationKind::Inclusion)
                    .with_param("value", field)
                    .with_param("allowed", sortable.clone()),
            );
        }

        self.params.order_by = Some(order_by);
        self.params.order_directions = directions;
    }

    fn pagination(&mut self, group: Option<PaginationType>) {
        let group = match group {
            Some(group) => Some(group),
            None if self.opts.pagination && self.opts.default_limit.is_some() => self
                .opts
                .default_pagination_type
                .filter(|ty| self.opts.allows(*ty)),
            None => None,
        };
        match group {
            Some(PaginationType::First) => self.cursor_group(PaginationType::First),
            Some(PaginationType::Last) => self.cursor_group(PaginationType::Last),
            Some(PaginationType::Offset) => self.offset_group(),
            Some(PaginationType::Page) => self.page_group(),
            None => self.params.limit = self.opts.default_limit,
        }
    }

    fn number(&mut self, name: &'static str, min: i64) -> Num {
        let value = match self.raw.get(name) {
            None | Some(Value::Null) => return Num::Absent,
            Some(value) => value.clone(),
        };
        let parsed = cast(&FieldType::Integer, &value).and_then(|v| v.as_i64());
        let Some(n) = parsed else {
            self.report(name, Violation::new(ViolationKind::Cast));
            return Num::Invalid;
        };
        if n < min {
            let violation = if min == 0 {
                Violation::new(ViolationKind::GreaterThanOrEqualTo).with_param("number", 0i64)
            } else {
                Violation::new(ViolationKind::GreaterThan).with_param("number", min - 1)
            };
            self.report(name, violation);
            return Num::Invalid;
        }
        u64::try_from(n).map_or(Num::Invalid, Num::Valid)
    }

    /// A positive page size bounded by `max_limit`. Absent and (in replace
    /// mode) invalid values fall back to `default_limit`.
    fn page_size(&mut self, name: &'static str) -> Option<u64> {
        let n = match self.number(name, 1) {
            Num::Absent | Num::Invalid => return self.opts.default_limit,
            Num::Valid(n) => n,
        };
        match self.opts.max_limit {
            Some(max) if n > max => {
                self.report(
                    name,
                    Violation::new(ViolationKind::LessThanOrEqualTo).with_param("number", max),
                );
                Some(max)
            }
            _ => Some(n),
        }
    }

    fn cursor_group(&mut self, ty: PaginationType) {
        let [size_field, cursor_field] = ty.fields();
        let size = self.page_size(size_field);
        let order_by = self.params.order_by.clone().unwrap_or_default();

        let mut valid = true;
        if size.is_none() {
            self.report(size_field, Violation::new(ViolationKind::Required));
            valid = false;
        }
        if order_by.is_empty() {
            self.report("order_by", Violation::new(ViolationKind::Required));
            valid = false;
        }
        if !valid {
            // Replace mode: no usable cursor pagination, fall back to the
            // default limit.
            self.params.limit = self.opts.default_limit;
            return;
        }

        let (token, decoded) = match self.raw.get(cursor_field).cloned() {
            None | Some(Value::Null) => (None, None),
            Some(value) => match self.check_cursor(cursor_field, &value, &order_by) {
                Some((token, decoded)) => (Some(token), Some(decoded)),
                None => (None, None),
            },
        };

        if ty == PaginationType::First {
            self.params.first = size;
            self.params.after = token;
        } else {
            self.params.last = size;
            self.params.before = token;
        }
        self.params.decoded_cursor = decoded;
    }

    fn check_cursor(
        &mut self,
        field: &'static str,
        value: &Value,
        order_by: &[String],
    ) -> Option<(String, CursorMap)> {
        let Some(token) = value.as_str() else {
            self.report(field, Violation::new(ViolationKind::Cast));
            return None;
        };
        let Ok(decoded) = cursor::decode(token) else {
            self.report(field, Violation::new(ViolationKind::InvalidCursor));
            return None;
        };
        let same_keys = decoded.len() == order_by.len()
            && order_by.iter().all(|f| decoded.contains_key(f));
        if !same_keys {
            self.report(field, Violation::new(ViolationKind::CursorMismatch));
            return None;
        }
        Some((token.to_owned(), decoded))
    }

    fn offset_group(&mut self) {
        let limit = self.page_size("limit");
        let offset = match self.number("offset", 0) {
            Num::Valid(n) => Some(n),
            Num::Invalid => Some(0),
            Num::Absent => limit.map(|_| 0),
        };
        self.params.limit = limit;
        self.params.offset = offset;
    }

    fn page_group(&mut self) {
        let page_size = self.page_size("page_size");
        if page_size.is_none() {
            self.report("page_size", Violation::new(ViolationKind::Required));
            return;
        }
        let page = match self.number("page", 1) {
            Num::Valid(n) => n,
            Num::Absent | Num::Invalid => 1,
        };
        self.params.page = Some(page);
        self.params.page_size = page_size;
    }

    fn filters(&mut self) {
        let items = match self.raw.filters.take() {
            None | Some(Value::Null) => return,
            Some(Value::List(items)) => items,
            Some(_) => {
                self.report("filters", Violation::new(ViolationKind::Cast));
                return;
            }
        };
        for (i, item) in items.iter().enumerate() {
            if let Some(filter) = self.filter(i, item) {
                self.params.filters.push(filter);
            }
        }
    }

    /// Validate clause `i`; `None` drops it.
    fn filter(&mut self, i: usize, item: &Value) -> Option<Filter> {
        let registry = self.registry;
        let path = |part: &str| format!("filters[{i}].{part}");
        if !matches!(item, Value::Map(_)) {
            self.report(format!("filters[{i}]"), Violation::new(ViolationKind::Cast));
            return None;
        }

        let op = match item.get("op") {
            None | Some(Value::Null) => Operator::Eq,
            Some(raw) => match raw.as_str().and_then(|s| s.parse::<Operator>().ok()) {
                Some(op) => op,
                None => {
                    self.report(
                        path("op"),
                        Violation::new(ViolationKind::Inclusion).with_param(
                            "allowed",
                            Operator::ALL.iter().map(|o| o.as_str()).collect::<Vec<_>>(),
                        ),
                    );
                    return None;
                }
            },
        };
        let raw_value = item.get("value").cloned().unwrap_or(Value::Null);

        let field = match item.get("field") {
            None | Some(Value::Null) => {
                return Some(Filter {
                    field: None,
                    op,
                    value: raw_value,
                });
            }
            Some(Value::String(field)) => field.clone(),
            Some(_) => {
                self.report(path("field"), Violation::new(ViolationKind::Cast));
                return None;
            }
        };

        let descriptor = match registry.resolve(&field) {
            Some(descriptor) if registry.is_filterable(&field) => descriptor,
            _ => {
                self.report(
                    path("field"),
                    Violation::new(ViolationKind::Inclusion)
                        .with_param("allowed", registry.filterable_fields().to_vec()),
                );
                return None;
            }
        };

        let allowed = allowed_operators(descriptor);
        if !allowed.contains(&op) {
            self.report(
                path("op"),
                Violation::new(ViolationKind::Inclusion).with_param(
                    "allowed",
                    allowed.iter().map(|o| o.as_str()).collect::<Vec<_>>(),
                ),
            );
            return None;
        }

        let Some(value) = cast_filter_value(op, &descriptor.value_type(), &raw_value) else {
            self.report(path("value"), Violation::new(ViolationKind::Cast));
            return None;
        };

        Some(Filter {
            field: Some(field),
            op,
            value,
        })
    }
}

fn is_zero(value: &Value) -> bool {
    cast(&FieldType::Integer, value).and_then(|v| v.as_i64()) == Some(0)
}

/// A list of strings, or a single string as a one-element list.
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::List(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => None,
    }
}
