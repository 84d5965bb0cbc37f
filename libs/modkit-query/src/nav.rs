//! Navigation and editing helpers on [`Parameters`], for building links to
//! neighbouring pages and for adjusting a request server-side.

use crate::error::InvalidDirectionsError;
use crate::order::Direction;
use crate::params::{Filter, Parameters};
use crate::value::Value;

impl Parameters {
    /// Switch to page pagination at `page` (at least 1), keeping the current
    /// page size or limit.
    #[must_use]
    pub fn set_page(&self, page: u64) -> Self {
        let page_size = self.page_size.or(self.limit).or(self.first).or(self.last);
        let mut next = self.clone();
        next.clear_pagination();
        next.page = Some(page.max(1));
        next.page_size = page_size;
        next
    }

    /// The following page, not beyond `total_pages` when it is known.
    #[must_use]
    pub fn to_next_page(&self, total_pages: Option<u64>) -> Self {
        let page = self.page.unwrap_or(1).saturating_add(1);
        let page = match total_pages {
            Some(total) if page > total => total,
            _ => page,
        };
        self.set_page(page)
    }

    #[must_use]
    pub fn to_previous_page(&self) -> Self {
        self.set_page(self.page.unwrap_or(1).saturating_sub(1))
    }

    /// Switch to limit/offset pagination at `offset`, keeping the current
    /// limit or page size.
    #[must_use]
    pub fn set_offset(&self, offset: u64) -> Self {
        let limit = self.limit.or(self.page_size).or(self.first).or(self.last);
        let mut next = self.clone();
        next.clear_pagination();
        next.limit = limit;
        next.offset = Some(offset);
        next
    }

    /// Advance the offset by the limit; unchanged when that would move past
    /// `total_count`.
    #[must_use]
    pub fn to_next_offset(&self, total_count: Option<u64>) -> Self {
        let offset = self.offset.unwrap_or(0);
        let step = self.limit.or(self.page_size).unwrap_or(0);
        let candidate = offset.saturating_add(step);
        match total_count {
            Some(total) if candidate >= total => self.set_offset(offset),
            _ => self.set_offset(candidate),
        }
    }

    #[must_use]
    pub fn to_previous_offset(&self) -> Self {
        let step = self.limit.or(self.page_size).unwrap_or(0);
        self.set_offset(self.offset.unwrap_or(0).saturating_sub(step))
    }

    /// Forward cursor request for the page after `end_cursor`.
    #[must_use]
    pub fn to_next_cursor(&self, end_cursor: impl Into<String>) -> Self {
        let first = self.first.or(self.last).or(self.limit).or(self.page_size);
        let mut next = self.clone();
        next.clear_pagination();
        next.first = first;
        next.after = Some(end_cursor.into());
        next
    }

    /// Backward cursor request for the page before `start_cursor`.
    #[must_use]
    pub fn to_previous_cursor(&self, start_cursor: impl Into<String>) -> Self {
        let last = self.last.or(self.first).or(self.limit).or(self.page_size);
        let mut next = self.clone();
        next.clear_pagination();
        next.last = last;
        next.before = Some(start_cursor.into());
        next
    }

    #[must_use]
    pub fn reset_cursors(&self) -> Self {
        Self {
            after: None,
            before: None,
            decoded_cursor: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn reset_filters(&self) -> Self {
        Self {
            filters: Vec::new(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn reset_order(&self) -> Self {
        Self {
            order_by: None,
            order_directions: None,
            ..self.clone()
        }
    }

    /// Put `field` at the front of the ordering.
    ///
    /// If it is already first, its direction toggles between the two
    /// directions of `directions` (default `asc`/`desc`); otherwise it moves to
    /// the front with the ascending one. Cursors are reset, since they no
    /// longer match the order.
    ///
    /// # Errors
    ///
    /// [`InvalidDirectionsError`] unless `directions` is one ascending and one
    /// descending direction, in that order.
    pub fn push_order(
        &self,
        field: impl Into<String>,
        directions: Option<(Direction, Direction)>,
    ) -> Result<Self, InvalidDirectionsError> {
        let (asc, desc) = directions.unwrap_or((Direction::Asc, Direction::Desc));
        if !asc.is_ascending() || desc.is_ascending() {
            return Err(InvalidDirectionsError { asc, desc });
        }
        let field = field.into();

        let mut order_by = self.order_by.clone().unwrap_or_default();
        let mut dirs = self.order_directions.clone().unwrap_or_default();
        dirs.resize(order_by.len(), Direction::Asc);

        let direction = if order_by.first() == Some(&field) {
            order_by.remove(0);
            if dirs.remove(0) == asc { desc } else { asc }
        } else {
            if let Some(i) = order_by.iter().position(|f| *f == field) {
                order_by.remove(i);
                dirs.remove(i);
            }
            asc
        };
        order_by.insert(0, field);
        dirs.insert(0, direction);

        let mut next = self.reset_cursors();
        next.order_by = Some(order_by);
        next.order_directions = Some(dirs);
        Ok(next)
    }

    /// Value of the first filter on `field`.
    #[must_use]
    pub fn filter_value(&self, field: &str) -> Option<&Value> {
        self.filters
            .iter()
            .find(|f| f.field.as_deref() == Some(field))
            .map(|f| &f.value)
    }

    /// Replace all filters on the same field with `filter`.
    #[must_use]
    pub fn put_filter(&self, filter: Filter) -> Self {
        let mut next = self.clone();
        next.filters.retain(|f| f.field != filter.field);
        next.filters.push(filter);
        next
    }

    #[must_use]
    pub fn delete_filter(&self, field: &str) -> Self {
        let mut next = self.clone();
        next.filters.retain(|f| f.field.as_deref() != Some(field));
        next
    }

    /// Bracket-notation query pairs that [`crate::RawParams::from_query_str`]
    /// reads back into equivalent parameters.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, filter) in self.filters.iter().enumerate() {
            let prefix = format!("filters[{i}]");
            if let Some(field) = &filter.field {
                pairs.push((format!("{prefix}[field]"), field.clone()));
            }
            pairs.push((format!("{prefix}[op]"), filter.op.to_string()));
            push_value(&mut pairs, format!("{prefix}[value]"), &filter.value);
        }
        for field in self.order_by.iter().flatten() {
            pairs.push(("order_by[]".to_owned(), field.clone()));
        }
        for direction in self.order_directions.iter().flatten() {
            pairs.push(("order_directions[]".to_owned(), direction.to_string()));
        }
        let scalars = [
            ("first", self.first.map(|n| n.to_string())),
            ("after", self.after.clone()),
            ("last", self.last.map(|n| n.to_string())),
            ("before", self.before.clone()),
            ("limit", self.limit.map(|n| n.to_string())),
            ("offset", self.offset.map(|n| n.to_string())),
            ("page", self.page.map(|n| n.to_string())),
            ("page_size", self.page_size.map(|n| n.to_string())),
        ];
        for (name, value) in scalars {
            if let Some(value) = value {
                pairs.push((name.to_owned(), value));
            }
        }
        pairs
    }

    /// [`Self::to_query_pairs`] as an encoded query string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self.to_query_pairs()).unwrap_or_default()
    }
}

fn push_value(pairs: &mut Vec<(String, String)>, key: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::List(items) => {
            for item in items {
                push_value(pairs, format!("{key}[]"), item);
            }
        }
        Value::Map(entries) => {
            for (k, v) in entries {
                push_value(pairs, format!("{key}[{k}]"), v);
            }
        }
        scalar => pairs.push((key, scalar.to_string())),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use crate::params::RawParams;

    fn paged() -> Parameters {
        Parameters {
            page: Some(2),
            page_size: Some(10),
            ..Parameters::default()
        }
    }

    #[test]
    fn page_navigation() {
        assert_eq!(paged().to_next_page(Some(3)).page, Some(3));
        assert_eq!(paged().to_next_page(Some(2)).page, Some(2));
        assert_eq!(paged().to_previous_page().page, Some(1));
        assert_eq!(paged().to_previous_page().to_previous_page().page, Some(1));
        assert_eq!(paged().to_next_page(None).page_size, Some(10));
    }

    #[test]
    fn offset_navigation() {
        let params = paged().set_offset(4);
        assert_eq!((params.limit, params.offset, params.page), (Some(10), Some(4), None));
        assert_eq!(params.to_next_offset(Some(20)).offset, Some(14));
        assert_eq!(params.to_next_offset(Some(14)).offset, Some(4));
        assert_eq!(params.to_previous_offset().offset, Some(0));
    }

    #[test]
    fn cursor_navigation_switches_direction() {
        let params = Parameters {
            first: Some(5),
            after: Some("a".into()),
            ..Parameters::default()
        };
        let prev = params.to_previous_cursor("s");
        assert_eq!((prev.last, prev.before.as_deref()), (Some(5), Some("s")));
        assert_eq!((prev.first, prev.after.as_deref()), (None, None));

        let next = prev.to_next_cursor("e");
        assert_eq!((next.first, next.after.as_deref()), (Some(5), Some("e")));
        assert_eq!(next.reset_cursors().after, None);
    }

    #[test]
    fn push_order_moves_and_toggles() {
        let params = Parameters {
            order_by: Some(vec!["name".into(), "age".into()]),
            order_directions: Some(vec![Direction::Desc]),
            after: Some("x".into()),
            ..Parameters::default()
        };

        let pushed = params.push_order("age", None).unwrap();
        assert_eq!(pushed.order_by, Some(vec!["age".to_owned(), "name".to_owned()]));
        assert_eq!(
            pushed.order_directions,
            Some(vec![Direction::Asc, Direction::Desc])
        );
        assert_eq!(pushed.after, None);

        let toggled = pushed.push_order("age", None).unwrap();
        assert_eq!(toggled.order_directions.unwrap()[0], Direction::Desc);

        let custom = Some((Direction::AscNullsFirst, Direction::DescNullsLast));
        let toggled = params.push_order("name", custom).unwrap();
        assert_eq!(toggled.order_directions.unwrap()[0], Direction::AscNullsFirst);
    }

    #[test]
    fn push_order_rejects_malformed_pairs() {
        let err = Parameters::default()
            .push_order("name", Some((Direction::Desc, Direction::Asc)))
            .unwrap_err();
        assert_eq!(err.asc, Direction::Desc);
    }

    #[test]
    fn filter_accessors() {
        let params = Parameters::default()
            .put_filter(Filter::new("age", Operator::Gt, 2i64))
            .put_filter(Filter::new("name", Operator::Eq, "Harry"))
            .put_filter(Filter::new("age", Operator::Lt, 9i64));
        assert_eq!(params.filters.len(), 2);
        assert_eq!(params.filter_value("age"), Some(&Value::Int(9)));
        assert_eq!(params.delete_filter("age").filter_value("age"), None);
        assert!(params.reset_filters().filters.is_empty());
    }

    #[test]
    fn query_pairs_read_back() {
        let params = Parameters {
            filters: vec![Filter::new("name", Operator::In, vec!["Harry", "Patty"])],
            order_by: Some(vec!["name".into()]),
            order_directions: Some(vec![Direction::DescNullsLast]),
            page: Some(2),
            page_size: Some(10),
            ..Parameters::default()
        };
        let raw = RawParams::from_query_str(&params.to_query_string()).unwrap();

        assert_eq!(raw.order_by, Some(Value::from(vec!["name"])));
        assert_eq!(raw.order_directions, Some(Value::from(vec!["desc_nulls_last"])));
        assert_eq!(raw.page, Some(Value::from("2")));
        let filters = raw.filters.unwrap();
        let filter = &filters.as_list().unwrap()[0];
        assert_eq!(filter.get("op"), Some(&Value::from("in")));
        assert_eq!(filter.get("value"), Some(&Value::from(vec!["Harry", "Patty"])));
    }
}
