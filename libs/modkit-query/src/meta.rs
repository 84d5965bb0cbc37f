//! Pagination metadata.
//!
//! Offset and page pagination derive everything from the total count; cursor
//! pagination derives it from the fetched window, which holds one probe row
//! more than requested when another page exists.

use serde::Serialize;

use crate::cursor::{self, CursorMap};
use crate::error::Error;
use crate::params::{PaginationType, Parameters};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Meta {
    pub total_count: Option<u64>,
    pub total_pages: Option<u64>,
    pub current_offset: Option<u64>,
    pub current_page: Option<u64>,
    pub previous_offset: Option<u64>,
    pub previous_page: Option<u64>,
    pub next_offset: Option<u64>,
    pub next_page: Option<u64>,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub page_size: Option<u64>,
    /// Parameters used for the request, without the decoded cursor.
    pub params: Parameters,
}

/// Offset of the following page, or `None` on the last page.
#[must_use]
pub fn next_offset(offset: u64, page_size: u64, total_count: u64) -> Option<u64> {
    let next = offset.saturating_add(page_size);
    (next < total_count).then_some(next)
}

#[must_use]
pub fn previous_offset(offset: u64, page_size: u64) -> u64 {
    offset.saturating_sub(page_size)
}

#[must_use]
pub fn total_pages(total_count: u64, page_size: Option<u64>) -> u64 {
    match page_size {
        _ if total_count == 0 => 0,
        None | Some(0) => 1,
        Some(size) => total_count.div_ceil(size),
    }
}

/// Metadata for limit/offset and page/page_size requests (and for requests
/// with only a default limit).
#[must_use]
pub fn offset_meta(params: &Parameters, total_count: u64) -> Meta {
    let page_size = params.page_size.or(params.limit).filter(|n| *n > 0);
    let current_offset = match (params.offset, params.page, page_size) {
        (Some(offset), _, _) => offset,
        (None, Some(page), Some(size)) => page.saturating_sub(1).saturating_mul(size),
        _ => 0,
    };
    let total_pages = total_pages(total_count, page_size);
    let current_page = match (params.page, params.limit) {
        (Some(page), _) => page,
        (None, Some(limit)) if limit > 0 && params.offset.is_some() => {
            (current_offset.div_ceil(limit) + 1).min(total_pages)
        }
        _ => 1,
    };

    let has_previous_page = current_offset > 0;
    let (previous_offset, previous_page) = if has_previous_page {
        (
            Some(previous_offset(current_offset, page_size.unwrap_or(0))),
            current_page.checked_sub(1).filter(|p| *p > 0),
        )
    } else {
        (None, None)
    };

    let next = page_size.and_then(|size| next_offset(current_offset, size, total_count));
    let (next_offset, next_page) = match next {
        Some(offset) => (Some(offset), Some(total_pages.min(current_page + 1))),
        None => (None, None),
    };

    Meta {
        total_count: Some(total_count),
        total_pages: Some(total_pages),
        current_offset: Some(current_offset),
        current_page: Some(current_page),
        previous_offset,
        previous_page,
        next_offset,
        next_page,
        start_cursor: None,
        end_cursor: None,
        has_previous_page,
        has_next_page: next.is_some(),
        page_size,
        params: params.without_decoded_cursor(),
    }
}

/// Trim a fetched cursor window and compute its metadata.
///
/// `window` is what the backend returned for the composed page bound (up to
/// `first + 1` or `last + 1` rows, in physical scan order). The returned
/// records are in logical order.
///
/// # Errors
///
/// Propagates cursor encoding failures.
pub fn cursor_meta<T, F>(
    params: &Parameters,
    mut window: Vec<T>,
    extract: F,
) -> Result<(Vec<T>, Meta), Error>
where
    F: Fn(&T, &[String]) -> CursorMap,
{
    let backward = params.is_backward();
    let (has_previous_page, has_next_page, page_size) = if backward {
        let last = params.last.unwrap_or(u64::MAX);
        let more = exceeds(window.len(), last);
        truncate(&mut window, last);
        window.reverse();
        (more, params.before.is_some(), params.last)
    } else {
        let first = params.first.unwrap_or(u64::MAX);
        let more = exceeds(window.len(), first);
        truncate(&mut window, first);
        (params.after.is_some(), more, params.first)
    };

    let order_by = params.order_by.as_deref().unwrap_or_default();
    let (start_cursor, end_cursor) = cursor::get_cursors(&window, order_by, extract)?;

    let meta = Meta {
        start_cursor,
        end_cursor,
        has_previous_page,
        has_next_page,
        page_size,
        params: params.without_decoded_cursor(),
        ..Meta::default()
    };
    Ok((window, meta))
}

fn exceeds(len: usize, bound: u64) -> bool {
    u64::try_from(len).is_ok_and(|len| len > bound)
}

fn truncate<T>(window: &mut Vec<T>, bound: u64) {
    if let Ok(bound) = usize::try_from(bound) {
        window.truncate(bound);
    }
}

/// Whether `params` paginate with cursors.
#[must_use]
pub fn is_cursor_mode(params: &Parameters) -> bool {
    params
        .pagination_type()
        .is_some_and(PaginationType::is_cursor)
}
