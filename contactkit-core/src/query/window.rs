use shared_types::{Item, Sort, SortField, SortOrder};

use super::cursor;

pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Non-positive limits fall back to [`DEFAULT_PAGE_LIMIT`].
pub fn effective_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

fn sort_key(item: &Item, by: SortField) -> (String, String) {
    let given = item.given_name.to_lowercase();
    let family = item.family_name.to_lowercase();
    match by {
        SortField::GivenName => (given, family),
        SortField::FamilyName => (family, given),
    }
}

/// Sorts by the compound name key, case-insensitively. Equal keys keep their
/// input order; descending is the exact reverse of ascending.
pub fn sort_items(items: &mut [Item], sort: Sort) {
    items.sort_by_cached_key(|item| sort_key(item, sort.by));
    if sort.order == SortOrder::Desc {
        items.reverse();
    }
}

/// One page of a sorted sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<T> {
    pub items: Vec<T>,
    pub next_cursor: String,
}

/// Cuts `[offset, offset + limit)` out of `items`, clamped to its length.
/// The next cursor is empty once the end of the sequence is reached.
pub fn paginate<T>(mut items: Vec<T>, offset: usize, limit: usize) -> Window<T> {
    let len = items.len();
    let start = offset.min(len);
    let end = start.saturating_add(limit).min(len);
    let next_cursor = if end < len {
        cursor::encode(end)
    } else {
        String::new()
    };

    Window {
        items: items.drain(start..end).collect(),
        next_cursor,
    }
}
