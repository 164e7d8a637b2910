//! Pagination cursor codec. A cursor is the decimal zero-based offset into
//! the sorted match sequence.

use shared_types::{ContactsError, ContactsResult};

/// Decodes a caller cursor. Surrounding whitespace is ignored and an empty
/// cursor is offset zero.
pub fn decode(cursor: &str) -> ContactsResult<usize> {
    let cursor = cursor.trim();
    if cursor.is_empty() {
        return Ok(0);
    }
    cursor
        .parse::<usize>()
        .map_err(|_| ContactsError::validation(format!("invalid cursor {:?}", cursor)))
}

pub fn encode(offset: usize) -> String {
    offset.to_string()
}
