//! Selection: clause matching, sorting and pagination over a full store
//! enumeration.

pub mod cursor;
pub mod matcher;
pub mod window;

pub use matcher::{decide, fold, CompiledQuery};
pub use window::{effective_limit, paginate, sort_items, Window, DEFAULT_PAGE_LIMIT};

use shared_types::{ContactsResult, FindInput, FindOutput, Meta};

use crate::store::ContactStore;

/// Runs one Find against `store`.
///
/// The cursor is validated before the store is touched. Group clauses are
/// resolved once, then every enumerated candidate is matched, sorted and
/// windowed. Any store error aborts with no partial output.
pub fn select(store: &dyn ContactStore, input: &FindInput) -> ContactsResult<FindOutput> {
    let offset = cursor::decode(&input.page.cursor)?;
    let limit = effective_limit(input.page.limit);

    let compiled = CompiledQuery::compile(&input.query, |group_id| store.group_members(group_id))?;
    let candidates = store.enumerate(compiled.candidate_fields())?;
    let scanned = candidates.len();

    let mut matched: Vec<_> = candidates
        .into_iter()
        .filter(|item| compiled.matches(item))
        .collect();
    sort_items(&mut matched, input.sort);

    tracing::debug!(
        scanned,
        matched = matched.len(),
        clauses = compiled.clause_count(),
        offset,
        limit,
        "Find scan complete"
    );

    let window = paginate(matched, offset, limit);
    let meta = if input.include_meta {
        window.items.iter().map(Meta::from).collect()
    } else {
        Vec::new()
    };

    Ok(FindOutput {
        refs: window
            .items
            .into_iter()
            .map(|item| item.contact_ref)
            .collect(),
        meta,
        next_cursor: window.next_cursor,
    })
}
