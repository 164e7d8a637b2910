use shared_types::{ContactChanges, ContactsError, ContactsResult, MutationOp, MutationType};

use crate::membership::MembershipChange;

/// One unit of work for a mutated contact.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Consecutive scalar sets, submitted as one update.
    SetFields(ContactChanges),
    /// Consecutive membership ops, reconciled as one batch.
    Membership(MembershipChange),
    Delete,
}

/// Validates `ops` and folds them into ordered steps.
///
/// Set ops need a value (an empty one clears the field). Group ops need a
/// non-blank group id. `delete` must be the last op.
pub fn compile(ops: &[MutationOp]) -> ContactsResult<Vec<Step>> {
    if ops.is_empty() {
        return Err(ContactsError::validation("at least one op is required"));
    }

    let mut steps: Vec<Step> = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        let value = op.value.as_deref().map(str::trim);
        if op.kind.requires_value() && value.map_or(true, str::is_empty) {
            return Err(ContactsError::validation(format!(
                "op {} ({}) requires a group id",
                index,
                op.kind.as_str()
            )));
        }

        match op.kind {
            MutationType::Delete => {
                if index + 1 != ops.len() {
                    return Err(ContactsError::validation(format!(
                        "op {} (delete) must be the last op",
                        index
                    )));
                }
                steps.push(Step::Delete);
            }
            MutationType::AddToGroup | MutationType::RemoveFromGroup => {
                let group_id = value.unwrap_or_default();
                let adding = op.kind == MutationType::AddToGroup;
                let extends_batch = matches!(
                    steps.last(),
                    Some(Step::Membership(change)) if !change.would_contradict(group_id, adding)
                );
                if !extends_batch {
                    steps.push(Step::Membership(MembershipChange::default()));
                }
                if let Some(Step::Membership(change)) = steps.last_mut() {
                    push_membership(change, group_id, adding);
                }
            }
            scalar => {
                let value = value.ok_or_else(|| {
                    ContactsError::validation(format!(
                        "op {} ({}) requires a value",
                        index,
                        scalar.as_str()
                    ))
                })?;
                if !matches!(steps.last(), Some(Step::SetFields(_))) {
                    steps.push(Step::SetFields(ContactChanges::default()));
                }
                if let Some(Step::SetFields(changes)) = steps.last_mut() {
                    set_scalar(changes, scalar, value);
                }
            }
        }
    }

    Ok(steps)
}

fn push_membership(change: &mut MembershipChange, group_id: &str, adding: bool) {
    if adding {
        change.push_add(group_id);
    } else {
        change.push_remove(group_id);
    }
}

fn set_scalar(changes: &mut ContactChanges, kind: MutationType, value: &str) {
    let value = Some(value.to_string());
    match kind {
        MutationType::SetNote => changes.note = value,
        MutationType::SetOrganization => changes.organization = value,
        MutationType::SetJobTitle => changes.job_title = value,
        MutationType::SetGivenName => changes.given_name = value,
        MutationType::SetFamilyName => changes.family_name = value,
        MutationType::AddToGroup | MutationType::RemoveFromGroup | MutationType::Delete => {}
    }
}
