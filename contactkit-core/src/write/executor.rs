use shared_types::{
    ContactChanges, ContactDraft, ContactPatch, ContactsError, ContactsResult, Item, LabeledValue,
    Ref, WriteResult,
};

use super::plan::Step;
use crate::automation::{MemberIdentity, RemovalChannel};
use crate::membership::{MembershipChange, Reconciler};
use crate::store::{ContactStore, FieldSet, SaveRequest};

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn non_blank_values(values: &[LabeledValue]) -> Vec<LabeledValue> {
    values
        .iter()
        .filter(|entry| !entry.value.trim().is_empty())
        .map(|entry| LabeledValue::new(entry.label.trim(), entry.value.trim()))
        .collect()
}

/// Builds the record for a draft. A draft with no scalar or list content is
/// rejected.
fn draft_item(draft: &ContactDraft) -> ContactsResult<Item> {
    let item = Item {
        contact_ref: Ref {
            container_id: trimmed(&draft.container_id),
            ..Default::default()
        },
        given_name: trimmed(&draft.given_name),
        family_name: trimmed(&draft.family_name),
        middle_name: trimmed(&draft.middle_name),
        nickname: trimmed(&draft.nickname),
        organization: trimmed(&draft.organization),
        job_title: trimmed(&draft.job_title),
        note: trimmed(&draft.note),
        emails: non_blank_values(&draft.emails),
        phones: non_blank_values(&draft.phones),
        ..Default::default()
    };

    let has_content = [
        &item.given_name,
        &item.family_name,
        &item.middle_name,
        &item.nickname,
        &item.organization,
        &item.job_title,
        &item.note,
    ]
    .iter()
    .any(|value| !value.is_empty())
        || !item.emails.is_empty()
        || !item.phones.is_empty();

    if !has_content {
        return Err(ContactsError::validation(
            "contact draft needs at least one non-empty field",
        ));
    }
    Ok(item)
}

/// Applies the explicitly set fields of `changes`. Returns whether the record
/// actually changed.
fn apply_changes(item: &mut Item, changes: &ContactChanges) -> bool {
    let before = item.clone();

    let scalars = [
        (&mut item.given_name, &changes.given_name),
        (&mut item.family_name, &changes.family_name),
        (&mut item.middle_name, &changes.middle_name),
        (&mut item.nickname, &changes.nickname),
        (&mut item.organization, &changes.organization),
        (&mut item.job_title, &changes.job_title),
        (&mut item.note, &changes.note),
    ];
    for (field, change) in scalars {
        if let Some(value) = change {
            *field = value.trim().to_string();
        }
    }
    if let Some(emails) = &changes.emails {
        item.emails = non_blank_values(emails);
    }
    if let Some(phones) = &changes.phones {
        item.phones = non_blank_values(phones);
    }

    *item != before
}

fn failure(contact_ref: Ref, err: ContactsError, created: bool, updated: bool) -> WriteResult {
    WriteResult {
        created,
        updated,
        ..WriteResult::failed(contact_ref, err)
    }
}

/// Runs creates, patches and compiled mutation steps against a store.
///
/// Every call returns exactly one `WriteResult`. A failing save stops the
/// remaining work for that contact and the result records what already
/// happened.
pub struct WriteExecutor<'a> {
    store: &'a dyn ContactStore,
    reconciler: Reconciler<'a>,
}

impl<'a> WriteExecutor<'a> {
    pub fn new(store: &'a dyn ContactStore, remover: &'a dyn RemovalChannel) -> Self {
        Self {
            store,
            reconciler: Reconciler::new(store, remover),
        }
    }

    pub fn create(&self, draft: &ContactDraft) -> WriteResult {
        let item = match draft_item(draft) {
            Ok(item) => item,
            Err(err) => return WriteResult::failed(Ref::default(), err),
        };
        let member = MemberIdentity::from(&item);

        let contact_ref = match self
            .store
            .save(SaveRequest::CreateContact(item))
            .and_then(|receipt| receipt.into_contact_ref())
        {
            Ok(contact_ref) => contact_ref,
            Err(err) => return WriteResult::failed(Ref::default(), err),
        };
        tracing::debug!(contact_id = %contact_ref.id, "Created contact");

        let change = MembershipChange::new(&draft.group_ids, &[]);
        let member = MemberIdentity {
            id: contact_ref.id.clone(),
            ..member
        };
        match self.reconciler.run(&member, &change) {
            Ok(_) => WriteResult::created(contact_ref),
            Err(err) => failure(contact_ref, err, true, false),
        }
    }

    pub fn patch(&self, patch: &ContactPatch) -> WriteResult {
        let contact_ref = patch.contact_ref.clone();
        let changes = &patch.changes;

        let change = MembershipChange::new(&changes.add_group_ids, &changes.remove_group_ids);
        if let Some(group_id) = change.add.iter().find(|id| change.remove.contains(*id)) {
            return WriteResult::failed(
                contact_ref,
                ContactsError::validation(format!(
                    "group {} is both added and removed",
                    group_id
                )),
            );
        }

        let mut item = match self.load(&contact_ref) {
            Ok(item) => item,
            Err(err) => return WriteResult::failed(contact_ref, err),
        };

        let mut updated = false;
        if apply_changes(&mut item, changes) {
            if let Err(err) = self.store.save(SaveRequest::UpdateContact(item.clone())) {
                return WriteResult::failed(contact_ref, err);
            }
            updated = true;
        }

        if !change.is_empty() {
            if let Err(err) = self.reconciler.run(&MemberIdentity::from(&item), &change) {
                return failure(contact_ref, err, false, updated);
            }
            updated = true;
        }

        WriteResult::updated(contact_ref, updated)
    }

    /// Runs `steps` in order against one contact, stopping at the first
    /// failure.
    pub fn mutate(&self, contact_ref: &Ref, steps: &[Step]) -> WriteResult {
        let mut item = match self.load(contact_ref) {
            Ok(item) => item,
            Err(err) => return WriteResult::failed(contact_ref.clone(), err),
        };

        let mut updated = false;
        for step in steps {
            let outcome = match step {
                Step::SetFields(changes) => {
                    if apply_changes(&mut item, changes) {
                        self.store
                            .save(SaveRequest::UpdateContact(item.clone()))
                            .map(|_| true)
                    } else {
                        Ok(false)
                    }
                }
                Step::Membership(change) => self
                    .reconciler
                    .run(&MemberIdentity::from(&item), change)
                    .map(|_| true),
                Step::Delete => self
                    .store
                    .save(SaveRequest::DeleteContact {
                        id: contact_ref.id.clone(),
                    })
                    .map(|_| true),
            };

            match outcome {
                Ok(changed) => updated |= changed,
                Err(err) => return failure(contact_ref.clone(), err, false, updated),
            }
        }

        WriteResult::updated(contact_ref.clone(), updated)
    }

    fn load(&self, contact_ref: &Ref) -> ContactsResult<Item> {
        let id = contact_ref.id.trim();
        if id.is_empty() {
            return Err(ContactsError::validation("ref id is required"));
        }
        self.store
            .fetch_by_ids(&[id.to_string()], FieldSet::all())?
            .into_iter()
            .next()
            .ok_or_else(|| ContactsError::not_found(format!("contact {} not found", id)))
    }
}
