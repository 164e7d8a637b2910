//! Caller-facing primitives bound to one store session.

use std::collections::HashMap;

use shared_types::{
    AuthStatus, ContactsError, ContactsResult, FindInput, FindOutput, GetInput, GetOutput,
    GroupRef, GroupResult, GroupsAction, GroupsInput, GroupsOutput, MutateInput, MutateOutput,
    UpsertInput, UpsertOutput, WriteResult,
};

use crate::automation::RemovalChannel;
use crate::query;
use crate::report::BatchReport;
use crate::store::{ContactStore, FieldSet, SaveRequest};
use crate::write::{self, WriteExecutor};

/// Explicit session over a contacts store and its removal channel.
///
/// Nothing is cached between calls; each primitive reads the store afresh.
pub struct Contacts<'a> {
    store: &'a dyn ContactStore,
    remover: &'a dyn RemovalChannel,
}

impl<'a> Contacts<'a> {
    pub fn new(store: &'a dyn ContactStore, remover: &'a dyn RemovalChannel) -> Self {
        Self { store, remover }
    }

    pub fn authorization_status(&self) -> ContactsResult<AuthStatus> {
        self.store.authorization_status()
    }

    /// Requests access and returns the resulting status.
    pub fn request_access(&self) -> ContactsResult<AuthStatus> {
        self.store.request_access()?;
        self.store.authorization_status()
    }

    pub fn find(&self, input: &FindInput) -> ContactsResult<FindOutput> {
        query::select(self.store, input)
    }

    /// Hydrates refs in ref order. Refs missing from the store are omitted
    /// and unrequested fields come back blank.
    pub fn get(&self, input: &GetInput) -> ContactsResult<GetOutput> {
        if let Some(index) = input
            .refs
            .iter()
            .position(|contact_ref| contact_ref.id.trim().is_empty())
        {
            return Err(ContactsError::validation(format!(
                "ref {} has an empty id",
                index
            )));
        }
        if input.refs.is_empty() {
            return Ok(GetOutput::default());
        }

        let fields = FieldSet::from_fields(&input.fields);
        let mut ids: Vec<String> = Vec::with_capacity(input.refs.len());
        for contact_ref in &input.refs {
            let id = contact_ref.id.trim();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }

        let by_id: HashMap<String, _> = self
            .store
            .fetch_by_ids(&ids, fields)?
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect();

        let items = input
            .refs
            .iter()
            .filter_map(|contact_ref| by_id.get(contact_ref.id.trim()))
            .map(|item| fields.project(item.clone()))
            .collect();

        Ok(GetOutput { items })
    }

    /// Creates then patches, one result per input item.
    pub fn upsert(&self, input: &UpsertInput) -> UpsertOutput {
        let executor = WriteExecutor::new(self.store, self.remover);
        let mut report = BatchReport::new("upsert");

        for draft in &input.create {
            report.record(executor.create(draft));
        }
        for patch in &input.patch {
            report.record(executor.patch(patch));
        }

        UpsertOutput {
            results: report.finish(),
        }
    }

    /// Applies the same ops to every ref, one result per ref.
    pub fn mutate(&self, input: &MutateInput) -> MutateOutput {
        let executor = WriteExecutor::new(self.store, self.remover);
        let mut report = BatchReport::new("mutate");

        match write::compile(&input.ops) {
            Ok(steps) => {
                for contact_ref in &input.refs {
                    report.record(executor.mutate(contact_ref, &steps));
                }
            }
            Err(err) => {
                for contact_ref in &input.refs {
                    report.record(WriteResult::failed(contact_ref.clone(), err.clone()));
                }
            }
        }

        MutateOutput {
            results: report.finish(),
        }
    }

    /// Runs one catalog action. The output carries the catalog as it stands
    /// afterwards; failing to read it fails the whole call.
    pub fn groups(&self, input: &GroupsInput) -> ContactsResult<GroupsOutput> {
        let mut report = BatchReport::new("groups");
        match input.action {
            GroupsAction::List => {}
            GroupsAction::Create => report.record(self.create_group(input)),
            GroupsAction::Rename => report.record(self.rename_group(input)),
            GroupsAction::Delete => report.record(self.delete_group(input)),
        }

        let results = if input.action == GroupsAction::List {
            Vec::new()
        } else {
            report.finish()
        };

        Ok(GroupsOutput {
            groups: self.store.list_groups()?,
            results,
        })
    }

    fn create_group(&self, input: &GroupsInput) -> GroupResult {
        let Some(name) = non_blank(&input.name) else {
            return GroupResult::failed(
                GroupRef::default(),
                ContactsError::validation("group name is required"),
            );
        };

        match self
            .store
            .save(SaveRequest::CreateGroup {
                name: name.to_string(),
                container_id: non_blank(&input.container_id).map(str::to_string),
            })
            .and_then(|receipt| receipt.into_group_ref())
        {
            Ok(group) => GroupResult {
                group,
                succeeded: true,
                created: true,
                updated: false,
                err: None,
            },
            Err(err) => GroupResult::failed(GroupRef::default(), err),
        }
    }

    fn rename_group(&self, input: &GroupsInput) -> GroupResult {
        let group = match target_group(input) {
            Ok(group) => group,
            Err(err) => return GroupResult::failed(input.group.clone().unwrap_or_default(), err),
        };
        let Some(name) = non_blank(&input.name) else {
            return GroupResult::failed(group, ContactsError::validation("group name is required"));
        };

        match self
            .store
            .save(SaveRequest::RenameGroup {
                id: group.id.clone(),
                name: name.to_string(),
            })
            .and_then(|receipt| receipt.into_group_ref())
        {
            Ok(group) => GroupResult {
                group,
                succeeded: true,
                created: false,
                updated: true,
                err: None,
            },
            Err(err) => GroupResult::failed(group, err),
        }
    }

    fn delete_group(&self, input: &GroupsInput) -> GroupResult {
        let group = match target_group(input) {
            Ok(group) => group,
            Err(err) => return GroupResult::failed(input.group.clone().unwrap_or_default(), err),
        };

        match self.store.save(SaveRequest::DeleteGroup {
            id: group.id.clone(),
        }) {
            Ok(_) => GroupResult {
                group,
                succeeded: true,
                created: false,
                updated: true,
                err: None,
            },
            Err(err) => GroupResult::failed(group, err),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn target_group(input: &GroupsInput) -> ContactsResult<GroupRef> {
    match &input.group {
        Some(group) if !group.id.trim().is_empty() => Ok(GroupRef {
            id: group.id.trim().to_string(),
            ..group.clone()
        }),
        _ => Err(ContactsError::validation("group id is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{RecordingRemover, StaleRemover};
    use shared_types::{
        ContactChanges, ContactDraft, ContactPatch, ErrorCode, Field, Item, LabeledValue,
        MutationOp, Page, Query, Ref, Sort, SortField, SortOrder,
    };

    fn person(given: &str, family: &str, org: &str) -> Item {
        Item {
            given_name: given.to_string(),
            family_name: family.to_string(),
            organization: org.to_string(),
            ..Default::default()
        }
    }

    fn seeded() -> (MemoryStore, Vec<Ref>) {
        let store = MemoryStore::new();
        let refs = vec![
            store.insert_contact(person("Priya", "N.", "Acme Corp")),
            store.insert_contact(person("Priya", "Shah", "Globex")),
            store.insert_contact(person("Omar", "Haddad", "Acme Corp")),
            store.insert_contact(person("Ana", "Núñez", "Initech")),
        ];
        (store, refs)
    }

    #[test]
    fn test_find_priya_at_acme() {
        let (store, refs) = seeded();
        let remover = store.remover();
        let contacts = Contacts::new(&store, &remover);

        let output = contacts
            .find(&FindInput {
                query: Query {
                    name_contains: Some("priya".to_string()),
                    organization_contains: Some("acme".to_string()),
                    ..Default::default()
                },
                page: Page::first(10),
                include_meta: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(output.refs, vec![refs[0].clone()]);
        assert_eq!(output.meta.len(), 1);
        assert_eq!(output.meta[0].display_name, "Priya N.");
        assert_eq!(output.meta[0].organization, "Acme Corp");
        assert!(!output.has_more());
    }

    #[test]
    fn test_find_pages_through_sorted_matches() {
        let (store, refs) = seeded();
        let remover = store.remover();
        let contacts = Contacts::new(&store, &remover);
        let mut input = FindInput {
            page: Page::first(3),
            sort: Sort {
                by: SortField::FamilyName,
                order: SortOrder::Asc,
            },
            ..Default::default()
        };

        let first = contacts.find(&input).unwrap();
        assert_eq!(first.refs, vec![refs[2].clone(), refs[0].clone(), refs[3].clone()]);
        assert_eq!(first.next_cursor, "3");

        input.page.cursor = first.next_cursor;
        let second = contacts.find(&input).unwrap();
        assert_eq!(second.refs, vec![refs[1].clone()]);
        assert!(second.next_cursor.is_empty());
    }

    #[test]
    fn test_find_diacritic_insensitive() {
        let (store, refs) = seeded();
        let remover = store.remover();
        let output = Contacts::new(&store, &remover)
            .find(&FindInput {
                query: Query {
                    name_contains: Some("nunez".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        assert_eq!(output.refs, vec![refs[3].clone()]);
    }

    #[test]
    fn test_find_invalid_cursor_before_store_access() {
        let store = MemoryStore::new().with_auth_status(AuthStatus::Denied);
        let remover = RecordingRemover::default();
        let contacts = Contacts::new(&store, &remover);

        let mut input = FindInput::default();
        input.page.cursor = "-5".to_string();
        assert_eq!(contacts.find(&input).unwrap_err().code, ErrorCode::Validation);

        input.page.cursor.clear();
        assert_eq!(
            contacts.find(&input).unwrap_err().code,
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn test_find_unknown_group_aborts() {
        let (store, _) = seeded();
        let remover = store.remover();
        let err = Contacts::new(&store, &remover)
            .find(&FindInput {
                query: Query {
                    group_ids_any: vec!["g-404".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_get_projects_and_keeps_ref_order() {
        let (store, refs) = seeded();
        let remover = store.remover();
        let output = Contacts::new(&store, &remover)
            .get(&GetInput {
                refs: vec![refs[2].clone(), Ref::new("c-404"), refs[0].clone()],
                fields: vec![Field::Names],
            })
            .unwrap();

        let ids: Vec<&str> = output.items.iter().map(|item| item.id()).collect();
        assert_eq!(ids, vec![refs[2].id.as_str(), refs[0].id.as_str()]);
        assert_eq!(output.items[0].given_name, "Omar");
        assert!(output.items[0].organization.is_empty());
    }

    #[test]
    fn test_get_rejects_empty_ref_id() {
        let (store, _) = seeded();
        let remover = store.remover();
        let err = Contacts::new(&store, &remover)
            .get(&GetInput {
                refs: vec![Ref::new(" ")],
                fields: vec![],
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn test_upsert_reports_creates_then_patches() {
        let (store, refs) = seeded();
        let remover = store.remover();
        let output = Contacts::new(&store, &remover).upsert(&UpsertInput {
            create: vec![
                ContactDraft {
                    given_name: Some("Lin".to_string()),
                    emails: vec![LabeledValue::new("home", "lin@example.com")],
                    ..Default::default()
                },
                ContactDraft::default(),
            ],
            patch: vec![ContactPatch {
                contact_ref: refs[0].clone(),
                changes: ContactChanges {
                    note: Some("VIP".to_string()),
                    ..Default::default()
                },
            }],
        });

        assert_eq!(output.results.len(), 3);
        assert!(output.results[0].succeeded && output.results[0].created);
        assert!(!output.results[1].succeeded);
        assert_eq!(
            output.results[1].err.as_ref().map(|e| e.code),
            Some(ErrorCode::Validation)
        );
        assert!(output.results[2].succeeded && output.results[2].updated);
        assert_eq!(output.results[2].contact_ref, refs[0]);
        assert_eq!(store.contact_count(), 5);
    }

    #[test]
    fn test_mutate_add_to_group_then_find_by_group() {
        let (store, refs) = seeded();
        let group_id = store.insert_group("Vendors");
        let remover = store.remover();
        let contacts = Contacts::new(&store, &remover);

        let output = contacts.mutate(&MutateInput {
            refs: vec![refs[0].clone(), refs[2].clone()],
            ops: vec![MutationOp::add_to_group(group_id.clone())],
        });
        assert!(output.results.iter().all(|r| r.succeeded && r.updated));
        assert!(store.is_member(&group_id, &refs[0].id));

        let found = contacts
            .find(&FindInput {
                query: Query {
                    group_ids_any: vec![group_id],
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.refs, vec![refs[2].clone(), refs[0].clone()]);
    }

    #[test]
    fn test_mutate_remove_that_does_not_persist_is_conflict() {
        let (store, refs) = seeded();
        let group_id = store.insert_group("Vendors");
        let remover = store.remover();
        Contacts::new(&store, &remover).mutate(&MutateInput {
            refs: vec![refs[0].clone()],
            ops: vec![MutationOp::add_to_group(group_id.clone())],
        });

        let stale = StaleRemover::default();
        let output = Contacts::new(&store, &stale).mutate(&MutateInput {
            refs: vec![refs[0].clone()],
            ops: vec![MutationOp::remove_from_group(group_id.clone())],
        });

        let result = &output.results[0];
        assert!(!result.succeeded);
        assert_eq!(result.err.as_ref().map(|e| e.code), Some(ErrorCode::Conflict));
        assert!(store.is_member(&group_id, &refs[0].id));
    }

    #[test]
    fn test_mutate_invalid_ops_fail_every_ref() {
        let (store, refs) = seeded();
        let remover = RecordingRemover::default();
        let output = Contacts::new(&store, &remover).mutate(&MutateInput {
            refs: vec![refs[0].clone(), refs[1].clone()],
            ops: vec![MutationOp::delete(), MutationOp::set_note("late")],
        });

        assert_eq!(output.results.len(), 2);
        for result in &output.results {
            assert_eq!(
                result.err.as_ref().map(|e| e.code),
                Some(ErrorCode::Validation)
            );
        }
        assert_eq!(store.contact_count(), 4);
    }

    #[test]
    fn test_mutate_one_failure_does_not_abort_batch() {
        let (store, refs) = seeded();
        let remover = RecordingRemover::default();
        let output = Contacts::new(&store, &remover).mutate(&MutateInput {
            refs: vec![Ref::new("c-404"), refs[1].clone()],
            ops: vec![MutationOp::set_note("checked")],
        });

        assert_eq!(
            output.results[0].err.as_ref().map(|e| e.code),
            Some(ErrorCode::NotFound)
        );
        assert!(output.results[1].succeeded);
    }

    #[test]
    fn test_groups_lifecycle() {
        let store = MemoryStore::new();
        let remover = store.remover();
        let contacts = Contacts::new(&store, &remover);

        let created = contacts.groups(&GroupsInput::create("Vendors")).unwrap();
        let group_id = created.created_group_id().unwrap().to_string();
        assert_eq!(created.groups.len(), 1);

        let renamed = contacts
            .groups(&GroupsInput::rename(group_id.clone(), "Suppliers"))
            .unwrap();
        assert!(renamed.results[0].updated);
        assert_eq!(renamed.groups[0].name, "Suppliers");

        let listed = contacts.groups(&GroupsInput::list()).unwrap();
        assert!(listed.results.is_empty());
        assert_eq!(listed.groups.len(), 1);

        let deleted = contacts.groups(&GroupsInput::delete(group_id)).unwrap();
        assert!(deleted.results[0].succeeded);
        assert!(deleted.groups.is_empty());
    }

    #[test]
    fn test_groups_validation_and_not_found() {
        let store = MemoryStore::new();
        let remover = store.remover();
        let contacts = Contacts::new(&store, &remover);

        let blank = contacts.groups(&GroupsInput::create("  ")).unwrap();
        assert_eq!(
            blank.results[0].err.as_ref().map(|e| e.code),
            Some(ErrorCode::Validation)
        );

        let missing = contacts.groups(&GroupsInput::delete("g-404")).unwrap();
        assert_eq!(
            missing.results[0].err.as_ref().map(|e| e.code),
            Some(ErrorCode::NotFound)
        );
    }

    #[test]
    fn test_groups_catalog_read_failure_fails_call() {
        let store = MemoryStore::new().with_auth_status(AuthStatus::Restricted);
        let remover = RecordingRemover::default();
        let err = Contacts::new(&store, &remover)
            .groups(&GroupsInput::list())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_request_access_reports_status() {
        let store = MemoryStore::new();
        let remover = RecordingRemover::default();
        let contacts = Contacts::new(&store, &remover);
        assert_eq!(contacts.request_access().unwrap(), AuthStatus::Authorized);
    }

    /// Full lifecycle against a SQLite file and the real `sqlite3` shell.
    /// Runs only with `CONTACTKIT_LIVE_TEST=1`.
    #[test]
    fn test_live_sqlite_lifecycle() {
        use crate::automation::{ScriptedRemover, SqliteShell};
        use crate::store::SqliteStore;

        if std::env::var("CONTACTKIT_LIVE_TEST").as_deref() != Ok("1") {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.db");
        let store = SqliteStore::open(&path).unwrap();
        let remover = ScriptedRemover::new(SqliteShell::new("sqlite3", &path));
        let contacts = Contacts::new(&store, &remover);

        let group_id = contacts
            .groups(&GroupsInput::create("Vendors"))
            .unwrap()
            .created_group_id()
            .unwrap()
            .to_string();

        let created = contacts.upsert(&UpsertInput {
            create: vec![ContactDraft {
                given_name: Some("Priya".to_string()),
                family_name: Some("N.".to_string()),
                organization: Some("Acme Corp".to_string()),
                group_ids: vec![group_id.clone()],
                ..Default::default()
            }],
            patch: vec![],
        });
        assert!(created.results[0].succeeded, "{:?}", created.results[0].err);
        let contact_ref = created.results[0].contact_ref.clone();

        let found = contacts
            .find(&FindInput {
                query: Query {
                    group_ids_any: vec![group_id.clone()],
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.refs, vec![contact_ref.clone()]);

        let removed = contacts.mutate(&MutateInput {
            refs: vec![contact_ref.clone()],
            ops: vec![MutationOp::remove_from_group(group_id.clone())],
        });
        assert!(removed.results[0].succeeded, "{:?}", removed.results[0].err);
        assert!(store.group_members(&group_id).unwrap().is_empty());

        let deleted = contacts.mutate(&MutateInput {
            refs: vec![contact_ref],
            ops: vec![MutationOp::delete()],
        });
        assert!(deleted.results[0].succeeded);
    }
}
