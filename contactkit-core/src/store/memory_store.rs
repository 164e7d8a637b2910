use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use shared_types::{AuthStatus, ContactsError, ContactsResult, Group, GroupRef, Item, Ref};

use super::{ContactStore, FieldSet, SaveReceipt, SaveRequest};
use crate::automation::{MemberIdentity, RemovalChannel};

const MEMORY_CONTAINER: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    contacts: Vec<Item>,
    groups: Vec<Group>,
    members: HashMap<String, BTreeSet<String>>,
    next_contact: u64,
    next_group: u64,
    save_failures: HashMap<&'static str, ContactsError>,
    drop_member_adds: bool,
}

/// In-process contact store.
///
/// Enumeration follows insertion order. Contact ids are `c-<n>` and group
/// ids `g-<n>`. A few knobs make the store misbehave on purpose so callers
/// can exercise failure handling.
#[derive(Debug)]
pub struct MemoryStore {
    state: RefCell<MemoryState>,
    auth: Cell<AuthStatus>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MemoryState::default()),
            auth: Cell::new(AuthStatus::Authorized),
        }
    }

    pub fn with_auth_status(self, status: AuthStatus) -> Self {
        self.auth.set(status);
        self
    }

    /// Inserts a contact directly, bypassing `save`. Returns its ref.
    pub fn insert_contact(&self, mut item: Item) -> Ref {
        let mut state = self.state.borrow_mut();
        if item.contact_ref.id.is_empty() {
            state.next_contact += 1;
            item.contact_ref.id = format!("c-{}", state.next_contact);
        }
        if item.contact_ref.container_id.is_empty() {
            item.contact_ref.container_id = MEMORY_CONTAINER.to_string();
        }
        if item.contact_ref.account_id.is_empty() {
            item.contact_ref.account_id = item.contact_ref.container_id.clone();
        }
        for group_id in std::mem::take(&mut item.group_ids) {
            state
                .members
                .entry(group_id)
                .or_default()
                .insert(item.contact_ref.id.clone());
        }
        let contact_ref = item.contact_ref.clone();
        state.contacts.push(item);
        contact_ref
    }

    /// Inserts a group directly, bypassing `save`. Returns its id.
    pub fn insert_group(&self, name: &str) -> String {
        let mut state = self.state.borrow_mut();
        state.next_group += 1;
        let id = format!("g-{}", state.next_group);
        state.groups.push(Group {
            group_ref: GroupRef {
                id: id.clone(),
                container_id: MEMORY_CONTAINER.to_string(),
                account_id: MEMORY_CONTAINER.to_string(),
            },
            name: name.to_string(),
        });
        state.members.insert(id.clone(), BTreeSet::new());
        id
    }

    /// Makes every save of the given kind (see [`SaveRequest::kind`]) fail.
    pub fn fail_saves(&self, kind: &'static str, err: ContactsError) {
        self.state.borrow_mut().save_failures.insert(kind, err);
    }

    /// Membership adds report success without changing anything.
    pub fn drop_member_adds(&self) {
        self.state.borrow_mut().drop_member_adds = true;
    }

    pub fn is_member(&self, group_id: &str, contact_id: &str) -> bool {
        self.state
            .borrow()
            .members
            .get(group_id)
            .map(|members| members.contains(contact_id))
            .unwrap_or(false)
    }

    pub fn contact_count(&self) -> usize {
        self.state.borrow().contacts.len()
    }

    /// Removal channel that edits this store directly.
    pub fn remover(&self) -> MemoryRemover<'_> {
        MemoryRemover { store: self }
    }

    fn ensure_authorized(&self) -> ContactsResult<()> {
        let status = self.auth.get();
        if status.is_authorized() {
            return Ok(());
        }
        Err(ContactsError::permission_denied(format!(
            "contacts access is {:?}",
            status
        )))
    }

    fn hydrate(state: &MemoryState, item: &Item, fields: FieldSet) -> Item {
        let mut hydrated = item.clone();
        if fields.contains(shared_types::Field::Groups) {
            hydrated.group_ids = state
                .groups
                .iter()
                .filter(|group| {
                    state
                        .members
                        .get(group.id())
                        .map(|members| members.contains(item.id()))
                        .unwrap_or(false)
                })
                .map(|group| group.id().to_string())
                .collect();
        }
        fields.project(hydrated)
    }

    fn remove_membership(&self, group_id: &str, contact_id: &str) -> ContactsResult<()> {
        let mut state = self.state.borrow_mut();
        let members = state
            .members
            .get_mut(group_id)
            .ok_or_else(|| ContactsError::not_found(format!("group {} not found", group_id)))?;
        members.remove(contact_id);
        Ok(())
    }
}

impl ContactStore for MemoryStore {
    fn authorization_status(&self) -> ContactsResult<AuthStatus> {
        Ok(self.auth.get())
    }

    /// An undetermined status is granted; denied and restricted stay so.
    fn request_access(&self) -> ContactsResult<()> {
        if self.auth.get() == AuthStatus::NotDetermined {
            self.auth.set(AuthStatus::Authorized);
        }
        self.ensure_authorized()
    }

    fn enumerate(&self, fields: FieldSet) -> ContactsResult<Vec<Item>> {
        self.ensure_authorized()?;
        let state = self.state.borrow();
        Ok(state
            .contacts
            .iter()
            .map(|item| Self::hydrate(&state, item, fields))
            .collect())
    }

    fn fetch_by_ids(&self, ids: &[String], fields: FieldSet) -> ContactsResult<Vec<Item>> {
        self.ensure_authorized()?;
        let state = self.state.borrow();
        Ok(state
            .contacts
            .iter()
            .filter(|item| ids.iter().any(|id| id == item.id()))
            .map(|item| Self::hydrate(&state, item, fields))
            .collect())
    }

    fn save(&self, request: SaveRequest) -> ContactsResult<SaveReceipt> {
        self.ensure_authorized()?;
        if let Some(err) = self.state.borrow().save_failures.get(request.kind()) {
            return Err(err.clone());
        }

        match request {
            SaveRequest::CreateContact(mut item) => {
                item.contact_ref.id.clear();
                item.group_ids.clear();
                item.modified_at = Some(Utc::now());
                Ok(SaveReceipt::Contact(self.insert_contact(item)))
            }
            SaveRequest::UpdateContact(mut item) => {
                let mut state = self.state.borrow_mut();
                let existing = state
                    .contacts
                    .iter_mut()
                    .find(|existing| existing.id() == item.id())
                    .ok_or_else(|| {
                        ContactsError::not_found(format!("contact {} not found", item.id()))
                    })?;
                item.contact_ref = existing.contact_ref.clone();
                item.group_ids.clear();
                item.modified_at = Some(Utc::now());
                *existing = item;
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::DeleteContact { id } => {
                let mut state = self.state.borrow_mut();
                let before = state.contacts.len();
                state.contacts.retain(|item| item.id() != id);
                if state.contacts.len() == before {
                    return Err(ContactsError::not_found(format!("contact {} not found", id)));
                }
                for members in state.members.values_mut() {
                    members.remove(&id);
                }
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::AddMembers {
                contact_id,
                group_ids,
            } => {
                let mut state = self.state.borrow_mut();
                if !state.contacts.iter().any(|item| item.id() == contact_id) {
                    return Err(ContactsError::not_found(format!(
                        "contact {} not found",
                        contact_id
                    )));
                }
                if let Some(missing) = group_ids
                    .iter()
                    .find(|group_id| !state.members.contains_key(group_id.as_str()))
                {
                    return Err(ContactsError::not_found(format!(
                        "group {} not found",
                        missing
                    )));
                }
                if state.drop_member_adds {
                    return Ok(SaveReceipt::Saved);
                }
                for group_id in group_ids {
                    if let Some(members) = state.members.get_mut(&group_id) {
                        members.insert(contact_id.clone());
                    }
                }
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::CreateGroup { name, container_id } => {
                let id = self.insert_group(&name);
                let mut state = self.state.borrow_mut();
                let group = state
                    .groups
                    .iter_mut()
                    .find(|group| group.id() == id)
                    .ok_or_else(|| ContactsError::unknown("created group vanished"))?;
                if let Some(container_id) = container_id.filter(|c| !c.trim().is_empty()) {
                    group.group_ref.container_id = container_id.clone();
                    group.group_ref.account_id = container_id;
                }
                Ok(SaveReceipt::Group(group.group_ref.clone()))
            }
            SaveRequest::RenameGroup { id, name } => {
                let mut state = self.state.borrow_mut();
                let group = state
                    .groups
                    .iter_mut()
                    .find(|group| group.id() == id)
                    .ok_or_else(|| ContactsError::not_found(format!("group {} not found", id)))?;
                group.name = name;
                Ok(SaveReceipt::Group(group.group_ref.clone()))
            }
            SaveRequest::DeleteGroup { id } => {
                let mut state = self.state.borrow_mut();
                let before = state.groups.len();
                state.groups.retain(|group| group.id() != id);
                if state.groups.len() == before {
                    return Err(ContactsError::not_found(format!("group {} not found", id)));
                }
                state.members.remove(&id);
                Ok(SaveReceipt::Saved)
            }
        }
    }

    fn group_members(&self, group_id: &str) -> ContactsResult<Vec<String>> {
        self.ensure_authorized()?;
        self.state
            .borrow()
            .members
            .get(group_id)
            .map(|members| members.iter().cloned().collect())
            .ok_or_else(|| ContactsError::not_found(format!("group {} not found", group_id)))
    }

    fn resolve_group(&self, group_id: &str) -> ContactsResult<Option<Group>> {
        self.ensure_authorized()?;
        Ok(self
            .state
            .borrow()
            .groups
            .iter()
            .find(|group| group.id() == group_id)
            .cloned())
    }

    fn list_groups(&self) -> ContactsResult<Vec<Group>> {
        self.ensure_authorized()?;
        Ok(self.state.borrow().groups.clone())
    }
}

/// Removal channel backed by a [`MemoryStore`].
pub struct MemoryRemover<'a> {
    store: &'a MemoryStore,
}

impl RemovalChannel for MemoryRemover<'_> {
    fn remove_member(&self, group: &Group, member: &MemberIdentity) -> ContactsResult<()> {
        self.store.remove_membership(group.id(), &member.id)
    }
}
