//! Backing-store capability contract.
//!
//! The store lives outside the program's control: it enumerates, fetches and
//! saves records, and answers group-membership questions. Everything the
//! core knows about a store goes through [`ContactStore`].

pub mod memory_store;
pub mod migrations;
pub mod sqlite_store;

pub use memory_store::{MemoryRemover, MemoryStore};
pub use sqlite_store::SqliteStore;

use shared_types::{AuthStatus, ContactsError, ContactsResult, Field, Group, GroupRef, Item, Ref};

/// Set of logical fields requested from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet(u8);

impl FieldSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Field::ALL.iter().fold(Self::empty(), |set, field| set.with(*field))
    }

    /// An empty slice selects every field.
    pub fn from_fields(fields: &[Field]) -> Self {
        if fields.is_empty() {
            return Self::all();
        }
        fields
            .iter()
            .fold(Self::empty(), |set, field| set.with(*field))
    }

    pub fn with(self, field: Field) -> Self {
        Self(self.0 | Self::bit(field))
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & Self::bit(field) != 0
    }

    fn bit(field: Field) -> u8 {
        1 << (field as u8)
    }

    /// Blanks every field of `item` that was not requested. The ref and the
    /// modification time are always kept.
    pub fn project(&self, mut item: Item) -> Item {
        if !self.contains(Field::Names) {
            item.given_name.clear();
            item.family_name.clear();
            item.middle_name.clear();
            item.nickname.clear();
        }
        if !self.contains(Field::Organization) {
            item.organization.clear();
            item.job_title.clear();
        }
        if !self.contains(Field::Emails) {
            item.emails.clear();
        }
        if !self.contains(Field::Phones) {
            item.phones.clear();
        }
        if !self.contains(Field::Note) {
            item.note.clear();
        }
        if !self.contains(Field::Groups) {
            item.group_ids.clear();
        }
        item
    }
}

/// One native write submitted to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    /// Creates a contact from the item's fields. The store assigns the id;
    /// `contact_ref.container_id` may name a target container.
    CreateContact(Item),
    /// Replaces the scalar and list fields of an existing contact. Group ids
    /// on the item are ignored.
    UpdateContact(Item),
    DeleteContact { id: String },
    /// Batched membership add for one contact.
    AddMembers {
        contact_id: String,
        group_ids: Vec<String>,
    },
    CreateGroup {
        name: String,
        container_id: Option<String>,
    },
    RenameGroup { id: String, name: String },
    DeleteGroup { id: String },
}

impl SaveRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            SaveRequest::CreateContact(_) => "create_contact",
            SaveRequest::UpdateContact(_) => "update_contact",
            SaveRequest::DeleteContact { .. } => "delete_contact",
            SaveRequest::AddMembers { .. } => "add_members",
            SaveRequest::CreateGroup { .. } => "create_group",
            SaveRequest::RenameGroup { .. } => "rename_group",
            SaveRequest::DeleteGroup { .. } => "delete_group",
        }
    }
}

/// What the store hands back after a successful save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveReceipt {
    Contact(Ref),
    Group(GroupRef),
    Saved,
}

impl SaveReceipt {
    pub fn into_contact_ref(self) -> ContactsResult<Ref> {
        match self {
            SaveReceipt::Contact(contact_ref) => Ok(contact_ref),
            other => Err(ContactsError::unknown(format!(
                "store returned {:?} where a contact ref was expected",
                other
            ))),
        }
    }

    pub fn into_group_ref(self) -> ContactsResult<GroupRef> {
        match self {
            SaveReceipt::Group(group_ref) => Ok(group_ref),
            other => Err(ContactsError::unknown(format!(
                "store returned {:?} where a group ref was expected",
                other
            ))),
        }
    }
}

/// Capabilities the core consumes from a contacts store.
///
/// Calls are blocking. Implementations map their failures into the
/// `ContactsError` taxonomy.
pub trait ContactStore {
    fn authorization_status(&self) -> ContactsResult<AuthStatus>;

    fn request_access(&self) -> ContactsResult<()>;

    /// Full, unfiltered, unordered enumeration of contacts.
    fn enumerate(&self, fields: FieldSet) -> ContactsResult<Vec<Item>>;

    /// Fetches the given ids. Ids with no record are omitted.
    fn fetch_by_ids(&self, ids: &[String], fields: FieldSet) -> ContactsResult<Vec<Item>>;

    fn save(&self, request: SaveRequest) -> ContactsResult<SaveReceipt>;

    /// Current member contact ids of a group. Unknown groups are `not_found`.
    fn group_members(&self, group_id: &str) -> ContactsResult<Vec<String>>;

    fn resolve_group(&self, group_id: &str) -> ContactsResult<Option<Group>>;

    fn list_groups(&self) -> ContactsResult<Vec<Group>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_field_list_selects_all() {
        let set = FieldSet::from_fields(&[]);
        for field in Field::ALL {
            assert!(set.contains(field));
        }
    }

    #[test]
    fn test_project_blanks_unrequested_fields() {
        let item = Item {
            contact_ref: Ref::new("c-1"),
            given_name: "Priya".to_string(),
            organization: "Acme Corp".to_string(),
            note: "met in SF".to_string(),
            group_ids: vec!["g-1".to_string()],
            ..Default::default()
        };

        let projected = FieldSet::from_fields(&[Field::Names]).project(item);
        assert_eq!(projected.id(), "c-1");
        assert_eq!(projected.given_name, "Priya");
        assert!(projected.organization.is_empty());
        assert!(projected.note.is_empty());
        assert!(projected.group_ids.is_empty());
    }

    #[test]
    fn test_receipt_kind_mismatch_is_unknown() {
        let err = SaveReceipt::Saved.into_contact_ref().unwrap_err();
        assert_eq!(err.code, shared_types::ErrorCode::Unknown);
    }
}
