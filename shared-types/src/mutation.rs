use serde::{Deserialize, Serialize};

use crate::contact::{ContactDraft, ContactPatch, Field, Item, Ref};
use crate::error::ContactsError;

/// Hydrates refs into typed contact items. An empty field list requests
/// every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetInput {
    pub refs: Vec<Ref>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetOutput {
    pub items: Vec<Item>,
}

/// Creates and patches contacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertInput {
    pub create: Vec<ContactDraft>,
    pub patch: Vec<ContactPatch>,
}

/// Per-item write status. `err` is set exactly when `succeeded` is false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    #[serde(rename = "ref")]
    pub contact_ref: Ref,
    pub succeeded: bool,
    pub created: bool,
    pub updated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ContactsError>,
}

impl WriteResult {
    pub fn created(contact_ref: Ref) -> Self {
        Self {
            contact_ref,
            succeeded: true,
            created: true,
            updated: false,
            err: None,
        }
    }

    pub fn updated(contact_ref: Ref, updated: bool) -> Self {
        Self {
            contact_ref,
            succeeded: true,
            created: false,
            updated,
            err: None,
        }
    }

    pub fn failed(contact_ref: Ref, err: ContactsError) -> Self {
        Self {
            contact_ref,
            succeeded: false,
            created: false,
            updated: false,
            err: Some(err),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertOutput {
    pub results: Vec<WriteResult>,
}

/// Explicit state transitions accepted by Mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    SetNote,
    SetOrganization,
    SetJobTitle,
    SetGivenName,
    SetFamilyName,
    AddToGroup,
    RemoveFromGroup,
    Delete,
}

impl MutationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationType::SetNote => "set_note",
            MutationType::SetOrganization => "set_organization",
            MutationType::SetJobTitle => "set_job_title",
            MutationType::SetGivenName => "set_given_name",
            MutationType::SetFamilyName => "set_family_name",
            MutationType::AddToGroup => "add_to_group",
            MutationType::RemoveFromGroup => "remove_from_group",
            MutationType::Delete => "delete",
        }
    }

    /// Group ops need a non-blank group id. Scalar sets accept any value,
    /// including an empty one that clears the field.
    pub fn requires_value(&self) -> bool {
        matches!(self, MutationType::AddToGroup | MutationType::RemoveFromGroup)
    }
}

/// One explicit state transition. `value` semantics depend on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOp {
    #[serde(rename = "type")]
    pub kind: MutationType,
    #[serde(default)]
    pub value: Option<String>,
}

impl MutationOp {
    pub fn new(kind: MutationType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
        }
    }

    pub fn set_note(note: impl Into<String>) -> Self {
        Self::new(MutationType::SetNote, note)
    }

    pub fn add_to_group(group_id: impl Into<String>) -> Self {
        Self::new(MutationType::AddToGroup, group_id)
    }

    pub fn remove_from_group(group_id: impl Into<String>) -> Self {
        Self::new(MutationType::RemoveFromGroup, group_id)
    }

    pub fn delete() -> Self {
        Self {
            kind: MutationType::Delete,
            value: None,
        }
    }
}

/// Applies the same ops to each target ref.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutateInput {
    pub refs: Vec<Ref>,
    pub ops: Vec<MutationOp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutateOutput {
    pub results: Vec<WriteResult>,
}
