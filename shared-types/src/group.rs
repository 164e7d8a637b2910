use serde::{Deserialize, Serialize};

use crate::error::ContactsError;

/// Stable group reference shared across group operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub account_id: String,
}

impl GroupRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Discoverable group metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub group_ref: GroupRef,
    pub name: String,
}

impl Group {
    pub fn id(&self) -> &str {
        &self.group_ref.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupsAction {
    #[default]
    List,
    Create,
    Rename,
    Delete,
}

/// Request for Groups.
///
/// Create uses `name` and optional `container_id`; rename uses `group.id`
/// and `name`; delete uses `group.id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsInput {
    pub action: GroupsAction,
    pub group: Option<GroupRef>,
    pub name: Option<String>,
    pub container_id: Option<String>,
}

impl GroupsInput {
    pub fn list() -> Self {
        Self::default()
    }

    pub fn create(name: impl Into<String>) -> Self {
        Self {
            action: GroupsAction::Create,
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn rename(group_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            action: GroupsAction::Rename,
            group: Some(GroupRef::new(group_id)),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn delete(group_id: impl Into<String>) -> Self {
        Self {
            action: GroupsAction::Delete,
            group: Some(GroupRef::new(group_id)),
            ..Default::default()
        }
    }
}

/// Per-action status for mutating group operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group: GroupRef,
    pub succeeded: bool,
    pub created: bool,
    pub updated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<ContactsError>,
}

impl GroupResult {
    pub fn failed(group: GroupRef, err: ContactsError) -> Self {
        Self {
            group,
            succeeded: false,
            created: false,
            updated: false,
            err: Some(err),
        }
    }
}

/// Current group catalog plus results of the requested action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupsOutput {
    pub groups: Vec<Group>,
    pub results: Vec<GroupResult>,
}

impl GroupsOutput {
    /// Id of the first successfully created group, if any.
    pub fn created_group_id(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|result| result.succeeded && result.created && !result.group.id.is_empty())
            .map(|result| result.group.id.as_str())
    }
}
