//! Scripted-automation removal channel.
//!
//! Group membership removals do not go through the native save path. They
//! are issued through a separate channel that is slower, less reliable and
//! may report success without changing anything, which is why every removal
//! is verified afterwards by the membership reconciler.

pub mod scripted;

pub use scripted::{
    AppleScript, ProcessRunner, ScriptDialect, ScriptInvocation, ScriptOutcome, ScriptRunner,
    ScriptedRemover, SqliteShell,
};

use serde::{Deserialize, Serialize};
use shared_types::{ContactsResult, Group, Item};

/// Person identity handed to the removal channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberIdentity {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
}

impl MemberIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn has_name(&self) -> bool {
        !self.given_name.trim().is_empty() || !self.family_name.trim().is_empty()
    }
}

impl From<&Item> for MemberIdentity {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id().to_string(),
            given_name: item.given_name.clone(),
            family_name: item.family_name.clone(),
        }
    }
}

/// Removes one contact from one group.
pub trait RemovalChannel {
    fn remove_member(&self, group: &Group, member: &MemberIdentity) -> ContactsResult<()>;
}

/// Successive fallback strategies a scripted removal tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStrategy {
    /// Address the group by id and the person by id.
    GroupId,
    /// Address the group by name and the person by id.
    GroupName,
    /// Address the group by name and the person by given/family name.
    PersonName,
}

impl RemovalStrategy {
    pub const ORDER: [RemovalStrategy; 3] = [
        RemovalStrategy::GroupId,
        RemovalStrategy::GroupName,
        RemovalStrategy::PersonName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalStrategy::GroupId => "group_id",
            RemovalStrategy::GroupName => "group_name",
            RemovalStrategy::PersonName => "person_name",
        }
    }
}
