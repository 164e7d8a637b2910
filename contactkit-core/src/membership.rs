//! Group membership changes applied across two write channels and verified.
//!
//! Adds go through one batched native save. Removes go through the scripted
//! removal channel, one group at a time. Neither channel is trusted: after
//! both ran, the actual membership of every touched group is read back and
//! compared with the request.

use shared_types::{ContactsError, ContactsResult, Group};

use crate::automation::{MemberIdentity, RemovalChannel};
use crate::store::{ContactStore, SaveRequest};

/// Requested add/remove group ids for one contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl MembershipChange {
    /// Builds a change with blank ids dropped and duplicates collapsed.
    pub fn new(add: &[String], remove: &[String]) -> Self {
        let mut change = Self::default();
        for group_id in add {
            change.push_add(group_id);
        }
        for group_id in remove {
            change.push_remove(group_id);
        }
        change
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn push_add(&mut self, group_id: &str) {
        push_unique(&mut self.add, group_id);
    }

    pub fn push_remove(&mut self, group_id: &str) {
        push_unique(&mut self.remove, group_id);
    }

    /// True when adding/removing `group_id` would make it appear on both sides.
    pub fn would_contradict(&self, group_id: &str, adding: bool) -> bool {
        let group_id = group_id.trim();
        let other = if adding { &self.remove } else { &self.add };
        other.iter().any(|id| id == group_id)
    }
}

fn push_unique(ids: &mut Vec<String>, group_id: &str) {
    let group_id = group_id.trim();
    if !group_id.is_empty() && !ids.iter().any(|id| id == group_id) {
        ids.push(group_id.to_string());
    }
}

/// Write path used for a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    NativeSave,
    ScriptedRemoval,
}

/// Phase of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipState {
    Pending,
    Applied(Vec<Channel>),
    Verified(Vec<Channel>),
    Conflict(ContactsError),
}

impl MembershipState {
    fn name(&self) -> &'static str {
        match self {
            MembershipState::Pending => "pending",
            MembershipState::Applied(_) => "applied",
            MembershipState::Verified(_) => "verified",
            MembershipState::Conflict(_) => "conflict",
        }
    }
}

/// A change whose groups all exist.
#[derive(Debug, Clone)]
pub struct ResolvedChange {
    add: Vec<Group>,
    remove: Vec<Group>,
}

pub struct Reconciler<'a> {
    store: &'a dyn ContactStore,
    remover: &'a dyn RemovalChannel,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn ContactStore, remover: &'a dyn RemovalChannel) -> Self {
        Self { store, remover }
    }

    /// Applies and verifies `change` for `member`. Returns the channels used
    /// once the store shows exactly the requested membership.
    pub fn run(
        &self,
        member: &MemberIdentity,
        change: &MembershipChange,
    ) -> ContactsResult<Vec<Channel>> {
        if change.is_empty() {
            return Ok(Vec::new());
        }

        let resolved = self.resolve(change)?;
        let mut state = MembershipState::Pending;
        self.trace(member, &state);

        state = self.apply(member, &resolved)?;
        self.trace(member, &state);

        state = self.verify(member, &resolved, state)?;
        self.trace(member, &state);

        match state {
            MembershipState::Verified(channels) => Ok(channels),
            MembershipState::Conflict(err) => {
                tracing::warn!(contact_id = %member.id, error = %err, "Membership verification failed");
                Err(err)
            }
            other => Err(ContactsError::unknown(format!(
                "membership reconciliation stopped in phase {}",
                other.name()
            ))),
        }
    }

    /// Looks up every group named by the change before anything is written.
    pub fn resolve(&self, change: &MembershipChange) -> ContactsResult<ResolvedChange> {
        let lookup = |group_id: &String| -> ContactsResult<Group> {
            self.store
                .resolve_group(group_id)?
                .ok_or_else(|| ContactsError::not_found(format!("group {} not found", group_id)))
        };

        Ok(ResolvedChange {
            add: change.add.iter().map(lookup).collect::<ContactsResult<_>>()?,
            remove: change
                .remove
                .iter()
                .map(lookup)
                .collect::<ContactsResult<_>>()?,
        })
    }

    /// Pushes adds through the native save and removes through the scripted
    /// channel. The first removal failure stops the remaining removals.
    pub fn apply(
        &self,
        member: &MemberIdentity,
        change: &ResolvedChange,
    ) -> ContactsResult<MembershipState> {
        let mut channels = Vec::new();

        if !change.add.is_empty() {
            self.store.save(SaveRequest::AddMembers {
                contact_id: member.id.clone(),
                group_ids: change.add.iter().map(|g| g.id().to_string()).collect(),
            })?;
            channels.push(Channel::NativeSave);
        }

        if !change.remove.is_empty() {
            for group in &change.remove {
                self.remover.remove_member(group, member).map_err(|err| {
                    ContactsError::store(format!(
                        "membership remove failed for group {}: {}",
                        group.id(),
                        err.message
                    ))
                })?;
            }
            channels.push(Channel::ScriptedRemoval);
        }

        Ok(MembershipState::Applied(channels))
    }

    /// Reads back every touched group and compares it with the request.
    pub fn verify(
        &self,
        member: &MemberIdentity,
        change: &ResolvedChange,
        state: MembershipState,
    ) -> ContactsResult<MembershipState> {
        let MembershipState::Applied(channels) = state else {
            return Ok(state);
        };

        for group in &change.add {
            let members = self.store.group_members(group.id())?;
            if !members.iter().any(|id| id == &member.id) {
                return Ok(MembershipState::Conflict(ContactsError::conflict(format!(
                    "membership add did not persist for group {}",
                    group.id()
                ))));
            }
        }

        for group in &change.remove {
            let members = self.store.group_members(group.id())?;
            if members.iter().any(|id| id == &member.id) {
                return Ok(MembershipState::Conflict(ContactsError::conflict(format!(
                    "membership remove did not persist for group {}",
                    group.id()
                ))));
            }
        }

        Ok(MembershipState::Verified(channels))
    }

    fn trace(&self, member: &MemberIdentity, state: &MembershipState) {
        tracing::debug!(contact_id = %member.id, phase = state.name(), "Membership phase");
    }
}
