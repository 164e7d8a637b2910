//! Removal channels that misbehave in controlled ways.

use std::cell::{Cell, RefCell};

use shared_types::{ContactsError, ContactsResult, Group};

use crate::automation::{MemberIdentity, RemovalChannel};

/// Reports success without removing anything.
#[derive(Default)]
pub struct StaleRemover {
    calls: Cell<usize>,
}

impl StaleRemover {
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RemovalChannel for StaleRemover {
    fn remove_member(&self, _group: &Group, _member: &MemberIdentity) -> ContactsResult<()> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

/// Fails every removal with the same error.
pub struct FailingRemover {
    err: ContactsError,
    calls: Cell<usize>,
}

impl FailingRemover {
    pub fn new(err: ContactsError) -> Self {
        Self {
            err,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RemovalChannel for FailingRemover {
    fn remove_member(&self, _group: &Group, _member: &MemberIdentity) -> ContactsResult<()> {
        self.calls.set(self.calls.get() + 1);
        Err(self.err.clone())
    }
}

/// Records (group id, contact id) pairs and succeeds without side effects.
#[derive(Default)]
pub struct RecordingRemover {
    removed: RefCell<Vec<(String, String)>>,
}

impl RecordingRemover {
    pub fn removed(&self) -> Vec<(String, String)> {
        self.removed.borrow().clone()
    }
}

impl RemovalChannel for RecordingRemover {
    fn remove_member(&self, group: &Group, member: &MemberIdentity) -> ContactsResult<()> {
        self.removed
            .borrow_mut()
            .push((group.id().to_string(), member.id.clone()));
        Ok(())
    }
}
