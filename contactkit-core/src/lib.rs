//! Contactkit core
//!
//! Typed primitives over a personal-contacts store that lives outside the
//! program's control.
//!
//! # Architecture
//!
//! - **Types**: inputs, outputs and errors live in the `shared-types` crate
//! - **Store**: the [`ContactStore`] trait plus in-memory and SQLite backends
//! - **Automation**: the [`RemovalChannel`] used for group removals
//! - **Query / Write / Membership**: matching, pagination, writes and
//!   verified membership reconciliation
//! - **Session**: [`Contacts`], which exposes Find, Get, Upsert, Mutate and
//!   Groups
//!
//! # Example
//!
//! ```rust,ignore
//! use contactkit_core::{Contacts, MemoryStore};
//! use shared_types::{FindInput, Query};
//!
//! let store = MemoryStore::new();
//! let remover = store.remover();
//! let contacts = Contacts::new(&store, &remover);
//! let page = contacts.find(&FindInput {
//!     query: Query { name_contains: Some("priya".into()), ..Default::default() },
//!     ..Default::default()
//! })?;
//! ```

pub mod automation;
pub mod membership;
pub mod query;
pub mod report;
pub mod session;
pub mod store;
pub mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use automation::{
    AppleScript, MemberIdentity, RemovalChannel, RemovalStrategy, ScriptedRemover, SqliteShell,
};
pub use membership::{Channel, MembershipChange, MembershipState, Reconciler};
pub use session::Contacts;
pub use store::{ContactStore, FieldSet, MemoryStore, SaveReceipt, SaveRequest, SqliteStore};
pub use write::WriteExecutor;
