//! Shared types for the contacts primitives.
//!
//! Everything a caller exchanges with Find, Get, Upsert, Mutate and Groups
//! lives here, together with the typed `ContactsError`.

pub mod auth;
pub mod contact;
pub mod error;
pub mod group;
pub mod mutation;
pub mod query;

pub use auth::AuthStatus;
pub use contact::{
    ContactChanges, ContactDraft, ContactPatch, Field, Item, LabeledValue, Meta, Ref,
};
pub use error::{ContactsError, ContactsResult, ErrorCode};
pub use group::{Group, GroupRef, GroupResult, GroupsAction, GroupsInput, GroupsOutput};
pub use mutation::{
    GetInput, GetOutput, MutateInput, MutateOutput, MutationOp, MutationType, UpsertInput,
    UpsertOutput, WriteResult,
};
pub use query::{
    FindInput, FindOutput, MatchPolicy, Page, Query, Sort, SortField, SortOrder,
};
