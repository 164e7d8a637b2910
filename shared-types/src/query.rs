use serde::{Deserialize, Serialize};

use crate::contact::{Meta, Ref};

/// Controls how populated Query clauses combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Every populated clause must match.
    #[default]
    All,
    /// At least one populated clause must match.
    Any,
}

/// Typed selection filters for Find.
///
/// Clauses whose value is blank after trimming are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub name_contains: Option<String>,
    pub organization_contains: Option<String>,
    pub email_domain: Option<String>,
    pub note_contains: Option<String>,
    pub group_ids_any: Vec<String>,
    pub ids: Vec<String>,
    #[serde(rename = "match")]
    pub match_policy: MatchPolicy,
}

/// Paginated find window. `cursor` is opaque to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub limit: i64,
    pub cursor: String,
}

impl Page {
    pub fn first(limit: i64) -> Self {
        Self {
            limit,
            cursor: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Given name, then family name.
    #[default]
    GivenName,
    /// Family name, then given name.
    FamilyName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sort {
    pub by: SortField,
    pub order: SortOrder,
}

/// Selection request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindInput {
    pub query: Query,
    pub page: Page,
    pub sort: Sort,
    pub include_meta: bool,
}

/// Selection response. `next_cursor` is empty when no more pages exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOutput {
    pub refs: Vec<Ref>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<Meta>,
    pub next_cursor: String,
}

impl FindOutput {
    pub fn has_more(&self) -> bool {
        !self.next_cursor.is_empty()
    }
}
