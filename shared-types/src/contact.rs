use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable contact reference shared across primitives.
///
/// `container_id` and `account_id` are advisory and backend-defined. The
/// account id may equal the container id when the store has no distinct
/// account concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub id: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub account_id: String,
}

impl Ref {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Selects logical data for Get hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Names,
    Organization,
    Emails,
    Phones,
    Note,
    Groups,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Names,
        Field::Organization,
        Field::Emails,
        Field::Phones,
        Field::Note,
        Field::Groups,
    ];
}

/// A labeled email address or phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    #[serde(default)]
    pub label: String,
    pub value: String,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Hydrated contact as stored by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub contact_ref: Ref,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub emails: Vec<LabeledValue>,
    #[serde(default)]
    pub phones: Vec<LabeledValue>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn id(&self) -> &str {
        &self.contact_ref.id
    }

    /// Human readable name: the non-empty name parts, falling back to the
    /// nickname and then the organization.
    pub fn display_name(&self) -> String {
        let name = [
            self.given_name.as_str(),
            self.middle_name.as_str(),
            self.family_name.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        if !name.is_empty() {
            name
        } else if !self.nickname.trim().is_empty() {
            self.nickname.trim().to_string()
        } else {
            self.organization.trim().to_string()
        }
    }
}

/// Lightweight metadata aligned with `FindOutput::refs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "ref")]
    pub contact_ref: Ref,
    pub display_name: String,
    pub organization: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<&Item> for Meta {
    fn from(item: &Item) -> Self {
        Self {
            contact_ref: item.contact_ref.clone(),
            display_name: item.display_name(),
            organization: item.organization.clone(),
            modified_at: item.modified_at,
        }
    }
}

/// Create model for Upsert. Blank fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDraft {
    pub container_id: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub nickname: Option<String>,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub note: Option<String>,
    pub emails: Vec<LabeledValue>,
    pub phones: Vec<LabeledValue>,
    pub group_ids: Vec<String>,
}

/// Typed patch for existing contacts.
///
/// `None` means "no change". `Some` replaces the field; for emails and
/// phones `Some(vec![])` clears the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactChanges {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub nickname: Option<String>,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub note: Option<String>,
    pub emails: Option<Vec<LabeledValue>>,
    pub phones: Option<Vec<LabeledValue>>,
    pub add_group_ids: Vec<String>,
    pub remove_group_ids: Vec<String>,
}

impl ContactChanges {
    /// True when no scalar or list field is set. Membership changes are not
    /// considered.
    pub fn has_no_field_changes(&self) -> bool {
        self.given_name.is_none()
            && self.family_name.is_none()
            && self.middle_name.is_none()
            && self.nickname.is_none()
            && self.organization.is_none()
            && self.job_title.is_none()
            && self.note.is_none()
            && self.emails.is_none()
            && self.phones.is_none()
    }
}

/// Applies `ContactChanges` to a target ref.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(rename = "ref")]
    pub contact_ref: Ref,
    #[serde(default)]
    pub changes: ContactChanges,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let mut item = Item {
            given_name: "Priya".to_string(),
            family_name: "N.".to_string(),
            ..Default::default()
        };
        assert_eq!(item.display_name(), "Priya N.");

        item.given_name.clear();
        item.family_name.clear();
        item.nickname = "pn".to_string();
        assert_eq!(item.display_name(), "pn");

        item.nickname.clear();
        item.organization = "Acme Corp".to_string();
        assert_eq!(item.display_name(), "Acme Corp");
    }

    #[test]
    fn test_item_flattens_ref() {
        let item = Item {
            contact_ref: Ref::new("c-1"),
            given_name: "Ada".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "c-1");
        assert_eq!(json["given_name"], "Ada");
    }

    #[test]
    fn test_changes_distinguish_clear_from_unchanged() {
        let changes: ContactChanges = serde_json::from_str(r#"{"emails": []}"#).unwrap();
        assert_eq!(changes.emails, Some(vec![]));
        assert_eq!(changes.phones, None);
        assert!(!changes.has_no_field_changes());
    }
}
