use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use shared_types::{
    AuthStatus, ContactsError, ContactsResult, Field, Group, GroupRef, Item, LabeledValue, Ref,
};
use uuid::Uuid;

use super::migrations;
use super::{ContactStore, FieldSet, SaveReceipt, SaveRequest};

const LOCAL_CONTAINER: &str = "local";

const CONTACT_COLUMNS: &str = "id, container_id, account_id, given_name, family_name, middle_name,
     nickname, organization, job_title, note, modified_at";

const GROUP_COLUMNS: &str = "id, container_id, account_id, name";

/// Maps rusqlite failures into the contacts error taxonomy.
pub(crate) fn store_err(err: rusqlite::Error) -> ContactsError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            rusqlite::ErrorCode::ConstraintViolation => ContactsError::conflict(err.to_string()),
            rusqlite::ErrorCode::PermissionDenied | rusqlite::ErrorCode::ReadOnly => {
                ContactsError::permission_denied(err.to_string())
            }
            _ => ContactsError::store(err.to_string()),
        },
        _ => ContactsError::store(err.to_string()),
    }
}

/// Contact store persisted in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub fn open(path: &Path) -> ContactsResult<Self> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ContactsError::store(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(store_err)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> ContactsResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> ContactsResult<Self> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(store_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_err)?;
        migrations::run_migrations(&conn).map_err(store_err)?;

        tracing::debug!(path = ?path, "Opened contacts database");
        Ok(Self { conn, path })
    }

    /// Database file path; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
        let modified_at: i64 = row.get(10)?;
        Ok(Item {
            contact_ref: Ref {
                id: row.get(0)?,
                container_id: row.get(1)?,
                account_id: row.get(2)?,
            },
            given_name: row.get(3)?,
            family_name: row.get(4)?,
            middle_name: row.get(5)?,
            nickname: row.get(6)?,
            organization: row.get(7)?,
            job_title: row.get(8)?,
            note: row.get(9)?,
            modified_at: DateTime::<Utc>::from_timestamp(modified_at, 0),
            ..Default::default()
        })
    }

    fn row_to_group(row: &Row) -> rusqlite::Result<Group> {
        Ok(Group {
            group_ref: GroupRef {
                id: row.get(0)?,
                container_id: row.get(1)?,
                account_id: row.get(2)?,
            },
            name: row.get(3)?,
        })
    }

    /// Labeled values of one table, keyed by contact id, in stored order.
    fn labeled_values(
        &self,
        table: &str,
        contact_id: Option<&str>,
    ) -> rusqlite::Result<HashMap<String, Vec<LabeledValue>>> {
        let sql = match contact_id {
            Some(_) => format!(
                "SELECT contact_id, label, value FROM {} WHERE contact_id = ?1 ORDER BY position",
                table
            ),
            None => format!(
                "SELECT contact_id, label, value FROM {} ORDER BY contact_id, position",
                table
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match contact_id {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };

        let mut values: HashMap<String, Vec<LabeledValue>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let contact_id: String = row.get(0)?;
            values.entry(contact_id).or_default().push(LabeledValue {
                label: row.get(1)?,
                value: row.get(2)?,
            });
        }
        Ok(values)
    }

    fn memberships(&self, contact_id: Option<&str>) -> rusqlite::Result<HashMap<String, Vec<String>>> {
        let base = "SELECT gm.contact_id, gm.group_id
             FROM group_members gm
             INNER JOIN contact_groups g ON g.id = gm.group_id";
        let sql = match contact_id {
            Some(_) => format!("{} WHERE gm.contact_id = ?1 ORDER BY g.name, g.id", base),
            None => format!("{} ORDER BY g.name, g.id", base),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match contact_id {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };

        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let contact_id: String = row.get(0)?;
            groups.entry(contact_id).or_default().push(row.get(1)?);
        }
        Ok(groups)
    }

    fn attach_lists(
        &self,
        items: &mut [Item],
        fields: FieldSet,
        contact_id: Option<&str>,
    ) -> rusqlite::Result<()> {
        if fields.contains(Field::Emails) {
            let mut emails = self.labeled_values("contact_emails", contact_id)?;
            for item in items.iter_mut() {
                item.emails = emails.remove(item.id()).unwrap_or_default();
            }
        }
        if fields.contains(Field::Phones) {
            let mut phones = self.labeled_values("contact_phones", contact_id)?;
            for item in items.iter_mut() {
                item.phones = phones.remove(item.id()).unwrap_or_default();
            }
        }
        if fields.contains(Field::Groups) {
            let mut groups = self.memberships(contact_id)?;
            for item in items.iter_mut() {
                item.group_ids = groups.remove(item.id()).unwrap_or_default();
            }
        }
        Ok(())
    }

    fn contact_exists(&self, id: &str) -> rusqlite::Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn group_exists(&self, id: &str) -> rusqlite::Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM contact_groups WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn write_labeled_values(
        conn: &Connection,
        table: &str,
        contact_id: &str,
        values: &[LabeledValue],
    ) -> rusqlite::Result<()> {
        conn.execute(
            &format!("DELETE FROM {} WHERE contact_id = ?1", table),
            [contact_id],
        )?;
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} (contact_id, position, label, value) VALUES (?1, ?2, ?3, ?4)",
            table
        ))?;
        for (position, value) in values.iter().enumerate() {
            stmt.execute(params![contact_id, position as i64, value.label, value.value])?;
        }
        Ok(())
    }

    fn create_contact(&self, item: Item) -> rusqlite::Result<Ref> {
        let now = Utc::now().timestamp();
        let container_id = if item.contact_ref.container_id.trim().is_empty() {
            LOCAL_CONTAINER.to_string()
        } else {
            item.contact_ref.container_id.trim().to_string()
        };
        let contact_ref = Ref {
            id: Uuid::new_v4().to_string(),
            account_id: container_id.clone(),
            container_id,
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO contacts
             (id, container_id, account_id, given_name, family_name, middle_name, nickname,
              organization, job_title, note, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                contact_ref.id,
                contact_ref.container_id,
                contact_ref.account_id,
                item.given_name,
                item.family_name,
                item.middle_name,
                item.nickname,
                item.organization,
                item.job_title,
                item.note,
                now,
                now,
            ],
        )?;
        Self::write_labeled_values(&tx, "contact_emails", &contact_ref.id, &item.emails)?;
        Self::write_labeled_values(&tx, "contact_phones", &contact_ref.id, &item.phones)?;
        tx.commit()?;

        Ok(contact_ref)
    }

    fn update_contact(&self, item: &Item) -> rusqlite::Result<usize> {
        let now = Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE contacts
             SET given_name = ?1, family_name = ?2, middle_name = ?3, nickname = ?4,
                 organization = ?5, job_title = ?6, note = ?7, modified_at = ?8
             WHERE id = ?9",
            params![
                item.given_name,
                item.family_name,
                item.middle_name,
                item.nickname,
                item.organization,
                item.job_title,
                item.note,
                now,
                item.id(),
            ],
        )?;
        if changed > 0 {
            Self::write_labeled_values(&tx, "contact_emails", item.id(), &item.emails)?;
            Self::write_labeled_values(&tx, "contact_phones", item.id(), &item.phones)?;
        }
        tx.commit()?;
        Ok(changed)
    }

    fn add_members(&self, contact_id: &str, group_ids: &[String]) -> ContactsResult<()> {
        if !self.contact_exists(contact_id).map_err(store_err)? {
            return Err(ContactsError::not_found(format!(
                "contact {} not found",
                contact_id
            )));
        }
        for group_id in group_ids {
            if !self.group_exists(group_id).map_err(store_err)? {
                return Err(ContactsError::not_found(format!(
                    "group {} not found",
                    group_id
                )));
            }
        }

        let now = Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction().map_err(store_err)?;
        for group_id in group_ids {
            tx.execute(
                "INSERT OR IGNORE INTO group_members (group_id, contact_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![group_id, contact_id, now],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }

    fn create_group(&self, name: &str, container_id: Option<String>) -> rusqlite::Result<GroupRef> {
        let now = Utc::now().timestamp();
        let container_id = container_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| LOCAL_CONTAINER.to_string());
        let group_ref = GroupRef {
            id: Uuid::new_v4().to_string(),
            account_id: container_id.clone(),
            container_id,
        };

        self.conn.execute(
            "INSERT INTO contact_groups (id, container_id, account_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group_ref.id,
                group_ref.container_id,
                group_ref.account_id,
                name,
                now,
                now
            ],
        )?;
        Ok(group_ref)
    }
}

impl ContactStore for SqliteStore {
    fn authorization_status(&self) -> ContactsResult<AuthStatus> {
        Ok(AuthStatus::Authorized)
    }

    fn request_access(&self) -> ContactsResult<()> {
        Ok(())
    }

    fn enumerate(&self, fields: FieldSet) -> ContactsResult<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM contacts ORDER BY rowid",
                CONTACT_COLUMNS
            ))
            .map_err(store_err)?;

        let mut items = stmt
            .query_map([], Self::row_to_item)
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        self.attach_lists(&mut items, fields, None)
            .map_err(store_err)?;

        Ok(items.into_iter().map(|item| fields.project(item)).collect())
    }

    fn fetch_by_ids(&self, ids: &[String], fields: FieldSet) -> ContactsResult<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS))
            .map_err(store_err)?;

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if items.iter().any(|item: &Item| item.id() == id) {
                continue;
            }
            let found = stmt
                .query_row([id], Self::row_to_item)
                .optional()
                .map_err(store_err)?;
            if let Some(mut item) = found {
                self.attach_lists(std::slice::from_mut(&mut item), fields, Some(id.as_str()))
                    .map_err(store_err)?;
                items.push(fields.project(item));
            }
        }
        Ok(items)
    }

    fn save(&self, request: SaveRequest) -> ContactsResult<SaveReceipt> {
        tracing::debug!(kind = request.kind(), "Submitting save request");
        match request {
            SaveRequest::CreateContact(item) => self
                .create_contact(item)
                .map(SaveReceipt::Contact)
                .map_err(store_err),
            SaveRequest::UpdateContact(item) => {
                let changed = self.update_contact(&item).map_err(store_err)?;
                if changed == 0 {
                    return Err(ContactsError::not_found(format!(
                        "contact {} not found",
                        item.id()
                    )));
                }
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::DeleteContact { id } => {
                let changed = self
                    .conn
                    .execute("DELETE FROM contacts WHERE id = ?1", [&id])
                    .map_err(store_err)?;
                if changed == 0 {
                    return Err(ContactsError::not_found(format!("contact {} not found", id)));
                }
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::AddMembers {
                contact_id,
                group_ids,
            } => {
                self.add_members(&contact_id, &group_ids)?;
                Ok(SaveReceipt::Saved)
            }
            SaveRequest::CreateGroup { name, container_id } => self
                .create_group(&name, container_id)
                .map(SaveReceipt::Group)
                .map_err(store_err),
            SaveRequest::RenameGroup { id, name } => {
                let changed = self
                    .conn
                    .execute(
                        "UPDATE contact_groups SET name = ?1, updated_at = ?2 WHERE id = ?3",
                        params![name, Utc::now().timestamp(), id],
                    )
                    .map_err(store_err)?;
                if changed == 0 {
                    return Err(ContactsError::not_found(format!("group {} not found", id)));
                }
                let group = self
                    .resolve_group(&id)?
                    .ok_or_else(|| ContactsError::not_found(format!("group {} not found", id)))?;
                Ok(SaveReceipt::Group(group.group_ref))
            }
            SaveRequest::DeleteGroup { id } => {
                let changed = self
                    .conn
                    .execute("DELETE FROM contact_groups WHERE id = ?1", [&id])
                    .map_err(store_err)?;
                if changed == 0 {
                    return Err(ContactsError::not_found(format!("group {} not found", id)));
                }
                Ok(SaveReceipt::Saved)
            }
        }
    }

    fn group_members(&self, group_id: &str) -> ContactsResult<Vec<String>> {
        if !self.group_exists(group_id).map_err(store_err)? {
            return Err(ContactsError::not_found(format!(
                "group {} not found",
                group_id
            )));
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT contact_id FROM group_members
                 WHERE group_id = ?1
                 ORDER BY created_at, contact_id",
            )
            .map_err(store_err)?;

        let members = stmt
            .query_map([group_id], |row| row.get::<_, String>(0))
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        Ok(members)
    }

    fn resolve_group(&self, group_id: &str) -> ContactsResult<Option<Group>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM contact_groups WHERE id = ?1", GROUP_COLUMNS),
                [group_id],
                Self::row_to_group,
            )
            .optional()
            .map_err(store_err)
    }

    fn list_groups(&self) -> ContactsResult<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM contact_groups ORDER BY name, id",
                GROUP_COLUMNS
            ))
            .map_err(store_err)?;

        let groups = stmt
            .query_map([], Self::row_to_group)
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        Ok(groups)
    }
}
