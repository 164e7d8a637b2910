use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    // Create contacts table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contacts (
            id VARCHAR PRIMARY KEY,
            container_id VARCHAR NOT NULL,
            account_id VARCHAR NOT NULL,
            given_name VARCHAR NOT NULL DEFAULT '',
            family_name VARCHAR NOT NULL DEFAULT '',
            middle_name VARCHAR NOT NULL DEFAULT '',
            nickname VARCHAR NOT NULL DEFAULT '',
            organization VARCHAR NOT NULL DEFAULT '',
            job_title VARCHAR NOT NULL DEFAULT '',
            note VARCHAR NOT NULL DEFAULT '',
            created_at BIGINT NOT NULL,
            modified_at BIGINT NOT NULL
        )",
        [],
    )?;

    // Create contact_emails table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_emails (
            contact_id VARCHAR NOT NULL,
            position INTEGER NOT NULL,
            label VARCHAR NOT NULL DEFAULT '',
            value VARCHAR NOT NULL,
            PRIMARY KEY (contact_id, position),
            FOREIGN KEY (contact_id) REFERENCES contacts (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create contact_phones table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_phones (
            contact_id VARCHAR NOT NULL,
            position INTEGER NOT NULL,
            label VARCHAR NOT NULL DEFAULT '',
            value VARCHAR NOT NULL,
            PRIMARY KEY (contact_id, position),
            FOREIGN KEY (contact_id) REFERENCES contacts (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create contact_groups table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_groups (
            id VARCHAR PRIMARY KEY,
            container_id VARCHAR NOT NULL,
            account_id VARCHAR NOT NULL,
            name VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )",
        [],
    )?;

    // Create group_members table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_members (
            group_id VARCHAR NOT NULL,
            contact_id VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            PRIMARY KEY (group_id, contact_id),
            FOREIGN KEY (group_id) REFERENCES contact_groups (id) ON DELETE CASCADE,
            FOREIGN KEY (contact_id) REFERENCES contacts (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Create indexes for performance
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_group_members_contact ON group_members(contact_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_groups_name ON contact_groups(name)",
        [],
    )?;

    Ok(())
}
