use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contacts (
            contact_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name VARCHAR,
            last_name VARCHAR,
            email VARCHAR,
            mobile VARCHAR,
            linkedin VARCHAR,
            job_role VARCHAR,
            description VARCHAR,
            score INTEGER CHECK (score IS NULL OR score BETWEEN 1 AND 5),
            category VARCHAR DEFAULT 'Inbox',
            keep_in_touch_frequency VARCHAR,
            birthday VARCHAR,
            created_at BIGINT NOT NULL,
            last_modified_at BIGINT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contacts_names
            ON contacts(first_name, last_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_emails (
            email_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            email VARCHAR NOT NULL,
            type VARCHAR NOT NULL DEFAULT 'personal' CHECK (type IN ('personal', 'work', 'other')),
            is_primary BOOLEAN NOT NULL DEFAULT false,
            FOREIGN KEY (contact_id) REFERENCES contacts (contact_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_emails_email
            ON contact_emails(email)",
        [],
    )?;

    // At most one primary email per contact
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_contact_emails_primary
            ON contact_emails(contact_id) WHERE is_primary = 1",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_mobiles (
            mobile_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            mobile VARCHAR NOT NULL,
            type VARCHAR NOT NULL DEFAULT 'personal' CHECK (type IN ('personal', 'work', 'other')),
            is_primary BOOLEAN NOT NULL DEFAULT false,
            FOREIGN KEY (contact_id) REFERENCES contacts (contact_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_mobiles_mobile
            ON contact_mobiles(mobile)",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_contact_mobiles_primary
            ON contact_mobiles(contact_id) WHERE is_primary = 1",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tags (
            tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_tags (
            entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            UNIQUE (contact_id, tag_id),
            FOREIGN KEY (contact_id) REFERENCES contacts (contact_id),
            FOREIGN KEY (tag_id) REFERENCES tags (tag_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cities (
            city_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR NOT NULL,
            country VARCHAR
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_cities (
            entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            city_id INTEGER NOT NULL,
            UNIQUE (contact_id, city_id),
            FOREIGN KEY (contact_id) REFERENCES contacts (contact_id),
            FOREIGN KEY (city_id) REFERENCES cities (city_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            company_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR NOT NULL,
            website VARCHAR,
            category VARCHAR,
            created_at BIGINT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_companies (
            contact_companies_id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_id INTEGER NOT NULL,
            company_id INTEGER NOT NULL,
            relationship VARCHAR,
            is_primary BOOLEAN NOT NULL DEFAULT false,
            UNIQUE (contact_id, company_id),
            FOREIGN KEY (contact_id) REFERENCES contacts (contact_id),
            FOREIGN KEY (company_id) REFERENCES companies (company_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contact_duplicates (
            duplicate_id INTEGER PRIMARY KEY AUTOINCREMENT,
            primary_contact_id INTEGER NOT NULL,
            duplicate_contact_id INTEGER NOT NULL,
            email VARCHAR,
            mobile_number VARCHAR,
            match_evidence VARCHAR,
            status VARCHAR NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'completed', 'failed', 'resolved')),
            false_positive BOOLEAN NOT NULL DEFAULT false,
            notes VARCHAR,
            detected_at BIGINT NOT NULL,
            resolved_at BIGINT,
            resolved_by VARCHAR,
            error_message VARCHAR,
            duplicate_data VARCHAR,
            merge_selections VARCHAR,
            start_trigger BOOLEAN NOT NULL DEFAULT false
        )",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_contact_duplicates_pair
            ON contact_duplicates(primary_contact_id, duplicate_contact_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contact_duplicates_status
            ON contact_duplicates(status, start_trigger)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'contact%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }
}
