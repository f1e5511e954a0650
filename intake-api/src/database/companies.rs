use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::OptionalExtension;

pub async fn insert_company(
    conn: AsyncDbConnection,
    name: &str,
    website: Option<&str>,
    category: Option<&str>,
) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    let id: i64 = conn.query_row(
        "INSERT INTO companies (name, website, category, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING company_id",
        rusqlite::params![name, website, category, now],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn get_or_create_company(conn: AsyncDbConnection, name: &str) -> Result<i64> {
    {
        let locked_conn = conn.lock().await?;
        let existing: Option<i64> = locked_conn
            .query_row(
                "SELECT company_id FROM companies WHERE name = ? ORDER BY company_id LIMIT 1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }
    }

    insert_company(conn, name, None, None).await
}
