use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use shared_types::{
    City, Contact, ContactCompany, ContactEmail, ContactMobile, ContactPointType, ContactRecord,
    Tag, CATEGORY_INBOX, CATEGORY_MERGED,
};

pub const CONTACT_COLUMNS: &str = "c.contact_id, c.first_name, c.last_name, c.email, c.mobile,
    c.linkedin, c.job_role, c.description, c.score, c.category, c.keep_in_touch_frequency,
    c.birthday, c.created_at, c.last_modified_at";

/// Map the [`CONTACT_COLUMNS`] block starting at `offset`.
pub fn contact_from_row(row: &Row, offset: usize) -> rusqlite::Result<Contact> {
    Ok(Contact {
        contact_id: row.get(offset)?,
        first_name: row.get(offset + 1)?,
        last_name: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        mobile: row.get(offset + 4)?,
        linkedin: row.get(offset + 5)?,
        job_role: row.get(offset + 6)?,
        description: row.get(offset + 7)?,
        score: row.get(offset + 8)?,
        category: row.get(offset + 9)?,
        keep_in_touch_frequency: row.get(offset + 10)?,
        birthday: row.get(offset + 11)?,
        created_at: row.get(offset + 12)?,
        last_modified_at: row.get(offset + 13)?,
    })
}

/// Another contact that owns an email or mobile equal to the searched value.
#[derive(Debug, Clone)]
pub struct ContactPointMatch {
    pub contact: Contact,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub linkedin: Option<String>,
    pub job_role: Option<String>,
    pub description: Option<String>,
    pub score: Option<u8>,
    pub category: Option<String>,
    pub keep_in_touch_frequency: Option<String>,
    pub birthday: Option<String>,
}

pub async fn insert_contact(conn: AsyncDbConnection, contact: &NewContact) -> Result<i64> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();
    let category = contact
        .category
        .clone()
        .unwrap_or_else(|| CATEGORY_INBOX.to_string());

    let id: i64 = conn.query_row(
        "INSERT INTO contacts
         (first_name, last_name, email, mobile, linkedin, job_role, description, score,
          category, keep_in_touch_frequency, birthday, created_at, last_modified_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING contact_id",
        params![
            contact.first_name.as_ref(),
            contact.last_name.as_ref(),
            contact.email.as_ref(),
            contact.mobile.as_ref(),
            contact.linkedin.as_ref(),
            contact.job_role.as_ref(),
            contact.description.as_ref(),
            contact.score,
            &category,
            contact.keep_in_touch_frequency.as_ref(),
            contact.birthday.as_ref(),
            now,
            now
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn insert_contact_email(
    conn: AsyncDbConnection,
    contact_id: i64,
    email: &str,
    email_type: ContactPointType,
    is_primary: bool,
) -> Result<i64> {
    let conn = conn.lock().await?;

    let id: i64 = conn.query_row(
        "INSERT INTO contact_emails (contact_id, email, type, is_primary)
         VALUES (?, ?, ?, ?)
         RETURNING email_id",
        params![contact_id, email, email_type.as_str(), is_primary],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn insert_contact_mobile(
    conn: AsyncDbConnection,
    contact_id: i64,
    mobile: &str,
    mobile_type: ContactPointType,
    is_primary: bool,
) -> Result<i64> {
    let conn = conn.lock().await?;

    let id: i64 = conn.query_row(
        "INSERT INTO contact_mobiles (contact_id, mobile, type, is_primary)
         VALUES (?, ?, ?, ?)
         RETURNING mobile_id",
        params![contact_id, mobile, mobile_type.as_str(), is_primary],
        |row| row.get(0),
    )?;

    Ok(id)
}

fn get_or_create_tag(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT tag_id FROM tags WHERE name = ?", [name], |row| row.get(0))
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i64 = conn.query_row(
        "INSERT INTO tags (name) VALUES (?) RETURNING tag_id",
        [name],
        |row| row.get(0),
    )?;

    Ok(id)
}

fn get_or_create_city(conn: &Connection, name: &str, country: Option<&str>) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT city_id FROM cities
             WHERE name = ?1 AND (country = ?2 OR country IS NULL AND ?2 IS NULL)",
            params![name, country],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i64 = conn.query_row(
        "INSERT INTO cities (name, country) VALUES (?, ?) RETURNING city_id",
        params![name, country],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn add_contact_tag(conn: AsyncDbConnection, contact_id: i64, name: &str) -> Result<i64> {
    let conn = conn.lock().await?;
    let tag_id = get_or_create_tag(&conn, name)?;

    conn.execute(
        "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id) VALUES (?, ?)",
        params![contact_id, tag_id],
    )?;

    Ok(tag_id)
}

pub async fn add_contact_city(
    conn: AsyncDbConnection,
    contact_id: i64,
    name: &str,
    country: Option<&str>,
) -> Result<i64> {
    let conn = conn.lock().await?;
    let city_id = get_or_create_city(&conn, name, country)?;

    conn.execute(
        "INSERT OR IGNORE INTO contact_cities (contact_id, city_id) VALUES (?, ?)",
        params![contact_id, city_id],
    )?;

    Ok(city_id)
}

pub async fn link_contact_company(
    conn: AsyncDbConnection,
    contact_id: i64,
    company_id: i64,
    relationship: Option<&str>,
    is_primary: bool,
) -> Result<()> {
    let conn = conn.lock().await?;

    conn.execute(
        "INSERT INTO contact_companies (contact_id, company_id, relationship, is_primary)
         VALUES (?, ?, ?, ?)",
        params![contact_id, company_id, relationship, is_primary],
    )?;

    Ok(())
}

pub fn load_contact(conn: &Connection, id: i64) -> Result<Option<Contact>> {
    let sql = format!("SELECT {} FROM contacts c WHERE c.contact_id = ?", CONTACT_COLUMNS);

    conn.query_row(&sql, [id], |row| contact_from_row(row, 0))
        .optional()
        .map_err(|e| anyhow::anyhow!("Failed to get contact: {}", e))
}

pub fn load_emails(conn: &Connection, contact_id: i64) -> Result<Vec<ContactEmail>> {
    let mut stmt = conn.prepare(
        "SELECT email_id, email, type, is_primary
         FROM contact_emails
         WHERE contact_id = ?
         ORDER BY email_id",
    )?;

    let emails = stmt
        .query_map([contact_id], |row| {
            let email_type: String = row.get(2)?;
            Ok(ContactEmail {
                email_id: row.get(0)?,
                email: row.get(1)?,
                email_type: ContactPointType::from_db(&email_type),
                is_primary: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(emails)
}

pub fn load_mobiles(conn: &Connection, contact_id: i64) -> Result<Vec<ContactMobile>> {
    let mut stmt = conn.prepare(
        "SELECT mobile_id, mobile, type, is_primary
         FROM contact_mobiles
         WHERE contact_id = ?
         ORDER BY mobile_id",
    )?;

    let mobiles = stmt
        .query_map([contact_id], |row| {
            let mobile_type: String = row.get(2)?;
            Ok(ContactMobile {
                mobile_id: row.get(0)?,
                mobile: row.get(1)?,
                mobile_type: ContactPointType::from_db(&mobile_type),
                is_primary: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(mobiles)
}

pub fn load_tags(conn: &Connection, contact_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.tag_id, t.name
         FROM contact_tags ct
         JOIN tags t ON t.tag_id = ct.tag_id
         WHERE ct.contact_id = ?
         ORDER BY ct.entry_id",
    )?;

    let tags = stmt
        .query_map([contact_id], |row| {
            Ok(Tag {
                tag_id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tags)
}

pub fn load_cities(conn: &Connection, contact_id: i64) -> Result<Vec<City>> {
    let mut stmt = conn.prepare(
        "SELECT ci.city_id, ci.name, ci.country
         FROM contact_cities cc
         JOIN cities ci ON ci.city_id = cc.city_id
         WHERE cc.contact_id = ?
         ORDER BY cc.entry_id",
    )?;

    let cities = stmt
        .query_map([contact_id], |row| {
            Ok(City {
                city_id: row.get(0)?,
                name: row.get(1)?,
                country: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cities)
}

pub fn load_companies(conn: &Connection, contact_id: i64) -> Result<Vec<ContactCompany>> {
    let mut stmt = conn.prepare(
        "SELECT co.company_id, co.name, cc.relationship, cc.is_primary
         FROM contact_companies cc
         JOIN companies co ON co.company_id = cc.company_id
         WHERE cc.contact_id = ?
         ORDER BY cc.contact_companies_id",
    )?;

    let companies = stmt
        .query_map([contact_id], |row| {
            Ok(ContactCompany {
                company_id: row.get(0)?,
                name: row.get(1)?,
                relationship: row.get(2)?,
                is_primary: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(companies)
}

pub fn load_record(conn: &Connection, id: i64) -> Result<Option<ContactRecord>> {
    let Some(contact) = load_contact(conn, id)? else {
        return Ok(None);
    };

    Ok(Some(ContactRecord {
        contact,
        emails: load_emails(conn, id)?,
        mobiles: load_mobiles(conn, id)?,
        tags: load_tags(conn, id)?,
        cities: load_cities(conn, id)?,
        companies: load_companies(conn, id)?,
    }))
}

pub async fn get_contact(conn: AsyncDbConnection, id: i64) -> Result<Option<Contact>> {
    let conn = conn.lock().await?;
    load_contact(&conn, id)
}

pub async fn get_contact_record(conn: AsyncDbConnection, id: i64) -> Result<Option<ContactRecord>> {
    let conn = conn.lock().await?;
    load_record(&conn, id)
}

fn find_contact_points(
    conn: &Connection,
    table: &str,
    column: &str,
    value: &str,
    exclude_id: i64,
) -> Result<Vec<ContactPointMatch>> {
    let sql = format!(
        "SELECT p.contact_id, p.{column}, {columns}
         FROM {table} p
         LEFT JOIN contacts c ON c.contact_id = p.contact_id
         WHERE p.{column} = ?1
           AND p.contact_id != ?2
           AND (c.contact_id IS NULL OR COALESCE(c.category, '') != ?3)
         ORDER BY p.rowid",
        column = column,
        columns = CONTACT_COLUMNS,
        table = table,
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![value, exclude_id, CATEGORY_MERGED], |row| {
            let owner: i64 = row.get(0)?;
            let matched: String = row.get(1)?;
            let joined: Option<i64> = row.get(2)?;
            let contact = match joined {
                Some(_) => Some(contact_from_row(row, 2)?),
                None => None,
            };
            Ok((owner, matched, contact))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut matches = Vec::with_capacity(rows.len());
    for (owner, matched, contact) in rows {
        match contact {
            Some(contact) => matches.push(ContactPointMatch {
                contact,
                value: matched,
            }),
            None => {
                tracing::warn!(
                    "{} row for '{}' references missing contact {}, skipping",
                    table,
                    matched,
                    owner
                );
            }
        }
    }

    Ok(matches)
}

pub async fn find_contacts_by_email(
    conn: AsyncDbConnection,
    email: &str,
    exclude_id: i64,
) -> Result<Vec<ContactPointMatch>> {
    let conn = conn.lock().await?;
    find_contact_points(&conn, "contact_emails", "email", email, exclude_id)
}

pub async fn find_contacts_by_mobile(
    conn: AsyncDbConnection,
    mobile: &str,
    exclude_id: i64,
) -> Result<Vec<ContactPointMatch>> {
    let conn = conn.lock().await?;
    find_contact_points(&conn, "contact_mobiles", "mobile", mobile, exclude_id)
}

fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Broad pre-filter: contacts whose first name contains `first` OR whose last name contains `last`.
pub async fn find_contacts_by_name_like(
    conn: AsyncDbConnection,
    first: Option<&str>,
    last: Option<&str>,
    exclude_id: i64,
) -> Result<Vec<Contact>> {
    let mut clauses = Vec::new();
    let mut values: Vec<Box<dyn ToSql + Send>> = Vec::new();

    if let Some(first) = first {
        clauses.push("c.first_name LIKE ? ESCAPE '\\'");
        values.push(Box::new(like_pattern(first)));
    }
    if let Some(last) = last {
        clauses.push("c.last_name LIKE ? ESCAPE '\\'");
        values.push(Box::new(like_pattern(last)));
    }

    if clauses.is_empty() {
        return Ok(Vec::new());
    }

    values.push(Box::new(exclude_id));
    values.push(Box::new(CATEGORY_MERGED));

    let sql = format!(
        "SELECT {} FROM contacts c
         WHERE ({}) AND c.contact_id != ? AND COALESCE(c.category, '') != ?
         ORDER BY c.contact_id",
        CONTACT_COLUMNS,
        clauses.join(" OR ")
    );

    let conn = conn.lock().await?;
    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref() as &dyn ToSql).collect();

    let contacts = stmt
        .query_map(params_refs.as_slice(), |row| contact_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(contacts)
}

pub async fn get_primary_email(conn: AsyncDbConnection, contact_id: i64) -> Result<Option<String>> {
    let conn = conn.lock().await?;

    let email = conn
        .query_row(
            "SELECT email FROM contact_emails
             WHERE contact_id = ? AND is_primary = 1
             ORDER BY email_id LIMIT 1",
            [contact_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(email)
}

pub async fn get_primary_mobile(
    conn: AsyncDbConnection,
    contact_id: i64,
) -> Result<Option<String>> {
    let conn = conn.lock().await?;

    let mobile = conn
        .query_row(
            "SELECT mobile FROM contact_mobiles
             WHERE contact_id = ? AND is_primary = 1
             ORDER BY mobile_id LIMIT 1",
            [contact_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(mobile)
}

/// Name of the contact's primary company, or of the first linked one.
pub async fn get_primary_company_name(
    conn: AsyncDbConnection,
    contact_id: i64,
) -> Result<Option<String>> {
    let conn = conn.lock().await?;

    let name = conn
        .query_row(
            "SELECT co.name
             FROM contact_companies cc
             JOIN companies co ON co.company_id = cc.company_id
             WHERE cc.contact_id = ?
             ORDER BY cc.is_primary DESC, cc.contact_companies_id
             LIMIT 1",
            [contact_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(name)
}

pub fn set_category(conn: &Connection, contact_id: i64, category: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    let changed = conn.execute(
        "UPDATE contacts SET category = ?, last_modified_at = ? WHERE contact_id = ?",
        params![category, now, contact_id],
    )?;

    if changed == 0 {
        anyhow::bail!("Contact {} does not exist", contact_id);
    }

    Ok(())
}

pub async fn set_contact_category(
    conn: AsyncDbConnection,
    contact_id: i64,
    category: &str,
) -> Result<()> {
    let conn = conn.lock().await?;
    set_category(&conn, contact_id, category)
}

/// Overwrite a contact's fields and child collections with `record`.
///
/// Meant to run inside the caller's transaction.
pub fn write_record(conn: &Connection, record: &ContactRecord) -> Result<()> {
    let contact = &record.contact;
    let id = contact.contact_id;
    let now = chrono::Utc::now().timestamp();

    let changed = conn.execute(
        "UPDATE contacts
         SET first_name = ?, last_name = ?, email = ?, mobile = ?, linkedin = ?, job_role = ?,
             description = ?, score = ?, category = ?, keep_in_touch_frequency = ?,
             birthday = ?, last_modified_at = ?
         WHERE contact_id = ?",
        params![
            contact.first_name,
            contact.last_name,
            contact.email,
            contact.mobile,
            contact.linkedin,
            contact.job_role,
            contact.description,
            contact.score,
            contact.category,
            contact.keep_in_touch_frequency,
            contact.birthday,
            now,
            id
        ],
    )?;

    if changed == 0 {
        anyhow::bail!("Contact {} no longer exists", id);
    }

    conn.execute("DELETE FROM contact_emails WHERE contact_id = ?", [id])?;
    for email in &record.emails {
        conn.execute(
            "INSERT INTO contact_emails (contact_id, email, type, is_primary) VALUES (?, ?, ?, ?)",
            params![id, email.email, email.email_type.as_str(), email.is_primary],
        )?;
    }

    conn.execute("DELETE FROM contact_mobiles WHERE contact_id = ?", [id])?;
    for mobile in &record.mobiles {
        conn.execute(
            "INSERT INTO contact_mobiles (contact_id, mobile, type, is_primary) VALUES (?, ?, ?, ?)",
            params![id, mobile.mobile, mobile.mobile_type.as_str(), mobile.is_primary],
        )?;
    }

    conn.execute("DELETE FROM contact_tags WHERE contact_id = ?", [id])?;
    for tag in &record.tags {
        let tag_id = match tag.tag_id {
            Some(tag_id) => tag_id,
            None => get_or_create_tag(conn, &tag.name)?,
        };
        conn.execute(
            "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id) VALUES (?, ?)",
            params![id, tag_id],
        )?;
    }

    conn.execute("DELETE FROM contact_cities WHERE contact_id = ?", [id])?;
    for city in &record.cities {
        let city_id = match city.city_id {
            Some(city_id) => city_id,
            None => get_or_create_city(conn, &city.name, city.country.as_deref())?,
        };
        conn.execute(
            "INSERT OR IGNORE INTO contact_cities (contact_id, city_id) VALUES (?, ?)",
            params![id, city_id],
        )?;
    }

    conn.execute("DELETE FROM contact_companies WHERE contact_id = ?", [id])?;
    for company in &record.companies {
        conn.execute(
            "INSERT INTO contact_companies (contact_id, company_id, relationship, is_primary)
             VALUES (?, ?, ?, ?)",
            params![id, company.company_id, company.relationship, company.is_primary],
        )?;
    }

    Ok(())
}
