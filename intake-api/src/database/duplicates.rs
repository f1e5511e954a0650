use crate::database::{contacts, AsyncDbConnection};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use shared_types::{
    ContactRecord, DuplicatePair, DuplicatePairStatus, DuplicateStatus, NewMergeRequest,
    CATEGORY_MERGED,
};

const PAIR_COLUMNS: &str = "duplicate_id, primary_contact_id, duplicate_contact_id, email,
    mobile_number, match_evidence, status, false_positive, notes, detected_at, resolved_at,
    resolved_by, error_message, duplicate_data, merge_selections, start_trigger";

fn parse_status(value: &str) -> DuplicateStatus {
    DuplicateStatus::from_db(value).unwrap_or_else(|| {
        tracing::warn!("Unknown duplicate status '{}', treating as failed", value);
        DuplicateStatus::Failed
    })
}

fn pair_from_row(row: &Row) -> rusqlite::Result<DuplicatePair> {
    let duplicate_id: i64 = row.get(0)?;
    let status: String = row.get(6)?;
    let duplicate_data: Option<String> = row.get(13)?;
    let merge_selections: Option<String> = row.get(14)?;

    let duplicate_data = duplicate_data.and_then(|json| {
        serde_json::from_str::<ContactRecord>(&json)
            .map_err(|e| tracing::warn!("Pair {} has an unreadable snapshot: {}", duplicate_id, e))
            .ok()
    });
    let merge_selections = merge_selections.and_then(|json| {
        serde_json::from_str(&json)
            .map_err(|e| tracing::warn!("Pair {} has unreadable selections: {}", duplicate_id, e))
            .ok()
    });

    Ok(DuplicatePair {
        duplicate_id,
        primary_contact_id: row.get(1)?,
        duplicate_contact_id: row.get(2)?,
        email: row.get(3)?,
        mobile_number: row.get(4)?,
        match_evidence: row.get(5)?,
        status: parse_status(&status),
        false_positive: row.get(7)?,
        notes: row.get(8)?,
        detected_at: row.get(9)?,
        resolved_at: row.get(10)?,
        resolved_by: row.get(11)?,
        error_message: row.get(12)?,
        duplicate_data,
        merge_selections,
        start_trigger: row.get(15)?,
    })
}

pub fn load_pair(conn: &Connection, duplicate_id: i64) -> Result<Option<DuplicatePair>> {
    let sql = format!(
        "SELECT {} FROM contact_duplicates WHERE duplicate_id = ?",
        PAIR_COLUMNS
    );

    conn.query_row(&sql, [duplicate_id], pair_from_row)
        .optional()
        .map_err(|e| anyhow::anyhow!("Failed to get duplicate pair: {}", e))
}

/// Every pair linking `a` and `b`, in either orientation, oldest first.
pub fn load_pairs_between(conn: &Connection, a: i64, b: i64) -> Result<Vec<DuplicatePair>> {
    let sql = format!(
        "SELECT {} FROM contact_duplicates
         WHERE (primary_contact_id = ?1 AND duplicate_contact_id = ?2)
            OR (primary_contact_id = ?2 AND duplicate_contact_id = ?1)
         ORDER BY duplicate_id",
        PAIR_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let pairs = stmt
        .query_map(params![a, b], pair_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}

pub async fn get_duplicate_pair(
    conn: AsyncDbConnection,
    duplicate_id: i64,
) -> Result<Option<DuplicatePair>> {
    let conn = conn.lock().await?;
    load_pair(&conn, duplicate_id)
}

pub async fn find_pairs_between(
    conn: AsyncDbConnection,
    a: i64,
    b: i64,
) -> Result<Vec<DuplicatePair>> {
    let conn = conn.lock().await?;
    load_pairs_between(&conn, a, b)
}

/// Whether `contact_id` is on either side of a merge that is pending or processing.
pub async fn has_open_merge(conn: AsyncDbConnection, contact_id: i64) -> Result<bool> {
    let conn = conn.lock().await?;

    let open: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM contact_duplicates
             WHERE status IN ('pending', 'processing')
               AND (primary_contact_id = ?1 OR duplicate_contact_id = ?1)
         )",
        [contact_id],
        |row| row.get(0),
    )?;

    Ok(open)
}

/// Pairs touching `contact_id` that were dismissed as not being duplicates.
pub async fn list_false_positive_pairs(
    conn: AsyncDbConnection,
    contact_id: i64,
) -> Result<Vec<DuplicatePair>> {
    let conn = conn.lock().await?;
    let sql = format!(
        "SELECT {} FROM contact_duplicates
         WHERE false_positive = 1
           AND (primary_contact_id = ?1 OR duplicate_contact_id = ?1)
         ORDER BY duplicate_id",
        PAIR_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let pairs = stmt
        .query_map([contact_id], pair_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}

/// Record a merge request and arm it for the merge job.
///
/// A previous row for the same orientation (typically a failed attempt) is reset to pending.
pub async fn upsert_merge_request(
    conn: AsyncDbConnection,
    request: &NewMergeRequest,
) -> Result<DuplicatePair> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();
    let duplicate_data = serde_json::to_string(&request.duplicate_data)?;
    let merge_selections = serde_json::to_string(&request.merge_selections)?;

    let id: i64 = conn.query_row(
        "INSERT INTO contact_duplicates
         (primary_contact_id, duplicate_contact_id, email, mobile_number, match_evidence,
          status, false_positive, notes, detected_at, resolved_by, duplicate_data,
          merge_selections, start_trigger)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?7, ?8, ?9, ?10, 1)
         ON CONFLICT (primary_contact_id, duplicate_contact_id) DO UPDATE SET
             email = excluded.email,
             mobile_number = excluded.mobile_number,
             match_evidence = excluded.match_evidence,
             status = 'pending',
             false_positive = 0,
             notes = excluded.notes,
             detected_at = excluded.detected_at,
             resolved_at = NULL,
             resolved_by = excluded.resolved_by,
             error_message = NULL,
             duplicate_data = excluded.duplicate_data,
             merge_selections = excluded.merge_selections,
             start_trigger = 1
         RETURNING duplicate_id",
        params![
            request.primary_contact_id,
            request.duplicate_contact_id,
            request.email,
            request.mobile_number,
            request.match_evidence,
            request.notes,
            now,
            request.resolved_by,
            duplicate_data,
            merge_selections
        ],
        |row| row.get(0),
    )?;

    load_pair(&conn, id)?.ok_or_else(|| anyhow::anyhow!("Duplicate pair {} vanished after insert", id))
}

/// Flag the pair between `subject_id` and `candidate_id` as not being duplicates.
///
/// Reuses the rows already linking the two contacts in either orientation, so repeating
/// the call has no further effect.
pub async fn mark_false_positive(
    conn: AsyncDbConnection,
    subject_id: i64,
    candidate_id: i64,
    resolved_by: Option<&str>,
) -> Result<DuplicatePair> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();
    let tx = conn.transaction()?;

    let existing = load_pairs_between(&tx, subject_id, candidate_id)?;
    let dismissed = existing
        .iter()
        .find(|pair| pair.false_positive && pair.status == DuplicateStatus::Resolved)
        .map(|pair| pair.duplicate_id);

    let id = match (dismissed, existing.first()) {
        (Some(id), _) => id,
        (None, Some(oldest)) => {
            tx.execute(
                "UPDATE contact_duplicates
                 SET false_positive = 1, status = 'resolved', resolved_at = ?1, resolved_by = ?2,
                     error_message = NULL, start_trigger = 0
                 WHERE (primary_contact_id = ?3 AND duplicate_contact_id = ?4)
                    OR (primary_contact_id = ?4 AND duplicate_contact_id = ?3)",
                params![now, resolved_by, subject_id, candidate_id],
            )?;
            oldest.duplicate_id
        }
        (None, None) => tx.query_row(
            "INSERT INTO contact_duplicates
             (primary_contact_id, duplicate_contact_id, status, false_positive, notes,
              detected_at, resolved_at, resolved_by, start_trigger)
             VALUES (?, ?, 'resolved', 1, 'Marked as not a duplicate', ?, ?, ?, 0)
             RETURNING duplicate_id",
            params![subject_id, candidate_id, now, now, resolved_by],
            |row| row.get(0),
        )?,
    };

    tx.commit()?;

    load_pair(&conn, id)?.ok_or_else(|| anyhow::anyhow!("Duplicate pair {} vanished", id))
}

pub async fn get_pair_status(
    conn: AsyncDbConnection,
    duplicate_id: i64,
) -> Result<Option<DuplicatePairStatus>> {
    let conn = conn.lock().await?;

    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT status, error_message FROM contact_duplicates WHERE duplicate_id = ?",
            [duplicate_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row.map(|(status, error_message)| DuplicatePairStatus {
        duplicate_id,
        status: parse_status(&status),
        error_message,
    }))
}

/// Move up to `limit` armed pending pairs to processing and return them.
pub async fn claim_pending_merges(
    conn: AsyncDbConnection,
    limit: usize,
) -> Result<Vec<DuplicatePair>> {
    let conn = conn.lock().await?;

    let ids: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT duplicate_id FROM contact_duplicates
             WHERE status = 'pending' AND start_trigger = 1
             ORDER BY duplicate_id
             LIMIT ?",
        )?;
        let ids = stmt
            .query_map([limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    let mut claimed = Vec::with_capacity(ids.len());
    for id in ids {
        let changed = conn.execute(
            "UPDATE contact_duplicates SET status = 'processing'
             WHERE duplicate_id = ? AND status = 'pending'",
            [id],
        )?;
        if changed == 1 {
            if let Some(pair) = load_pair(&conn, id)? {
                claimed.push(pair);
            }
        }
    }

    Ok(claimed)
}

/// Put pairs left in `processing` by an interrupted run back into the queue.
pub async fn reset_interrupted_merges(conn: AsyncDbConnection) -> Result<usize> {
    let conn = conn.lock().await?;

    let count = conn.execute(
        "UPDATE contact_duplicates SET status = 'pending'
         WHERE status = 'processing' AND start_trigger = 1",
        [],
    )?;

    Ok(count)
}

/// Stamp a terminal status on a pair and disarm it. Dismissed pairs keep their status.
pub async fn finish_pair(
    conn: AsyncDbConnection,
    duplicate_id: i64,
    status: DuplicateStatus,
    error_message: Option<&str>,
) -> Result<()> {
    let conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "UPDATE contact_duplicates
         SET status = ?, error_message = ?, resolved_at = ?, start_trigger = 0
         WHERE duplicate_id = ? AND false_positive = 0",
        params![status.as_str(), error_message, now, duplicate_id],
    )?;

    Ok(())
}

/// Write the merged survivor, retire the subsumed contact and complete the pair atomically.
///
/// Fails without writing anything if the pair is no longer processing, was dismissed, or
/// either contact has already been merged away.
pub async fn complete_merge(
    conn: AsyncDbConnection,
    pair: &DuplicatePair,
    merged: &ContactRecord,
) -> Result<()> {
    let mut conn = conn.lock().await?;
    let now = chrono::Utc::now().timestamp();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let claimed = tx.execute(
        "UPDATE contact_duplicates
         SET status = 'completed', error_message = NULL, resolved_at = ?, start_trigger = 0
         WHERE duplicate_id = ? AND status = 'processing' AND false_positive = 0",
        params![now, pair.duplicate_id],
    )?;
    if claimed == 0 {
        anyhow::bail!(
            "Duplicate pair {} is no longer awaiting a merge",
            pair.duplicate_id
        );
    }

    for contact_id in [pair.primary_contact_id, pair.duplicate_contact_id] {
        let contact = contacts::load_contact(&tx, contact_id)?
            .ok_or_else(|| anyhow::anyhow!("Contact {} not found", contact_id))?;
        if contact.category.as_deref() == Some(CATEGORY_MERGED) {
            anyhow::bail!("Contact {} has already been merged", contact_id);
        }
    }

    contacts::write_record(&tx, merged)?;
    contacts::set_category(&tx, pair.duplicate_contact_id, CATEGORY_MERGED)?;

    tx.commit()?;

    Ok(())
}
