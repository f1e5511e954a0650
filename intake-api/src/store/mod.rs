//! The contact store contract used by candidate search, the disposition tracker and the merge job.

mod sqlite_store;

use anyhow::Result;
use async_trait::async_trait;
use shared_types::{
    Contact, ContactRecord, DuplicatePair, DuplicatePairStatus, DuplicateStatus, NewMergeRequest,
};

pub use crate::database::contacts::ContactPointMatch;
pub use sqlite_store::SqliteContactStore;

/// Reads return `Ok(None)` or an empty list when nothing matches.
/// `Err` is reserved for storage failures.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get_contact(&self, id: i64) -> Result<Option<Contact>>;

    async fn get_contact_record(&self, id: i64) -> Result<Option<ContactRecord>>;

    async fn find_contacts_by_email(
        &self,
        email: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>>;

    async fn find_contacts_by_mobile(
        &self,
        mobile: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>>;

    async fn find_contacts_by_name_like(
        &self,
        first: Option<&str>,
        last: Option<&str>,
        exclude_id: i64,
    ) -> Result<Vec<Contact>>;

    async fn get_primary_email(&self, contact_id: i64) -> Result<Option<String>>;

    async fn get_primary_mobile(&self, contact_id: i64) -> Result<Option<String>>;

    async fn get_primary_company_name(&self, contact_id: i64) -> Result<Option<String>>;

    async fn list_false_positive_pairs(&self, contact_id: i64) -> Result<Vec<DuplicatePair>>;

    /// Every pair linking two contacts, in either orientation, oldest first.
    async fn find_duplicate_pairs(&self, a: i64, b: i64) -> Result<Vec<DuplicatePair>>;

    /// Whether the contact is on either side of a pending or processing merge.
    async fn has_open_merge(&self, contact_id: i64) -> Result<bool>;

    async fn get_duplicate_pair(&self, duplicate_id: i64) -> Result<Option<DuplicatePair>>;

    async fn get_duplicate_pair_status(
        &self,
        duplicate_id: i64,
    ) -> Result<Option<DuplicatePairStatus>>;

    async fn upsert_duplicate_pair(&self, request: &NewMergeRequest) -> Result<DuplicatePair>;

    async fn mark_false_positive(
        &self,
        subject_id: i64,
        candidate_id: i64,
        resolved_by: Option<&str>,
    ) -> Result<DuplicatePair>;

    async fn set_contact_category(&self, contact_id: i64, category: &str) -> Result<()>;

    async fn claim_pending_merges(&self, limit: usize) -> Result<Vec<DuplicatePair>>;

    async fn reset_interrupted_merges(&self) -> Result<usize>;

    /// Write the merged survivor and retire the subsumed contact in one transaction.
    async fn apply_merge(&self, pair: &DuplicatePair, merged: &ContactRecord) -> Result<()>;

    async fn finish_duplicate_pair(
        &self,
        duplicate_id: i64,
        status: DuplicateStatus,
        error_message: Option<&str>,
    ) -> Result<()>;
}
