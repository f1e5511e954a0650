use anyhow::Result;
use async_trait::async_trait;
use shared_types::{
    Contact, ContactRecord, DuplicatePair, DuplicatePairStatus, DuplicateStatus, NewMergeRequest,
};

use super::{ContactPointMatch, ContactStore};
use crate::database::contacts as contacts_db;
use crate::database::duplicates as duplicates_db;
use crate::database::AsyncDbConnection;

#[derive(Clone)]
pub struct SqliteContactStore {
    db_conn: AsyncDbConnection,
}

impl SqliteContactStore {
    pub fn new(db_conn: AsyncDbConnection) -> Self {
        Self { db_conn }
    }

    pub fn get_db_connection(&self) -> AsyncDbConnection {
        self.db_conn.clone()
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        contacts_db::get_contact(self.db_conn.clone(), id).await
    }

    async fn get_contact_record(&self, id: i64) -> Result<Option<ContactRecord>> {
        contacts_db::get_contact_record(self.db_conn.clone(), id).await
    }

    async fn find_contacts_by_email(
        &self,
        email: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>> {
        contacts_db::find_contacts_by_email(self.db_conn.clone(), email, exclude_id).await
    }

    async fn find_contacts_by_mobile(
        &self,
        mobile: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>> {
        contacts_db::find_contacts_by_mobile(self.db_conn.clone(), mobile, exclude_id).await
    }

    async fn find_contacts_by_name_like(
        &self,
        first: Option<&str>,
        last: Option<&str>,
        exclude_id: i64,
    ) -> Result<Vec<Contact>> {
        contacts_db::find_contacts_by_name_like(self.db_conn.clone(), first, last, exclude_id)
            .await
    }

    async fn get_primary_email(&self, contact_id: i64) -> Result<Option<String>> {
        contacts_db::get_primary_email(self.db_conn.clone(), contact_id).await
    }

    async fn get_primary_mobile(&self, contact_id: i64) -> Result<Option<String>> {
        contacts_db::get_primary_mobile(self.db_conn.clone(), contact_id).await
    }

    async fn get_primary_company_name(&self, contact_id: i64) -> Result<Option<String>> {
        contacts_db::get_primary_company_name(self.db_conn.clone(), contact_id).await
    }

    async fn list_false_positive_pairs(&self, contact_id: i64) -> Result<Vec<DuplicatePair>> {
        duplicates_db::list_false_positive_pairs(self.db_conn.clone(), contact_id).await
    }

    async fn find_duplicate_pairs(&self, a: i64, b: i64) -> Result<Vec<DuplicatePair>> {
        duplicates_db::find_pairs_between(self.db_conn.clone(), a, b).await
    }

    async fn has_open_merge(&self, contact_id: i64) -> Result<bool> {
        duplicates_db::has_open_merge(self.db_conn.clone(), contact_id).await
    }

    async fn get_duplicate_pair(&self, duplicate_id: i64) -> Result<Option<DuplicatePair>> {
        duplicates_db::get_duplicate_pair(self.db_conn.clone(), duplicate_id).await
    }

    async fn get_duplicate_pair_status(
        &self,
        duplicate_id: i64,
    ) -> Result<Option<DuplicatePairStatus>> {
        duplicates_db::get_pair_status(self.db_conn.clone(), duplicate_id).await
    }

    async fn upsert_duplicate_pair(&self, request: &NewMergeRequest) -> Result<DuplicatePair> {
        duplicates_db::upsert_merge_request(self.db_conn.clone(), request).await
    }

    async fn mark_false_positive(
        &self,
        subject_id: i64,
        candidate_id: i64,
        resolved_by: Option<&str>,
    ) -> Result<DuplicatePair> {
        duplicates_db::mark_false_positive(self.db_conn.clone(), subject_id, candidate_id, resolved_by)
            .await
    }

    async fn set_contact_category(&self, contact_id: i64, category: &str) -> Result<()> {
        contacts_db::set_contact_category(self.db_conn.clone(), contact_id, category).await
    }

    async fn claim_pending_merges(&self, limit: usize) -> Result<Vec<DuplicatePair>> {
        duplicates_db::claim_pending_merges(self.db_conn.clone(), limit).await
    }

    async fn reset_interrupted_merges(&self) -> Result<usize> {
        duplicates_db::reset_interrupted_merges(self.db_conn.clone()).await
    }

    async fn apply_merge(&self, pair: &DuplicatePair, merged: &ContactRecord) -> Result<()> {
        duplicates_db::complete_merge(self.db_conn.clone(), pair, merged).await
    }

    async fn finish_duplicate_pair(
        &self,
        duplicate_id: i64,
        status: DuplicateStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        duplicates_db::finish_pair(self.db_conn.clone(), duplicate_id, status, error_message).await
    }
}
