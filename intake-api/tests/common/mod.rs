#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use intake_api::database::contacts::{self as contacts_db, NewContact};
use intake_api::database::{companies as companies_db, Database};
use intake_api::dedup::{CandidateSearch, DispositionTracker, PollSettings};
use intake_api::notifications::{NotificationLevel, Notifier};
use intake_api::store::{ContactPointMatch, ContactStore, SqliteContactStore};
use matching::NameMatcher;
use shared_types::{
    Contact, ContactPointType, ContactRecord, DuplicatePair, DuplicatePairStatus, DuplicateStatus,
    NewMergeRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestDb {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub store: Arc<SqliteContactStore>,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(&dir.path().join("contacts.db")).unwrap());
        let store = Arc::new(SqliteContactStore::new(db.async_connection.clone()));
        Self {
            _dir: dir,
            db,
            store,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn ContactStore> {
        self.store.clone()
    }

    /// Insert a contact with its email/mobile stored as primary child rows.
    pub async fn add_contact(
        &self,
        first: Option<&str>,
        last: Option<&str>,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> i64 {
        let conn = self.db.async_connection.clone();
        let id = contacts_db::insert_contact(
            conn.clone(),
            &NewContact {
                first_name: first.map(str::to_string),
                last_name: last.map(str::to_string),
                email: email.map(str::to_string),
                mobile: mobile.map(str::to_string),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        if let Some(email) = email {
            contacts_db::insert_contact_email(conn.clone(), id, email, ContactPointType::Personal, true)
                .await
                .unwrap();
        }
        if let Some(mobile) = mobile {
            contacts_db::insert_contact_mobile(conn, id, mobile, ContactPointType::Personal, true)
                .await
                .unwrap();
        }

        id
    }

    pub async fn add_tag(&self, contact_id: i64, name: &str) {
        contacts_db::add_contact_tag(self.db.async_connection.clone(), contact_id, name)
            .await
            .unwrap();
    }

    pub async fn add_company(&self, contact_id: i64, name: &str, is_primary: bool) -> i64 {
        let conn = self.db.async_connection.clone();
        let company_id = companies_db::get_or_create_company(conn.clone(), name)
            .await
            .unwrap();
        contacts_db::link_contact_company(conn, contact_id, company_id, Some("employee"), is_primary)
            .await
            .unwrap();
        company_id
    }

    pub async fn record(&self, contact_id: i64) -> ContactRecord {
        self.store
            .get_contact_record(contact_id)
            .await
            .unwrap()
            .unwrap()
    }

    pub fn search(&self, notifier: Arc<dyn Notifier>) -> CandidateSearch {
        CandidateSearch::new(self.dyn_store(), notifier, NameMatcher::default(), 2)
    }

    pub fn tracker(&self, notifier: Arc<dyn Notifier>) -> DispositionTracker {
        DispositionTracker::new(self.dyn_store(), notifier, fast_poll(3))
    }
}

/// A merge request written straight to the store, skipping the tracker's checks.
pub fn merge_request(primary_id: i64, duplicate_id: i64, snapshot: ContactRecord) -> NewMergeRequest {
    NewMergeRequest {
        primary_contact_id: primary_id,
        duplicate_contact_id: duplicate_id,
        email: None,
        mobile_number: None,
        match_evidence: None,
        notes: None,
        resolved_by: None,
        duplicate_data: snapshot,
        merge_selections: Default::default(),
    }
}

pub fn fast_poll(max_attempts: u32) -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        backoff: 2.0,
        max_attempts,
    }
}

/// Collects notifications for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, level, _)| *level)
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, text)| text.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, operation_id: &str, level: NotificationLevel, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((operation_id.to_string(), level, message.to_string()));
    }
}

/// Wraps a real store and fails selected operations on demand.
pub struct FlakyStore {
    pub inner: Arc<dyn ContactStore>,
    pub fail_email: AtomicBool,
    pub fail_false_positives: AtomicBool,
    pub fail_status: AtomicBool,
    pub name_delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ContactStore>) -> Self {
        Self {
            inner,
            fail_email: AtomicBool::new(false),
            fail_false_positives: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
            name_delay: Mutex::new(None),
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            anyhow::bail!("simulated timeout in {}", what);
        }
        Ok(())
    }
}

#[async_trait]
impl ContactStore for FlakyStore {
    async fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        self.inner.get_contact(id).await
    }

    async fn get_contact_record(&self, id: i64) -> Result<Option<ContactRecord>> {
        self.inner.get_contact_record(id).await
    }

    async fn find_contacts_by_email(
        &self,
        email: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>> {
        Self::check(&self.fail_email, "email lookup")?;
        self.inner.find_contacts_by_email(email, exclude_id).await
    }

    async fn find_contacts_by_mobile(
        &self,
        mobile: &str,
        exclude_id: i64,
    ) -> Result<Vec<ContactPointMatch>> {
        self.inner.find_contacts_by_mobile(mobile, exclude_id).await
    }

    async fn find_contacts_by_name_like(
        &self,
        first: Option<&str>,
        last: Option<&str>,
        exclude_id: i64,
    ) -> Result<Vec<Contact>> {
        let delay = *self.name_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner
            .find_contacts_by_name_like(first, last, exclude_id)
            .await
    }

    async fn get_primary_email(&self, contact_id: i64) -> Result<Option<String>> {
        self.inner.get_primary_email(contact_id).await
    }

    async fn get_primary_mobile(&self, contact_id: i64) -> Result<Option<String>> {
        self.inner.get_primary_mobile(contact_id).await
    }

    async fn get_primary_company_name(&self, contact_id: i64) -> Result<Option<String>> {
        self.inner.get_primary_company_name(contact_id).await
    }

    async fn list_false_positive_pairs(&self, contact_id: i64) -> Result<Vec<DuplicatePair>> {
        Self::check(&self.fail_false_positives, "false positive lookup")?;
        self.inner.list_false_positive_pairs(contact_id).await
    }

    async fn find_duplicate_pairs(&self, a: i64, b: i64) -> Result<Vec<DuplicatePair>> {
        self.inner.find_duplicate_pairs(a, b).await
    }

    async fn has_open_merge(&self, contact_id: i64) -> Result<bool> {
        self.inner.has_open_merge(contact_id).await
    }

    async fn get_duplicate_pair(&self, duplicate_id: i64) -> Result<Option<DuplicatePair>> {
        self.inner.get_duplicate_pair(duplicate_id).await
    }

    async fn get_duplicate_pair_status(
        &self,
        duplicate_id: i64,
    ) -> Result<Option<DuplicatePairStatus>> {
        Self::check(&self.fail_status, "status lookup")?;
        self.inner.get_duplicate_pair_status(duplicate_id).await
    }

    async fn upsert_duplicate_pair(&self, request: &NewMergeRequest) -> Result<DuplicatePair> {
        self.inner.upsert_duplicate_pair(request).await
    }

    async fn mark_false_positive(
        &self,
        subject_id: i64,
        candidate_id: i64,
        resolved_by: Option<&str>,
    ) -> Result<DuplicatePair> {
        self.inner
            .mark_false_positive(subject_id, candidate_id, resolved_by)
            .await
    }

    async fn set_contact_category(&self, contact_id: i64, category: &str) -> Result<()> {
        self.inner.set_contact_category(contact_id, category).await
    }

    async fn claim_pending_merges(&self, limit: usize) -> Result<Vec<DuplicatePair>> {
        self.inner.claim_pending_merges(limit).await
    }

    async fn reset_interrupted_merges(&self) -> Result<usize> {
        self.inner.reset_interrupted_merges().await
    }

    async fn apply_merge(&self, pair: &DuplicatePair, merged: &ContactRecord) -> Result<()> {
        self.inner.apply_merge(pair, merged).await
    }

    async fn finish_duplicate_pair(
        &self,
        duplicate_id: i64,
        status: DuplicateStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.inner
            .finish_duplicate_pair(duplicate_id, status, error_message)
            .await
    }
}
