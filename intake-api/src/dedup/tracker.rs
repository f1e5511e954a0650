use matching::normalize::present;
use shared_types::{
    ContactRecord, DuplicatePair, DuplicatePairStatus, DuplicateStatus, MatchedOn,
    MergeSelection, NewMergeRequest, CATEGORY_MERGED,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DedupConfig;
use crate::error::{IntakeError, IntakeResult};
use crate::notifications::{new_operation_id, Notifier};
use crate::store::ContactStore;

/// Bounded status polling with multiplicative backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&DedupConfig::default())
    }
}

impl From<&DedupConfig> for PollSettings {
    fn from(config: &DedupConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_interval: config.poll_max_interval(),
            backoff: config.poll_backoff,
            max_attempts: config.poll_max_attempts,
        }
    }
}

impl PollSettings {
    fn next_delay(&self, delay: Duration) -> Duration {
        let factor = if self.backoff.is_finite() && self.backoff >= 1.0 {
            self.backoff
        } else {
            1.0
        };
        delay.mul_f64(factor).min(self.max_interval)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeWait {
    /// The pair reached a terminal status.
    Done(DuplicatePairStatus),
    /// Attempts ran out while the job was still pending or processing.
    StillRunning,
    /// No status read succeeded.
    TimedOut,
}

/// Records operator dispositions on candidate pairs and follows merges to completion.
pub struct DispositionTracker {
    store: Arc<dyn ContactStore>,
    notifier: Arc<dyn Notifier>,
    poll: PollSettings,
}

impl DispositionTracker {
    pub fn new(store: Arc<dyn ContactStore>, notifier: Arc<dyn Notifier>, poll: PollSettings) -> Self {
        Self {
            store,
            notifier,
            poll,
        }
    }

    /// Both ids must be positive and distinct, and both contacts must exist.
    async fn load_endpoints(
        &self,
        subject_id: i64,
        candidate_id: i64,
    ) -> IntakeResult<(ContactRecord, ContactRecord)> {
        if subject_id <= 0 || candidate_id <= 0 {
            return Err(IntakeError::Validation(
                "Both a contact id and a candidate id are required".to_string(),
            ));
        }
        if subject_id == candidate_id {
            return Err(IntakeError::Validation(
                "A contact cannot be paired with itself".to_string(),
            ));
        }

        let subject = self
            .store
            .get_contact_record(subject_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("Contact {} not found", subject_id)))?;
        let candidate = self
            .store
            .get_contact_record(candidate_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("Contact {} not found", candidate_id)))?;

        Ok((subject, candidate))
    }

    /// Permanently suppress `candidate_id` from `subject_id`'s searches, and vice versa.
    pub async fn mark_false_positive(
        &self,
        subject_id: i64,
        candidate_id: i64,
        resolved_by: Option<&str>,
    ) -> IntakeResult<DuplicatePair> {
        let operation_id = new_operation_id();
        self.load_endpoints(subject_id, candidate_id).await?;

        for existing in self.store.find_duplicate_pairs(subject_id, candidate_id).await? {
            match existing.status {
                DuplicateStatus::Completed => {
                    return Err(IntakeError::Conflict(format!(
                        "Contacts {} and {} were already merged",
                        subject_id, candidate_id
                    )));
                }
                DuplicateStatus::Pending | DuplicateStatus::Processing => {
                    return Err(IntakeError::Conflict(format!(
                        "A merge of contacts {} and {} is in progress",
                        subject_id, candidate_id
                    )));
                }
                DuplicateStatus::Failed | DuplicateStatus::Resolved => {}
            }
        }

        match self
            .store
            .mark_false_positive(subject_id, candidate_id, resolved_by)
            .await
        {
            Ok(pair) => {
                self.notifier.success(
                    &operation_id,
                    &format!("Contact {} marked as not a duplicate", candidate_id),
                );
                Ok(pair)
            }
            Err(e) => {
                self.notifier
                    .error(&operation_id, &format!("Failed to mark false positive: {}", e));
                Err(e.into())
            }
        }
    }

    /// Default merge plan for folding `subject_id` into `candidate_id`.
    pub async fn plan(&self, subject_id: i64, candidate_id: i64) -> IntakeResult<MergeSelection> {
        let (subject, candidate) = self.load_endpoints(subject_id, candidate_id).await?;
        Ok(matching::propose(&subject.contact, &candidate.contact))
    }

    /// Persist a pending merge of `subject_id` into `candidate_id` for the merge job.
    ///
    /// `overrides` are applied over the default plan and kept verbatim.
    pub async fn submit_merge(
        &self,
        subject_id: i64,
        candidate_id: i64,
        overrides: Option<&BTreeMap<String, String>>,
        matched_on: Option<&str>,
        notes: Option<&str>,
        resolved_by: Option<&str>,
    ) -> IntakeResult<DuplicatePair> {
        let operation_id = new_operation_id();

        let (subject, candidate) = self.load_endpoints(subject_id, candidate_id).await?;

        let defaults = matching::propose(&subject.contact, &candidate.contact);
        let selection = match overrides {
            Some(overrides) => defaults.with_overrides(overrides)?,
            None => defaults,
        };

        if subject.contact.category.as_deref() == Some(CATEGORY_MERGED) {
            return Err(IntakeError::Conflict(format!(
                "Contact {} has already been merged",
                subject_id
            )));
        }
        if candidate.contact.category.as_deref() == Some(CATEGORY_MERGED) {
            return Err(IntakeError::Conflict(format!(
                "Contact {} has already been merged into another contact",
                candidate_id
            )));
        }

        for existing in self.store.find_duplicate_pairs(subject_id, candidate_id).await? {
            if existing.false_positive {
                return Err(IntakeError::Conflict(format!(
                    "Contacts {} and {} were marked as not duplicates",
                    subject_id, candidate_id
                )));
            }
            match existing.status {
                DuplicateStatus::Pending | DuplicateStatus::Processing => {
                    return Err(IntakeError::Conflict(format!(
                        "A merge of contacts {} and {} is already in progress",
                        subject_id, candidate_id
                    )));
                }
                DuplicateStatus::Completed => {
                    return Err(IntakeError::Conflict(format!(
                        "Contacts {} and {} were already merged",
                        subject_id, candidate_id
                    )));
                }
                DuplicateStatus::Failed | DuplicateStatus::Resolved => {}
            }
        }

        for contact_id in [subject_id, candidate_id] {
            if self.store.has_open_merge(contact_id).await? {
                return Err(IntakeError::Conflict(format!(
                    "Contact {} is part of another merge in progress",
                    contact_id
                )));
            }
        }

        let evidence = matched_on
            .and_then(|label| present(Some(label)))
            .map(str::to_string)
            .or_else(|| derive_evidence(&subject, &candidate).map(|m| m.to_string()));

        let request = NewMergeRequest {
            primary_contact_id: candidate_id,
            duplicate_contact_id: subject_id,
            email: subject.primary_email().map(str::to_string),
            mobile_number: subject.primary_mobile().map(str::to_string),
            match_evidence: evidence,
            notes: notes.map(str::to_string),
            resolved_by: resolved_by.map(str::to_string),
            duplicate_data: candidate,
            merge_selections: selection,
        };

        match self.store.upsert_duplicate_pair(&request).await {
            Ok(pair) => {
                self.notifier.info(
                    &operation_id,
                    &format!(
                        "Merging contact {} into {} (pair {})",
                        subject_id, candidate_id, pair.duplicate_id
                    ),
                );
                Ok(pair)
            }
            Err(e) => {
                self.notifier
                    .error(&operation_id, &format!("Failed to submit merge: {}", e));
                Err(e.into())
            }
        }
    }

    pub async fn merge_status(&self, duplicate_id: i64) -> IntakeResult<DuplicatePairStatus> {
        if duplicate_id <= 0 {
            return Err(IntakeError::Validation(format!(
                "Invalid duplicate pair id {}",
                duplicate_id
            )));
        }

        self.store
            .get_duplicate_pair_status(duplicate_id)
            .await?
            .ok_or_else(|| {
                IntakeError::NotFound(format!("Duplicate pair {} not found", duplicate_id))
            })
    }

    /// Poll a submitted merge until it settles or the attempt budget runs out.
    pub async fn wait_for_merge(&self, duplicate_id: i64) -> MergeWait {
        let operation_id = new_operation_id();
        let mut delay = self.poll.interval;
        let mut any_read = false;

        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(delay).await;

            match self.store.get_duplicate_pair_status(duplicate_id).await {
                Ok(Some(status)) => {
                    any_read = true;
                    if status.status.is_terminal() {
                        self.report(&operation_id, &status);
                        return MergeWait::Done(status);
                    }
                    tracing::debug!(
                        "Merge {} still {} after attempt {}",
                        duplicate_id,
                        status.status.as_str(),
                        attempt
                    );
                }
                Ok(None) => {
                    any_read = true;
                    tracing::warn!("Merge {} disappeared while polling", duplicate_id);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to read merge {} status (attempt {}): {:#}",
                        duplicate_id,
                        attempt,
                        e
                    );
                }
            }

            delay = self.poll.next_delay(delay);
        }

        if any_read {
            self.notifier.info(
                &operation_id,
                &format!("Merge {} is still processing", duplicate_id),
            );
            MergeWait::StillRunning
        } else {
            self.notifier.error(
                &operation_id,
                &format!("Could not read the status of merge {}", duplicate_id),
            );
            MergeWait::TimedOut
        }
    }

    fn report(&self, operation_id: &str, status: &DuplicatePairStatus) {
        match status.status {
            DuplicateStatus::Completed => self.notifier.success(
                operation_id,
                &format!("Merge {} completed", status.duplicate_id),
            ),
            _ => self.notifier.error(
                operation_id,
                &format!(
                    "Merge {} {}: {}",
                    status.duplicate_id,
                    status.status.as_str(),
                    status.error_message.as_deref().unwrap_or("no details")
                ),
            ),
        }
    }
}

/// Best guess at why two contacts were paired when the caller did not say.
fn derive_evidence(subject: &ContactRecord, candidate: &ContactRecord) -> Option<MatchedOn> {
    let candidate_emails: Vec<&str> = candidate.emails.iter().map(|e| e.email.as_str()).collect();
    if let Some(email) = subject.primary_email() {
        if candidate_emails.contains(&email) || candidate.contact.email.as_deref() == Some(email) {
            return Some(MatchedOn::Email(email.to_string()));
        }
    }

    let candidate_mobiles: Vec<&str> = candidate.mobiles.iter().map(|m| m.mobile.as_str()).collect();
    if let Some(mobile) = subject.primary_mobile() {
        if candidate_mobiles.contains(&mobile) || candidate.contact.mobile.as_deref() == Some(mobile)
        {
            return Some(MatchedOn::Mobile(mobile.to_string()));
        }
    }

    if matching::names_match(&subject.contact, &candidate.contact) {
        return Some(MatchedOn::NameSimilarity);
    }

    None
}

