use futures::stream::{self, StreamExt};
use matching::dedup::{cleared_contact_ids, merge_candidate_sets};
use matching::normalize::present;
use matching::NameMatcher;
use shared_types::{Candidate, Contact, DuplicateSearchResponse, MatchedOn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::ranker::MatchRanker;
use crate::error::{IntakeError, IntakeResult};
use crate::notifications::{new_operation_id, Notifier};
use crate::store::{ContactPointMatch, ContactStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Email,
    Mobile,
    Name,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StrategyKind::Email => "email",
            StrategyKind::Mobile => "mobile",
            StrategyKind::Name => "name",
        };
        f.write_str(label)
    }
}

/// Result of one match strategy. A failed strategy contributes no candidates.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub kind: StrategyKind,
    pub candidates: Vec<Candidate>,
    pub error: Option<String>,
}

impl StrategyOutcome {
    fn found(kind: StrategyKind, candidates: Vec<Candidate>) -> Self {
        Self {
            kind,
            candidates,
            error: None,
        }
    }

    fn degraded(kind: StrategyKind, error: &anyhow::Error) -> Self {
        tracing::warn!("{} match strategy failed: {:#}", kind, error);
        Self {
            kind,
            candidates: Vec::new(),
            error: Some(format!("{} match unavailable: {}", kind, error)),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct DuplicateSearchReport {
    pub subject_id: i64,
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<String>,
}

impl From<DuplicateSearchReport> for DuplicateSearchResponse {
    fn from(report: DuplicateSearchReport) -> Self {
        DuplicateSearchResponse {
            subject_id: report.subject_id,
            candidates: report.candidates,
            warnings: report.warnings,
        }
    }
}

/// Finds existing contacts that may be the same person as a subject contact.
pub struct CandidateSearch {
    store: Arc<dyn ContactStore>,
    notifier: Arc<dyn Notifier>,
    matcher: NameMatcher,
    ranker: MatchRanker,
    backfill_concurrency: usize,
}

impl CandidateSearch {
    pub fn new(
        store: Arc<dyn ContactStore>,
        notifier: Arc<dyn Notifier>,
        matcher: NameMatcher,
        backfill_concurrency: usize,
    ) -> Self {
        let backfill_concurrency = backfill_concurrency.max(1);
        Self {
            ranker: MatchRanker::new(store.clone(), backfill_concurrency),
            store,
            notifier,
            matcher,
            backfill_concurrency,
        }
    }

    pub async fn search_by_id(&self, subject_id: i64) -> IntakeResult<DuplicateSearchReport> {
        if subject_id <= 0 {
            return Err(IntakeError::Validation(format!(
                "Invalid contact id {}",
                subject_id
            )));
        }

        let subject = self
            .store
            .get_contact(subject_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("Contact {} not found", subject_id)))?;

        Ok(self.search(&subject).await)
    }

    /// Run every strategy, drop cleared and repeated contacts, then annotate.
    ///
    /// Never fails: strategy errors become warnings on the report.
    pub async fn search(&self, subject: &Contact) -> DuplicateSearchReport {
        let subject_id = subject.contact_id;
        let operation_id = new_operation_id();

        let (by_email, by_mobile, by_name, false_positives) = tokio::join!(
            self.by_email(subject),
            self.by_mobile(subject),
            self.by_name(subject),
            self.store.list_false_positive_pairs(subject_id),
        );

        let outcomes = [by_email, by_mobile, by_name];
        let mut warnings: Vec<String> = outcomes.iter().filter_map(|o| o.error.clone()).collect();

        let candidates = match false_positives {
            Ok(pairs) => {
                let cleared = cleared_contact_ids(&pairs, subject_id);
                let merged = merge_candidate_sets(
                    outcomes.into_iter().map(|o| o.candidates),
                    subject_id,
                    &cleared,
                );
                self.ranker.annotate(merged).await
            }
            Err(e) => {
                // Without the cleared set any candidate could be a dismissed one.
                tracing::warn!(
                    "Failed to load false positives for contact {}: {:#}",
                    subject_id,
                    e
                );
                warnings.push(format!("false positive list unavailable: {}", e));
                Vec::new()
            }
        };

        for warning in &warnings {
            self.notifier.error(&operation_id, warning);
        }

        tracing::info!(
            "Duplicate search for contact {} found {} candidates ({} warnings)",
            subject_id,
            candidates.len(),
            warnings.len()
        );

        DuplicateSearchReport {
            subject_id,
            candidates,
            warnings,
        }
    }

    async fn by_email(&self, subject: &Contact) -> StrategyOutcome {
        match self.try_by_email(subject).await {
            Ok(candidates) => StrategyOutcome::found(StrategyKind::Email, candidates),
            Err(e) => StrategyOutcome::degraded(StrategyKind::Email, &e),
        }
    }

    async fn by_mobile(&self, subject: &Contact) -> StrategyOutcome {
        match self.try_by_mobile(subject).await {
            Ok(candidates) => StrategyOutcome::found(StrategyKind::Mobile, candidates),
            Err(e) => StrategyOutcome::degraded(StrategyKind::Mobile, &e),
        }
    }

    async fn by_name(&self, subject: &Contact) -> StrategyOutcome {
        match self.try_by_name(subject).await {
            Ok(candidates) => StrategyOutcome::found(StrategyKind::Name, candidates),
            Err(e) => StrategyOutcome::degraded(StrategyKind::Name, &e),
        }
    }

    async fn subject_email(&self, subject: &Contact) -> anyhow::Result<Option<String>> {
        if let Some(email) = present(subject.email.as_deref()) {
            return Ok(Some(email.to_string()));
        }
        let email = self.store.get_primary_email(subject.contact_id).await?;
        Ok(email.as_deref().and_then(|e| present(Some(e))).map(str::to_string))
    }

    async fn subject_mobile(&self, subject: &Contact) -> anyhow::Result<Option<String>> {
        if let Some(mobile) = present(subject.mobile.as_deref()) {
            return Ok(Some(mobile.to_string()));
        }
        let mobile = self.store.get_primary_mobile(subject.contact_id).await?;
        Ok(mobile.as_deref().and_then(|m| present(Some(m))).map(str::to_string))
    }

    async fn try_by_email(&self, subject: &Contact) -> anyhow::Result<Vec<Candidate>> {
        let Some(email) = self.subject_email(subject).await? else {
            return Ok(Vec::new());
        };

        let matches = self
            .store
            .find_contacts_by_email(&email, subject.contact_id)
            .await?;

        let candidates = unique_points(matches)
            .into_iter()
            .map(|point| {
                let mut contact = point.contact;
                if present(contact.email.as_deref()).is_none() {
                    contact.email = Some(point.value);
                }
                Candidate::new(contact, MatchedOn::Email(email.clone()))
            })
            .collect();

        Ok(self.backfill(candidates).await)
    }

    async fn try_by_mobile(&self, subject: &Contact) -> anyhow::Result<Vec<Candidate>> {
        let Some(mobile) = self.subject_mobile(subject).await? else {
            return Ok(Vec::new());
        };

        let matches = self
            .store
            .find_contacts_by_mobile(&mobile, subject.contact_id)
            .await?;

        let candidates = unique_points(matches)
            .into_iter()
            .map(|point| {
                let mut contact = point.contact;
                if present(contact.mobile.as_deref()).is_none() {
                    contact.mobile = Some(point.value);
                }
                Candidate::new(contact, MatchedOn::Mobile(mobile.clone()))
            })
            .collect();

        Ok(self.backfill(candidates).await)
    }

    async fn try_by_name(&self, subject: &Contact) -> anyhow::Result<Vec<Candidate>> {
        let first = present(subject.first_name.as_deref());
        let last = present(subject.last_name.as_deref());
        if first.is_none() && last.is_none() {
            return Ok(Vec::new());
        }

        let prefiltered = self
            .store
            .find_contacts_by_name_like(first, last, subject.contact_id)
            .await?;

        let mut seen = HashSet::new();
        let candidates = prefiltered
            .into_iter()
            .filter(|contact| seen.insert(contact.contact_id))
            .filter(|contact| self.matcher.matches(subject, contact))
            .map(|contact| Candidate::new(contact, MatchedOn::NameSimilarity))
            .collect();

        Ok(self.backfill(candidates).await)
    }

    /// Fill blank email/mobile from the candidate's primary child rows, preserving order.
    async fn backfill(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        stream::iter(candidates)
            .map(|candidate| self.backfill_one(candidate))
            .buffered(self.backfill_concurrency)
            .collect()
            .await
    }

    async fn backfill_one(&self, mut candidate: Candidate) -> Candidate {
        let id = candidate.contact_id();

        if present(candidate.contact.email.as_deref()).is_none() {
            match self.store.get_primary_email(id).await {
                Ok(Some(email)) => candidate.contact.email = Some(email),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to backfill email for contact {}: {:#}", id, e),
            }
        }

        if present(candidate.contact.mobile.as_deref()).is_none() {
            match self.store.get_primary_mobile(id).await {
                Ok(Some(mobile)) => candidate.contact.mobile = Some(mobile),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to backfill mobile for contact {}: {:#}", id, e),
            }
        }

        candidate
    }
}

fn unique_points(points: Vec<ContactPointMatch>) -> Vec<ContactPointMatch> {
    let mut seen = HashSet::new();
    points
        .into_iter()
        .filter(|point| seen.insert(point.contact.contact_id))
        .collect()
}
