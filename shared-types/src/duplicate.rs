use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::contact::ContactRecord;
use crate::merge_selection::MergeSelection;

/// Lifecycle of a duplicate pair.
///
/// `pending -> processing -> completed | failed` is driven by the merge job;
/// `resolved` is written directly when a pair is dismissed as a false positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Resolved,
}

impl DuplicateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateStatus::Pending => "pending",
            DuplicateStatus::Processing => "processing",
            DuplicateStatus::Completed => "completed",
            DuplicateStatus::Failed => "failed",
            DuplicateStatus::Resolved => "resolved",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DuplicateStatus::Pending),
            "processing" => Some(DuplicateStatus::Processing),
            "completed" => Some(DuplicateStatus::Completed),
            "failed" => Some(DuplicateStatus::Failed),
            "resolved" => Some(DuplicateStatus::Resolved),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DuplicateStatus::Pending | DuplicateStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct DuplicatePair {
    pub duplicate_id: i64,
    /// Surviving contact once a merge completes.
    pub primary_contact_id: i64,
    /// Contact subsumed by the merge.
    pub duplicate_contact_id: i64,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub match_evidence: Option<String>,
    pub status: DuplicateStatus,
    pub false_positive: bool,
    pub notes: Option<String>,
    pub detected_at: i64,
    pub resolved_at: Option<i64>,
    pub resolved_by: Option<String>,
    pub error_message: Option<String>,
    pub duplicate_data: Option<ContactRecord>,
    pub merge_selections: Option<MergeSelection>,
    pub start_trigger: bool,
}

impl DuplicatePair {
    /// The endpoint that is not `contact_id`, if `contact_id` is one of them.
    pub fn other_endpoint(&self, contact_id: i64) -> Option<i64> {
        if self.primary_contact_id == contact_id {
            Some(self.duplicate_contact_id)
        } else if self.duplicate_contact_id == contact_id {
            Some(self.primary_contact_id)
        } else {
            None
        }
    }
}

/// A merge request ready to be handed to the merge job.
#[derive(Debug, Clone)]
pub struct NewMergeRequest {
    pub primary_contact_id: i64,
    pub duplicate_contact_id: i64,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub match_evidence: Option<String>,
    pub notes: Option<String>,
    pub resolved_by: Option<String>,
    pub duplicate_data: ContactRecord,
    pub merge_selections: MergeSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct DuplicatePairStatus {
    pub duplicate_id: i64,
    pub status: DuplicateStatus,
    pub error_message: Option<String>,
}
