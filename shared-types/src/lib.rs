use serde::{Deserialize, Serialize};

pub mod candidate;
pub mod contact;
pub mod duplicate;
pub mod merge_selection;

pub use candidate::{Candidate, DuplicateSearchResponse, MatchedOn};
pub use contact::{
    City, Contact, ContactCompany, ContactEmail, ContactMobile, ContactPointType, ContactRecord,
    ContactRecordResponse, Tag, CATEGORY_INBOX, CATEGORY_MERGED,
};
pub use duplicate::{DuplicatePair, DuplicatePairStatus, DuplicateStatus, NewMergeRequest};
pub use merge_selection::{
    CollectionMode, FalsePositiveRequest, FieldMode, MergeCollection, MergeField, MergePlanResponse, MergeSelection,
    MergeSelectionError, SubmitMergeRequest,
};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
