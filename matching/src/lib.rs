//! Matching Crate
//!
//! Pure duplicate-detection and merge-reconciliation logic for contact intake.
//! Nothing in this crate touches the contact store; callers load records and
//! hand them in.
//!
//! # Modules
//!
//! - `similarity`: fast approximate string similarity used for name matching
//! - `name_match`: the first/last name qualification rule applied after the broad name query
//! - `dedup`: union of strategy results, self-exclusion and false-positive suppression
//! - `planner`: default field-by-field merge plan for two contacts
//! - `merge`: applies a merge plan to two contact records

pub mod dedup;
pub mod merge;
pub mod name_match;
pub mod normalize;
pub mod planner;
pub mod similarity;

pub use dedup::{cleared_contact_ids, merge_candidate_sets};
pub use merge::apply_selection;
pub use name_match::{names_match, NameMatcher, NAME_SIMILARITY_THRESHOLD};
pub use planner::propose;
pub use similarity::{similarity, similarity_ignore_case};
