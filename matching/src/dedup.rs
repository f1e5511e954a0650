use shared_types::{Candidate, DuplicatePair};
use std::collections::HashSet;

/// Contacts the operator has already cleared as "not the same person" as `subject_id`.
///
/// Only false-positive pairs count; pairs that do not reference the subject are ignored.
pub fn cleared_contact_ids(pairs: &[DuplicatePair], subject_id: i64) -> HashSet<i64> {
    pairs
        .iter()
        .filter(|pair| pair.false_positive)
        .filter_map(|pair| pair.other_endpoint(subject_id))
        .filter(|other| *other != subject_id)
        .collect()
}

/// Union strategy results into one list.
///
/// Sets are consumed in the order given (email, mobile, name). The first
/// occurrence of a contact wins and keeps its `matched_on` tag. The subject
/// itself, invalid ids and cleared contacts are dropped.
pub fn merge_candidate_sets<I>(sets: I, subject_id: i64, cleared: &HashSet<i64>) -> Vec<Candidate>
where
    I: IntoIterator<Item = Vec<Candidate>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for candidate in sets.into_iter().flatten() {
        let id = candidate.contact_id();
        if id <= 0 || id == subject_id || cleared.contains(&id) {
            continue;
        }
        if seen.insert(id) {
            merged.push(candidate);
        }
    }

    merged
}
