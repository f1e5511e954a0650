use shared_types::Contact;

use crate::normalize::present;
use crate::similarity::similarity_ignore_case;

/// Minimum per-name similarity for a name-strategy candidate to qualify.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Qualification rule applied to the results of the broad first/last name query.
#[derive(Debug, Clone, Copy)]
pub struct NameMatcher {
    threshold: f64,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(NAME_SIMILARITY_THRESHOLD)
    }
}

impl NameMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether `candidate` is similar enough by name to be proposed for `subject`.
    ///
    /// When both contacts carry both names, both must clear the threshold.
    /// Otherwise a single name present on both sides clearing the threshold is enough.
    pub fn matches(&self, subject: &Contact, candidate: &Contact) -> bool {
        let subject_first = present(subject.first_name.as_deref());
        let subject_last = present(subject.last_name.as_deref());
        let candidate_first = present(candidate.first_name.as_deref());
        let candidate_last = present(candidate.last_name.as_deref());

        let first_score = match (subject_first, candidate_first) {
            (Some(a), Some(b)) => Some(similarity_ignore_case(a, b)),
            _ => None,
        };
        let last_score = match (subject_last, candidate_last) {
            (Some(a), Some(b)) => Some(similarity_ignore_case(a, b)),
            _ => None,
        };

        match (first_score, last_score) {
            (Some(first), Some(last)) => first >= self.threshold && last >= self.threshold,
            (Some(single), None) | (None, Some(single)) => single >= self.threshold,
            (None, None) => false,
        }
    }
}

/// [`NameMatcher::matches`] with the default threshold.
pub fn names_match(subject: &Contact, candidate: &Contact) -> bool {
    NameMatcher::default().matches(subject, candidate)
}
