use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::search::{CandidateSearch, DuplicateSearchReport};
use crate::error::IntakeResult;

#[derive(Debug)]
pub enum SearchOutcome {
    Fresh(DuplicateSearchReport),
    /// A newer search for the same subject started before this one resolved.
    Superseded { subject_id: i64 },
}

/// Ensures a slow, stale search never replaces a newer one for the same subject.
pub struct SearchCoordinator {
    search: Arc<CandidateSearch>,
    next_ticket: AtomicU64,
    in_flight: Mutex<HashMap<i64, SubjectSearches>>,
}

impl SearchCoordinator {
    pub fn new(search: Arc<CandidateSearch>) -> Self {
        Self {
            search,
            next_ticket: AtomicU64::new(1),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn search(&self, subject_id: i64) -> IntakeResult<SearchOutcome> {
        // Released on drop, including when the caller abandons the request.
        let ticket = self.begin(subject_id);
        let result = self.search.search_by_id(subject_id).await;

        if !ticket.is_latest() {
            tracing::info!(
                "Discarding superseded duplicate search for contact {}",
                subject_id
            );
            return Ok(SearchOutcome::Superseded { subject_id });
        }

        result.map(SearchOutcome::Fresh)
    }

    /// Subjects with at least one search still running.
    pub fn subjects_in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn begin(&self, subject_id: i64) -> SearchTicket<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let entry = in_flight.entry(subject_id).or_default();
        entry.latest = ticket;
        entry.running += 1;

        SearchTicket {
            coordinator: self,
            subject_id,
            ticket,
        }
    }

    fn release(&self, subject_id: i64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = in_flight.get_mut(&subject_id) else {
            return;
        };

        entry.running = entry.running.saturating_sub(1);
        if entry.running == 0 {
            in_flight.remove(&subject_id);
        }
    }
}

struct SearchTicket<'a> {
    coordinator: &'a SearchCoordinator,
    subject_id: i64,
    ticket: u64,
}

impl SearchTicket<'_> {
    /// True when no newer search for the subject has started.
    fn is_latest(&self) -> bool {
        let in_flight = self
            .coordinator
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        in_flight
            .get(&self.subject_id)
            .map_or(true, |entry| entry.latest == self.ticket)
    }
}

impl Drop for SearchTicket<'_> {
    fn drop(&mut self) {
        self.coordinator.release(self.subject_id);
    }
}

#[derive(Debug, Default)]
struct SubjectSearches {
    latest: u64,
    running: usize,
}
