use futures::stream::{self, StreamExt};
use shared_types::Candidate;
use std::sync::Arc;

use crate::store::ContactStore;

/// Presentation pass over filtered candidates. Lookups are best-effort and never drop a candidate.
pub struct MatchRanker {
    store: Arc<dyn ContactStore>,
    concurrency: usize,
}

impl MatchRanker {
    pub fn new(store: Arc<dyn ContactStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn annotate(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        stream::iter(candidates)
            .map(|candidate| self.annotate_one(candidate))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn annotate_one(&self, mut candidate: Candidate) -> Candidate {
        if candidate.company_name.is_some() {
            return candidate;
        }

        let id = candidate.contact_id();
        match self.store.get_primary_company_name(id).await {
            Ok(name) => candidate.company_name = name,
            Err(e) => tracing::warn!("Failed to load company for contact {}: {:#}", id, e),
        }

        candidate
    }
}
