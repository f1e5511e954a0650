use crate::store::ContactStore;
use anyhow::Result;
use shared_types::{DuplicatePair, DuplicateStatus, CATEGORY_MERGED};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Pairs claimed per `run_pending` call.
const CLAIM_BATCH: usize = 16;

/// Background worker that carries out submitted merges.
///
/// A merge writes the survivor's resolved fields and collections, moves the
/// subsumed contact to the "Merged" category and completes the pair in one
/// transaction. Any failure leaves both contacts as they were and records
/// the error on the pair.
pub struct MergeJobManager {
    store: Arc<dyn ContactStore>,
    active_jobs: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
    shutting_down: AtomicBool,
}

impl MergeJobManager {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Requeue merges left in `processing` by a previous run.
    pub async fn restore_interrupted_jobs(&self) -> Result<usize> {
        let restored = self.store.reset_interrupted_merges().await?;
        if restored > 0 {
            tracing::info!("Requeued {} interrupted merges", restored);
        }
        Ok(restored)
    }

    /// Claim armed pending merges and start a job for each. Returns how many started.
    pub async fn run_pending(&self) -> Result<usize> {
        if self.is_shutting_down() {
            return Ok(0);
        }

        let pairs = self.store.claim_pending_merges(CLAIM_BATCH).await?;
        let mut started = 0;

        for pair in pairs {
            let job_id = pair.duplicate_id;
            match self.start_job(pair).await {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!("Could not start merge {}: {:#}", job_id, e),
            }
        }

        Ok(started)
    }

    async fn start_job(&self, pair: DuplicatePair) -> Result<()> {
        let job_id = pair.duplicate_id;

        // Held until the handle is registered so the job cannot deregister first.
        let mut jobs = self.active_jobs.lock().await;
        if jobs.contains_key(&job_id) {
            return Err(anyhow::anyhow!("Merge {} already running", job_id));
        }

        let store = self.store.clone();
        let active_jobs = self.active_jobs.clone();

        let handle = tokio::spawn(async move {
            match Self::process(store.as_ref(), &pair).await {
                Ok(()) => {
                    tracing::info!(
                        "Merged contact {} into {} (pair {})",
                        pair.duplicate_contact_id,
                        pair.primary_contact_id,
                        job_id
                    );
                }
                Err(e) => {
                    tracing::error!("Merge {} failed: {:#}", job_id, e);
                    let message = e.to_string();
                    if let Err(e) = store
                        .finish_duplicate_pair(job_id, DuplicateStatus::Failed, Some(&message))
                        .await
                    {
                        tracing::error!("Failed to record failure of merge {}: {:#}", job_id, e);
                    }
                }
            }

            let mut jobs = active_jobs.lock().await;
            jobs.remove(&job_id);
        });

        jobs.insert(job_id, handle);

        Ok(())
    }

    async fn process(store: &dyn ContactStore, pair: &DuplicatePair) -> Result<()> {
        let snapshot = pair
            .duplicate_data
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Merge has no snapshot of contact {}", pair.primary_contact_id))?;
        let selection = pair
            .merge_selections
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Merge has no field selections"))?;

        let current = store
            .get_contact_record(pair.duplicate_contact_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Contact {} no longer exists", pair.duplicate_contact_id))?;
        if current.contact.category.as_deref() == Some(CATEGORY_MERGED) {
            anyhow::bail!(
                "Contact {} has already been merged",
                pair.duplicate_contact_id
            );
        }

        let merged = matching::apply_selection(&current, snapshot, selection);
        store.apply_merge(pair, &merged).await
    }

    /// Wait until every running merge job has finished.
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut jobs = self.active_jobs.lock().await;
            jobs.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Merge job panicked or was cancelled: {}", e);
            }
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        tracing::info!("Waiting for running merges to finish");
        self.wait_idle().await;
        Ok(())
    }
}
