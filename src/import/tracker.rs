use super::batch::{BatchEvent, BatchState, Transition};
use super::with_retries;
use crate::db::models::ImportBatch;
use crate::db::{batches, DbPool};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// Extra attempts at the terminal write after the regular retries failed
const TERMINAL_WRITE_ATTEMPTS: u32 = 5;

/// Sending half of a batch tracker
#[derive(Clone)]
pub struct BatchEvents {
    batch_id: uuid::Uuid,
    sender: mpsc::Sender<BatchEvent>,
}

impl BatchEvents {
    pub async fn send(&self, event: BatchEvent) {
        if self.sender.send(event).await.is_err() {
            warn!("Tracker for batch {} is gone, event dropped", self.batch_id);
        }
    }
}

/// Spawn the single task allowed to mutate `batch`.
///
/// Every event is applied in arrival order and the resulting snapshot is
/// written through the guarded update. The task drains until every
/// [`BatchEvents`] handle is dropped and returns the final batch. A batch
/// still running at that point is marked failed. If the terminal snapshot
/// cannot be stored the task returns [`Error::Persistence`] instead.
pub fn spawn_tracker(
    pool: DbPool,
    batch: ImportBatch,
    persist_retries: u32,
    persist_backoff: Duration,
) -> (BatchEvents, JoinHandle<Result<ImportBatch>>) {
    let (sender, mut receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let events = BatchEvents {
        batch_id: batch.id,
        sender,
    };

    let handle = tokio::spawn(async move {
        let mut state = BatchState::new(batch);
        let mut stored = true;

        while let Some(event) = receiver.recv().await {
            if let Some(saved) = apply(&pool, &mut state, event, persist_retries, persist_backoff).await {
                stored = saved;
            }
        }

        if !state.batch().status.is_terminal() {
            let event = BatchEvent::Fatal {
                message: "Import run ended before the batch finished".to_string(),
            };
            if let Some(saved) = apply(&pool, &mut state, event, persist_retries, persist_backoff).await {
                stored = saved;
            }
        }

        let batch = state.into_inner();
        if !stored {
            persist_terminal(&pool, &batch, persist_backoff).await?;
        }

        info!(
            "Batch {} {}: {} imported, {} failed of {:?}",
            batch.id, batch.status, batch.successful_imports, batch.failed_imports, batch.total_recipes
        );
        Ok(batch)
    });

    (events, handle)
}

/// Apply one event and store the new snapshot.
///
/// Returns whether the snapshot reached the database, or `None` when the
/// event was ignored.
async fn apply(
    pool: &DbPool,
    state: &mut BatchState,
    event: BatchEvent,
    persist_retries: u32,
    persist_backoff: Duration,
) -> Option<bool> {
    match state.apply(event) {
        Transition::Anomaly(reason) => {
            warn!("Batch anomaly: {}", reason);
            return None;
        }
        Transition::Applied => {}
    }

    let snapshot = state.batch();
    match with_retries(persist_retries, persist_backoff, || {
        batches::save_batch_progress(pool, snapshot)
    })
    .await
    {
        Ok(true) => debug!(
            "Batch {} saved: {} ({} ok, {} failed)",
            snapshot.id, snapshot.status, snapshot.successful_imports, snapshot.failed_imports
        ),
        Ok(false) => warn!(
            "Batch {} update rejected, stored row is terminal or ahead",
            snapshot.id
        ),
        Err(e) => {
            error!("Failed to save batch {}: {}", snapshot.id, e.log_safe());
            return Some(false);
        }
    }
    Some(true)
}

/// Keep writing the terminal snapshot, with a growing pause, until it sticks
async fn persist_terminal(pool: &DbPool, batch: &ImportBatch, backoff: Duration) -> Result<()> {
    let mut last_error = None;

    for attempt in 1..=TERMINAL_WRITE_ATTEMPTS {
        sleep(backoff * attempt).await;
        match batches::save_batch_progress(pool, batch).await {
            Ok(_) => {
                info!("Stored final status of batch {} on attempt {}", batch.id, attempt);
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Final status of batch {} not stored (attempt {}/{}): {}",
                    batch.id,
                    attempt,
                    TERMINAL_WRITE_ATTEMPTS,
                    e.log_safe()
                );
                last_error = Some(e);
            }
        }
    }

    let reason = last_error.map(|e| e.log_safe()).unwrap_or_default();
    error!("Batch {} finished as {} but the stored row was not updated", batch.id, batch.status);
    Err(Error::Persistence(format!(
        "final status {} of batch {} could not be stored: {}",
        batch.status, batch.id, reason
    )))
}
