use crate::db::models::ImportBatch;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Interval clients are expected to poll at
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The batch reached `completed` or `failed`
    Terminal(ImportBatch),
    /// `max_polls` reads happened without a terminal status
    GaveUp(ImportBatch),
}

/// Read a batch every `interval` until it is terminal or `max_polls` reads
/// have been made. Errors from `fetch` end the loop. Dropping the returned
/// future cancels polling.
pub async fn poll_until_terminal<F, Fut, U>(
    mut fetch: F,
    interval: Duration,
    max_polls: u32,
    mut on_update: U,
) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ImportBatch>>,
    U: FnMut(&ImportBatch),
{
    let max_polls = max_polls.max(1);
    let mut polls = 0;

    loop {
        let batch = fetch().await?;
        polls += 1;
        on_update(&batch);

        if batch.status.is_terminal() {
            return Ok(PollOutcome::Terminal(batch));
        }
        if polls >= max_polls {
            return Ok(PollOutcome::GaveUp(batch));
        }

        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BatchStatus;
    use crate::error::Error;
    use chrono::Utc;
    use sqlx::types::Json;
    use std::cell::Cell;
    use uuid::Uuid;

    fn batch(status: BatchStatus) -> ImportBatch {
        ImportBatch {
            id: Uuid::nil(),
            repository_url: "example/recipes".to_string(),
            status,
            total_recipes: None,
            successful_imports: 0,
            failed_imports: 0,
            error_log: Json(Vec::new()),
            created_by: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_stops_at_terminal_status() {
        let sequence = [
            BatchStatus::Pending,
            BatchStatus::InProgress,
            BatchStatus::Completed,
            BatchStatus::Failed,
        ];
        let calls = Cell::new(0);
        let mut seen = Vec::new();

        let outcome = poll_until_terminal(
            || {
                let status = sequence[calls.get()];
                calls.set(calls.get() + 1);
                async move { Ok(batch(status)) }
            },
            Duration::from_millis(1),
            10,
            |b| seen.push(b.status),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Terminal(b) if b.status == BatchStatus::Completed));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            seen,
            vec![BatchStatus::Pending, BatchStatus::InProgress, BatchStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let calls = Cell::new(0);
        let outcome = tokio_test::assert_ok!(
            poll_until_terminal(
                || {
                    calls.set(calls.get() + 1);
                    async { Ok(batch(BatchStatus::InProgress)) }
                },
                Duration::from_millis(1),
                3,
                |_| {},
            )
            .await
        );

        assert!(matches!(outcome, PollOutcome::GaveUp(_)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_fetch_error_ends_polling() {
        let result = poll_until_terminal(
            || async { Err(Error::NotFound("Batch not found".to_string())) },
            Duration::from_millis(1),
            5,
            |_| {},
        )
        .await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, Error::NotFound(_)));
    }
}
