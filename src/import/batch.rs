use crate::db::models::{BatchStatus, ImportBatch};
use chrono::Utc;

/// One outcome reported to a batch's tracker
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Enumeration succeeded with `total` payloads to attempt
    Enumerated { total: usize },
    ItemSucceeded { location: String },
    /// Per-item failure, `message` is prefixed with the payload location
    ItemFailed { message: String },
    /// Every enumerated item has been attempted
    Finished,
    /// Repository-level failure
    Fatal { message: String },
}

impl BatchEvent {
    fn name(&self) -> &'static str {
        match self {
            BatchEvent::Enumerated { .. } => "enumerated",
            BatchEvent::ItemSucceeded { .. } => "item succeeded",
            BatchEvent::ItemFailed { .. } => "item failed",
            BatchEvent::Finished => "finished",
            BatchEvent::Fatal { .. } => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied,
    /// The event was discarded; the batch is unchanged
    Anomaly(String),
}

/// In-memory state machine for one batch.
///
/// `pending -> inProgress -> completed | failed`. Terminal states absorb
/// every later event.
#[derive(Debug, Clone)]
pub struct BatchState {
    batch: ImportBatch,
}

impl BatchState {
    pub fn new(batch: ImportBatch) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &ImportBatch {
        &self.batch
    }

    pub fn into_inner(self) -> ImportBatch {
        self.batch
    }

    fn attempted(&self) -> i64 {
        self.batch.successful_imports + self.batch.failed_imports
    }

    fn has_capacity(&self) -> bool {
        self.batch
            .total_recipes
            .is_some_and(|total| self.attempted() < total)
    }

    fn anomaly(&self, event: &BatchEvent) -> Transition {
        Transition::Anomaly(format!(
            "Dropped `{}` event for batch {} in state {} ({}/{} attempted)",
            event.name(),
            self.batch.id,
            self.batch.status,
            self.attempted(),
            self.batch
                .total_recipes
                .map_or_else(|| "?".to_string(), |t| t.to_string()),
        ))
    }

    fn finish(&mut self, status: BatchStatus) {
        self.batch.status = status;
        self.batch.completed_at = Some(Utc::now());
    }

    pub fn apply(&mut self, event: BatchEvent) -> Transition {
        let status = self.batch.status;
        if status.is_terminal() {
            return self.anomaly(&event);
        }

        match event {
            BatchEvent::Enumerated { total } if status == BatchStatus::Pending => {
                self.batch.status = BatchStatus::InProgress;
                self.batch.total_recipes = Some(total as i64);
            }
            BatchEvent::ItemSucceeded { .. }
                if status == BatchStatus::InProgress && self.has_capacity() =>
            {
                self.batch.successful_imports += 1;
            }
            BatchEvent::ItemFailed { message }
                if status == BatchStatus::InProgress && self.has_capacity() =>
            {
                self.batch.failed_imports += 1;
                self.batch.error_log.0.push(message);
            }
            BatchEvent::Finished if status == BatchStatus::InProgress => {
                let total = self.batch.total_recipes.unwrap_or_default();
                let missing = total - self.attempted();
                if missing > 0 {
                    self.batch
                        .error_log
                        .0
                        .push(format!("{missing} payloads were never attempted"));
                }
                self.finish(BatchStatus::Completed);
            }
            BatchEvent::Fatal { message } => {
                self.batch.error_log.0.push(message);
                self.finish(BatchStatus::Failed);
            }
            other => return self.anomaly(&other),
        }

        Transition::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn pending() -> BatchState {
        BatchState::new(ImportBatch {
            id: Uuid::new_v4(),
            repository_url: "https://github.com/example/recipes".to_string(),
            status: BatchStatus::Pending,
            total_recipes: None,
            successful_imports: 0,
            failed_imports: 0,
            error_log: Json(Vec::new()),
            created_by: None,
            started_at: Utc::now(),
            completed_at: None,
        })
    }

    fn succeeded() -> BatchEvent {
        BatchEvent::ItemSucceeded {
            location: "a.json".to_string(),
        }
    }

    fn failed(message: &str) -> BatchEvent {
        BatchEvent::ItemFailed {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_happy_path() {
        let mut state = pending();

        assert_eq!(state.apply(BatchEvent::Enumerated { total: 3 }), Transition::Applied);
        assert_eq!(state.batch().status, BatchStatus::InProgress);
        assert_eq!(state.batch().total_recipes, Some(3));

        assert_eq!(state.apply(succeeded()), Transition::Applied);
        assert_eq!(state.apply(succeeded()), Transition::Applied);
        assert_eq!(state.apply(failed("b.md: no name")), Transition::Applied);
        assert_eq!(state.apply(BatchEvent::Finished), Transition::Applied);

        let batch = state.into_inner();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.successful_imports, 2);
        assert_eq!(batch.failed_imports, 1);
        assert_eq!(batch.error_log.0, vec!["b.md: no name".to_string()]);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_fatal_before_enumeration() {
        let mut state = pending();
        state.apply(BatchEvent::Fatal {
            message: "Repository not found".to_string(),
        });

        let batch = state.batch();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.total_recipes, None);
        assert_eq!(batch.successful_imports, 0);
        assert_eq!(batch.error_log.0.len(), 1);
    }

    #[test]
    fn test_terminal_states_absorb_late_events() {
        let mut state = pending();
        state.apply(BatchEvent::Enumerated { total: 1 });
        state.apply(succeeded());
        state.apply(BatchEvent::Finished);
        let before = state.batch().clone();

        for event in [
            succeeded(),
            failed("late"),
            BatchEvent::Finished,
            BatchEvent::Fatal {
                message: "late".to_string(),
            },
            BatchEvent::Enumerated { total: 9 },
        ] {
            assert!(matches!(state.apply(event), Transition::Anomaly(_)));
        }
        assert_eq!(state.batch(), &before);
    }

    #[test]
    fn test_items_before_enumeration_are_anomalies() {
        let mut state = pending();
        assert!(matches!(state.apply(succeeded()), Transition::Anomaly(_)));
        assert!(matches!(state.apply(BatchEvent::Finished), Transition::Anomaly(_)));
        assert_eq!(state.batch().status, BatchStatus::Pending);
    }

    #[test]
    fn test_counters_never_exceed_total() {
        let mut state = pending();
        state.apply(BatchEvent::Enumerated { total: 1 });
        assert_eq!(state.apply(succeeded()), Transition::Applied);
        assert!(matches!(state.apply(failed("extra")), Transition::Anomaly(_)));

        let batch = state.batch();
        assert_eq!(batch.successful_imports + batch.failed_imports, 1);
        assert!(batch.error_log.0.is_empty());
    }

    #[test]
    fn test_second_enumeration_is_anomaly() {
        let mut state = pending();
        state.apply(BatchEvent::Enumerated { total: 2 });
        assert!(matches!(
            state.apply(BatchEvent::Enumerated { total: 5 }),
            Transition::Anomaly(_)
        ));
        assert_eq!(state.batch().total_recipes, Some(2));
    }

    #[test]
    fn test_early_finish_records_shortfall() {
        let mut state = pending();
        state.apply(BatchEvent::Enumerated { total: 2 });
        state.apply(succeeded());
        state.apply(BatchEvent::Finished);

        let batch = state.batch();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.successful_imports, 1);
        assert_eq!(batch.error_log.0, vec!["1 payloads were never attempted".to_string()]);
    }
}
