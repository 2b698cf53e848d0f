//! Fixed-interval polling of asynchronous generation tasks.
//!
//! One call to [`wait_for_completion`] owns exactly one task and at most one
//! in-flight status query. Queries are strictly sequential: query N+1 is only
//! issued after query N returned and the interval elapsed. The only way to
//! stop waiting early is the attempt ceiling.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::GenerationError;
use crate::logging;
use crate::modules::video::VideoTaskRecord;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

// === Types ===

/// Attempt ceiling and fixed wait between status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollConfig {
    /// Build a policy; a zero attempt ceiling falls back to the default.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        let max_attempts = if max_attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            max_attempts
        };
        Self {
            max_attempts,
            interval,
        }
    }

    /// Total time the loop may spend waiting before giving up.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Anything that can report the current record of a task.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn query_task(&self, task_id: &str) -> Result<VideoTaskRecord, GenerationError>;
}

// === Polling Loop ===

/// Poll `task_id` until it reaches a terminal status or the attempt budget runs out.
///
/// Query errors are returned immediately; nothing is retried here.
pub async fn wait_for_completion<S>(
    source: &S,
    task_id: &str,
    config: &PollConfig,
) -> Result<VideoTaskRecord, GenerationError>
where
    S: TaskStatusSource + ?Sized,
{
    let mut attempts: u32 = 0;

    while attempts < config.max_attempts {
        let record = source.query_task(task_id).await?;
        logging::info(format!(
            "Task {task_id} poll {}/{}: {}",
            attempts + 1,
            config.max_attempts,
            record.status
        ));

        if record.status.is_terminal() {
            return Ok(record);
        }

        sleep(config.interval).await;
        attempts += 1;
    }

    Err(GenerationError::PollTimeout {
        task_id: task_id.to_string(),
        attempts,
        waited: config.budget(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{ApiError, ApiErrorCode};
    use crate::modules::video::TaskStatus;

    /// Returns `running` until the configured query number, then `finish`.
    struct ScriptedSource {
        queries: AtomicUsize,
        finish_on: Option<usize>,
        finish: TaskStatus,
    }

    impl ScriptedSource {
        fn finishing_on(n: usize, finish: TaskStatus) -> Self {
            Self {
                queries: AtomicUsize::new(0),
                finish_on: Some(n),
                finish,
            }
        }

        fn never_finishing() -> Self {
            Self {
                queries: AtomicUsize::new(0),
                finish_on: None,
                finish: TaskStatus::Running,
            }
        }

        fn count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskStatusSource for ScriptedSource {
        async fn query_task(&self, task_id: &str) -> Result<VideoTaskRecord, GenerationError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            let status = match self.finish_on {
                Some(finish_on) if n >= finish_on => self.finish,
                _ => TaskStatus::Running,
            };
            Ok(VideoTaskRecord::with_status(task_id, status))
        }
    }

    struct FailingSource {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl TaskStatusSource for FailingSource {
        async fn query_task(&self, _task_id: &str) -> Result<VideoTaskRecord, GenerationError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::new(ApiErrorCode::ServerError, "boom")
                .with_status(500)
                .into())
        }
    }

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn returns_succeeded_record_after_exactly_n_queries() {
        let source = ScriptedSource::finishing_on(4, TaskStatus::Succeeded);
        let record = wait_for_completion(&source, "cgt-1", &fast(10))
            .await
            .expect("completes");
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(record.id, "cgt-1");
        assert_eq!(source.count(), 4);
    }

    #[tokio::test]
    async fn succeeding_on_the_last_allowed_attempt_still_completes() {
        let source = ScriptedSource::finishing_on(5, TaskStatus::Succeeded);
        let record = wait_for_completion(&source, "cgt-2", &fast(5))
            .await
            .expect("completes");
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(source.count(), 5);
    }

    #[tokio::test]
    async fn remote_failure_states_are_terminal_not_errors() {
        for terminal in [TaskStatus::Failed, TaskStatus::Expired, TaskStatus::Cancelled] {
            let source = ScriptedSource::finishing_on(2, terminal);
            let record = wait_for_completion(&source, "cgt-3", &fast(10))
                .await
                .expect("terminal record");
            assert_eq!(record.status, terminal);
            assert_eq!(source.count(), 2);
        }
    }

    #[tokio::test]
    async fn times_out_after_exactly_max_attempts_queries() {
        let source = ScriptedSource::never_finishing();
        let err = wait_for_completion(&source, "cgt-4", &fast(7))
            .await
            .unwrap_err();
        assert_eq!(source.count(), 7);
        match err {
            GenerationError::PollTimeout {
                task_id, attempts, ..
            } => {
                assert_eq!(task_id, "cgt-4");
                assert_eq!(attempts, 7);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_error_stops_the_loop_without_retry() {
        let source = FailingSource {
            queries: AtomicUsize::new(0),
        };
        let err = wait_for_completion(&source, "cgt-5", &fast(10))
            .await
            .unwrap_err();
        assert_eq!(source.queries.load(Ordering::SeqCst), 1);
        assert_eq!(err.api_code(), Some(ApiErrorCode::ServerError));
    }

    #[test]
    fn zero_attempts_fall_back_to_default_and_budget_multiplies() {
        let config = PollConfig::new(0, Duration::from_millis(5000));
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.budget(), Duration::from_secs(300));
    }
}
