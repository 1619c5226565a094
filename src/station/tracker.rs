//! Task tracking.
//!
//! Every mutation yields a task id that the station works through
//! asynchronously. [`TaskTracker::state`] reads one task's state from the task
//! list; [`TaskTracker::wait_for_completion`] polls it at a fixed interval until
//! it completes, fails, runs past the deadline or the caller cancels.

use crate::env;
use crate::station::client::StationApi;
use crate::station::{Result, StationError};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Task id absent from the task list
    NotFound,
    /// Any state string the station reports that is not modelled above
    Other(String),
}

impl TaskState {
    /// Exact, case-sensitive match; anything else is kept verbatim as
    /// [`TaskState::Other`] and keeps the poll loop going.
    pub fn parse(state: &str) -> Self {
        match state {
            env::status::TASK_QUEUED => TaskState::Queued,
            env::status::TASK_RUNNING => TaskState::Running,
            env::status::TASK_COMPLETED => TaskState::Completed,
            env::status::TASK_FAILED => TaskState::Failed,
            env::status::TASK_CANCELLED => TaskState::Cancelled,
            env::status::TASK_NOT_FOUND => TaskState::NotFound,
            _ => TaskState::Other(state.to_string()),
        }
    }

    /// Only `completed` counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskState::Completed)
    }

    /// Failed or cancelled: no further transition, and not a success.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskState::Failed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Queued => write!(f, "{}", env::status::TASK_QUEUED),
            TaskState::Running => write!(f, "{}", env::status::TASK_RUNNING),
            TaskState::Completed => write!(f, "{}", env::status::TASK_COMPLETED),
            TaskState::Failed => write!(f, "{}", env::status::TASK_FAILED),
            TaskState::Cancelled => write!(f, "{}", env::status::TASK_CANCELLED),
            TaskState::NotFound => write!(f, "{}", env::status::TASK_NOT_FOUND),
            TaskState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// How a poll loop waits on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between polls
    pub interval: Duration,
    /// Give up after this long; `None` waits until completion or cancellation
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: env::poll::DEFAULT_INTERVAL,
            timeout: Some(env::poll::DEFAULT_TIMEOUT),
        }
    }
}

/// Reads task states from the station task list.
pub struct TaskTracker<'a> {
    api: &'a dyn StationApi,
}

impl<'a> TaskTracker<'a> {
    pub fn new(api: &'a dyn StationApi) -> Self {
        Self { api }
    }

    /// Current state of `task_id`, or [`TaskState::NotFound`] when the task
    /// list does not contain it.
    ///
    /// # Errors
    ///
    /// Returns transport or decode errors from the task list request.
    pub async fn state(&self, task_id: &str) -> Result<TaskState> {
        Ok(self
            .raw_state(task_id)
            .await?
            .map(|raw| TaskState::parse(&raw))
            .unwrap_or(TaskState::NotFound))
    }

    async fn raw_state(&self, task_id: &str) -> Result<Option<String>> {
        let tasks = self.api.tasks().await?;
        Ok(tasks
            .data
            .items
            .into_iter()
            .find(|task| task.id == task_id)
            .map(|task| task.state))
    }

    /// Poll until `task_id` reaches `completed`.
    ///
    /// Queued, running, unknown and not-found states keep the loop going.
    ///
    /// # Errors
    ///
    /// - [`StationError::TaskFailed`] if the task ends failed or cancelled
    /// - [`StationError::Timeout`] if `policy.timeout` elapses first
    /// - [`StationError::Cancelled`] if `cancel` fires first
    /// - transport or decode errors from any poll
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = policy.timeout.map(|timeout| started + timeout);
        let mut polls: u32 = 0;

        loop {
            let raw = self.raw_state(task_id).await?;
            let state = raw
                .as_deref()
                .map(TaskState::parse)
                .unwrap_or(TaskState::NotFound);
            polls += 1;
            debug!(task_id, %state, polls, "Polled task");

            if state.is_success() {
                info!(task_id, polls, elapsed = ?started.elapsed(), "Task completed");
                return Ok(());
            }
            if state.is_failure() {
                warn!(task_id, %state, "Task ended without completing");
                return Err(StationError::TaskFailed {
                    task_id: task_id.to_string(),
                    state: raw.unwrap_or_else(|| state.to_string()),
                });
            }

            let mut wake = Instant::now() + policy.interval;
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(self.timed_out(task_id, started));
                }
                wake = wake.min(deadline);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(task_id, "Stopped waiting on task: cancelled");
                    return Err(StationError::Cancelled {
                        task_id: task_id.to_string(),
                    });
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    fn timed_out(&self, task_id: &str, started: Instant) -> StationError {
        let waited = started.elapsed();
        warn!(task_id, ?waited, "Task did not complete before the deadline");
        StationError::Timeout {
            task_id: task_id.to_string(),
            waited,
        }
    }
}
