// # Job Reporter Trait
//
// Defines how a job tells its owner about state transitions.
//
// A job reports every transition through `JobReporter::report` and emits
// progress notices for manual retries through `JobReporter::notify`.
//
// ## Implementations
//
// - `JobBoard`: keeps one row per job name (`webprobe_core::board`)
// - `TracingReporter`: logs transitions only
// - `tokio::sync::mpsc` senders: forward updates to a consumer task

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{JobId, JobState, RetryHandle};

/// One state transition of one job
#[derive(Debug, Clone)]
pub struct JobUpdate {
    /// Job that transitioned
    pub job_id: JobId,

    /// New state
    pub state: JobState,

    /// Error, timeout or skip message
    pub message: Option<String>,

    /// Handle to re-run the job; present on every non-success settlement
    pub retry: Option<RetryHandle>,

    /// Result data; present on success
    pub data: Option<Value>,
}

impl JobUpdate {
    /// Create an update carrying only a state
    pub fn new(job_id: JobId, state: JobState) -> Self {
        Self {
            job_id,
            state,
            message: None,
            retry: None,
            data: None,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a retry handle
    pub fn with_retry(mut self, retry: RetryHandle) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Attach result data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Kind of progress notice emitted during a manual retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeKind {
    /// Retry started
    Pending,
    /// Retry settled with data
    Success,
    /// Retry settled with an error or timeout
    Error,
    /// Retry settled as skipped
    Skipped,
}

/// User-facing progress notice for a manual retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressNotice {
    /// Job being retried
    pub job_id: JobId,
    /// Notice kind
    pub kind: NoticeKind,
    /// Rendered message
    pub message: String,
}

impl ProgressNotice {
    /// Build the notice for `kind`
    pub fn new(job_id: JobId, kind: NoticeKind) -> Self {
        let message = match kind {
            NoticeKind::Pending => format!("Updating Data ({})", job_id),
            NoticeKind::Success => format!("Completed ({})", job_id),
            NoticeKind::Error => format!("Failed to update ({})", job_id),
            NoticeKind::Skipped => {
                format!("Skipped job ({}), as no valid results for host", job_id)
            }
        };

        Self {
            job_id,
            kind,
            message,
        }
    }
}

impl fmt::Display for ProgressNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Receiver of job transitions
///
/// Called synchronously from the job's task; implementations must not
/// block.
pub trait JobReporter: Send + Sync {
    /// Record a state transition
    fn report(&self, update: JobUpdate);

    /// Surface a retry progress notice
    fn notify(&self, notice: ProgressNotice) {
        debug!("{}", notice);
    }
}

impl JobReporter for mpsc::Sender<JobUpdate> {
    fn report(&self, update: JobUpdate) {
        // Full channel means the consumer is behind; drop rather than block the job
        if self.try_send(update).is_err() {
            warn!("Job update channel full or closed, dropping update");
        }
    }
}

impl JobReporter for mpsc::UnboundedSender<JobUpdate> {
    fn report(&self, update: JobUpdate) {
        if self.send(update).is_err() {
            warn!("Job update channel closed, dropping update");
        }
    }
}

/// Reporter that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl JobReporter for TracingReporter {
    fn report(&self, update: JobUpdate) {
        match update.message {
            Some(message) => info!("[{}] {}: {}", update.job_id, update.state, message),
            None => info!("[{}] {}", update.job_id, update.state),
        }
    }

    fn notify(&self, notice: ProgressNotice) {
        info!("{}", notice);
    }
}
