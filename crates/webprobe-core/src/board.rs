//! Loading-job board
//!
//! The board is the parent registry of job statuses. It receives every
//! [`JobUpdate`], keeps one row per job name, stores retry handles so the
//! caller can offer a "Retry" action, and fans updates out to subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use crate::engine::{JobState, RetryHandle};
use crate::error::Result;
use crate::traits::{JobReporter, JobUpdate, ProgressNotice};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Status row for one job name
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job name
    pub name: String,

    /// Current state
    pub state: JobState,

    /// Error, timeout or skip message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Retry action; present after a non-success settlement
    #[serde(skip)]
    pub retry: Option<RetryHandle>,

    /// Last result data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// When the current attempt started
    pub started_at: Option<DateTime<Utc>>,

    /// When the current attempt settled
    pub finished_at: Option<DateTime<Utc>>,

    /// Duration of the current attempt
    pub time_taken_ms: Option<i64>,
}

impl JobStatus {
    fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: JobState::Idle,
            message: None,
            retry: None,
            data: None,
            started_at: None,
            finished_at: None,
            time_taken_ms: None,
        }
    }

    fn apply(&mut self, update: &JobUpdate, now: DateTime<Utc>) {
        self.state = update.state;

        if matches!(update.state, JobState::Loading | JobState::Idle) {
            self.started_at = (update.state == JobState::Loading).then_some(now);
            self.finished_at = None;
            self.time_taken_ms = None;
            self.message = None;
            self.retry = None;
            return;
        }

        self.message = update.message.clone();
        self.retry = update.retry.clone();
        if let Some(data) = &update.data {
            self.data = Some(data.clone());
        }
        if update.state.is_terminal() {
            self.finished_at = Some(now);
            self.time_taken_ms = self
                .started_at
                .map(|started| (now - started).num_milliseconds());
        }
    }
}

/// Per-state counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    /// Rows on the board
    pub total: usize,
    /// Rows still idle
    pub idle: usize,
    /// Rows loading
    pub loading: usize,
    /// Rows settled with data
    pub success: usize,
    /// Rows settled with an error
    pub error: usize,
    /// Rows settled with a timeout
    pub timed_out: usize,
    /// Rows skipped
    pub skipped: usize,
}

/// Shared status board implementing [`JobReporter`]
pub struct JobBoard {
    rows: Mutex<Vec<JobStatus>>,
    notices: Mutex<Vec<ProgressNotice>>,
    updates: broadcast::Sender<JobStatus>,
}

impl JobBoard {
    /// Create an empty board
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            rows: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            updates,
        }
    }

    /// Create a board with idle rows for `names`, in order
    pub fn with_jobs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let board = Self::new();
        for name in names {
            board.track(name.as_ref());
        }
        board
    }

    /// Add an idle row for `name` unless one exists
    pub fn track(&self, name: &str) {
        let mut rows = self.rows();
        if !rows.iter().any(|row| row.name == name) {
            rows.push(JobStatus::idle(name));
        }
    }

    /// Re-run the job behind `name`
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A retry handle was present and the retry settled
    /// - `Ok(false)`: The row has no retry handle (unknown, loading or successful)
    /// - `Err(Error)`: The fetch collaborator failed (already recorded on the row)
    pub async fn retry(&self, name: &str) -> Result<bool> {
        let handle = self
            .rows()
            .iter()
            .find(|row| row.name == name)
            .and_then(|row| row.retry.clone());

        match handle {
            Some(handle) => {
                info!("Retrying {}", name);
                handle.retry(None).await?;
                Ok(true)
            }
            None => {
                debug!("No retry available for {}", name);
                Ok(false)
            }
        }
    }

    /// Current row for `name`
    pub fn status(&self, name: &str) -> Option<JobStatus> {
        self.rows().iter().find(|row| row.name == name).cloned()
    }

    /// Copy of every row, in insertion order
    pub fn snapshot(&self) -> Vec<JobStatus> {
        self.rows().clone()
    }

    /// Per-state counts
    pub fn summary(&self) -> BoardSummary {
        let rows = self.rows();
        let mut summary = BoardSummary {
            total: rows.len(),
            ..BoardSummary::default()
        };
        for row in rows.iter() {
            match row.state {
                JobState::Idle => summary.idle += 1,
                JobState::Loading => summary.loading += 1,
                JobState::Success => summary.success += 1,
                JobState::Error => summary.error += 1,
                JobState::TimedOut => summary.timed_out += 1,
                JobState::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// Whether every row has settled
    pub fn is_complete(&self) -> bool {
        self.rows().iter().all(|row| row.state.is_terminal())
    }

    /// Progress notices received so far
    pub fn notices(&self) -> Vec<ProgressNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stream of row updates from now on
    ///
    /// Slow subscribers observe `Lagged` errors instead of slowing jobs down.
    pub fn subscribe(&self) -> BroadcastStream<JobStatus> {
        BroadcastStream::new(self.updates.subscribe())
    }

    fn rows(&self) -> MutexGuard<'_, Vec<JobStatus>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBoard")
            .field("summary", &self.summary())
            .finish()
    }
}

impl JobReporter for JobBoard {
    fn report(&self, update: JobUpdate) {
        let now = Utc::now();
        let changed: Vec<JobStatus> = {
            let mut rows = self.rows();
            update
                .job_id
                .names()
                .iter()
                .map(|name| {
                    let index = match rows.iter().position(|row| &row.name == name) {
                        Some(index) => index,
                        None => {
                            rows.push(JobStatus::idle(name));
                            rows.len() - 1
                        }
                    };
                    rows[index].apply(&update, now);
                    rows[index].clone()
                })
                .collect()
        };

        for row in changed {
            debug!("Board: {} -> {}", row.name, row.state);
            // No subscribers is fine
            let _ = self.updates.send(row);
        }
    }

    fn notify(&self, notice: ProgressNotice) {
        info!("{}", notice);
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
