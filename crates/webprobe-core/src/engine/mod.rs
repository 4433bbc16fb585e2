//! Job orchestrator
//!
//! A [`Job`] drives one check through its lifecycle for the current target
//! address and reports every transition to a [`JobReporter`].
//!
//! ## Lifecycle
//!
//! ```text
//!            address context matches            settlement
//!   ┌──────┐ ───────────────────────► ┌─────────┐ ──────────► Success
//!   │ Idle │                          │ Loading │ ──────────► Error
//!   └──────┘ ◄─ address unset         └─────────┘ ──────────► TimedOut
//!      │                                   ▲      ──────────► Skipped
//!      │ type not expected                 │
//!      ▼                                   │ retry / reset
//!   Skipped ───────────────────────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. The owner delivers an [`AddressContext`] with [`Job::on_address_change`]
//! 2. A changed `(address, address_type)` identity advances the job's epoch
//! 3. Matching address types trigger one fetch; others report `Skipped`
//! 4. The settlement is classified into one terminal state and reported
//! 5. Settlements from a stale epoch are discarded without a report
//!
//! The job never retries on its own. A manual retry (through
//! [`RetryHandle`] or [`Job::reset`]) reuses the current epoch, so a retry
//! racing an automatic fetch is last-write-wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

use crate::address::{AddressContext, AddressType};
use crate::config::JobSettings;
use crate::error::Result;
use crate::traits::{CheckOutcome, FetchRequest, JobReporter, JobUpdate, NoticeKind, ProgressNotice};

/// Message reported for a falsy response
pub const NO_RESPONSE_MESSAGE: &str = "No response";

/// Message reported for every job while fetches are disabled
pub const DISABLED_MESSAGE: &str = "Webprobe is temporarily disabled. Please try again later.";

/// Appended to platform failures
pub const HOSTING_HINT: &str = "This sometimes occurs when the check backend runs on a \
    constrained serverless plan. You may need to upgrade it to run these checks";

/// Substring marking a failure message as a timeout
pub const TIMEOUT_MARKER: &str = "timed-out";

/// Identifier of a job: one or more names reported under one slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Vec<String>);

impl JobId {
    /// Create an id from several names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Names covered by this id
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for JobId {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for JobId {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// Waiting for a usable address
    #[default]
    Idle,
    /// Fetch in flight
    Loading,
    /// Fetch produced data
    Success,
    /// Fetch failed
    Error,
    /// Fetch failed with a timeout
    TimedOut,
    /// Check does not apply, or fetches are disabled
    Skipped,
}

impl JobState {
    /// Whether this is a settled state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::TimedOut | Self::Skipped
        )
    }

    /// Lowercase name, as reported
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::TimedOut => "timed-out",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobSnapshot {
    /// Current state
    pub state: JobState,
    /// Message of the last non-success settlement
    pub last_error: Option<String>,
    /// Last result, from a successful fetch or a reset override
    pub last_result: Option<Value>,
}

type Identity = (Option<String>, Option<AddressType>);

struct JobInner {
    id: JobId,
    fetch: Arc<dyn FetchRequest>,
    reporter: Arc<dyn JobReporter>,
    settings: JobSettings,
    snapshot: Mutex<JobSnapshot>,
    last_seen: Mutex<Option<Identity>>,
    epoch: AtomicU64,
    torn_down: AtomicBool,
}

/// One check's fetch-and-report lifecycle
///
/// Dropping the job tears it down: in-flight settlements are discarded and
/// outstanding retry handles become no-ops.
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create an idle job
    pub fn new(
        id: impl Into<JobId>,
        fetch: Arc<dyn FetchRequest>,
        reporter: Arc<dyn JobReporter>,
        settings: JobSettings,
    ) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: id.into(),
                fetch,
                reporter,
                settings,
                snapshot: Mutex::new(JobSnapshot::default()),
                last_seen: Mutex::new(None),
                epoch: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    /// Job identifier
    pub fn id(&self) -> &JobId {
        &self.inner.id
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.inner.snapshot().state
    }

    /// Last result
    pub fn result(&self) -> Option<Value> {
        self.inner.snapshot().last_result.clone()
    }

    /// Message of the last non-success settlement
    pub fn last_error(&self) -> Option<String> {
        self.inner.snapshot().last_error.clone()
    }

    /// Copy of the job's current view
    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.snapshot().clone()
    }

    /// Handle that re-runs this job while it is alive
    pub fn retry_handle(&self) -> RetryHandle {
        self.inner.retry_handle()
    }

    /// Deliver the current address context
    ///
    /// The identity comparison and epoch advance happen immediately; the
    /// returned future performs the fetch, if one is due. Re-delivering the
    /// same `(address, address_type)` resolves without doing anything.
    ///
    /// # Errors
    ///
    /// Returns the fetch collaborator's error after it has been reported.
    pub fn on_address_change(
        &self,
        context: &AddressContext,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let due = inner.observe(context);

        async move {
            match due {
                Some(epoch) => inner.auto_fetch(epoch).await.map(|_| ()),
                None => Ok(()),
            }
        }
    }

    /// Replace the result, or re-run the fetch
    ///
    /// A usable override (truthy, and not a UI event artifact) becomes the
    /// result without fetching. Anything else reports `Loading`, re-runs the
    /// fetch, and emits progress notices.
    pub fn reset(&self, data: Option<Value>) -> impl Future<Output = Result<()>> + Send + 'static {
        JobInner::reset(Arc::clone(&self.inner), data)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl JobInner {
    fn snapshot(&self) -> MutexGuard<'_, JobSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retry_handle(self: &Arc<Self>) -> RetryHandle {
        RetryHandle {
            job: Arc::downgrade(self),
            id: self.id.clone(),
        }
    }

    /// Record the context; returns the epoch to fetch under, if a fetch is due
    fn observe(self: &Arc<Self>, context: &AddressContext) -> Option<u64> {
        let identity = context.identity();
        let epoch = {
            let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if last_seen.as_ref() == Some(&identity) {
                return None;
            }
            *last_seen = Some(identity);
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        let (Some(address), Some(address_type)) = (&context.address, context.address_type) else {
            self.abandon_loading();
            return None;
        };
        if address.is_empty() {
            self.abandon_loading();
            return None;
        }

        if !context.expected_address_types.contains(&address_type) {
            if address_type == AddressType::Empty {
                self.abandon_loading();
            } else {
                debug!("[{}] Not applicable to {} addresses", self.id, address_type);
                self.settle(epoch, JobState::Skipped, None, false, None);
            }
            return None;
        }

        Some(epoch)
    }

    async fn auto_fetch(self: Arc<Self>, epoch: u64) -> Result<Option<JobState>> {
        if !self.settings.disable_everything {
            self.mark_loading();
        }
        self.run_fetch(epoch).await
    }

    async fn reset(self: Arc<Self>, data: Option<Value>) -> Result<()> {
        if let Some(data) = data.filter(is_usable_override) {
            debug!("[{}] Result replaced by caller", self.id);
            self.snapshot().last_result = Some(data);
            return Ok(());
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        self.mark_loading();
        self.reporter
            .notify(ProgressNotice::new(self.id.clone(), NoticeKind::Pending));

        match self.run_fetch(epoch).await {
            Ok(Some(state)) => {
                let kind = match state {
                    JobState::Success => Some(NoticeKind::Success),
                    JobState::Error | JobState::TimedOut => Some(NoticeKind::Error),
                    JobState::Skipped => Some(NoticeKind::Skipped),
                    JobState::Idle | JobState::Loading => None,
                };
                if let Some(kind) = kind {
                    self.reporter.notify(ProgressNotice::new(self.id.clone(), kind));
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.reporter
                    .notify(ProgressNotice::new(self.id.clone(), NoticeKind::Error));
                Err(e)
            }
        }
    }

    /// One attempt; `None` when the settlement was discarded as stale
    async fn run_fetch(self: &Arc<Self>, epoch: u64) -> Result<Option<JobState>> {
        if self.settings.disable_everything {
            return Ok(self.settle(
                epoch,
                JobState::Skipped,
                Some(DISABLED_MESSAGE.to_string()),
                true,
                None,
            ));
        }

        let outcome = match self.fetch.fetch().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[{}] Fetch failed: {}", self.id, e);
                self.settle(epoch, JobState::Error, Some(e.user_message()), true, None);
                return Err(e);
            }
        };

        let settled = match outcome {
            CheckOutcome::Success(value) => self.settle(epoch, JobState::Success, None, false, Some(value)),
            CheckOutcome::NoResponse => self.settle(
                epoch,
                JobState::Error,
                Some(NO_RESPONSE_MESSAGE.to_string()),
                true,
                None,
            ),
            CheckOutcome::Failed(message) => {
                let state = if message.contains(TIMEOUT_MARKER) {
                    JobState::TimedOut
                } else {
                    JobState::Error
                };
                self.settle(epoch, state, Some(message), true, None)
            }
            CheckOutcome::PlatformFailure {
                error_type,
                error_message,
            } => self.settle(
                epoch,
                JobState::Error,
                Some(format!("{}\n{}\n\n{}", error_type, error_message, HOSTING_HINT)),
                true,
                None,
            ),
            CheckOutcome::Skipped(reason) => {
                self.settle(epoch, JobState::Skipped, Some(reason), true, None)
            }
        };

        Ok(settled)
    }

    /// The epoch just moved on without starting a fetch; a fetch still in
    /// flight will be discarded, so a `Loading` job goes back to `Idle`
    fn abandon_loading(&self) {
        {
            let mut snapshot = self.snapshot();
            if snapshot.state != JobState::Loading {
                return;
            }
            snapshot.state = JobState::Idle;
        }

        debug!("[{}] In-flight fetch superseded, back to idle", self.id);
        self.reporter.report(JobUpdate::new(self.id.clone(), JobState::Idle));
    }

    fn mark_loading(&self) {
        self.snapshot().state = JobState::Loading;
        self.reporter
            .report(JobUpdate::new(self.id.clone(), JobState::Loading));
    }

    /// Apply a settlement unless `epoch` is stale or the job is gone
    fn settle(
        self: &Arc<Self>,
        epoch: u64,
        state: JobState,
        message: Option<String>,
        with_retry: bool,
        data: Option<Value>,
    ) -> Option<JobState> {
        let current = self.epoch.load(Ordering::SeqCst);
        if self.torn_down.load(Ordering::SeqCst) || epoch != current {
            debug!(
                "[{}] Discarding {} settlement from epoch {} (current {})",
                self.id, state, epoch, current
            );
            return None;
        }

        {
            let mut snapshot = self.snapshot();
            snapshot.state = state;
            if state == JobState::Success {
                snapshot.last_error = None;
                snapshot.last_result = data.clone();
            } else {
                snapshot.last_error = message.clone();
            }
        }

        let mut update = JobUpdate::new(self.id.clone(), state);
        if let Some(message) = message {
            update = update.with_message(message);
        }
        if let Some(data) = data {
            update = update.with_data(data);
        }
        if with_retry {
            update = update.with_retry(self.retry_handle());
        }

        debug!("[{}] Settled as {}", self.id, state);
        self.reporter.report(update);

        Some(state)
    }
}

/// Whether `data` may replace a job's result without a refetch
///
/// Falsy values and UI event objects (carrying `_reactName`) are not.
fn is_usable_override(data: &Value) -> bool {
    crate::traits::is_truthy(data) && data.get("_reactName").is_none()
}

/// Re-runs a job while it is alive
///
/// Holds only a weak reference; once the job is dropped `retry` does
/// nothing.
#[derive(Clone)]
pub struct RetryHandle {
    job: Weak<JobInner>,
    id: JobId,
}

impl RetryHandle {
    /// Job this handle re-runs
    pub fn job_id(&self) -> &JobId {
        &self.id
    }

    /// Whether the job is still alive
    pub fn is_live(&self) -> bool {
        self.job
            .upgrade()
            .is_some_and(|job| !job.torn_down.load(Ordering::SeqCst))
    }

    /// Same as [`Job::reset`]
    pub async fn retry(&self, data: Option<Value>) -> Result<()> {
        let Some(job) = self.job.upgrade() else {
            debug!("[{}] Retry ignored, job is gone", self.id);
            return Ok(());
        };
        if job.torn_down.load(Ordering::SeqCst) {
            debug!("[{}] Retry ignored, job torn down", self.id);
            return Ok(());
        }

        JobInner::reset(job, data).await
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::fetch_fn;
    use serde_json::json;

    struct NullReporter;

    impl JobReporter for NullReporter {
        fn report(&self, _update: JobUpdate) {}
    }

    fn job_with(outcome: CheckOutcome) -> Job {
        let fetch = fetch_fn(move || {
            let outcome = outcome.clone();
            async move { Ok(outcome) }
        });
        Job::new("test", Arc::new(fetch), Arc::new(NullReporter), JobSettings::default())
    }

    fn url_context() -> AddressContext {
        AddressContext::for_address("example.com", vec![AddressType::Url])
    }

    #[test]
    fn test_job_id_display() {
        assert_eq!(JobId::from("dns").to_string(), "dns");
        assert_eq!(JobId::new(["a", "b"]).to_string(), "a, b");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(JobState::TimedOut.to_string(), "timed-out");
        assert_eq!(serde_json::to_value(JobState::TimedOut).unwrap(), json!("timed-out"));
        assert!(!JobState::Loading.is_terminal());
        assert!(JobState::Skipped.is_terminal());
    }

    #[tokio::test]
    async fn test_platform_failure_message() {
        let job = job_with(CheckOutcome::PlatformFailure {
            error_type: "Lambda".into(),
            error_message: "crashed".into(),
        });
        job.on_address_change(&url_context()).await.unwrap();

        assert_eq!(job.state(), JobState::Error);
        assert_eq!(
            job.last_error().unwrap(),
            format!("Lambda\ncrashed\n\n{}", HOSTING_HINT)
        );
    }

    #[tokio::test]
    async fn test_no_response_is_error() {
        let job = job_with(CheckOutcome::NoResponse);
        job.on_address_change(&url_context()).await.unwrap();

        assert_eq!(job.state(), JobState::Error);
        assert_eq!(job.last_error().as_deref(), Some(NO_RESPONSE_MESSAGE));
    }

    #[test]
    fn test_usable_override() {
        assert!(is_usable_override(&json!({"foo": 1})));
        assert!(!is_usable_override(&json!(null)));
        assert!(!is_usable_override(&json!({"_reactName": "onClick"})));
    }

    #[tokio::test]
    async fn test_retry_handle_outlived_job() {
        let job = job_with(CheckOutcome::Success(json!(1)));
        let handle = job.retry_handle();
        assert!(handle.is_live());

        drop(job);
        assert!(!handle.is_live());
        assert!(handle.retry(None).await.is_ok());
    }
}
