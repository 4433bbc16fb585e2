//! Scan aggregator
//!
//! A [`Scan`] builds one [`Job`] per enabled check for a single target,
//! fires them all concurrently and collects the board into a
//! [`ScanReport`]. One job's failure never holds up another.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::address::{AddressContext, AddressType};
use crate::board::{BoardSummary, JobBoard, JobStatus};
use crate::config::WebprobeConfig;
use crate::engine::Job;
use crate::error::Result;
use crate::policy::{ConcurrencyLimit, Timeout};
use crate::registry::CheckRegistry;
use crate::traits::{CheckFetch, FetchRequest, JobReporter};

/// An error a job returned after recording it on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    /// Job name
    pub check: String,
    /// User-facing message
    pub message: String,
}

/// Outcome of one scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Target as entered
    pub target: String,
    /// Classification of the target
    pub address_type: AddressType,
    /// Per-state counts
    pub summary: BoardSummary,
    /// Every board row
    pub jobs: Vec<JobStatus>,
    /// Errors returned by fetch collaborators
    pub failures: Vec<ScanFailure>,
    /// When the last job settled
    pub finished_at: DateTime<Utc>,
}

struct ScanJob {
    job: Job,
    expected: Vec<AddressType>,
}

/// One target, many checks
pub struct Scan {
    target: String,
    address_type: AddressType,
    jobs: Vec<ScanJob>,
    board: Arc<JobBoard>,
}

impl Scan {
    /// Build the jobs for `target`
    ///
    /// Each check is bound to the target and wrapped in the timeout layer,
    /// plus the concurrency layer when `max_concurrent_checks` is set.
    ///
    /// # Errors
    ///
    /// - Invalid configuration
    /// - A configured check that is not registered
    pub fn new(
        target: impl Into<String>,
        registry: &CheckRegistry,
        config: &WebprobeConfig,
        board: Arc<JobBoard>,
    ) -> Result<Self> {
        config.validate()?;

        let target = target.into().trim().to_string();
        let address_type = AddressType::classify(&target);
        let names = config.enabled_checks(registry)?;

        let permits = match config.policy.max_concurrent_checks {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let mut jobs = Vec::with_capacity(names.len());
        for name in names {
            let check = registry.get(&name)?;
            board.track(&name);

            let bound = Timeout::new(
                CheckFetch::new(Arc::clone(&check), target.clone()),
                config.policy.api_timeout_ms,
            );
            let fetch: Arc<dyn FetchRequest> = match &permits {
                Some(permits) => Arc::new(ConcurrencyLimit::new(bound, Arc::clone(permits))),
                None => Arc::new(bound),
            };
            let reporter: Arc<dyn JobReporter> = board.clone();

            jobs.push(ScanJob {
                job: Job::new(name, fetch, reporter, config.jobs),
                expected: check.expected_address_types(),
            });
        }

        info!(
            "Scan of {} ({}) with {} checks",
            target,
            address_type,
            jobs.len()
        );

        Ok(Self {
            target,
            address_type,
            jobs,
            board,
        })
    }

    /// Target as entered, trimmed
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Classification of the target
    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    /// Jobs in this scan
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().map(|entry| &entry.job)
    }

    /// Board the jobs report to
    pub fn board(&self) -> &Arc<JobBoard> {
        &self.board
    }

    /// Deliver the target to every job and wait for all of them to settle
    ///
    /// Running a scan a second time is a no-op for each job; use
    /// [`JobBoard::retry`] to re-run individual checks.
    pub async fn run(&self) -> ScanReport {
        let mut set = JoinSet::new();

        for entry in &self.jobs {
            let context = AddressContext {
                address: Some(self.target.clone()),
                address_type: Some(self.address_type),
                expected_address_types: entry.expected.clone(),
            };
            let name = entry.job.id().to_string();
            let pending = entry.job.on_address_change(&context);
            set.spawn(async move { (name, pending.await) });
        }

        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((check, Err(e))) => {
                    warn!("Check {} failed: {}", check, e);
                    failures.push(ScanFailure {
                        check,
                        message: e.user_message(),
                    });
                }
                Err(e) => {
                    error!("Job task aborted: {}", e);
                    failures.push(ScanFailure {
                        check: "unknown".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.report(failures)
    }

    /// Current state of the scan as a report
    pub fn report(&self, failures: Vec<ScanFailure>) -> ScanReport {
        ScanReport {
            target: self.target.clone(),
            address_type: self.address_type,
            summary: self.board.summary(),
            jobs: self.board.snapshot(),
            failures,
            finished_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Scan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scan")
            .field("target", &self.target)
            .field("address_type", &self.address_type)
            .field("jobs", &self.jobs.len())
            .finish()
    }
}
