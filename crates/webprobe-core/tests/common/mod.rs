//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles: scripted fetches, a recording
//! reporter, a resolver with fixed answers and a static check.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webprobe_core::error::{Error, Result};
use webprobe_core::traits::{
    Check, CheckOutcome, FetchRequest, HostResolver, JobReporter, JobUpdate, NoticeKind,
    ProgressNotice,
};
use webprobe_core::{AddressContext, AddressType, JobState};

/// One scripted settlement
#[derive(Debug, Clone)]
pub enum Step {
    /// Settle with this outcome
    Settle(CheckOutcome),
    /// Fail with `Error::check("scripted", message)`
    Fail(String),
}

/// A fetch that plays back a script, repeating the last step
pub struct ScriptedFetch {
    steps: Vec<(Duration, Step)>,
    calls: AtomicUsize,
}

impl ScriptedFetch {
    /// Settle immediately with `outcome`, every time
    pub fn always(outcome: CheckOutcome) -> Arc<Self> {
        Self::script(vec![(0, Step::Settle(outcome))])
    }

    /// Fail immediately with `message`, every time
    pub fn failing(message: &str) -> Arc<Self> {
        Self::script(vec![(0, Step::Fail(message.to_string()))])
    }

    /// Play `steps` in order; each is (delay in ms, step)
    pub fn script(steps: Vec<(u64, Step)>) -> Arc<Self> {
        assert!(!steps.is_empty(), "script needs at least one step");
        Arc::new(Self {
            steps: steps
                .into_iter()
                .map(|(ms, step)| (Duration::from_millis(ms), step))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of times fetch() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchRequest for ScriptedFetch {
    async fn fetch(&self) -> Result<CheckOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, step) = self.steps[call.min(self.steps.len() - 1)].clone();

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match step {
            Step::Settle(outcome) => Ok(outcome),
            Step::Fail(message) => Err(Error::check("scripted", message)),
        }
    }
}

/// A reporter that records everything it receives
#[derive(Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<JobUpdate>>,
    notices: Mutex<Vec<ProgressNotice>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every update, in order
    pub fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Reported states, in order
    pub fn states(&self) -> Vec<JobState> {
        self.updates().into_iter().map(|u| u.state).collect()
    }

    /// Most recent update
    pub fn last(&self) -> Option<JobUpdate> {
        self.updates().pop()
    }

    /// Notice kinds, in order
    pub fn notice_kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    /// Notices, in order
    pub fn notices(&self) -> Vec<ProgressNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl JobReporter for RecordingReporter {
    fn report(&self, update: JobUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    fn notify(&self, notice: ProgressNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// A resolver with fixed answer sets
#[derive(Default)]
pub struct StaticResolver {
    answers: HashMap<String, Vec<IpAddr>>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `host` with `addresses`, in this order
    pub fn with(mut self, host: &str, addresses: &[&str]) -> Self {
        let parsed = addresses
            .iter()
            .map(|a| a.parse().expect("test address must parse"))
            .collect();
        self.answers.insert(host.to_string(), parsed);
        self
    }

    /// Number of lookups performed
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup_all(&self, host: &str) -> Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(host)
            .cloned()
            .ok_or_else(|| Error::Other(format!("NXDOMAIN {}", host)))
    }

    fn resolver_name(&self) -> &'static str {
        "static"
    }
}

/// A named check settling with a fixed step
pub struct StaticCheck {
    name: &'static str,
    expected: Vec<AddressType>,
    fetch: Arc<ScriptedFetch>,
    targets: Mutex<Vec<String>>,
}

impl StaticCheck {
    pub fn new(name: &'static str, expected: Vec<AddressType>, fetch: Arc<ScriptedFetch>) -> Arc<Self> {
        Arc::new(Self {
            name,
            expected,
            fetch,
            targets: Mutex::new(Vec::new()),
        })
    }

    /// Number of runs
    pub fn calls(&self) -> usize {
        self.fetch.calls()
    }

    /// Targets the check ran against
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Check for StaticCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn expected_address_types(&self) -> Vec<AddressType> {
        self.expected.clone()
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        self.targets.lock().unwrap().push(target.to_string());
        self.fetch.fetch().await
    }
}

/// Context for a URL target that URL checks accept
pub fn url_context(address: &str) -> AddressContext {
    AddressContext::for_address(address, vec![AddressType::Url])
}
