//! Policy layers around fetches
//!
//! Both layers wrap a [`FetchRequest`] and are themselves fetch requests, so
//! they stack: the scan builds `ConcurrencyLimit<Timeout<CheckFetch>>`.
//!
//! The timeout produces a `Failed` outcome whose message contains
//! `timed-out`, which the job classifies as `TimedOut`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{CheckOutcome, FetchRequest};

/// Appended to timeout messages
pub const TIMEOUT_HINT: &str = "You can re-trigger this request by clicking \"Retry\".\n\
    If you're running your own instance of webprobe, you can raise the limit \
    with the WEBPROBE_API_TIMEOUT_MS environment variable (in milliseconds).";

/// Races a fetch against a timer
#[derive(Debug, Clone)]
pub struct Timeout<F> {
    inner: F,
    limit: Duration,
}

impl<F> Timeout<F> {
    /// Wrap `inner` with a limit of `limit_ms` milliseconds
    pub fn new(inner: F, limit_ms: u64) -> Self {
        Self {
            inner,
            limit: Duration::from_millis(limit_ms),
        }
    }

    /// Message produced when the limit is hit
    pub fn timed_out_message(&self) -> String {
        format!(
            "Request timed-out after {} ms\n\n{}",
            self.limit.as_millis(),
            TIMEOUT_HINT
        )
    }
}

#[async_trait]
impl<F: FetchRequest> FetchRequest for Timeout<F> {
    async fn fetch(&self) -> Result<CheckOutcome> {
        match tokio::time::timeout(self.limit, self.inner.fetch()).await {
            Ok(settled) => settled,
            Err(_) => {
                warn!("Fetch exceeded {} ms", self.limit.as_millis());
                Ok(CheckOutcome::Failed(self.timed_out_message()))
            }
        }
    }
}

/// Caps the number of fetches in flight across every wrapped request
/// sharing the same semaphore
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit<F> {
    inner: F,
    permits: Arc<Semaphore>,
}

impl<F> ConcurrencyLimit<F> {
    /// Wrap `inner`, sharing `permits` with other wrapped requests
    pub fn new(inner: F, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }
}

#[async_trait]
impl<F: FetchRequest> FetchRequest for ConcurrencyLimit<F> {
    async fn fetch(&self) -> Result<CheckOutcome> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Other("Concurrency limiter closed".to_string()))?;
        debug!("Acquired fetch permit ({} left)", self.permits.available_permits());
        self.inner.fetch().await
    }
}
