//! Minimal embedding example for webprobe-core
//!
//! Registers two home-made checks, runs a scan against one target, watches
//! the board while it runs and retries the check that failed. No network
//! access is needed.

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_stream::StreamExt;
use webprobe_core::traits::{TracingReporter, fetch_fn};
use webprobe_core::{
    AddressContext, AddressType, Check, CheckOutcome, CheckRegistry, Error, Job, JobBoard,
    JobSettings, Result, Scan, WebprobeConfig,
};

/// Reports the length of the target
struct TargetLength;

#[async_trait::async_trait]
impl Check for TargetLength {
    fn name(&self) -> &str {
        "target-length"
    }

    fn expected_address_types(&self) -> Vec<AddressType> {
        vec![AddressType::Url, AddressType::Ipv4, AddressType::Ipv6]
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        Ok(CheckOutcome::Success(json!({ "length": target.len() })))
    }
}

/// Fails the first time it runs, then succeeds
struct Flaky {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Check for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(&self, _target: &str) -> Result<CheckOutcome> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Err(Error::check("flaky", "upstream unavailable")),
            n => Ok(CheckOutcome::Success(json!({ "attempt": n + 1 }))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded webprobe-core Example ===\n");

    println!("1. Registering checks...");
    let registry = CheckRegistry::new();
    registry.register(Arc::new(TargetLength));
    registry.register(Arc::new(Flaky {
        calls: AtomicUsize::new(0),
    }));

    println!("2. Building scan...");
    let board = Arc::new(JobBoard::new());
    let scan = Scan::new("example.com", &registry, &WebprobeConfig::default(), board.clone())?;

    // Watch rows change while the scan runs
    let mut updates = board.subscribe();
    let watcher = tokio::spawn(async move {
        while let Some(Ok(row)) = updates.next().await {
            println!("[Board] {} -> {}", row.name, row.state);
        }
    });

    println!("3. Running scan...");
    let report = scan.run().await;
    println!("\n{}", serde_json::to_string_pretty(&report.summary)?);

    println!("\n4. Retrying failed checks...");
    for row in board.snapshot() {
        if row.retry.is_some() {
            let retried = board.retry(&row.name).await?;
            println!("   {} retried: {}", row.name, retried);
        }
    }
    println!("   board complete: {}", board.is_complete());

    println!("\n5. Driving a single job directly...");
    let job = Job::new(
        "standalone",
        Arc::new(fetch_fn(|| async { Ok(CheckOutcome::NoResponse) })),
        Arc::new(TracingReporter),
        JobSettings::default(),
    );
    job.on_address_change(&AddressContext::for_address("203.0.113.7", vec![AddressType::Ipv4]))
        .await?;
    println!("   {} settled as {}", job.id(), job.state());

    drop(scan);
    watcher.abort();

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Checks are plain trait objects, registered at runtime");
    println!("- The board owns the status rows and retry handles");
    println!("- Jobs can be used on their own with any reporter");

    Ok(())
}
