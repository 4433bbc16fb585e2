//! Contract Test: Liveness and Races
//!
//! Verifies which settlements are allowed to land.
//!
//! Constraints verified:
//! - A settlement that arrives after the job is dropped is discarded
//! - A settlement for a superseded address is discarded
//! - A job whose fetch is superseded by an unset or empty context returns
//!   to idle instead of staying in loading
//! - Retry handles become no-ops once the job is gone
//! - A manual retry racing an automatic fetch is last-write-wins

mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use webprobe_core::{AddressContext, AddressType, CheckOutcome, Job, JobBoard, JobSettings, JobState};

#[tokio::test]
async fn settlement_after_drop_is_discarded() {
    let fetch = ScriptedFetch::script(vec![(50, Step::Settle(CheckOutcome::Success(json!(1))))]);
    let reporter = RecordingReporter::new();
    let job = Job::new("whois", fetch.clone(), reporter.clone(), JobSettings::default());

    let pending = tokio::spawn(job.on_address_change(&url_context("example.com")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(job);

    pending.await.unwrap().unwrap();

    assert_eq!(fetch.calls(), 1);
    assert_eq!(reporter.states(), vec![JobState::Loading]);
}

#[tokio::test]
async fn superseded_address_settlement_is_discarded() {
    let fetch = ScriptedFetch::script(vec![
        (60, Step::Settle(CheckOutcome::Success(json!("old")))),
        (0, Step::Settle(CheckOutcome::Success(json!("new")))),
    ]);
    let reporter = RecordingReporter::new();
    let job = Job::new("whois", fetch.clone(), reporter.clone(), JobSettings::default());

    let old = tokio::spawn(job.on_address_change(&url_context("old.example")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    job.on_address_change(&url_context("new.example")).await.unwrap();
    old.await.unwrap().unwrap();

    assert_eq!(job.result(), Some(json!("new")));
    let successes: Vec<_> = reporter
        .updates()
        .into_iter()
        .filter(|u| u.state == JobState::Success)
        .collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].data, Some(json!("new")));
}

#[tokio::test]
async fn retry_after_drop_is_a_no_op() {
    let fetch = ScriptedFetch::always(CheckOutcome::Failed("down".into()));
    let reporter = RecordingReporter::new();
    let job = Job::new("whois", fetch.clone(), reporter.clone(), JobSettings::default());

    job.on_address_change(&url_context("example.com")).await.unwrap();
    let handle = job.retry_handle();
    drop(job);

    handle.retry(None).await.unwrap();

    assert_eq!(fetch.calls(), 1);
    assert!(!handle.is_live());
}

#[tokio::test]
async fn retry_racing_auto_fetch_is_last_write_wins() {
    // auto fetch is slow, the retry is fast: the auto fetch settles last and wins
    let fetch = ScriptedFetch::script(vec![
        (60, Step::Settle(CheckOutcome::Success(json!("auto")))),
        (0, Step::Settle(CheckOutcome::Failed("retry failed".into()))),
    ]);
    let reporter = RecordingReporter::new();
    let job = Job::new("whois", fetch.clone(), reporter.clone(), JobSettings::default());

    let auto = tokio::spawn(job.on_address_change(&url_context("example.com")));
    tokio::time::sleep(Duration::from_millis(10)).await;

    job.reset(None).await.unwrap();
    assert_eq!(job.state(), JobState::Error);

    auto.await.unwrap().unwrap();

    assert_eq!(fetch.calls(), 2);
    assert_eq!(job.state(), JobState::Success);
    assert_eq!(job.result(), Some(json!("auto")));
    assert_eq!(
        reporter.states(),
        vec![
            JobState::Loading,
            JobState::Loading,
            JobState::Error,
            JobState::Success,
        ]
    );
}

async fn supersede_with(context: AddressContext) -> (Job, std::sync::Arc<RecordingReporter>) {
    let fetch = ScriptedFetch::script(vec![(50, Step::Settle(CheckOutcome::Success(json!(1))))]);
    let reporter = RecordingReporter::new();
    let job = Job::new("whois", fetch.clone(), reporter.clone(), JobSettings::default());

    let pending = tokio::spawn(job.on_address_change(&url_context("example.com")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    job.on_address_change(&context).await.unwrap();
    pending.await.unwrap().unwrap();

    assert_eq!(fetch.calls(), 1);
    (job, reporter)
}

#[tokio::test]
async fn unset_context_during_fetch_returns_to_idle() {
    let (job, reporter) = supersede_with(AddressContext::default()).await;

    assert_eq!(job.state(), JobState::Idle);
    assert_eq!(job.result(), None);
    assert_eq!(reporter.states(), vec![JobState::Loading, JobState::Idle]);
}

#[tokio::test]
async fn empty_sentinel_during_fetch_returns_to_idle() {
    let empty = AddressContext {
        address: Some(" ".to_string()),
        address_type: Some(AddressType::Empty),
        expected_address_types: vec![AddressType::Url],
    };
    let (job, reporter) = supersede_with(empty).await;

    assert_eq!(job.state(), JobState::Idle);
    // still silent: no skip is reported
    assert_eq!(reporter.states(), vec![JobState::Loading, JobState::Idle]);
}

#[tokio::test]
async fn board_row_leaves_loading_when_fetch_is_superseded() {
    let fetch = ScriptedFetch::script(vec![(50, Step::Settle(CheckOutcome::Success(json!(1))))]);
    let board = std::sync::Arc::new(JobBoard::with_jobs(["whois"]));
    let job = Job::new("whois", fetch, board.clone(), JobSettings::default());

    let pending = tokio::spawn(job.on_address_change(&url_context("example.com")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(board.summary().loading, 1);

    job.on_address_change(&AddressContext::default()).await.unwrap();
    pending.await.unwrap().unwrap();

    assert_eq!(board.status("whois").unwrap().state, JobState::Idle);
    assert_eq!(board.summary().loading, 0);
}
