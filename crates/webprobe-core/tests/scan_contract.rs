//! Contract Test: Scan Aggregation
//!
//! Verifies that a scan runs every enabled check for one target and that
//! checks stay isolated from each other.
//!
//! Constraints verified:
//! - Every registered check gets a row on the board
//! - Checks that do not apply to the address type are skipped, not run
//! - One failing check does not block or alter another
//! - The timeout policy turns slow checks into TimedOut
//! - Disabled checks in configuration are not run

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use webprobe_core::{
    AddressType, CheckConfig, CheckOutcome, CheckRegistry, JobBoard, JobState, Scan,
    WebprobeConfig,
};

fn registry_with(checks: &[Arc<StaticCheck>]) -> CheckRegistry {
    let registry = CheckRegistry::new();
    for check in checks {
        registry.register(check.clone());
    }
    registry
}

#[tokio::test]
async fn scan_runs_all_checks_in_isolation() {
    let ok = StaticCheck::new(
        "headers",
        vec![AddressType::Url],
        ScriptedFetch::always(CheckOutcome::Success(json!({"server": "nginx"}))),
    );
    let broken = StaticCheck::new("whois", vec![AddressType::Url], ScriptedFetch::failing("socket closed"));
    let ip_only = StaticCheck::new(
        "ports",
        vec![AddressType::Ipv4, AddressType::Ipv6],
        ScriptedFetch::always(CheckOutcome::Success(json!([]))),
    );
    let registry = registry_with(&[ok.clone(), broken.clone(), ip_only.clone()]);

    let board = Arc::new(JobBoard::new());
    let scan = Scan::new("https://example.com", &registry, &WebprobeConfig::default(), board.clone()).unwrap();
    assert_eq!(scan.address_type(), AddressType::Url);

    let report = scan.run().await;

    assert_eq!(board.status("headers").unwrap().state, JobState::Success);
    assert_eq!(board.status("whois").unwrap().state, JobState::Error);
    assert_eq!(board.status("ports").unwrap().state, JobState::Skipped);
    assert_eq!(ip_only.calls(), 0);
    assert_eq!(ok.targets(), vec!["https://example.com".to_string()]);

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.success, 1);
    assert_eq!(report.summary.error, 1);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].check, "whois");
    assert_eq!(report.failures[0].message, "socket closed");
    assert!(board.is_complete());
}

#[tokio::test]
async fn slow_checks_time_out() {
    let slow = StaticCheck::new(
        "trace-route",
        vec![AddressType::Url],
        ScriptedFetch::script(vec![(500, Step::Settle(CheckOutcome::Success(json!(1))))]),
    );
    let registry = registry_with(&[slow]);

    let mut config = WebprobeConfig::default();
    config.policy.api_timeout_ms = 20;

    let board = Arc::new(JobBoard::new());
    let report = Scan::new("example.com", &registry, &config, board.clone())
        .unwrap()
        .run()
        .await;

    let row = board.status("trace-route").unwrap();
    assert_eq!(row.state, JobState::TimedOut);
    assert!(row.message.unwrap().starts_with("Request timed-out after 20 ms"));
    assert!(row.retry.is_some());
    assert_eq!(report.summary.timed_out, 1);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn configured_checks_select_and_disable() {
    let a = StaticCheck::new("a", vec![AddressType::Url], ScriptedFetch::always(CheckOutcome::Success(json!(1))));
    let b = StaticCheck::new("b", vec![AddressType::Url], ScriptedFetch::always(CheckOutcome::Success(json!(2))));
    let registry = registry_with(&[a.clone(), b.clone()]);

    let mut config = WebprobeConfig::default();
    config.checks = vec![CheckConfig::new("a"), CheckConfig::new("b").with_enabled(false)];
    config.policy.max_concurrent_checks = 1;

    let board = Arc::new(JobBoard::new());
    let report = Scan::new("example.com", &registry, &config, board).unwrap().run().await;

    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
    assert_eq!(report.jobs.len(), 1);
}

#[tokio::test]
async fn unknown_configured_check_is_rejected() {
    let registry = CheckRegistry::new();
    let mut config = WebprobeConfig::default();
    config.checks = vec![CheckConfig::new("missing")];

    let result = Scan::new("example.com", &registry, &config, Arc::new(JobBoard::new()));
    assert!(matches!(result, Err(webprobe_core::Error::Config(_))));
}

#[tokio::test]
async fn disabled_instance_skips_everything() {
    let check = StaticCheck::new("a", vec![AddressType::Url], ScriptedFetch::always(CheckOutcome::Success(json!(1))));
    let registry = registry_with(&[check.clone()]);

    let mut config = WebprobeConfig::default();
    config.jobs.disable_everything = true;

    let board = Arc::new(JobBoard::new());
    let report = Scan::new("example.com", &registry, &config, board).unwrap().run().await;

    assert_eq!(check.calls(), 0);
    assert_eq!(report.summary.skipped, 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["addressType"], "url");
    assert_eq!(json["jobs"][0]["state"], "skipped");
}
