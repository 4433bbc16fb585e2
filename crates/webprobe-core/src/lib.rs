// # webprobe-core
//
// Core library for the webprobe website-diagnostics aggregator.
//
// ## Architecture Overview
//
// A target host fans out to many independent checks (WHOIS, TXT records,
// HTTP headers, traceroute, ...). This library provides:
// - **HostGuard**: SSRF gate every outbound check passes its host through
// - **Job**: per-check lifecycle controller (fetch, classify, report, retry)
// - **JobBoard**: parent registry of job statuses and retry actions
// - **CheckRegistry**: plugin-based registry of checks
// - **Scan**: runs every enabled check for one target
//
// ## Design Principles
//
// 1. **Fail Closed**: anything the guard cannot classify is treated as private
// 2. **Tagged Outcomes**: collaborators settle with a `CheckOutcome`, never
//    with ad-hoc error shapes
// 3. **Plugin-Based**: checks are registered dynamically, no hard-coded list
// 4. **Library-First**: the runner binary is a thin shim over this crate
// 5. **Isolation**: one job's failure never affects another

pub mod address;
pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod policy;
pub mod registry;
pub mod scan;
pub mod traits;

// Re-export core types for convenience
pub use address::{AddressContext, AddressType};
pub use board::{BoardSummary, JobBoard, JobStatus};
pub use config::{CheckConfig, GuardConfig, HttpConfig, JobSettings, PolicyConfig, TracerouteConfig, WebprobeConfig};
pub use engine::{Job, JobId, JobSnapshot, JobState, RetryHandle};
pub use error::{Error, Result};
pub use guard::{GuardError, HostGuard, ResolvedHost, resolve_public_host};
pub use registry::CheckRegistry;
pub use scan::{Scan, ScanFailure, ScanReport};
pub use traits::{Check, CheckOutcome, FetchRequest, HostResolver, JobReporter, JobUpdate};
