//! Core traits for the webprobe system
//!
//! This module defines the abstract interfaces that collaborators implement.
//!
//! - [`HostResolver`]: Forward DNS lookups for the host guard
//! - [`FetchRequest`] / [`Check`]: Fetch data for a job
//! - [`JobReporter`]: Receive job state transitions

pub mod check;
pub mod reporter;
pub mod resolver;

pub use check::{Check, CheckFetch, CheckOutcome, FetchRequest, FnFetch, fetch_fn, is_truthy};
pub use reporter::{JobReporter, JobUpdate, NoticeKind, ProgressNotice, TracingReporter};
pub use resolver::HostResolver;
