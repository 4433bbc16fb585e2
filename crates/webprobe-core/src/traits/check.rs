// # Check Traits
//
// Defines the collaborator seam between the job orchestrator and the
// things that actually go and fetch data.
//
// - `FetchRequest`: zero-argument fetch driven by a `Job`
// - `Check`: named, target-taking check registered in the `CheckRegistry`
// - `CheckFetch`: binds a `Check` to one target, producing a `FetchRequest`
//
// Every collaborator settles with a `CheckOutcome` or an `Error`. JSON
// producing collaborators go through `CheckOutcome::from_json` exactly once.
//
// ## Usage
//
// ```rust,ignore
// use webprobe_core::traits::{fetch_fn, CheckOutcome};
//
// let fetch = fetch_fn(|| async { Ok(CheckOutcome::Success(serde_json::json!({"ok": true}))) });
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::address::AddressType;
use crate::error::Result;

/// Tagged settlement of a single fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum CheckOutcome {
    /// The check produced data
    Success(Value),

    /// The check produced nothing at all
    NoResponse,

    /// The check reported an error message
    Failed(String),

    /// The hosting platform failed before the check could answer
    PlatformFailure {
        /// Platform error class
        error_type: String,
        /// Platform error text
        error_message: String,
    },

    /// The check decided there is nothing to report for this target
    Skipped(String),
}

impl CheckOutcome {
    /// Normalize a JSON-shaped response
    ///
    /// Falsy values are `NoResponse`. For objects the precedence is
    /// `error`, then `errorType` together with `errorMessage`, then
    /// `skipped`; only truthy fields count. Anything else is `Success`.
    pub fn from_json(value: Value) -> Self {
        if !is_truthy(&value) {
            return Self::NoResponse;
        }

        if let Value::Object(map) = &value {
            let field = |key: &str| map.get(key).filter(|v| is_truthy(v)).map(text_of);

            if let Some(error) = field("error") {
                return Self::Failed(error);
            }

            if let (Some(error_type), Some(error_message)) =
                (field("errorType"), field("errorMessage"))
            {
                return Self::PlatformFailure {
                    error_type,
                    error_message,
                };
            }

            if let Some(reason) = field("skipped") {
                return Self::Skipped(reason);
            }
        }

        Self::Success(value)
    }

    /// Whether this outcome is `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// JavaScript-style truthiness of a JSON value
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else,
/// including empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Zero-argument fetch driven by a job
///
/// Each call performs one attempt and settles exactly once.
#[async_trait]
pub trait FetchRequest: Send + Sync {
    /// Perform one fetch attempt
    async fn fetch(&self) -> Result<CheckOutcome>;
}

#[async_trait]
impl<T: FetchRequest + ?Sized> FetchRequest for Arc<T> {
    async fn fetch(&self) -> Result<CheckOutcome> {
        (**self).fetch().await
    }
}

/// `FetchRequest` backed by a closure returning a future
pub struct FnFetch<F>(F);

/// Wrap a closure as a `FetchRequest`
pub fn fetch_fn<F, Fut>(f: F) -> FnFetch<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckOutcome>> + Send + 'static,
{
    FnFetch(f)
}

#[async_trait]
impl<F, Fut> FetchRequest for FnFetch<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<CheckOutcome>> + Send + 'static,
{
    async fn fetch(&self) -> Result<CheckOutcome> {
        (self.0)().await
    }
}

/// A named diagnostic check
///
/// # Contract
///
/// - Implementations that open sockets or spawn processes against the
///   target **must** pass it through the host guard first and fail if the
///   guard rejects it
/// - Implementations must be stateless across targets; one instance serves
///   every scan
#[async_trait]
pub trait Check: Send + Sync {
    /// Registry name, also used as the job id
    fn name(&self) -> &str;

    /// Address types this check can run against
    fn expected_address_types(&self) -> Vec<AddressType> {
        vec![AddressType::Url]
    }

    /// Run the check against `target`
    async fn run(&self, target: &str) -> Result<CheckOutcome>;
}

/// A `Check` bound to a single target
#[derive(Clone)]
pub struct CheckFetch {
    check: Arc<dyn Check>,
    target: String,
}

impl CheckFetch {
    /// Bind `check` to `target`
    pub fn new(check: Arc<dyn Check>, target: impl Into<String>) -> Self {
        Self {
            check,
            target: target.into(),
        }
    }
}

#[async_trait]
impl FetchRequest for CheckFetch {
    async fn fetch(&self) -> Result<CheckOutcome> {
        self.check.run(&self.target).await
    }
}
