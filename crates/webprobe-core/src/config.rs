//! Configuration types for the webprobe system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::registry::CheckRegistry;

/// Main webprobe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebprobeConfig {
    /// Host guard settings
    #[serde(default)]
    pub guard: GuardConfig,

    /// Settings injected into every job
    #[serde(default)]
    pub jobs: JobSettings,

    /// Timeout and concurrency policy applied around every check
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Checks to run; empty means every registered check
    #[serde(default)]
    pub checks: Vec<CheckConfig>,

    /// Traceroute check settings
    #[serde(default)]
    pub traceroute: TracerouteConfig,

    /// HTTP check settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl WebprobeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.policy.validate()?;
        self.traceroute.validate()?;
        self.http.validate()?;

        for check in &self.checks {
            if check.name.trim().is_empty() {
                return Err(crate::Error::config("Check name cannot be empty"));
            }
        }

        Ok(())
    }

    /// Names of the checks to run, in registry order
    ///
    /// With no `checks` configured every registered check runs. Otherwise
    /// only enabled entries run, and an entry naming an unknown check is a
    /// configuration error.
    pub fn enabled_checks(&self, registry: &CheckRegistry) -> Result<Vec<String>, crate::Error> {
        if self.checks.is_empty() {
            return Ok(registry.list());
        }

        let mut names = Vec::new();
        for check in self.checks.iter().filter(|c| c.enabled) {
            if !registry.has(&check.name) {
                return Err(crate::Error::config(format!(
                    "Unknown check '{}'. Available checks: {}",
                    check.name,
                    registry.list().join(", ")
                )));
            }
            if !names.contains(&check.name) {
                names.push(check.name.clone());
            }
        }

        Ok(names)
    }
}

/// Host guard configuration
///
/// Entries extend the built-in blocklist (`localhost`, `.local`,
/// `.localhost`, `.internal`, `.lan`), which always applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Additional host names to reject
    #[serde(default)]
    pub extra_blocked_hosts: Vec<String>,

    /// Additional suffixes to reject (leading dot optional)
    #[serde(default)]
    pub extra_blocked_suffixes: Vec<String>,
}

/// Settings injected into each job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    /// Skip every fetch with the "temporarily disabled" message
    #[serde(default)]
    pub disable_everything: bool,
}

/// Policy applied around check fetches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Per-check timeout in milliseconds
    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,

    /// Maximum checks in flight at once (0 = unlimited)
    #[serde(default)]
    pub max_concurrent_checks: usize,
}

impl PolicyConfig {
    /// Validate the policy configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_timeout_ms == 0 {
            return Err(crate::Error::config("API timeout must be > 0 ms"));
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            api_timeout_ms: default_api_timeout_ms(),
            max_concurrent_checks: 0,
        }
    }
}

/// Per-check switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Registered check name (e.g. "whois")
    pub name: String,

    /// Whether this check is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl CheckConfig {
    /// Create an enabled check entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Enable or disable the check
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Traceroute check configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteConfig {
    /// Maximum TTL probed (`-m`)
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Seconds to wait per probe (`-w`)
    #[serde(default = "default_wait_secs")]
    pub wait_secs: f64,

    /// Probes per hop (`-q`)
    #[serde(default = "default_queries")]
    pub queries: u32,
}

impl TracerouteConfig {
    /// Validate the traceroute configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_hops == 0 || self.max_hops > 255 {
            return Err(crate::Error::config("Traceroute max hops must be between 1 and 255"));
        }
        if !(self.wait_secs > 0.0) {
            return Err(crate::Error::config("Traceroute wait must be > 0 seconds"));
        }
        if self.queries == 0 || self.queries > 10 {
            return Err(crate::Error::config("Traceroute queries must be between 1 and 10"));
        }
        Ok(())
    }
}

impl Default for TracerouteConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            wait_secs: default_wait_secs(),
            queries: default_queries(),
        }
    }
}

/// HTTP check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Redirects followed before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl HttpConfig {
    /// Validate the HTTP configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.user_agent.trim().is_empty() {
            return Err(crate::Error::config("HTTP user agent cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_api_timeout_ms() -> u64 {
    60_000
}

fn default_enabled() -> bool {
    true
}

fn default_max_hops() -> u32 {
    15
}

fn default_wait_secs() -> f64 {
    2.0
}

fn default_queries() -> u32 {
    1
}

fn default_user_agent() -> String {
    format!("webprobe/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    5
}
