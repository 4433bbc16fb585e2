//! Plugin-based check registry
//!
//! Checks register themselves by name at startup, so the scan builds jobs
//! from configuration instead of a hard-coded list.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use webprobe_core::registry::CheckRegistry;
//!
//! let registry = CheckRegistry::new();
//! webprobe_check_http::register(&registry, guard.clone(), &config.http)?;
//!
//! let whois = registry.get("whois")?;
//! ```
//!
//! ## Registration
//!
//! Check crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &CheckRegistry, guard: HostGuard, http: &HttpConfig) -> Result<()> {
//!     registry.register(Arc::new(WhoisCheck::new(guard, http)?));
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::traits::Check;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Registry of available checks, keyed by [`Check::name`]
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct CheckRegistry {
    checks: RwLock<HashMap<String, Arc<dyn Check>>>,
}

impl CheckRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check under its own name
    ///
    /// A later registration with the same name replaces the earlier one.
    pub fn register(&self, check: Arc<dyn Check>) {
        let name = check.name().to_string();
        debug!("Registering check {}", name);
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        checks.insert(name, check);
    }

    /// Look up a check
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn Check>)`: The registered check
    /// - `Err(Error::Config)`: If no check has that name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Check>> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        checks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown check: {}", name)))
    }

    /// Check if a name is registered
    pub fn has(&self, name: &str) -> bool {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        checks.contains_key(name)
    }

    /// List registered check names, sorted
    pub fn list(&self) -> Vec<String> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = checks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered checks
    pub fn len(&self) -> usize {
        self.checks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no checks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.list())
            .finish()
    }
}
