//! Host guard
//!
//! The guard validates a caller-supplied host and resolves it to a public,
//! routable address before any check is allowed to open a socket or spawn
//! a subprocess against it.
//!
//! ## Algorithm
//!
//! 1. Lowercase and trim the input; reject empty input
//! 2. Reject blocked names (`localhost`, `*.local`, `*.localhost`,
//!    `*.internal`, `*.lan`) without touching DNS
//! 3. IP literals are classified directly and returned as-is
//! 4. Names are resolved to their **full** answer set
//! 5. Any non-public answer rejects the host; otherwise the first answer is
//!    returned
//!
//! Step 5 is deliberately asymmetric: the returned address is the first
//! answer, but the decision covers all of them. A name that answers with
//! one public and one private address is rejected.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use webprobe_core::guard::HostGuard;
//!
//! # async fn demo() -> Result<(), webprobe_core::guard::GuardError> {
//! let guard = HostGuard::system();
//! let resolved = guard.resolve_public_host("example.com").await?;
//! println!("{} -> {}", resolved.host, resolved.address);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod resolver;

pub use classify::{AddressClassification, classify_address, classify_ip, is_public_address};
pub use resolver::SystemResolver;

use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::traits::HostResolver;

/// Host names rejected outright
pub const BLOCKED_HOSTS: &[&str] = &["localhost"];

/// Host suffixes rejected outright
pub const BLOCKED_HOST_SUFFIXES: &[&str] = &[".local", ".localhost", ".internal", ".lan"];

/// Reasons the guard refuses a host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Empty (or whitespace-only) input
    #[error("Invalid host provided")]
    InvalidHost,

    /// Host matched the blocklist
    #[error("Host is not allowed: {0}")]
    HostNotAllowed(String),

    /// Host is, or resolves to, a non-public address
    #[error("Host resolves to a private or reserved address: {host} ({address})")]
    PrivateAddress {
        /// The host as supplied
        host: String,
        /// The offending address
        address: String,
    },

    /// DNS produced no usable answer
    #[error("Unable to resolve host {host}: {reason}")]
    ResolutionFailure {
        /// The host as supplied
        host: String,
        /// Resolver error, or a note that the answer set was empty
        reason: String,
    },
}

/// A host confirmed to point at public address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedHost {
    /// The normalized (trimmed, lowercased) input
    pub host: String,
    /// First address of the answer set, or the literal itself
    pub address: IpAddr,
}

/// Result of the synchronous screening stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screened {
    /// The input was a public IP literal; no lookup needed
    Literal(ResolvedHost),
    /// The input is a name that still has to be resolved
    Name(String),
}

/// SSRF gate for outbound checks
///
/// Cheap to clone; clones share the resolver.
#[derive(Clone)]
pub struct HostGuard {
    resolver: Arc<dyn HostResolver>,
    blocked_hosts: Vec<String>,
    blocked_suffixes: Vec<String>,
}

impl std::fmt::Debug for HostGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostGuard")
            .field("resolver", &self.resolver.resolver_name())
            .field("blocked_hosts", &self.blocked_hosts)
            .field("blocked_suffixes", &self.blocked_suffixes)
            .finish()
    }
}

impl HostGuard {
    /// Create a guard with the built-in blocklist and the given resolver
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            resolver,
            blocked_hosts: BLOCKED_HOSTS.iter().map(|h| h.to_string()).collect(),
            blocked_suffixes: BLOCKED_HOST_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a guard backed by the system resolver
    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver::new()))
    }

    /// Create a guard from configuration
    ///
    /// Configured entries extend the built-in blocklist; they never replace it.
    pub fn from_config(config: &GuardConfig, resolver: Arc<dyn HostResolver>) -> Self {
        let mut guard = Self::new(resolver);

        for host in &config.extra_blocked_hosts {
            let host = host.trim().to_ascii_lowercase();
            if !host.is_empty() && !guard.blocked_hosts.contains(&host) {
                guard.blocked_hosts.push(host);
            }
        }

        for suffix in &config.extra_blocked_suffixes {
            let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
            if suffix.is_empty() {
                continue;
            }
            let suffix = format!(".{}", suffix);
            if !guard.blocked_suffixes.contains(&suffix) {
                guard.blocked_suffixes.push(suffix);
            }
        }

        guard
    }

    /// Synchronous part of the guard (steps 1-3)
    ///
    /// Usable where async DNS is not available, e.g. when vetting redirect
    /// targets. A `Screened::Name` still has to go through
    /// [`HostGuard::resolve_public_host`] before it is safe to contact.
    pub fn screen(&self, host: &str) -> Result<Screened, GuardError> {
        let normalized = host.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(GuardError::InvalidHost);
        }

        if self.is_blocked(&normalized) {
            debug!("Rejecting blocked host {}", normalized);
            return Err(GuardError::HostNotAllowed(normalized));
        }

        let literal = strip_brackets(&normalized);
        if let Ok(address) = literal.parse::<IpAddr>() {
            if !classify_address(literal).is_public() {
                warn!("Rejecting non-public literal {}", literal);
                return Err(GuardError::PrivateAddress {
                    address: literal.to_string(),
                    host: literal.to_string(),
                });
            }
            return Ok(Screened::Literal(ResolvedHost {
                host: literal.to_string(),
                address,
            }));
        }

        Ok(Screened::Name(normalized))
    }

    /// Validate `host` and resolve it to a public address
    ///
    /// # Errors
    ///
    /// - `InvalidHost`: empty input
    /// - `HostNotAllowed`: blocklisted name (no DNS lookup performed)
    /// - `PrivateAddress`: non-public literal, or any non-public answer
    /// - `ResolutionFailure`: lookup error or empty answer set
    pub async fn resolve_public_host(&self, host: &str) -> Result<ResolvedHost, GuardError> {
        let name = match self.screen(host)? {
            Screened::Literal(resolved) => return Ok(resolved),
            Screened::Name(name) => name,
        };

        let addresses = self.resolver.lookup_all(&name).await.map_err(|e| {
            GuardError::ResolutionFailure {
                host: name.clone(),
                reason: e.to_string(),
            }
        })?;

        let Some(first) = addresses.first().copied() else {
            return Err(GuardError::ResolutionFailure {
                host: name,
                reason: "no addresses returned".to_string(),
            });
        };

        if let Some(private) = addresses.iter().find(|ip| !classify_ip(**ip).is_public()) {
            warn!(
                "Host {} resolves to non-public address {} ({} answers)",
                name,
                private,
                addresses.len()
            );
            return Err(GuardError::PrivateAddress {
                host: name,
                address: private.to_string(),
            });
        }

        debug!(
            "Host {} resolved via {} to {} ({} answers)",
            name,
            self.resolver.resolver_name(),
            first,
            addresses.len()
        );

        Ok(ResolvedHost {
            host: name,
            address: first,
        })
    }

    fn is_blocked(&self, host: &str) -> bool {
        // "localhost." and "localhost" are the same name
        let host = host.strip_suffix('.').unwrap_or(host);

        self.blocked_hosts.iter().any(|blocked| blocked == host)
            || self
                .blocked_suffixes
                .iter()
                .any(|suffix| host.ends_with(suffix.as_str()))
    }
}

impl Default for HostGuard {
    fn default() -> Self {
        Self::system()
    }
}

/// Validate and resolve `host` with the system resolver and default blocklist
pub async fn resolve_public_host(host: &str) -> Result<ResolvedHost, GuardError> {
    HostGuard::system().resolve_public_host(host).await
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
