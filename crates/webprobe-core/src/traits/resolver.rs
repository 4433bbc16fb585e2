// # Host Resolver Trait
//
// Defines the forward-lookup interface used by the host guard.
//
// ## Implementations
//
// - System resolver (getaddrinfo via tokio): `webprobe_core::guard::SystemResolver`
// - Test doubles with fixed answer sets: `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use webprobe_core::traits::HostResolver;
//
// let resolver = /* HostResolver implementation */;
// let addresses = resolver.lookup_all("example.com").await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for forward DNS lookups
///
/// # Contract
///
/// - Return **every** address in the answer set, not just the first
/// - Preserve resolver order; never sort by address family
/// - An empty answer set is `Ok(vec![])`; the guard turns it into a
///   resolution failure
///
/// The guard classifies the whole answer set, so an implementation that
/// drops answers weakens the rebinding defense.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to all of its addresses, in resolver order
    async fn lookup_all(&self, host: &str) -> Result<Vec<IpAddr>, crate::Error>;

    /// Name used in logs
    fn resolver_name(&self) -> &'static str {
        "custom"
    }
}
