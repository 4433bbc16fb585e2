// # System Resolver
//
// HostResolver backed by the operating system resolver (getaddrinfo),
// through `tokio::net::lookup_host`.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::traits::HostResolver;
use crate::Error;

/// Resolver using the platform's getaddrinfo
///
/// Addresses come back in the order the platform returned them. Duplicates
/// (one per socket type on some platforms) are collapsed, keeping the first
/// occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Create a new system resolver
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup_all(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let answers = tokio::net::lookup_host((host, 0)).await?;

        let mut addresses: Vec<IpAddr> = Vec::new();
        for answer in answers {
            let ip = answer.ip();
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }

        Ok(addresses)
    }

    fn resolver_name(&self) -> &'static str {
        "system"
    }
}
