//! Guarded HTTP client
//!
//! Every name the client resolves, on the first request and on each
//! redirect hop, goes through the host guard. IP-literal URLs never reach
//! a resolver, so the redirect policy screens every hop as well.

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use webprobe_core::address::with_default_scheme;
use webprobe_core::config::HttpConfig;
use webprobe_core::guard::{GuardError, HostGuard};
use webprobe_core::{Error, Result};

/// Hard cap on a single request, below the scan's own timeout policy
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest resolver that only hands out guarded public addresses
struct GuardedResolve {
    guard: HostGuard,
}

impl Resolve for GuardedResolve {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.guard.clone();
        Box::pin(async move {
            let resolved = guard.resolve_public_host(name.as_str()).await?;
            debug!("Connecting to {} via {}", resolved.host, resolved.address);
            // port 0 is replaced with the URL's port by the connector
            let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(resolved.address, 0)));
            Ok(addrs)
        })
    }
}

/// Build a client whose connections are confined to public addresses
///
/// Proxies are never used, environment ones included: a proxy would
/// resolve names itself and bypass the guarded resolver.
pub fn guarded_client(guard: &HostGuard, config: &HttpConfig) -> Result<reqwest::Client> {
    let redirect_guard = guard.clone();
    let max_redirects = config.max_redirects;

    let policy = Policy::custom(move |attempt| {
        match check_redirect(&redirect_guard, attempt.url(), attempt.previous().len(), max_redirects) {
            Ok(()) => attempt.follow(),
            Err(reason) => {
                warn!("Refusing redirect to {}: {}", attempt.url(), reason);
                attempt.error(reason)
            }
        }
    });

    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(policy)
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .no_proxy()
        .dns_resolver(Arc::new(GuardedResolve {
            guard: guard.clone(),
        }))
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Whether a redirect to `next` may be followed after `hops` redirects
///
/// Literal hosts are judged here; names are judged again by the guarded
/// resolver when the client connects.
pub(crate) fn check_redirect(
    guard: &HostGuard,
    next: &Url,
    hops: usize,
    max_redirects: usize,
) -> std::result::Result<(), String> {
    if hops >= max_redirects {
        return Err(format!("Too many redirects (limit {})", max_redirects));
    }

    match next.host_str() {
        Some(host) => guard.screen(host).map(|_| ()).map_err(|e| e.to_string()),
        None => Err(GuardError::InvalidHost.to_string()),
    }
}

/// Parse `target` and check its host against the guard
///
/// `default_scheme` applies when the target has no `http://` or `https://`
/// prefix. Requests to the returned URL must use [`guarded_client`].
pub async fn guarded_url(guard: &HostGuard, target: &str, default_scheme: &str) -> Result<Url> {
    let full = with_default_scheme(target.trim(), default_scheme);

    let url = Url::parse(&full).map_err(|_| Error::invalid_input("Invalid URL provided"))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::invalid_input("Invalid URL provided"))?;

    guard.resolve_public_host(host).await?;
    Ok(url)
}

/// Display text of a reqwest error including its sources
pub(crate) fn error_text(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
