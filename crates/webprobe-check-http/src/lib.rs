// # HTTP Checks
//
// Checks that fetch the target over HTTP and report on the response.
//
// - `headers`: the response headers as a JSON object
// - `http-security`: booleans for the common security headers
//
// ## Security
//
// Targets come from users. Each check passes the target host through the
// `HostGuard` before sending anything, and the shared client resolves
// every name (including redirect targets) through the guard as well, so a
// connection can only ever reach a public address.
//
// The guarded client is public so other check crates can make outbound
// HTTP requests under the same rules.
//
// ## Usage
//
// ```rust,ignore
// let registry = CheckRegistry::new();
// webprobe_check_http::register(&registry, HostGuard::system(), &HttpConfig::default())?;
// ```

mod client;
mod headers;
mod security;

pub use client::{guarded_client, guarded_url};
pub use headers::{HeadersCheck, headers_to_json};
pub use security::{HttpSecurityCheck, security_flags};

use std::sync::Arc;
use webprobe_core::config::HttpConfig;
use webprobe_core::guard::HostGuard;
use webprobe_core::{CheckRegistry, Result};

/// Register every HTTP check
///
/// # Errors
///
/// Fails if an HTTP client cannot be built (e.g. no TLS backend).
pub fn register(registry: &CheckRegistry, guard: HostGuard, config: &HttpConfig) -> Result<()> {
    registry.register(Arc::new(HeadersCheck::new(guard.clone(), config)?));
    registry.register(Arc::new(HttpSecurityCheck::new(guard, config)?));
    Ok(())
}
