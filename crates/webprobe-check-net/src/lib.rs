// # Network Checks
//
// Checks that look at the target from the network side rather than over
// HTTP.
//
// - `trace-route`: hops to the target, via the system `traceroute`
// - `whois`: the domain's registration record from InterNIC, plus the
//   RDAP record when the bootstrap service answers
// - `txt-records`: the domain's TXT records
//
// `trace-route` needs a `traceroute` binary on `PATH`. Only it contacts
// the target, and it is handed the guarded address rather than the name.

mod traceroute;
mod txt;
mod whois;

pub use traceroute::{TracerouteCheck, parse_traceroute};
pub use txt::{TxtRecordsCheck, parse_txt_chunks};
pub use whois::{INTERNIC_SERVER, RDAP_BASE_URL, WhoisCheck, parse_whois, registrable_domain};

use std::sync::Arc;
use webprobe_core::config::{HttpConfig, TracerouteConfig};
use webprobe_core::{CheckRegistry, Result};
use webprobe_core::guard::HostGuard;

/// Register every network check
pub fn register(
    registry: &CheckRegistry,
    guard: HostGuard,
    traceroute: &TracerouteConfig,
    http: &HttpConfig,
) -> Result<()> {
    registry.register(Arc::new(TracerouteCheck::new(guard.clone(), traceroute.clone())));
    registry.register(Arc::new(WhoisCheck::new(guard.clone(), http)?));
    registry.register(Arc::new(TxtRecordsCheck::new(guard)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register() {
        let registry = CheckRegistry::new();
        register(
            &registry,
            HostGuard::system(),
            &TracerouteConfig::default(),
            &HttpConfig::default(),
        )
        .unwrap();

        assert_eq!(registry.list(), vec!["trace-route", "txt-records", "whois"]);
    }
}
