//! Target address classification
//!
//! Decides what kind of address the user supplied, so jobs can skip
//! themselves when a check does not apply (e.g. WHOIS against an IP).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::error::{Error, Result};

/// Kind of address supplied as a scan target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    /// A URL or bare domain with a dotted host
    Url,
    /// An IPv4 literal
    Ipv4,
    /// An IPv6 literal, bare or bracketed
    Ipv6,
    /// Nothing entered yet
    Empty,
    /// Something that is none of the above
    Invalid,
}

impl AddressType {
    /// Classify a raw target string
    pub fn classify(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        if trimmed.parse::<Ipv4Addr>().is_ok() {
            return Self::Ipv4;
        }
        if strip_brackets(trimmed).parse::<Ipv6Addr>().is_ok() {
            return Self::Ipv6;
        }

        match Url::parse(&normalize_url(trimmed)) {
            Ok(url) => match url.host() {
                Some(Host::Domain(domain)) if is_dotted_domain(domain) => Self::Url,
                Some(Host::Ipv4(_)) => Self::Ipv4,
                Some(Host::Ipv6(_)) => Self::Ipv6,
                _ => Self::Invalid,
            },
            Err(_) => Self::Invalid,
        }
    }

    /// Lowercase name, as used in configuration and reports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Empty => "empty",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address information delivered to a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressContext {
    /// The target as entered, if any
    pub address: Option<String>,
    /// Its classification, once known
    pub address_type: Option<AddressType>,
    /// Types the receiving job can run against
    pub expected_address_types: Vec<AddressType>,
}

impl AddressContext {
    /// Create a context for `address`, classifying it
    pub fn for_address(address: impl Into<String>, expected: Vec<AddressType>) -> Self {
        let address = address.into();
        let address_type = AddressType::classify(&address);
        Self {
            address: Some(address),
            address_type: Some(address_type),
            expected_address_types: expected,
        }
    }

    /// Identity used to detect changes: the address and its type
    pub fn identity(&self) -> (Option<String>, Option<AddressType>) {
        (self.address.clone(), self.address_type)
    }
}

/// Prefix `https://` unless the input already carries an HTTP scheme
pub fn normalize_url(input: &str) -> String {
    with_default_scheme(input, "https")
}

/// Prefix `{scheme}://` unless the input already carries an HTTP scheme
///
/// Bare names that merely begin with "http" (`httpbin.org`) get the prefix.
pub fn with_default_scheme(input: &str, scheme: &str) -> String {
    if has_http_scheme(input) {
        input.to_string()
    } else {
        format!("{}://{}", scheme, input)
    }
}

/// Whether `input` starts with `http://` or `https://`, ignoring case
pub fn has_http_scheme(input: &str) -> bool {
    ["http://", "https://"].iter().any(|prefix| {
        input
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Extract the host from a URL, bare domain or IP literal
///
/// Brackets around IPv6 hosts are removed.
pub fn target_host(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("Invalid URL provided"));
    }

    let bare = strip_brackets(trimmed);
    if bare.parse::<Ipv4Addr>().is_ok() || bare.parse::<Ipv6Addr>().is_ok() {
        return Ok(bare.to_ascii_lowercase());
    }

    let url = Url::parse(&normalize_url(trimmed))
        .map_err(|_| Error::invalid_input("Invalid URL provided"))?;

    url.host_str()
        .map(|host| strip_brackets(host).to_string())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| Error::invalid_input("Invalid URL provided"))
}

fn is_dotted_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.');
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(AddressType::classify(""), AddressType::Empty);
        assert_eq!(AddressType::classify("   "), AddressType::Empty);
        assert_eq!(AddressType::classify("8.8.8.8"), AddressType::Ipv4);
        assert_eq!(AddressType::classify("2606:4700:4700::1111"), AddressType::Ipv6);
        assert_eq!(AddressType::classify("[::1]"), AddressType::Ipv6);
        assert_eq!(AddressType::classify("example.com"), AddressType::Url);
        assert_eq!(AddressType::classify("https://example.com/path?q=1"), AddressType::Url);
        assert_eq!(AddressType::classify("http://1.2.3.4:8080/"), AddressType::Ipv4);
        assert_eq!(AddressType::classify("intranet"), AddressType::Invalid);
        assert_eq!(AddressType::classify("not a url"), AddressType::Invalid);
    }

    #[test]
    fn test_target_host() {
        assert_eq!(target_host("https://Example.com/a").unwrap(), "example.com");
        assert_eq!(target_host("example.com").unwrap(), "example.com");
        assert_eq!(target_host("http://[2001:db8::1]:8080/").unwrap(), "2001:db8::1");
        assert_eq!(target_host("[fe80::1]").unwrap(), "fe80::1");
        assert_eq!(target_host("1.2.3.4").unwrap(), "1.2.3.4");
        assert!(target_host("").is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://example.com"), "HTTPS://example.com");
        assert_eq!(normalize_url("httpbin.org"), "https://httpbin.org");
        assert_eq!(with_default_scheme("httpwatch.com/x", "http"), "http://httpwatch.com/x");
    }

    #[test]
    fn test_names_starting_with_http() {
        assert_eq!(AddressType::classify("httpbin.org"), AddressType::Url);
        assert_eq!(AddressType::classify("https.example.com"), AddressType::Url);
        assert_eq!(target_host("httpbin.org").unwrap(), "httpbin.org");
        assert_eq!(target_host("httpwatch.com/path").unwrap(), "httpwatch.com");
        assert!(!has_http_scheme("http:/broken"));
        assert!(!has_http_scheme("ht"));
    }

    #[test]
    fn test_context_identity() {
        let ctx = AddressContext::for_address("example.com", vec![AddressType::Url]);
        assert_eq!(
            ctx.identity(),
            (Some("example.com".to_string()), Some(AddressType::Url))
        );
    }
}
