// # Address Classification
//
// Pure classification of IP literals into public and non-public buckets.
//
// The rules work on the textual form the caller (or the resolver) produced,
// after lowercasing and stripping an IPv4-mapped `::ffff:` prefix. Anything
// that is neither an IPv4 nor an IPv6 literal classifies as `Private`.
//
// For IPv6 the structural ranges (fc00::/7, fe80::/10, ff00::/8,
// 2001:db8::/32) are checked on the parsed address, and the textual prefix
// rules are checked on the literal as written. An address is public only if
// it passes both.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Prefix marking an IPv4-mapped IPv6 literal
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Outcome of classifying a single address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressClassification {
    /// Globally routable
    Public,
    /// RFC 1918 space, or unrecognized syntax
    Private,
    /// Reserved ranges (0/8, CGNAT, 240/4 and up)
    Reserved,
    /// 127/8 and ::1
    Loopback,
    /// 169.254/16 and fe80::/10
    LinkLocal,
    /// 224/4 and ff00::/8
    Multicast,
    /// fc00::/7
    UniqueLocalV6,
    /// 2001:db8::/32
    DocumentationV6,
    /// 0.0.0.0 and ::
    Unspecified,
}

impl AddressClassification {
    /// Whether the guard may let traffic reach this address
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Classify an address literal
///
/// Fails closed: input that is not an IP literal is `Private`.
pub fn classify_address(literal: &str) -> AddressClassification {
    let lowered = literal.trim().to_ascii_lowercase();
    let normalized = lowered
        .strip_prefix(IPV4_MAPPED_PREFIX)
        .unwrap_or(&lowered);

    if let Ok(v4) = normalized.parse::<Ipv4Addr>() {
        return classify_ipv4(v4);
    }

    if let Ok(v6) = normalized.parse::<Ipv6Addr>() {
        return classify_ipv6(normalized, v6);
    }

    AddressClassification::Private
}

/// Classify a resolved address
///
/// Goes through the textual form so resolver answers and caller literals
/// are judged by exactly the same rules.
pub fn classify_ip(ip: IpAddr) -> AddressClassification {
    classify_address(&ip.to_string())
}

/// Shorthand for `classify_address(literal).is_public()`
pub fn is_public_address(literal: &str) -> bool {
    classify_address(literal).is_public()
}

fn classify_ipv4(ip: Ipv4Addr) -> AddressClassification {
    use AddressClassification::*;

    let [a, b, _, _] = ip.octets();
    match (a, b) {
        (0, _) if ip.is_unspecified() => Unspecified,
        (0, _) => Reserved,
        (10, _) => Private,
        (127, _) => Loopback,
        (169, 254) => LinkLocal,
        (172, 16..=31) => Private,
        (192, 168) => Private,
        (100, 64..=127) => Reserved,
        (224..=239, _) => Multicast,
        (240..=255, _) => Reserved,
        _ => Public,
    }
}

fn classify_ipv6(literal: &str, ip: Ipv6Addr) -> AddressClassification {
    use AddressClassification::*;

    // Mapped addresses written in long form, e.g. 0:0:0:0:0:ffff:a00:1
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_ipv4(v4);
    }

    if ip.is_unspecified() {
        return Unspecified;
    }
    if ip.is_loopback() {
        return Loopback;
    }

    let segments = ip.segments();
    let first = segments[0];

    if first & 0xfe00 == 0xfc00 || literal.starts_with("fc") || literal.starts_with("fd") {
        UniqueLocalV6
    } else if first & 0xffc0 == 0xfe80
        || ["fe8", "fe9", "fea", "feb"]
            .iter()
            .any(|prefix| literal.starts_with(prefix))
    {
        LinkLocal
    } else if first & 0xff00 == 0xff00 || literal.starts_with("ff") {
        Multicast
    } else if (first == 0x2001 && segments[1] == 0x0db8) || literal.starts_with("2001:db8") {
        DocumentationV6
    } else {
        Public
    }
}
