use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use serde_json::{Map, Value};
use tracing::debug;
use webprobe_core::address::target_host;
use webprobe_core::guard::{HostGuard, Screened};
use webprobe_core::{Check, CheckOutcome, Error, Result};

/// TXT records published for the target's name, as `{key: value}`
pub struct TxtRecordsCheck {
    guard: HostGuard,
    resolver: TokioAsyncResolver,
}

impl TxtRecordsCheck {
    /// Registry name
    pub const NAME: &'static str = "txt-records";

    pub fn new(guard: HostGuard) -> Self {
        Self {
            guard,
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

#[async_trait]
impl Check for TxtRecordsCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        let host = target_host(target)?;
        let name = match self.guard.screen(&host)? {
            Screened::Name(name) => name,
            Screened::Literal(_) => {
                return Ok(CheckOutcome::Skipped(
                    "TXT records need a domain name".to_string(),
                ));
            }
        };

        debug!("Looking up TXT records for {}", name);

        let lookup = match self.resolver.txt_lookup(name.as_str()).await {
            Ok(lookup) => lookup,
            Err(e) => {
                if let ResolveErrorKind::NoRecordsFound { .. } = e.kind() {
                    return Ok(CheckOutcome::Skipped(format!("No TXT records found for {}", name)));
                }
                return Err(Error::check(Self::NAME, e.to_string()));
            }
        };

        let chunks = lookup
            .iter()
            .flat_map(|txt| txt.txt_data().iter())
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned());

        Ok(CheckOutcome::Success(Value::Object(parse_txt_chunks(chunks))))
    }
}

/// Split each TXT string on its first `=`
///
/// Strings with an empty key are dropped. A string without `=` becomes a
/// key with an empty value. Later duplicates win.
pub fn parse_txt_chunks(chunks: impl IntoIterator<Item = String>) -> Map<String, Value> {
    let mut records = Map::new();
    for chunk in chunks {
        let (key, value) = chunk.split_once('=').unwrap_or((chunk.as_str(), ""));
        if key.is_empty() {
            continue;
        }
        records.insert(key.to_string(), Value::String(value.to_string()));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_txt_chunks() {
        let chunks = [
            "v=spf1 include:_spf.example.com ~all",
            "google-site-verification=abc=def",
            "=orphan",
            "plain",
        ]
        .into_iter()
        .map(String::from);

        assert_eq!(
            Value::Object(parse_txt_chunks(chunks)),
            json!({
                "v": "spf1 include:_spf.example.com ~all",
                "google-site-verification": "abc=def",
                "plain": "",
            })
        );
    }

    #[tokio::test]
    async fn test_ip_targets_are_skipped() {
        let check = TxtRecordsCheck::new(HostGuard::system());
        assert!(matches!(
            check.run("1.1.1.1").await.unwrap(),
            CheckOutcome::Skipped(_)
        ));
    }

    #[tokio::test]
    async fn test_internal_names_are_refused() {
        let check = TxtRecordsCheck::new(HostGuard::system());
        assert!(matches!(
            check.run("corp.internal").await.unwrap_err(),
            Error::Guard(_)
        ));
    }
}
