use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use tracing::debug;
use webprobe_core::config::HttpConfig;
use webprobe_core::guard::HostGuard;
use webprobe_core::{Check, CheckOutcome, Result};

use crate::client::{guarded_client, error_text, guarded_url};

/// Response headers of the target
///
/// Any status is accepted; only transport failures settle as `Failed`.
pub struct HeadersCheck {
    guard: HostGuard,
    client: reqwest::Client,
}

impl HeadersCheck {
    /// Registry name
    pub const NAME: &'static str = "headers";

    /// Create the check with its own guarded client
    pub fn new(guard: HostGuard, config: &HttpConfig) -> Result<Self> {
        let client = guarded_client(&guard, config)?;
        Ok(Self { guard, client })
    }
}

#[async_trait]
impl Check for HeadersCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        let url = guarded_url(&self.guard, target, "https").await?;
        debug!("Fetching headers of {}", url);

        match self.client.get(url).send().await {
            Ok(response) => Ok(CheckOutcome::Success(headers_to_json(response.headers()))),
            Err(e) => Ok(CheckOutcome::Failed(error_text(&e))),
        }
    }
}

/// Header map as a JSON object; repeated headers are joined with ", "
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut object = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        object.insert(name.as_str().to_string(), Value::String(joined));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SET_COOKIE, SERVER};
    use serde_json::json;
    use webprobe_core::Error;

    #[test]
    fn test_headers_to_json_joins_duplicates() {
        let mut headers = HeaderMap::new();
        headers.insert(SERVER, HeaderValue::from_static("nginx"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));

        assert_eq!(
            headers_to_json(&headers),
            json!({"server": "nginx", "set-cookie": "a=1, b=2"})
        );
    }

    #[tokio::test]
    async fn test_private_targets_are_refused() {
        let check = HeadersCheck::new(HostGuard::system(), &HttpConfig::default()).unwrap();
        let err = check.run("http://192.168.1.1/").await.unwrap_err();
        assert!(matches!(err, Error::Guard(_)));
    }
}
