use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::debug;
use webprobe_core::config::HttpConfig;
use webprobe_core::guard::HostGuard;
use webprobe_core::{Check, CheckOutcome, Result};

use crate::client::{guarded_client, error_text, guarded_url};

/// Presence of the common security headers
///
/// Targets without a scheme are fetched over plain `http`. Non-2xx
/// responses settle as `Failed`.
pub struct HttpSecurityCheck {
    guard: HostGuard,
    client: reqwest::Client,
}

impl HttpSecurityCheck {
    /// Registry name
    pub const NAME: &'static str = "http-security";

    /// Create the check with its own guarded client
    pub fn new(guard: HostGuard, config: &HttpConfig) -> Result<Self> {
        let client = guarded_client(&guard, config)?;
        Ok(Self { guard, client })
    }
}

#[async_trait]
impl Check for HttpSecurityCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        let url = guarded_url(&self.guard, target, "http").await?;
        debug!("Checking security headers of {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(CheckOutcome::Failed(error_text(&e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(CheckOutcome::Failed(format!(
                "Request failed with status code {}",
                status.as_u16()
            )));
        }

        Ok(CheckOutcome::Success(security_flags(response.headers())))
    }
}

/// Which security headers are present and non-empty
pub fn security_flags(headers: &HeaderMap) -> Value {
    let present = |name: &str| headers.get(name).is_some_and(|value| !value.is_empty());

    json!({
        "strictTransportPolicy": present("strict-transport-security"),
        "xFrameOptions": present("x-frame-options"),
        "xContentTypeOptions": present("x-content-type-options"),
        "xXSSProtection": present("x-xss-protection"),
        "contentSecurityPolicy": present("content-security-policy"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_security_flags() {
        let mut headers = HeaderMap::new();
        headers.insert("strict-transport-security", HeaderValue::from_static("max-age=63072000"));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.insert("x-xss-protection", HeaderValue::from_static(""));

        assert_eq!(
            security_flags(&headers),
            json!({
                "strictTransportPolicy": true,
                "xFrameOptions": true,
                "xContentTypeOptions": false,
                "xXSSProtection": false,
                "contentSecurityPolicy": false,
            })
        );
    }

    #[tokio::test]
    async fn test_blocked_names_are_refused() {
        let check = HttpSecurityCheck::new(HostGuard::system(), &HttpConfig::default()).unwrap();
        assert!(check.run("intranet.lan").await.is_err());
    }
}
