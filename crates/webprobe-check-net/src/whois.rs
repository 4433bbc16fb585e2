use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use webprobe_check_http::{guarded_client, guarded_url};
use webprobe_core::address::target_host;
use webprobe_core::config::HttpConfig;
use webprobe_core::guard::{HostGuard, Screened};
use webprobe_core::{Check, CheckOutcome, Error, Result};

/// Public WHOIS server for the generic TLDs
pub const INTERNIC_SERVER: &str = "whois.internic.net:43";

/// RDAP bootstrap service; the domain is appended
pub const RDAP_BASE_URL: &str = "https://rdap.org/domain/";

/// Registration record of the target's domain
///
/// Queries the InterNIC WHOIS server and the RDAP bootstrap service in
/// parallel. Neither contacts the target itself; the guard still screens
/// the name so internal names are not looked up. The RDAP record is
/// best-effort and reported as `null` when unavailable.
pub struct WhoisCheck {
    guard: HostGuard,
    client: reqwest::Client,
    server: String,
    rdap_base: String,
}

impl WhoisCheck {
    /// Registry name
    pub const NAME: &'static str = "whois";

    pub fn new(guard: HostGuard, http: &HttpConfig) -> Result<Self> {
        Self::with_servers(guard, http, INTERNIC_SERVER, RDAP_BASE_URL)
    }

    /// Query a different WHOIS server (`host:port`) and RDAP base URL
    pub fn with_servers(
        guard: HostGuard,
        http: &HttpConfig,
        server: impl Into<String>,
        rdap_base: impl Into<String>,
    ) -> Result<Self> {
        let client = guarded_client(&guard, http)?;
        Ok(Self {
            guard,
            client,
            server: server.into(),
            rdap_base: rdap_base.into(),
        })
    }

    async fn query(&self, domain: &str) -> Result<String> {
        let mut stream = TcpStream::connect(&self.server)
            .await
            .map_err(|e| Error::check(Self::NAME, format!("Failed to connect to {}: {}", self.server, e)))?;

        stream.write_all(format!("{}\r\n", domain).as_bytes()).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// RDAP record for `domain`, or `None` on any failure
    async fn rdap(&self, domain: &str) -> Option<Value> {
        match self.fetch_rdap(domain).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("RDAP lookup for {} failed: {}", domain, e);
                None
            }
        }
    }

    async fn fetch_rdap(&self, domain: &str) -> Result<Value> {
        let url = guarded_url(&self.guard, &format!("{}{}", self.rdap_base, domain), "https").await?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::http(e.to_string()))?;

        response.json::<Value>().await.map_err(|e| Error::http(e.to_string()))
    }
}

#[async_trait]
impl Check for WhoisCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        let host = target_host(target)?;
        let name = match self.guard.screen(&host)? {
            Screened::Name(name) => name,
            Screened::Literal(_) => {
                return Ok(CheckOutcome::Skipped(
                    "WHOIS lookups need a domain name".to_string(),
                ));
            }
        };

        let domain = registrable_domain(&name)?;
        debug!("Querying {} and RDAP for {}", self.server, domain);

        let (response, rdap) = tokio::join!(self.query(&domain), self.rdap(&domain));

        match parse_whois(&response?) {
            Some(record) => Ok(CheckOutcome::Success(json!({
                "internicData": record,
                "whoisData": rdap,
            }))),
            None => Ok(CheckOutcome::Failed(
                "No matches found for domain in internic database".to_string(),
            )),
        }
    }
}

/// Registrable part of a host name
///
/// The last two labels, or the last three when the second-level label is
/// short (`co.uk`, `com.au`).
pub fn registrable_domain(host: &str) -> Result<String> {
    let host = host.trim_end_matches('.');
    let parts: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    let len = parts.len();

    if len < 2 {
        return Err(Error::invalid_input(format!("Unable to parse domain: {}", host)));
    }

    let keep = if len >= 3 && parts[len - 2].len() <= 3 { 3 } else { 2 };
    Ok(parts[len - keep..].join("."))
}

/// Parse a WHOIS response into `{key: value}`
///
/// Keys have runs of non-word characters collapsed to `_`. Lines without a
/// colon continue the previous value. Returns `None` when the server
/// reports no match.
pub fn parse_whois(response: &str) -> Option<Map<String, Value>> {
    if response.contains("No match for") {
        return None;
    }

    let mut record: Map<String, Value> = Map::new();
    let mut last_key: Option<String> = None;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            if let Some(Value::String(existing)) = last_key.as_ref().and_then(|k| record.get_mut(k)) {
                existing.push(' ');
                existing.push_str(line);
            }
            continue;
        };

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let key = sanitize_key(key.trim());
        record.insert(key.clone(), Value::String(value.to_string()));
        last_key = Some(key);
    }

    Some(record)
}

fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_run = false;
    for c in key.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}
