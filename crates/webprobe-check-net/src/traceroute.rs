use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};
use webprobe_core::address::target_host;
use webprobe_core::config::TracerouteConfig;
use webprobe_core::guard::HostGuard;
use webprobe_core::{AddressType, Check, CheckOutcome, Error, Result};

/// Network path to the target via the system `traceroute`
///
/// The target is resolved through the guard and the **address** is passed
/// to traceroute, so the subprocess never does its own lookup.
pub struct TracerouteCheck {
    guard: HostGuard,
    config: TracerouteConfig,
}

impl TracerouteCheck {
    /// Registry name
    pub const NAME: &'static str = "trace-route";

    pub fn new(guard: HostGuard, config: TracerouteConfig) -> Self {
        Self { guard, config }
    }

    fn args(&self, address: &str) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-w".to_string(),
            self.config.wait_secs.to_string(),
            "-q".to_string(),
            self.config.queries.to_string(),
            "-m".to_string(),
            self.config.max_hops.to_string(),
            address.to_string(),
        ]
    }
}

#[async_trait]
impl Check for TracerouteCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn expected_address_types(&self) -> Vec<AddressType> {
        vec![AddressType::Url, AddressType::Ipv4, AddressType::Ipv6]
    }

    async fn run(&self, target: &str) -> Result<CheckOutcome> {
        let host = target_host(target)?;
        let resolved = self.guard.resolve_public_host(&host).await?;
        let address = resolved.address.to_string();

        let started = Instant::now();
        debug!("Tracing route to {} ({})", resolved.host, address);

        // Dropped (e.g. by the timeout policy) means killed
        let output = Command::new("traceroute")
            .args(self.args(&address))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::command(format!("Failed to run traceroute: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("traceroute exited with {}: {}", output.status, stderr);
            let message = if stderr.is_empty() {
                format!("traceroute exited with {}", output.status)
            } else {
                stderr
            };
            return Err(Error::check(Self::NAME, message));
        }

        let result = parse_traceroute(&String::from_utf8_lossy(&output.stdout));

        Ok(CheckOutcome::Success(json!({
            "message": "Traceroute completed!",
            "result": result,
            "timeTaken": started.elapsed().as_millis() as u64,
        })))
    }
}

/// Parse `traceroute -n` output into `[{host: [ms | "*", ...]}, ...]`
///
/// The banner line and anything that is not a numbered hop are ignored.
/// A hop with no timings reports `["*"]`.
pub fn parse_traceroute(stdout: &str) -> Vec<Value> {
    let mut hops = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("traceroute ") {
            continue;
        }

        let Some((number, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let host = tokens.first().copied().unwrap_or("*");
        let mut times: Vec<Value> = Vec::new();

        let mut i = 1;
        while i < tokens.len() {
            let token = tokens[i];
            if token == "*" {
                times.push(json!("*"));
            } else if let Some(value) = token.strip_suffix("ms") {
                if let Ok(ms) = value.parse::<f64>() {
                    times.push(json!(ms));
                }
            } else if tokens.get(i + 1) == Some(&"ms") {
                if let Ok(ms) = token.parse::<f64>() {
                    times.push(json!(ms));
                }
                i += 1;
            }
            i += 1;
        }

        if times.is_empty() {
            times.push(json!("*"));
        }

        hops.push(json!({ host: times }));
    }

    hops
}
