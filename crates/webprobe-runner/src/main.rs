// # webprobe - one-shot diagnostics run
//
// A thin integration layer: read configuration from the environment,
// register the built-in checks, scan one target and print the report as
// JSON. All job, guard and scan logic lives in webprobe-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Target
// - `WEBPROBE_TARGET`: URL, domain or IP address to scan (required)
// - `WEBPROBE_CHECKS`: Comma-separated checks to run (default: all)
//
// ### Policy
// - `WEBPROBE_DISABLE_EVERYTHING`: Skip every check (true/false)
// - `WEBPROBE_API_TIMEOUT_MS`: Per-check timeout in milliseconds
// - `WEBPROBE_MAX_CONCURRENT`: Checks in flight at once (0 = unlimited)
//
// ### Host guard
// - `WEBPROBE_BLOCKED_HOSTS`: Extra host names to refuse
// - `WEBPROBE_BLOCKED_SUFFIXES`: Extra name suffixes to refuse
//
// ### Traceroute
// - `WEBPROBE_TRACEROUTE_MAX_HOPS`: Maximum TTL (1-255)
// - `WEBPROBE_TRACEROUTE_WAIT_SECS`: Seconds to wait per probe
// - `WEBPROBE_TRACEROUTE_QUERIES`: Probes per hop (1-10)
//
// ### Logging
// - `WEBPROBE_LOG_LEVEL`: trace, debug, info, warn, error (logs go to stderr)
//
// ## Example
//
// ```bash
// export WEBPROBE_TARGET=https://example.com
// export WEBPROBE_CHECKS=headers,http-security,whois
// export WEBPROBE_API_TIMEOUT_MS=20000
//
// webprobe > report.json
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use webprobe_core::guard::SystemResolver;
use webprobe_core::{
    CheckConfig, CheckRegistry, GuardConfig, HostGuard, JobBoard, JobSettings, PolicyConfig, Scan,
    TracerouteConfig, WebprobeConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Scan completed (individual checks may still have failed)
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebprobeExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<WebprobeExitCode> for ExitCode {
    fn from(code: WebprobeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    target: String,
    checks: Vec<String>,
    disable_everything: bool,
    api_timeout_ms: Option<u64>,
    max_concurrent: Option<usize>,
    blocked_hosts: Vec<String>,
    blocked_suffixes: Vec<String>,
    traceroute_max_hops: Option<u32>,
    traceroute_wait_secs: Option<f64>,
    traceroute_queries: Option<u32>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            target: lookup("WEBPROBE_TARGET").unwrap_or_default().trim().to_string(),
            checks: list(lookup("WEBPROBE_CHECKS")),
            disable_everything: match lookup("WEBPROBE_DISABLE_EVERYTHING") {
                Some(value) => parse_bool("WEBPROBE_DISABLE_EVERYTHING", &value)?,
                None => false,
            },
            api_timeout_ms: parse_opt("WEBPROBE_API_TIMEOUT_MS", lookup("WEBPROBE_API_TIMEOUT_MS"))?,
            max_concurrent: parse_opt("WEBPROBE_MAX_CONCURRENT", lookup("WEBPROBE_MAX_CONCURRENT"))?,
            blocked_hosts: list(lookup("WEBPROBE_BLOCKED_HOSTS")),
            blocked_suffixes: list(lookup("WEBPROBE_BLOCKED_SUFFIXES")),
            traceroute_max_hops: parse_opt(
                "WEBPROBE_TRACEROUTE_MAX_HOPS",
                lookup("WEBPROBE_TRACEROUTE_MAX_HOPS"),
            )?,
            traceroute_wait_secs: parse_opt(
                "WEBPROBE_TRACEROUTE_WAIT_SECS",
                lookup("WEBPROBE_TRACEROUTE_WAIT_SECS"),
            )?,
            traceroute_queries: parse_opt(
                "WEBPROBE_TRACEROUTE_QUERIES",
                lookup("WEBPROBE_TRACEROUTE_QUERIES"),
            )?,
            log_level: lookup("WEBPROBE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            anyhow::bail!(
                "WEBPROBE_TARGET is required. \
                Set it via: export WEBPROBE_TARGET=https://example.com"
            );
        }

        if let Some(timeout) = self.api_timeout_ms
            && timeout == 0
        {
            anyhow::bail!("WEBPROBE_API_TIMEOUT_MS must be greater than 0");
        }

        if let Some(max_hops) = self.traceroute_max_hops
            && !(1..=255).contains(&max_hops)
        {
            anyhow::bail!(
                "WEBPROBE_TRACEROUTE_MAX_HOPS must be between 1 and 255. Got: {}",
                max_hops
            );
        }

        if let Some(wait) = self.traceroute_wait_secs
            && !(wait > 0.0 && wait <= 60.0)
        {
            anyhow::bail!(
                "WEBPROBE_TRACEROUTE_WAIT_SECS must be between 0 and 60 seconds. Got: {}",
                wait
            );
        }

        if let Some(queries) = self.traceroute_queries
            && !(1..=10).contains(&queries)
        {
            anyhow::bail!(
                "WEBPROBE_TRACEROUTE_QUERIES must be between 1 and 10. Got: {}",
                queries
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "WEBPROBE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_webprobe_config()
            .validate()
            .context("Invalid webprobe configuration")?;

        Ok(())
    }

    /// Library configuration with environment overrides applied
    fn to_webprobe_config(&self) -> WebprobeConfig {
        let mut policy = PolicyConfig::default();
        if let Some(timeout) = self.api_timeout_ms {
            policy.api_timeout_ms = timeout;
        }
        if let Some(max) = self.max_concurrent {
            policy.max_concurrent_checks = max;
        }

        let mut traceroute = TracerouteConfig::default();
        if let Some(max_hops) = self.traceroute_max_hops {
            traceroute.max_hops = max_hops;
        }
        if let Some(wait) = self.traceroute_wait_secs {
            traceroute.wait_secs = wait;
        }
        if let Some(queries) = self.traceroute_queries {
            traceroute.queries = queries;
        }

        WebprobeConfig {
            guard: GuardConfig {
                extra_blocked_hosts: self.blocked_hosts.clone(),
                extra_blocked_suffixes: self.blocked_suffixes.clone(),
            },
            jobs: JobSettings {
                disable_everything: self.disable_everything,
            },
            policy,
            checks: self.checks.iter().map(CheckConfig::new).collect(),
            traceroute,
            ..WebprobeConfig::default()
        }
    }
}

fn list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_opt<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", key, raw, e)),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be true or false. Got: '{}'", key, other),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WebprobeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return WebprobeExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WebprobeExitCode::ConfigError.into();
    }

    info!("Starting webprobe for {}", config.target);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WebprobeExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_scan(config).await {
            Ok(()) => WebprobeExitCode::CleanShutdown,
            Err(e) if is_config_error(&e) => {
                error!("Configuration error: {:#}", e);
                WebprobeExitCode::ConfigError
            }
            Err(e) => {
                error!("Runtime error: {:#}", e);
                WebprobeExitCode::RuntimeError
            }
        }
    })
    .into()
}

fn is_config_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<webprobe_core::Error>(),
        Some(webprobe_core::Error::Config(_))
    )
}

/// Register the checks, run one scan and print the report
async fn run_scan(config: Config) -> Result<()> {
    let settings = config.to_webprobe_config();
    let guard = HostGuard::from_config(&settings.guard, Arc::new(SystemResolver::new()));
    let registry = CheckRegistry::new();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP checks");
        webprobe_check_http::register(&registry, guard.clone(), &settings.http)?;
    }

    #[cfg(feature = "net")]
    {
        info!("Registering network checks");
        webprobe_check_net::register(&registry, guard.clone(), &settings.traceroute, &settings.http)?;
    }

    if registry.is_empty() {
        anyhow::bail!(webprobe_core::Error::config(
            "No checks available. Build with the `http` or `net` feature."
        ));
    }

    let board = Arc::new(JobBoard::new());
    let scan = Scan::new(config.target.clone(), &registry, &settings, board)?;

    let report = tokio::select! {
        report = scan.run() => report,
        signal = shutdown_signal() => {
            let signal = signal?;
            warn!("Received {}; reporting unfinished checks as they are", signal);
            scan.report(Vec::new())
        }
    };

    info!(
        "Scan finished: {} succeeded, {} failed, {} timed out, {} skipped",
        report.summary.success, report.summary.error, report.summary.timed_out, report.summary.skipped
    );

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("WEBPROBE_TARGET", " example.com ")]).unwrap();
        config.validate().unwrap();

        let settings = config.to_webprobe_config();
        assert_eq!(config.target, "example.com");
        assert!(settings.checks.is_empty());
        assert!(!settings.jobs.disable_everything);
        assert_eq!(settings.policy, PolicyConfig::default());
        assert_eq!(settings.traceroute, TracerouteConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WEBPROBE_TARGET", "https://example.com"),
            ("WEBPROBE_CHECKS", "headers, whois,,"),
            ("WEBPROBE_DISABLE_EVERYTHING", "yes"),
            ("WEBPROBE_API_TIMEOUT_MS", "2500"),
            ("WEBPROBE_MAX_CONCURRENT", "2"),
            ("WEBPROBE_BLOCKED_SUFFIXES", ".corp"),
            ("WEBPROBE_TRACEROUTE_MAX_HOPS", "30"),
        ])
        .unwrap();
        config.validate().unwrap();

        let settings = config.to_webprobe_config();
        assert_eq!(
            settings.checks,
            vec![CheckConfig::new("headers"), CheckConfig::new("whois")]
        );
        assert!(settings.jobs.disable_everything);
        assert_eq!(settings.policy.api_timeout_ms, 2500);
        assert_eq!(settings.policy.max_concurrent_checks, 2);
        assert_eq!(settings.guard.extra_blocked_suffixes, vec![".corp"]);
        assert_eq!(settings.traceroute.max_hops, 30);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config_from(&[("WEBPROBE_API_TIMEOUT_MS", "soon")]).is_err());
        assert!(config_from(&[("WEBPROBE_DISABLE_EVERYTHING", "maybe")]).is_err());

        let missing_target = config_from(&[]).unwrap();
        assert!(missing_target.validate().is_err());

        let zero_timeout =
            config_from(&[("WEBPROBE_TARGET", "example.com"), ("WEBPROBE_API_TIMEOUT_MS", "0")]).unwrap();
        assert!(zero_timeout.validate().is_err());

        let bad_level =
            config_from(&[("WEBPROBE_TARGET", "example.com"), ("WEBPROBE_LOG_LEVEL", "loud")]).unwrap();
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_config_errors_are_recognized() {
        let err = anyhow::Error::from(webprobe_core::Error::config("Unknown check: nope"));
        assert!(is_config_error(&err));
        assert!(!is_config_error(&anyhow::anyhow!("boom")));
    }
}
