//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pitchvet.toml` files.

use crate::job::ControllerConfig;
use crate::progress::ChannelConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Analysis service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Job tracking settings.
    #[serde(default)]
    pub job: JobConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Remote analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP base URL of the analysis service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// WebSocket base URL for the progress channel.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Job lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Overall job deadline in seconds.
    #[serde(default = "default_job_timeout")]
    pub timeout_seconds: u64,

    /// Polling fallback cadence in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Consecutive poll failures tolerated after the channel is lost.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    /// First reconnect delay in milliseconds; doubles per attempt.
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect attempts before the channel gives up for good.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_job_timeout(),
            poll_interval_seconds: default_poll_interval(),
            max_poll_failures: default_max_poll_failures(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
        }
    }
}

fn default_job_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    3
}

fn default_max_poll_failures() -> u32 {
    5
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "pitchvet_report.md".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".pitchvet.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Service settings - base URL always comes from CLI (it has a default)
        self.service.base_url = args.service.clone();

        if let Some(ref ws_url) = args.ws_url {
            self.service.ws_url = ws_url.clone();
        } else if args.service != default_base_url() && self.service.ws_url == default_ws_url() {
            // A non-default service URL with no explicit ws URL anywhere:
            // derive it so both halves point at the same host. A ws URL
            // from the config file stays untouched.
            self.service.ws_url = derive_ws_url(&args.service);
        }

        // Optional settings - only override if provided
        if let Some(timeout) = args.timeout {
            self.job.timeout_seconds = timeout;
        }
        if let Some(interval) = args.poll_interval {
            self.job.poll_interval_seconds = interval;
        }
    }

    /// Channel settings for the push connection.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            ws_base: self.service.ws_url.clone(),
            base_delay: Duration::from_millis(self.job.reconnect_base_delay_ms),
            max_attempts: self.job.reconnect_max_attempts,
            connect_timeout: Duration::from_secs(self.service.request_timeout_seconds),
        }
    }

    /// Controller settings for job tracking.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_secs(self.job.poll_interval_seconds),
            job_timeout: Duration::from_secs(self.job.timeout_seconds),
            max_poll_failures: self.job.max_poll_failures,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Derive the WebSocket base from an HTTP base URL.
fn derive_ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    };
    format!("{}/api", ws)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://localhost:8080");
        assert_eq!(config.job.timeout_seconds, 300);
        assert_eq!(config.job.reconnect_max_attempts, 5);
        assert_eq!(config.report.output, "pitchvet_report.md");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[service]
base_url = "https://analysis.example.com"
request_timeout_seconds = 10

[job]
timeout_seconds = 120
poll_interval_seconds = 5

[report]
output = "custom_report.md"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "https://analysis.example.com");
        assert_eq!(config.service.request_timeout_seconds, 10);
        assert_eq!(config.job.timeout_seconds, 120);
        assert_eq!(config.job.poll_interval_seconds, 5);
        assert_eq!(config.report.output, "custom_report.md");
        // Unspecified fields fall back to defaults.
        assert_eq!(config.job.reconnect_base_delay_ms, 1000);
    }

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(
            derive_ws_url("https://analysis.example.com"),
            "wss://analysis.example.com/api"
        );
        assert_eq!(derive_ws_url("http://localhost:9000/"), "ws://localhost:9000/api");
    }

    fn args_with_service(service: &str) -> crate::cli::Args {
        crate::cli::Args {
            pitch: Some("pitch".to_string()),
            pitch_file: None,
            website: None,
            service: service.to_string(),
            ws_url: None,
            output: None,
            format: crate::cli::OutputFormat::Markdown,
            config: None,
            timeout: None,
            poll_interval: None,
            fail_on_verdict: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_merge_derives_ws_url_when_unconfigured() {
        let mut config = Config::default();
        config.merge_with_args(&args_with_service("https://analysis.example.com"));

        assert_eq!(config.service.base_url, "https://analysis.example.com");
        assert_eq!(config.service.ws_url, "wss://analysis.example.com/api");
    }

    #[test]
    fn test_merge_keeps_config_file_ws_url() {
        let mut config = Config::default();
        config.service.ws_url = "wss://push.example.com/api".to_string();

        // A custom --service must not clobber a ws URL the config file set.
        config.merge_with_args(&args_with_service("https://analysis.example.com"));
        assert_eq!(config.service.ws_url, "wss://push.example.com/api");

        // An explicit --ws-url still wins over everything.
        let mut args = args_with_service("https://analysis.example.com");
        args.ws_url = Some("wss://override.example.com/api".to_string());
        config.merge_with_args(&args);
        assert_eq!(config.service.ws_url, "wss://override.example.com/api");
    }

    #[test]
    fn test_channel_config_from_settings() {
        let mut config = Config::default();
        config.job.reconnect_base_delay_ms = 500;
        config.job.reconnect_max_attempts = 3;

        let channel = config.channel_config();
        assert_eq!(channel.base_delay, Duration::from_millis(500));
        assert_eq!(channel.max_attempts, 3);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[service]"));
        assert!(toml_str.contains("[job]"));
        assert!(toml_str.contains("[report]"));
    }
}
