//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// PitchVet - AI startup-pitch analysis from the terminal
///
/// Submit a pitch to a remote multi-agent analysis service, follow the job
/// live over a push channel (with a polling fallback), and get a consensus
/// verdict with traceable dissent.
///
/// Examples:
///   pitchvet --pitch "We sell reusable rockets to penguins"
///   pitchvet --pitch-file deck.txt --website https://penguinrockets.example
///   pitchvet --pitch-file deck.txt --service https://analysis.example.com --format json
///   pitchvet --pitch-file deck.txt --fail-on-verdict high-risk
///   pitchvet --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Pitch text to analyze, inline
    ///
    /// Mutually exclusive with --pitch-file. One of the two is required
    /// unless --init-config is used.
    #[arg(short, long, value_name = "TEXT", conflicts_with = "pitch_file")]
    pub pitch: Option<String>,

    /// Read the pitch text from a file ("-" reads stdin)
    #[arg(long, value_name = "FILE")]
    pub pitch_file: Option<PathBuf>,

    /// Website URL to include as auxiliary context
    #[arg(short, long, value_name = "URL")]
    pub website: Option<String>,

    /// Base URL of the analysis service
    #[arg(
        short,
        long,
        default_value = "http://localhost:8080",
        env = "PITCHVET_SERVICE"
    )]
    pub service: String,

    /// WebSocket base URL for the progress channel
    ///
    /// Defaults to the service URL with an http->ws scheme swap.
    #[arg(long, value_name = "URL", env = "PITCHVET_WS_URL")]
    pub ws_url: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pitchvet.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overall job timeout in seconds
    ///
    /// The job is failed if no terminal event arrives in time, even if the
    /// push channel still claims to be connected.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Polling fallback interval in seconds
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Fail (exit code 2) if the final verdict is at or below this level
    ///
    /// Useful for scripted gates. Values: consider, high-risk, pass
    #[arg(long, value_name = "LEVEL")]
    pub fail_on_verdict: Option<VerdictLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: validate the pitch and print the request without submitting
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .pitchvet.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Verdict threshold for --fail-on-verdict, most favorable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum VerdictLevel {
    Consider,
    HighRisk,
    Pass,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.pitch.is_none() && self.pitch_file.is_none() {
            return Err("Provide a pitch via --pitch or --pitch-file".to_string());
        }

        if let Some(ref path) = self.pitch_file {
            // "-" means stdin, no file to check.
            if path != Path::new("-") && !path.exists() {
                return Err(format!("Pitch file does not exist: {}", path.display()));
            }
        }

        // Validate service URL format
        if !self.service.starts_with("http://") && !self.service.starts_with("https://") {
            return Err("Service URL must start with 'http://' or 'https://'".to_string());
        }

        if let Some(ref ws_url) = self.ws_url {
            if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
                return Err("WebSocket URL must start with 'ws://' or 'wss://'".to_string());
            }
        }

        if let Some(ref website) = self.website {
            if !website.starts_with("http://") && !website.starts_with("https://") {
                return Err("Website URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(interval) = self.poll_interval {
            if interval == 0 {
                return Err("Poll interval must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            pitch: Some("We sell reusable rockets to penguins".to_string()),
            pitch_file: None,
            website: None,
            service: "http://localhost:8080".to_string(),
            ws_url: None,
            output: None,
            format: OutputFormat::Markdown,
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
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_requires_a_pitch() {
        let mut args = make_args();
        args.pitch = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_stdin_pitch_file_accepted() {
        let mut args = make_args();
        args.pitch = None;
        args.pitch_file = Some(PathBuf::from("-"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_service_url() {
        let mut args = make_args();
        args.service = "localhost:8080".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_ws_url() {
        let mut args = make_args();
        args.ws_url = Some("http://localhost:8080".to_string());
        assert!(args.validate().is_err());

        args.ws_url = Some("wss://analysis.example.com/api".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_verdict_level_ordering() {
        assert!(VerdictLevel::Consider < VerdictLevel::HighRisk);
        assert!(VerdictLevel::HighRisk < VerdictLevel::Pass);
    }
}
