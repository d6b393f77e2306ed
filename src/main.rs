//! PitchVet - AI Startup-Pitch Analyzer
//!
//! A CLI tool that submits a startup pitch to a remote multi-agent
//! analysis service, follows the job live, and renders a consensus
//! verdict with traceable dissent.
//!
//! Exit codes:
//!   0 - Success (job completed, verdict above --fail-on-verdict if set)
//!   1 - Runtime error (bad input, connection failure, failed job, etc.)
//!   2 - Final verdict at or below --fail-on-verdict threshold

mod cli;
mod client;
mod config;
mod consensus;
mod error;
mod job;
mod models;
mod progress;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, VerdictLevel};
use client::AnalysisClient;
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use job::AnalysisJobController;
use models::{JobSnapshot, JobStatus, Vote};
use progress::ProgressChannel;
use report::{ReportMetadata, VerdictReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("PitchVet v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the analysis
    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pitchvet.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".pitchvet.toml");

    if path.exists() {
        eprintln!("⚠️  .pitchvet.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .pitchvet.toml")?;

    println!("✅ Created .pitchvet.toml with default settings.");
    println!("   Edit it to customize service URLs, timeouts, and output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Get the pitch text
    let pitch = read_pitch(&args)?;

    // Handle --dry-run: show what would be submitted and exit
    if args.dry_run {
        return handle_dry_run(&pitch, &args, &config);
    }

    // Step 2: Wire up the job machinery
    println!("🚀 Submitting pitch for analysis...");
    println!("   Service: {}", config.service.base_url);
    println!("   Timeout: {}s", config.job.timeout_seconds);

    let client = Arc::new(AnalysisClient::new(
        &config.service.base_url,
        config.service.request_timeout_seconds,
    ));
    let channel = ProgressChannel::new(config.channel_config());
    let mut controller =
        AnalysisJobController::new(client, channel, config.controller_config());

    // Step 3: Submit
    let job_id = controller
        .submit(&pitch, args.website.clone())
        .await
        .map_err(|e| {
            if e.retryable() {
                anyhow::anyhow!("{} (retrying later may succeed)", e)
            } else {
                anyhow::anyhow!("{}", e)
            }
        })?;

    println!("   Job: {}", job_id);
    println!("\n🔬 Analysis in progress (ctrl-c to cancel)...\n");

    // Ctrl-c requests cancellation; the controller closes the channel and
    // poller before returning.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested");
            let _ = cancel_tx.send(true);
        }
    });

    // Step 4: Follow the job to its terminal state
    let bar = make_progress_bar(args.quiet);
    let snapshot = controller
        .run_to_completion(cancel_rx, |snap| {
            bar.set_position(snap.progress_percent as u64);
            if !snap.progress_message.is_empty() {
                bar.set_message(snap.progress_message.clone());
            }
        })
        .await;
    bar.finish_and_clear();

    let duration = start_time.elapsed().as_secs_f64();

    // Step 5: Resolve the outcome
    match snapshot.status {
        JobStatus::Completed => {
            finish_completed(&args, &config, snapshot, job_id, duration)
        }
        JobStatus::Failed => {
            let failure = snapshot
                .error
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "unknown failure".to_string());
            let hint = match snapshot.error.as_ref().map(|f| f.retryable) {
                Some(true) => " (retrying later may succeed)",
                _ => "",
            };
            Err(anyhow::anyhow!("{}{}", failure, hint))
        }
        status => Err(anyhow::anyhow!(
            "Job ended in unexpected state: {}",
            status
        )),
    }
}

/// Build the verdict, write the report, and print the summary.
fn finish_completed(
    args: &Args,
    config: &Config,
    snapshot: JobSnapshot,
    job_id: String,
    duration: f64,
) -> Result<i32> {
    println!("📝 Generating report...");

    let verdict = snapshot
        .result
        .as_ref()
        .and_then(|r| r.committee.as_ref())
        .and_then(|committee| match consensus::aggregate(committee) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!("Skipping committee verdict: {}", e);
                None
            }
        });

    let verdict_report = VerdictReport {
        metadata: ReportMetadata {
            service_url: config.service.base_url.clone(),
            job_id,
            analysis_date: Utc::now(),
            duration_seconds: duration,
        },
        job: snapshot,
        verdict,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&verdict_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&verdict_report),
    };

    let output_path = output_path(args, config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    if let Some(ref verdict) = verdict_report.verdict {
        println!("   Final verdict: {}", verdict.final_verdict);
        if verdict.final_verdict != verdict.majority_vote {
            println!("   Majority vote: {} (overridden)", verdict.majority_vote);
        }
        println!(
            "   Consensus: {:.0}% | Dissenting opinions: {}",
            verdict.consensus_score * 100.0,
            verdict.dissenting_opinions.len()
        );
    } else {
        println!("   No committee data in this result.");
    }
    if let Some(ref result) = verdict_report.job.result {
        println!("   Agents reporting: {}", result.agents.len());
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on-verdict threshold
    if let (Some(level), Some(verdict)) = (args.fail_on_verdict, verdict_report.verdict.as_ref())
    {
        if verdict.final_verdict <= verdict_level_to_vote(level) {
            eprintln!(
                "\n⛔ Final verdict {} is at or below the {:?} threshold. Failing (exit code 2).",
                verdict.final_verdict, level
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --dry-run: show the request that would be sent, exit.
fn handle_dry_run(pitch: &str, args: &Args, config: &Config) -> Result<i32> {
    println!("\n🔍 Dry run: no job will be submitted.\n");
    println!("   Service:  {}", config.service.base_url);
    println!("   Channel:  {}", config.service.ws_url);
    if let Some(ref website) = args.website {
        println!("   Website:  {}", website);
    }
    println!("   Pitch ({} chars):", pitch.len());
    for line in pitch.lines().take(10) {
        println!("     {}", line);
    }

    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Read the pitch from the CLI argument or the given file.
fn read_pitch(args: &Args) -> Result<String> {
    let pitch = if let Some(ref inline) = args.pitch {
        inline.clone()
    } else if let Some(ref path) = args.pitch_file {
        if path == std::path::Path::new("-") {
            std::io::read_to_string(std::io::stdin()).context("Failed to read pitch from stdin")?
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read pitch file: {}", path.display()))?
        }
    } else {
        // validate() guarantees one of the two is present.
        String::new()
    };

    let pitch = pitch.trim().to_string();
    if pitch.is_empty() {
        anyhow::bail!("Pitch is empty");
    }
    Ok(pitch)
}

/// Report path: CLI flag wins, then config.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.report.output))
}

/// Terminal progress bar fed from job snapshots. Hidden in quiet mode.
fn make_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

/// Map a --fail-on-verdict level to the matching vote category.
fn verdict_level_to_vote(level: VerdictLevel) -> Vote {
    match level {
        VerdictLevel::Consider => Vote::Consider,
        VerdictLevel::HighRisk => Vote::HighRisk,
        VerdictLevel::Pass => Vote::Pass,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .pitchvet.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_level_mapping() {
        assert_eq!(verdict_level_to_vote(VerdictLevel::Consider), Vote::Consider);
        assert_eq!(verdict_level_to_vote(VerdictLevel::HighRisk), Vote::HighRisk);
        assert_eq!(verdict_level_to_vote(VerdictLevel::Pass), Vote::Pass);
    }

    #[test]
    fn test_fail_threshold_uses_favorability_order() {
        // STRONG_INVEST is above every threshold.
        assert!(Vote::StrongInvest > verdict_level_to_vote(VerdictLevel::Consider));
        // CONSIDER trips the consider threshold but not high-risk.
        assert!(Vote::Consider <= verdict_level_to_vote(VerdictLevel::Consider));
        assert!(Vote::Consider > verdict_level_to_vote(VerdictLevel::HighRisk));
        // PASS trips everything.
        assert!(Vote::Pass <= verdict_level_to_vote(VerdictLevel::Pass));
        assert!(Vote::Pass <= verdict_level_to_vote(VerdictLevel::HighRisk));
    }

    #[test]
    fn test_output_path_cli_wins() {
        let mut config = Config::default();
        config.report.output = "from_config.md".to_string();

        let mut args = crate::cli::Args {
            pitch: Some("p".to_string()),
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
        };

        assert_eq!(output_path(&args, &config), PathBuf::from("from_config.md"));

        args.output = Some(PathBuf::from("cli.md"));
        assert_eq!(output_path(&args, &config), PathBuf::from("cli.md"));
    }
}
