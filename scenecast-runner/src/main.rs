//! Scenecast Runner
//!
//! Generates one video per prompt by driving the application's chat UI
//! through a WebDriver-controlled browser.
//!
//! Architecture:
//! - Configuration: Flags with environment fallbacks, timing from the environment
//! - Scheduler: Batches, sessions, submission and the per-job poll loop
//! - Services: Artifact storage, scene index and run status reporting
//!
//! The runner logs in once, works through the prompt list in batches of
//! concurrent tabs, saves every generated artifact and records the final
//! status of the run.

mod clock;
mod config;
mod context;
mod error;
mod job;
mod pool;
mod prompts;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scenecast_core::domain::run::RunSummary;
use scenecast_driver::{Browser, BrowserOptions, LoginFlow, WebDriverClient};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::{Clock, TokioClock};
use crate::config::{Config, RunArgs};
use crate::context::RunContext;
use crate::scheduler::{BatchScheduler, JobPoller};
use crate::service::{FsArtifactStore, SceneIndex, StatusReporter};

const ARTIFACT_EXTENSION: &str = "mp4";

#[derive(Parser)]
#[command(name = "scenecast")]
#[command(about = "Batch video generation runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one video per prompt
    Run(RunArgs),

    /// List the saved artifact of every scene
    Scenes(ScenesArgs),
}

#[derive(Debug, Args)]
struct ScenesArgs {
    /// Directory artifacts were saved to
    #[arg(long = "output-dir", alias = "outputDir", env = "OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Number of scenes expected; missing ones are listed as failed
    #[arg(long)]
    expected: Option<u64>,
}

/// How a run ended when nothing went wrong at run level
#[derive(Debug)]
enum RunOutcome {
    Completed(RunSummary),
    NoPrompts,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenecast_runner=info,scenecast_driver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => ExitCode::from(run_command(args).await),
        Commands::Scenes(args) => scenes_command(args),
    }
}

/// Runs `scenecast run` and returns the process exit code
async fn run_command(args: RunArgs) -> u8 {
    info!("Starting Scenecast Runner");

    // A rejected configuration is still reported to the sink it names
    let requested_meta = args.job_meta.clone();
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => return conclude(Err(e), &StatusReporter::new(requested_meta)),
    };

    let reporter = StatusReporter::new(config.job_meta.clone());
    conclude(execute(config).await, &reporter)
}

fn scenes_command(args: ScenesArgs) -> ExitCode {
    let listing = SceneIndex::scan(&args.output_dir, ARTIFACT_EXTENSION)
        .map(|index| index.outputs(args.expected))
        .and_then(|outputs| serde_json::to_string_pretty(&outputs).map_err(Into::into));

    match listing {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to list scenes: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs every prompt of the configuration
async fn execute(config: Config) -> Result<RunOutcome> {
    info!(
        "Loaded configuration: prompts={}, output={}, tabs={}, headless={}",
        config.prompt_file.display(),
        config.output_dir.display(),
        config.concurrency,
        config.headless
    );

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;

    let prompts = prompts::load_prompts(&config.prompt_file).await?;
    if prompts.is_empty() {
        return Ok(RunOutcome::NoPrompts);
    }

    let client = WebDriverClient::new(config.webdriver_url.clone());
    let options = BrowserOptions {
        headless: config.headless,
        binary: config.browser_path.clone(),
        app_url: config.app_url.clone(),
        ..BrowserOptions::default()
    };
    let browser = Arc::new(
        Browser::launch(client, options)
            .await
            .context("Failed to launch browser")?,
    );
    info!("Browser launched via {}", config.webdriver_url);

    let output_dir = config.output_dir.clone();
    let result = run_prompts(config, browser.clone(), &prompts).await;

    // Always shut the browser down
    if let Err(e) = browser.shutdown().await {
        warn!("Failed to shut down browser: {}", e);
    }

    let summary = result?;
    log_scenes(&output_dir, prompts.len() as u64);

    Ok(RunOutcome::Completed(summary))
}

async fn run_prompts(config: Config, browser: Arc<Browser>, prompts: &[String]) -> Result<RunSummary> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let auth = Arc::new(LoginFlow::new(browser.clone(), config.credentials.clone()));
    let store = Arc::new(FsArtifactStore::with_extension(
        config.output_dir.clone(),
        ARTIFACT_EXTENSION,
    ));

    let poller = JobPoller::new(
        browser.clone(),
        browser.clone(),
        store,
        clock.clone(),
        config.timing.clone(),
    );
    let scheduler = BatchScheduler::new(browser, auth, poller, clock);

    let mut ctx = RunContext::new(config);
    let summary = scheduler.run(&mut ctx, prompts).await?;

    Ok(summary)
}

fn log_scenes(output_dir: &Path, expected: u64) {
    match SceneIndex::scan(output_dir, ARTIFACT_EXTENSION) {
        Ok(index) => {
            let missing = index.missing(expected);
            if missing.is_empty() {
                info!("All {} scene(s) saved in {}", expected, output_dir.display());
            } else {
                warn!("Scenes without an artifact: {:?}", missing);
            }
        }
        Err(e) => warn!("Failed to index scenes: {:#}", e),
    }
}

/// Records the outcome of the run and picks the exit code
fn conclude(result: Result<RunOutcome>, reporter: &StatusReporter) -> u8 {
    let (code, recorded) = match result {
        Ok(RunOutcome::Completed(summary)) => {
            info!(
                "Run completed: {} job(s), {} completed, {} failed, {} exhausted, {} unresolved",
                summary.total,
                summary.completed,
                summary.failed_fatal,
                summary.exhausted,
                summary.unresolved
            );
            (0, reporter.mark_completed(summary))
        }
        Ok(RunOutcome::NoPrompts) => {
            error!("No prompts loaded, nothing to do");
            (1, reporter.mark_failed_reason("no_prompts"))
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            (1, reporter.mark_failed_error(&format!("{:#}", e)))
        }
    };

    if let Err(e) = recorded {
        warn!("Failed to record run status: {:#}", e);
    }

    code
}
