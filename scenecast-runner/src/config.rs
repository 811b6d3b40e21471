//! Runner configuration
//!
//! Defines every configurable parameter of a run: input and output locations,
//! browser settings, concurrency, and the timing policy of the poll loop.
//! Flags fall back to environment variables; the timing policy is read from
//! the environment only.

use clap::Args;
use scenecast_driver::Credentials;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Upper bound on concurrently open sessions
pub const MAX_CONCURRENCY: usize = 40;

pub const DEFAULT_APP_URL: &str = "https://business.gemini.google/";

/// Command-line arguments of `scenecast run`
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Account email used when the application asks for a login
    #[arg(long, env = "GEMINI_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(long, env = "GEMINI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Newline-delimited prompt file
    #[arg(long = "prompt-file", alias = "promptFile", env = "PROMPT_FILE")]
    pub prompt_file: Option<PathBuf>,

    /// Directory artifacts are saved to
    #[arg(long = "output-dir", alias = "outputDir", env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// JSON file receiving the final run status
    #[arg(long = "job-meta", alias = "jobMeta", env = "JOB_META_PATH")]
    pub job_meta: Option<PathBuf>,

    /// Concurrent sessions per batch (1-40)
    #[arg(long = "max-tabs", alias = "maxTabs", env = "MAX_TABS", default_value = "1")]
    pub max_tabs: String,

    /// Run the browser without a window ("true" or "false")
    #[arg(long, env = "HEADLESS", default_value = "true")]
    pub headless: String,

    /// Custom browser binary
    #[arg(long = "browser-path", alias = "browserPath", env = "BROWSER_PATH")]
    pub browser_path: Option<PathBuf>,

    /// WebDriver endpoint
    #[arg(long = "webdriver-url", env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Entry point of the application
    #[arg(long = "app-url", env = "APP_URL", default_value = DEFAULT_APP_URL)]
    pub app_url: String,
}

/// Timing policy of the orchestration core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Delay applied after each job polled that is still pending
    pub poll_interval: Duration,

    /// Time an attempt may run before it is resubmitted
    pub job_timeout: Duration,

    /// Resubmissions allowed per job
    pub max_retries: u32,

    /// Budget of a whole batch, after which unresolved jobs are left behind
    pub batch_deadline: Duration,

    /// Pause after navigating sessions before interacting with them
    pub settle_delay: Duration,

    /// Pause after navigating a timed-out session home, before resubmitting
    pub retry_settle: Duration,

    /// Pause after clicking an acknowledge control
    pub action_pause: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(140),
            max_retries: 3,
            batch_deadline: Duration::from_secs(600),
            settle_delay: Duration::from_secs(5),
            retry_settle: Duration::from_secs(3),
            action_pause: Duration::from_secs(2),
        }
    }
}

impl Timing {
    /// Reads the timing policy from environment variables
    ///
    /// Expected environment variables (all optional, seconds unless noted):
    /// - POLL_INTERVAL (default: 5)
    /// - JOB_TIMEOUT (default: 140)
    /// - MAX_RETRIES (count, default: 3)
    /// - BATCH_DEADLINE (default: 600)
    /// - SETTLE_DELAY (default: 5)
    /// - RETRY_SETTLE (default: 3)
    /// - ACTION_PAUSE (default: 2)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            poll_interval: env_secs("POLL_INTERVAL").unwrap_or(defaults.poll_interval),
            job_timeout: env_secs("JOB_TIMEOUT").unwrap_or(defaults.job_timeout),
            max_retries: std::env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
            batch_deadline: env_secs("BATCH_DEADLINE").unwrap_or(defaults.batch_deadline),
            settle_delay: env_secs("SETTLE_DELAY").unwrap_or(defaults.settle_delay),
            retry_settle: env_secs("RETRY_SETTLE").unwrap_or(defaults.retry_settle),
            action_pause: env_secs("ACTION_PAUSE").unwrap_or(defaults.action_pause),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Resolved configuration of a run
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Option<Credentials>,
    pub prompt_file: PathBuf,
    pub output_dir: PathBuf,
    pub job_meta: Option<PathBuf>,
    pub concurrency: usize,
    pub headless: bool,
    pub browser_path: Option<PathBuf>,
    pub webdriver_url: String,
    pub app_url: String,
    pub timing: Timing,
}

impl Config {
    /// Creates a configuration with defaults for everything but the prompt file
    pub fn new(prompt_file: PathBuf) -> Self {
        Self {
            credentials: None,
            prompt_file,
            output_dir: PathBuf::from("output"),
            job_meta: None,
            concurrency: 1,
            headless: true,
            browser_path: None,
            webdriver_url: "http://localhost:9515".to_string(),
            app_url: DEFAULT_APP_URL.to_string(),
            timing: Timing::default(),
        }
    }

    /// Builds the configuration from parsed arguments and the environment
    pub fn from_args(args: RunArgs) -> anyhow::Result<Self> {
        let prompt_file = args
            .prompt_file
            .ok_or_else(|| anyhow::anyhow!("No prompt file provided (--prompt-file or PROMPT_FILE)"))?;

        let credentials = match (args.email, args.password) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            (None, None) => None,
            _ => {
                warn!("Only one of email/password was provided, ignoring credentials");
                None
            }
        };

        let config = Self {
            credentials,
            prompt_file,
            output_dir: args.output_dir,
            job_meta: args.job_meta,
            concurrency: parse_concurrency(&args.max_tabs),
            headless: parse_flag(&args.headless),
            browser_path: args.browser_path,
            webdriver_url: args.webdriver_url,
            app_url: args.app_url,
            timing: Timing::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.prompt_file.as_os_str().is_empty() {
            anyhow::bail!("prompt_file cannot be empty");
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            anyhow::bail!("concurrency must be between 1 and {}", MAX_CONCURRENCY);
        }

        if !self.webdriver_url.starts_with("http://") && !self.webdriver_url.starts_with("https://") {
            anyhow::bail!("webdriver_url must start with http:// or https://");
        }

        if self.timing.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.timing.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.timing.batch_deadline.is_zero() {
            anyhow::bail!("batch_deadline must be greater than 0");
        }

        Ok(())
    }
}

/// Parses the concurrency limit: invalid or non-positive values fall back to
/// 1, values above [`MAX_CONCURRENCY`] are clamped.
pub fn parse_concurrency(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => (n as u64).min(MAX_CONCURRENCY as u64) as usize,
        _ => 1,
    }
}

/// Case-insensitive "true"; anything else is false
pub fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.poll_interval, Duration::from_secs(5));
        assert_eq!(timing.job_timeout, Duration::from_secs(140));
        assert_eq!(timing.max_retries, 3);
        assert_eq!(timing.batch_deadline, Duration::from_secs(600));
        assert_eq!(timing.settle_delay, Duration::from_secs(5));
        assert_eq!(timing.retry_settle, Duration::from_secs(3));
    }

    #[test]
    fn test_parse_concurrency() {
        assert_eq!(parse_concurrency("1"), 1);
        assert_eq!(parse_concurrency("12"), 12);
        assert_eq!(parse_concurrency("40"), 40);
        assert_eq!(parse_concurrency("41"), 40);
        assert_eq!(parse_concurrency("0"), 1);
        assert_eq!(parse_concurrency("-3"), 1);
        assert_eq!(parse_concurrency("many"), 1);
        assert_eq!(parse_concurrency(""), 1);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("yes"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new(PathBuf::from("prompts.txt"));

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Empty prompt file should fail
        config.prompt_file = PathBuf::new();
        assert!(config.validate().is_err());
        config.prompt_file = PathBuf::from("prompts.txt");

        // Out-of-range concurrency should fail
        config.concurrency = 41;
        assert!(config.validate().is_err());
        config.concurrency = 4;

        // Invalid URL should fail
        config.webdriver_url = "localhost:9515".to_string();
        assert!(config.validate().is_err());
        config.webdriver_url = "http://localhost:9515".to_string();

        config.timing.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_legacy_flag_aliases() {
        let cli = TestCli::try_parse_from([
            "scenecast",
            "--promptFile=/tmp/prompts.txt",
            "--outputDir=/tmp/out",
            "--maxTabs=99",
            "--headless=false",
            "--email=user@example.test",
            "--password=secret",
        ])
        .unwrap();

        let config = Config::from_args(cli.run).unwrap();
        assert_eq!(config.prompt_file, PathBuf::from("/tmp/prompts.txt"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.concurrency, MAX_CONCURRENCY);
        assert!(!config.headless);
        assert_eq!(config.credentials.unwrap().email, "user@example.test");
    }

    #[test]
    fn test_missing_prompt_file_is_rejected() {
        let mut args = TestCli::try_parse_from(["scenecast"]).unwrap().run;
        args.prompt_file = None;
        assert!(Config::from_args(args).is_err());
    }
}
