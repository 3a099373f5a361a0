/// Settings and configuration management
/// Handles environment variable loading and validation

use anyhow::{Context, Result, bail};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Max retries when contacting the controller; crossing this sends the
/// terminal warning mail and stops the loop.
pub const DEFAULT_RETRY_MAX: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 120;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
/// Once per day
pub const DEFAULT_FILL_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_NUM_FILL_LINES: usize = 4;
pub const DEFAULT_FILL_RECORD_FILE: &str = "LN2AutofillData.txt";

#[derive(Debug, Clone)]
pub struct Config {
    /// host:port of the fill controller, no scheme
    pub controller_addr: String,

    // Retry / timing
    pub retry_max: u32,
    pub retry_backoff: Duration,
    pub poll_interval: Duration,
    pub fill_interval: Duration,

    // Fill lines and persistence
    pub num_lines: usize,
    pub fill_record_file: PathBuf,

    // Mail
    pub mail_enabled: bool,
    pub mail_from: String,
    pub mail_to: Vec<String>,

    // Report artifact
    pub plots_enabled: bool,
    pub report_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let controller_addr = env::var("CONTROLLER_ADDR")
            .context(
                "CONTROLLER_ADDR env var is required \
                 (host:port of the fill controller, e.g. 192.168.1.50:80)",
            )?
            .trim()
            .to_string();
        if controller_addr.is_empty() {
            bail!("CONTROLLER_ADDR is empty");
        }
        if controller_addr.contains("://") {
            bail!(
                "CONTROLLER_ADDR must be host:port without a scheme (found {})",
                controller_addr
            );
        }

        let retry_max = env_or("RETRY_MAX", DEFAULT_RETRY_MAX)?;
        let retry_backoff =
            Duration::from_secs(env_or("RETRY_BACKOFF_SECS", DEFAULT_RETRY_BACKOFF_SECS)?);
        let poll_interval =
            Duration::from_secs(env_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?);
        let fill_interval =
            Duration::from_secs(env_or("FILL_INTERVAL_SECS", DEFAULT_FILL_INTERVAL_SECS)?);

        let num_lines: usize = env_or("NUM_FILL_LINES", DEFAULT_NUM_FILL_LINES)?;
        if num_lines == 0 {
            bail!("NUM_FILL_LINES must be at least 1");
        }
        let fill_record_file = PathBuf::from(
            env::var("FILL_RECORD_FILE").unwrap_or_else(|_| DEFAULT_FILL_RECORD_FILE.to_string()),
        );

        let mail_enabled = env_flag("MAIL_ENABLED");
        let (mail_from, mail_to) = if mail_enabled {
            let from = env::var("MAIL_FROM")
                .context("MAIL_ENABLED is set but MAIL_FROM is missing (sender address)")?;
            let to_raw = env::var("MAIL_TO").context(
                "MAIL_ENABLED is set but MAIL_TO is missing (comma-separated recipients)",
            )?;
            let to: Vec<String> = to_raw
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            if to.is_empty() {
                bail!("MAIL_TO contains no addresses");
            }
            (from, to)
        } else {
            (String::new(), Vec::new())
        };

        let plots_enabled = env_flag("PLOTS_ENABLED");
        let report_dir = PathBuf::from(env::var("REPORT_DIR").unwrap_or_else(|_| ".".to_string()));

        Ok(Self {
            controller_addr,
            retry_max,
            retry_backoff,
            poll_interval,
            fill_interval,
            num_lines,
            fill_record_file,
            mail_enabled,
            mail_from,
            mail_to,
            plots_enabled,
            report_dir,
        })
    }

    /// Human-readable configuration summary, sent in the startup mail.
    pub fn summary(&self) -> String {
        format!(
            "controller = {}\n\
             retry max / backoff = {} / {}s\n\
             poll / fill interval = {}s / {}s\n\
             fill lines = {}\n\
             fill record file = {}\n\
             mail = {}\n\
             plots = {}",
            self.controller_addr,
            self.retry_max,
            self.retry_backoff.as_secs(),
            self.poll_interval.as_secs(),
            self.fill_interval.as_secs(),
            self.num_lines,
            self.fill_record_file.display(),
            if self.mail_enabled {
                format!("to {}", self.mail_to.join(", "))
            } else {
                "disabled".to_string()
            },
            if self.plots_enabled { "enabled" } else { "disabled" },
        )
    }
}

/// Parse an env var, falling back to a default when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {v:?}")),
        Err(_) => Ok(default),
    }
}

/// "true"/"1" (case-insensitive) means on; anything else, or unset, means off.
fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}
