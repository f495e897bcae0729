//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling and state settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// HTTP behavior for fetching the listing page
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Telegram delivery settings
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if the file is absent.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("No config at {}. Using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {e}", path.display())))
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat_id;
        }
        if let Some(interval) = lookup("CHECK_INTERVAL") {
            self.monitor.check_interval_secs = interval.trim().parse().map_err(|_| {
                AppError::config(format!("CHECK_INTERVAL must be a number of seconds, got '{interval}'"))
            })?;
        }
        if let Some(path) = lookup("SITE_CONFIG") {
            self.monitor.site_config = PathBuf::from(path);
        }
        if let Some(path) = lookup("STATE_FILE") {
            self.monitor.state_file = PathBuf::from(path);
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(AppError::config("TELEGRAM_BOT_TOKEN is not set"));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(AppError::config("TELEGRAM_CHAT_ID is not set"));
        }
        if self.monitor.check_interval_secs == 0 {
            return Err(AppError::config("monitor.check_interval_secs must be > 0"));
        }
        if self
            .monitor
            .max_drop_percent
            .is_some_and(|percent| percent == 0 || percent > 100)
        {
            return Err(AppError::config(
                "monitor.max_drop_percent must be between 1 and 100",
            ));
        }
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::config("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::config("scraper.timeout_secs must be > 0"));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::config("telegram.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.telegram.api_base).map_err(|e| {
            AppError::config(format!("telegram.api_base '{}' is invalid: {e}", self.telegram.api_base))
        })?;
        Ok(())
    }
}

/// Scheduling and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between the end of one cycle and the start of the next
    #[serde(default = "defaults::check_interval")]
    pub check_interval_secs: u64,

    /// Pause after a cycle escapes its own error handling
    #[serde(default = "defaults::error_cooldown")]
    pub error_cooldown_secs: u64,

    /// Snapshot file, relative to the storage directory unless absolute
    #[serde(default = "defaults::state_file")]
    pub state_file: PathBuf,

    /// Site definition file, relative to the storage directory unless absolute
    #[serde(default = "defaults::site_config")]
    pub site_config: PathBuf,

    /// Abort a cycle when the product count drops by more than this percentage.
    /// Unset disables the check; an empty scrape always aborts.
    #[serde(default)]
    pub max_drop_percent: Option<u8>,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: defaults::check_interval(),
            error_cooldown_secs: defaults::error_cooldown(),
            state_file: defaults::state_file(),
            site_config: defaults::site_config(),
            max_drop_percent: None,
        }
    }
}

/// HTTP client settings for the product scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Client-wide request timeout in seconds (a site's `wait_timeout` overrides it)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (usually supplied via `TELEGRAM_BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: String,

    /// Target chat (usually supplied via `TELEGRAM_CHAT_ID`)
    #[serde(default)]
    pub chat_id: String,

    /// Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Per-message timeout in seconds
    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: defaults::api_base(),
            timeout_secs: defaults::telegram_timeout(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Monitor defaults
    pub fn check_interval() -> u64 {
        300
    }
    pub fn error_cooldown() -> u64 {
        60
    }
    pub fn state_file() -> PathBuf {
        PathBuf::from("products_state.json")
    }
    pub fn site_config() -> PathBuf {
        PathBuf::from("sites/digidirect.json")
    }

    // Scraper defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (compatible; shelfwatch/0.1)"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Telegram defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        15
    }
}
