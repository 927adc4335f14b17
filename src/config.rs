use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::NotificationPreferences;
use crate::error::PulseError;

/// Prefix for environment overrides, e.g. `PR_PULSE_GITHUB_TOKEN`.
pub const ENV_PREFIX: &str = "PR_PULSE";

pub const DEFAULT_CONFIG_FILE: &str = "pr-pulse.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Write notifications to the log only.
    Log,
    /// Run `notify_command` for every notification.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub notify_comments: bool,
    pub notify_reviews: bool,
    pub max_concurrency: usize,
    pub notifier: NotifierKind,
    pub notify_command: Vec<String>,
    pub prune_after_days: i64,
}

impl AppConfig {
    /// Load configuration from defaults, the optional TOML file at `path`
    /// (falling back to `pr-pulse.toml` in the working directory) and
    /// `PR_PULSE_*` environment variables, in that order of precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, PulseError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Self::defaults()?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PulseError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| PulseError::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single TOML file without consulting the
    /// environment.
    pub fn load_file(path: &Path) -> Result<Self, PulseError> {
        let settings = Self::defaults()?
            .add_source(config::File::from(path).required(true))
            .build()
            .map_err(|e| PulseError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| PulseError::ConfigError(format!("Invalid configuration in {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, PulseError> {
        let builder = config::Config::builder()
            .set_default("database_url", "sqlite://pr-pulse.db")
            .and_then(|b| b.set_default("github_api_url", "https://api.github.com"))
            .and_then(|b| b.set_default("poll_interval_secs", 300_i64))
            .and_then(|b| b.set_default("request_timeout_secs", 30_i64))
            .and_then(|b| b.set_default("notify_comments", false))
            .and_then(|b| b.set_default("notify_reviews", false))
            .and_then(|b| b.set_default("max_concurrency", 4_i64))
            .and_then(|b| b.set_default("notifier", "log"))
            .and_then(|b| b.set_default("notify_command", vec!["notify-send", "{title}", "{body}"]))
            .and_then(|b| b.set_default("prune_after_days", 90_i64))
            .map_err(|e| PulseError::ConfigError(format!("Invalid default configuration: {}", e)))?;
        Ok(builder)
    }

    fn validate(&self) -> Result<(), PulseError> {
        if self.poll_interval_secs == 0 {
            return Err(PulseError::ConfigError(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(PulseError::ConfigError(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.notifier == NotifierKind::Command && self.notify_command.is_empty() {
            return Err(PulseError::ConfigError(
                "notifier = \"command\" requires a non-empty notify_command".to_string(),
            ));
        }
        Ok(())
    }

    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences {
            notify_comments: self.notify_comments,
            notify_reviews: self.notify_reviews,
        }
    }

    /// Token from the config file or environment; blank values count as unset.
    pub fn configured_token(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
