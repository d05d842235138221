use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::alert::AlertParams;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const CONFIG_PATH_ENV: &str = "SWING_WATCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub window: WindowConfig,
    pub alert: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub minute_range: usize,
    pub ratio: f64,
    #[serde(default)]
    pub require_full_window: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub waker_host: String,
    pub waker_port: u16,
    pub sound_id: u32,
    pub level: u32,
    pub repeat: u32,
    #[serde(default = "default_alert_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_alert_timeout_ms() -> u64 {
    10_000
}

impl AlertConfig {
    /// `http://{waker_host}:{waker_port}/api/schedules`
    pub fn waker_url(&self) -> Result<Url> {
        let base = format!("http://{}:{}/", self.waker_host, self.waker_port);
        Url::parse(&base)
            .and_then(|u| u.join("api/schedules"))
            .with_context(|| format!("invalid waker address '{}'", base))
    }

    pub fn params(&self) -> AlertParams {
        AlertParams {
            sound_id: self.sound_id,
            level: self.level,
            repeat: self.repeat,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from `$SWING_WATCH_CONFIG`, or `config/default.toml`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.minute_range == 0 {
            bail!("window.minute_range must be > 0");
        }
        if !self.window.ratio.is_finite() || self.window.ratio <= 0.0 {
            bail!(
                "window.ratio must be a positive number, got {}",
                self.window.ratio
            );
        }
        Url::parse(&self.feed.ws_url)
            .with_context(|| format!("feed.ws_url '{}' is not a valid URL", self.feed.ws_url))?;
        self.alert
            .waker_url()
            .context("alert.waker_host/waker_port are invalid")?;
        Ok(())
    }
}
