//! TOML configuration loading and validation.
//!
//! Everything here is fixed at startup and never mutated while the driver
//! runs. Only credentials come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use trendbook::{Horizon, RankingCascade};
use trendbook_broker::alpaca::AlpacaSettings;

use crate::error::{Error, Result};
use crate::schedule::Schedule;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_trading_url")]
    pub trading_url: String,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    #[serde(default = "default_feed")]
    pub feed: String,
    /// Environment variable holding the API key id.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Environment variable holding the API secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_trading_url() -> String {
    "https://paper-api.alpaca.markets".into()
}
fn default_data_url() -> String {
    "https://data.alpaca.markets".into()
}
fn default_feed() -> String {
    "iex".into()
}
fn default_key_env() -> String {
    "ALPACA_API_KEY".into()
}
fn default_secret_env() -> String {
    "ALPACA_API_SECRET".into()
}
fn default_timeout() -> u64 {
    30
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            trading_url: default_trading_url(),
            data_url: default_data_url(),
            feed: default_feed(),
            key_env: default_key_env(),
            secret_env: default_secret_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Where the instrument universe comes from. Inline symbols and file
/// contents are merged, inline first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
    /// One symbol per line, `#` starts a comment.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    #[serde(default = "default_medium_window")]
    pub medium_window: usize,
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_top_long")]
    pub top_long: usize,
    #[serde(default = "default_top_medium")]
    pub top_medium: usize,
    #[serde(default = "default_top_short")]
    pub top_short: usize,
    /// Calendar days of history requested each cycle.
    #[serde(default = "default_lookback")]
    pub lookback_days: u64,
}

fn default_long_window() -> usize {
    252
}
fn default_medium_window() -> usize {
    126
}
fn default_short_window() -> usize {
    63
}
fn default_top_long() -> usize {
    50
}
fn default_top_medium() -> usize {
    30
}
fn default_top_short() -> usize {
    10
}
fn default_lookback() -> u64 {
    396
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            long_window: default_long_window(),
            medium_window: default_medium_window(),
            short_window: default_short_window(),
            top_long: default_top_long(),
            top_medium: default_top_medium(),
            top_short: default_top_short(),
            lookback_days: default_lookback(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default = "default_min_trade")]
    pub min_trade_usd: f64,
    /// Share of the startup buying power each cycle may spend on buys.
    #[serde(default = "default_budget_fraction")]
    pub budget_fraction: f64,
}

fn default_min_trade() -> f64 {
    10.0
}
fn default_budget_fraction() -> f64 {
    0.45
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            min_trade_usd: default_min_trade(),
            budget_fraction: default_budget_fraction(),
        }
    }
}

/// Cadence policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadenceKind {
    Interval,
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_cadence")]
    pub cadence: CadenceKind,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// Exchange-local `HH:MM` for daily and weekly cadences.
    #[serde(default = "default_fire_time")]
    pub fire_time: String,
    #[serde(default = "default_weekday")]
    pub weekday: String,
    #[serde(default = "default_session_open")]
    pub session_open: String,
    #[serde(default = "default_session_close")]
    pub session_close: String,
}

fn default_cadence() -> CadenceKind {
    CadenceKind::Daily
}
fn default_interval_minutes() -> u32 {
    10
}
fn default_fire_time() -> String {
    "15:45".into()
}
fn default_weekday() -> String {
    "fri".into()
}
fn default_session_open() -> String {
    "09:30".into()
}
fn default_session_close() -> String {
    "16:00".into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cadence: default_cadence(),
            interval_minutes: default_interval_minutes(),
            fire_time: default_fire_time(),
            weekday: default_weekday(),
            session_open: default_session_open(),
            session_close: default_session_close(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Pause after a failed cycle before rescheduling.
    #[serde(default = "default_backoff")]
    pub failure_backoff_secs: u64,
    /// Pause after startup liquidation so fills land before the first cycle.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
    #[serde(default)]
    pub liquidate_on_start: bool,
}

fn default_backoff() -> u64 {
    300
}
fn default_settle() -> u64 {
    60
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            failure_backoff_secs: default_backoff(),
            settle_secs: default_settle(),
            liquidate_on_start: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        let r = &self.ranking;
        if r.long_window == 0 || r.medium_window == 0 || r.short_window == 0 {
            return Err(Error::Config("ranking windows must be > 0".into()));
        }
        if r.top_long == 0 || r.top_medium == 0 || r.top_short == 0 {
            return Err(Error::Config("ranking sizes must be > 0".into()));
        }
        if (r.lookback_days as usize) <= r.long_window {
            return Err(Error::Config(format!(
                "lookback_days ({}) must exceed long_window ({})",
                r.lookback_days, r.long_window
            )));
        }
        if !self.rebalance.min_trade_usd.is_finite() || self.rebalance.min_trade_usd < 0.0 {
            return Err(Error::Config("min_trade_usd must be >= 0".into()));
        }
        let f = self.rebalance.budget_fraction;
        if !(f > 0.0 && f <= 1.0) {
            return Err(Error::Config("budget_fraction must be in (0.0, 1.0]".into()));
        }
        if self.venue.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        Schedule::from_config(&self.schedule)?;
        Ok(())
    }

    /// The three-stage cascade described by `[ranking]`.
    pub fn cascade(&self) -> RankingCascade {
        let r = &self.ranking;
        RankingCascade {
            long: Horizon {
                window: r.long_window,
                keep: r.top_long,
            },
            medium: Horizon {
                window: r.medium_window,
                keep: r.top_medium,
            },
            short: Horizon {
                window: r.short_window,
                keep: r.top_short,
            },
        }
    }

    pub fn min_trade_cents(&self) -> i64 {
        (self.rebalance.min_trade_usd * 100.0).round() as i64
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.driver.failure_backoff_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.driver.settle_secs)
    }

    /// API key and secret from the configured environment variables.
    pub fn credentials(&self) -> Result<(String, String)> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Credentials(name.to_string()))
        };
        Ok((read(&self.venue.key_env)?, read(&self.venue.secret_env)?))
    }

    pub fn alpaca_settings(&self) -> AlpacaSettings {
        AlpacaSettings {
            trading_url: self.venue.trading_url.clone(),
            data_url: self.venue.data_url.clone(),
            feed: self.venue.feed.clone(),
            timeout: Duration::from_secs(self.venue.timeout_secs),
        }
    }
}
