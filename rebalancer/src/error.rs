//! Error types for the rebalancer.

use std::path::PathBuf;

use trendbook::SeriesError;
use trendbook_broker::BrokerError;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("universe error: {0}")]
    Universe(String),

    #[error("failed to read universe file {path}: {source}")]
    UniverseRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("missing credentials: environment variable {0} is not set")]
    Credentials(String),

    #[error("venue error: {0}")]
    Venue(#[from] BrokerError),

    #[error("price data error: {0}")]
    Data(String),

    #[error("series error: {0}")]
    Series(#[from] SeriesError),

    #[error("schedule error: {0}")]
    Schedule(String),

    #[error("execution aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, Error>;
