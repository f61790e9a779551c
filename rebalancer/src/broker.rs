//! Venue connection for the CLI.

use log::info;
use trendbook_broker::alpaca::AlpacaBroker;

use crate::config::Config;
use crate::error::Result;

/// Connect to Alpaca with credentials from the environment.
pub fn connect(config: &Config) -> Result<AlpacaBroker> {
    let (key, secret) = config.credentials()?;
    let broker = AlpacaBroker::connect(&key, &secret, &config.alpaca_settings())?;
    info!("Connected to {}", config.venue.trading_url);
    Ok(broker)
}
