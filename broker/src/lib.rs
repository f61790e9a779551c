//! Venue, calendar and price-history traits for trendbook.
//!
//! The rebalancer only talks to the outside world through three traits:
//!
//! - [`Broker`]: account, positions, open orders, order submission/cancel,
//!   latest trade prices.
//! - [`MarketCalendar`]: exchange clock and the trading-day predicate.
//! - [`PriceHistory`]: daily adjusted closes for a set of instruments.
//!
//! Implementations:
//!
//! - [`mock::MockBroker`]: in-memory, scriptable, records every call.
//! - **Alpaca** (feature `alpaca`): Alpaca trading + market data REST APIs.

pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "alpaca")]
pub mod alpaca;

pub use error::BrokerError;
pub use types::*;

use chrono::NaiveDate;
use trendbook::{PriceFrame, Symbol};

pub type BrokerResult<T> = Result<T, BrokerError>;

/// A brokerage account that can be inspected and traded.
pub trait Broker {
    /// Account summary (portfolio value, buying power, cash).
    fn account(&self) -> BrokerResult<Account>;

    /// All current positions.
    fn positions(&self) -> BrokerResult<Vec<Position>>;

    /// Orders that are still working.
    fn open_orders(&self) -> BrokerResult<Vec<OpenOrder>>;

    /// Cancel a working order.
    fn cancel_order(&self, id: &OrderRef) -> BrokerResult<()>;

    /// Submit an order. Returns the venue's order reference.
    fn submit_order(&self, order: &BrokerOrder) -> BrokerResult<OrderRef>;

    /// Flatten one position at market.
    fn close_position(&self, symbol: &Symbol) -> BrokerResult<()>;

    /// Price of the most recent trade, in cents.
    fn latest_price(&self, symbol: &Symbol) -> BrokerResult<i64>;
}

/// Exchange clock and session calendar.
pub trait MarketCalendar {
    /// Current exchange-local time and session state.
    fn clock(&self) -> BrokerResult<MarketClock>;

    /// Whether `date` is a full or partial trading session.
    fn is_trading_day(&self, date: NaiveDate) -> BrokerResult<bool>;

    fn is_market_open(&self) -> BrokerResult<bool> {
        self.clock().map(|c| c.is_open)
    }
}

/// Historical daily prices.
pub trait PriceHistory {
    /// Adjusted daily closes between `start` and `end` (inclusive), aligned
    /// on the union of dates. Instruments with gaps carry `NaN`; instruments
    /// the provider knows nothing about are absent.
    fn daily_closes(
        &self,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BrokerResult<PriceFrame>;
}
