//! Shared broker types: accounts, positions, orders, clock.

use std::fmt;

use chrono::NaiveDateTime;
use trendbook::Symbol;

/// Account summary from the broker. All amounts in cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Total portfolio value (cash + positions).
    pub portfolio_value_cents: i64,
    pub buying_power_cents: i64,
    pub cash_cents: i64,
}

/// A live position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: Symbol,
    /// Whole shares. Positive = long.
    pub quantity: i64,
    pub market_value_cents: i64,
    pub current_price_cents: i64,
    pub avg_cost_cents: i64,
}

/// Opaque order reference returned by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderRef(pub String);

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A working order on the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    pub id: OrderRef,
    pub symbol: Symbol,
    pub side: BrokerSide,
    pub quantity: u64,
}

/// Order to submit to a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOrder {
    pub symbol: Symbol,
    pub side: BrokerSide,
    pub quantity: u64,
    pub order_type: BrokerOrderType,
    pub time_in_force: BrokerTif,
}

impl BrokerOrder {
    /// Market order valid for the day.
    pub fn market_day(symbol: Symbol, side: BrokerSide, quantity: u64) -> Self {
        Self {
            symbol,
            side,
            quantity,
            order_type: BrokerOrderType::Market,
            time_in_force: BrokerTif::Day,
        }
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerSide {
    Buy,
    Sell,
}

impl BrokerSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerSide::Buy => "buy",
            BrokerSide::Sell => "sell",
        }
    }
}

/// Order type. Rebalancing only sends market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderType {
    Market,
}

impl BrokerOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerOrderType::Market => "market",
        }
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerTif {
    Day,
}

impl BrokerTif {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerTif::Day => "day",
        }
    }
}

/// Exchange clock. Times are exchange-local wall-clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    pub now: NaiveDateTime,
    pub is_open: bool,
    pub next_open: NaiveDateTime,
    pub next_close: NaiveDateTime,
}
