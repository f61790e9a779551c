//! Alpaca-specific API request and response types.
//!
//! Alpaca encodes most decimal amounts as strings.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// GET /v2/account
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub portfolio_value: String,
    pub buying_power: String,
    pub cash: String,
    #[serde(default)]
    pub trading_blocked: bool,
}

/// GET /v2/positions (one entry)
#[derive(Debug, Deserialize)]
pub struct PositionResponse {
    pub symbol: String,
    pub qty: String,
    pub market_value: String,
    pub current_price: String,
    pub avg_entry_price: String,
}

/// GET /v2/orders, POST /v2/orders
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub qty: Option<String>,
    pub side: String,
    pub status: String,
}

/// POST /v2/orders body
#[derive(Debug, Serialize)]
pub struct OrderRequest<'a> {
    pub symbol: &'a str,
    pub qty: String,
    pub side: &'a str,
    #[serde(rename = "type")]
    pub order_type: &'a str,
    pub time_in_force: &'a str,
}

/// GET /v2/clock
#[derive(Debug, Deserialize)]
pub struct ClockResponse {
    pub timestamp: DateTime<FixedOffset>,
    pub is_open: bool,
    pub next_open: DateTime<FixedOffset>,
    pub next_close: DateTime<FixedOffset>,
}

/// GET /v2/calendar (one session)
#[derive(Debug, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub open: String,
    pub close: String,
}

/// GET /v2/stocks/{symbol}/trades/latest
#[derive(Debug, Deserialize)]
pub struct LatestTradeResponse {
    pub symbol: String,
    pub trade: Trade,
}

#[derive(Debug, Deserialize)]
pub struct Trade {
    /// Price.
    pub p: f64,
    /// Size.
    #[serde(default)]
    pub s: f64,
}

/// GET /v2/stocks/bars (one page)
#[derive(Debug, Deserialize)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Option<HashMap<String, Vec<Bar>>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One OHLCV bar. Only the timestamp and close are used.
#[derive(Debug, Deserialize)]
pub struct Bar {
    pub t: DateTime<Utc>,
    pub c: f64,
}
