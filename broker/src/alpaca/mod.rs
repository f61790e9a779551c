//! Alpaca broker implementation.

pub mod client;
pub mod types;

use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use trendbook::{PriceFrame, Symbol};

use crate::error::BrokerError;
use crate::types::*;
use crate::{Broker, BrokerResult, MarketCalendar, PriceHistory};
use client::AlpacaClient;
use types::{OrderRequest, OrderResponse, PositionResponse};

/// Symbols per bars request; Alpaca caps the `symbols` query length.
const BARS_BATCH: usize = 100;

/// Connection settings for [`AlpacaBroker::connect`].
#[derive(Debug, Clone)]
pub struct AlpacaSettings {
    pub trading_url: String,
    pub data_url: String,
    pub feed: String,
    pub timeout: Duration,
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        Self {
            trading_url: client::PAPER_URL.to_string(),
            data_url: client::DATA_URL.to_string(),
            feed: "iex".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Alpaca account implementing [`Broker`], [`MarketCalendar`] and
/// [`PriceHistory`]. Blocking (sync) via `reqwest::blocking`.
pub struct AlpacaBroker {
    client: AlpacaClient,
}

impl AlpacaBroker {
    /// Build the client and verify the credentials with an account request.
    pub fn connect(api_key: &str, secret_key: &str, settings: &AlpacaSettings) -> BrokerResult<Self> {
        let client = AlpacaClient::new(
            api_key,
            secret_key,
            &settings.trading_url,
            &settings.data_url,
            &settings.feed,
            settings.timeout,
        )?;
        let account = client.account()?;
        if account.trading_blocked {
            warn!("Alpaca reports trading is blocked on this account");
        }
        Ok(Self { client })
    }
}

impl Broker for AlpacaBroker {
    fn account(&self) -> BrokerResult<Account> {
        let acct = self.client.account()?;
        Ok(Account {
            portfolio_value_cents: parse_cents(&acct.portfolio_value)?,
            buying_power_cents: parse_cents(&acct.buying_power)?,
            cash_cents: parse_cents(&acct.cash)?,
        })
    }

    fn positions(&self) -> BrokerResult<Vec<Position>> {
        self.client
            .positions()?
            .iter()
            .filter_map(|p| match to_position(p) {
                Ok(pos) => Some(Ok(pos)),
                Err(BrokerError::InvalidSymbol(s)) => {
                    warn!("Ignoring position with unsupported symbol {s}");
                    None
                }
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    fn open_orders(&self) -> BrokerResult<Vec<OpenOrder>> {
        self.client
            .open_orders()?
            .iter()
            .filter_map(|o| match to_open_order(o) {
                Ok(order) => Some(Ok(order)),
                Err(BrokerError::InvalidSymbol(s)) => {
                    warn!("Ignoring open order with unsupported symbol {s}");
                    None
                }
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    fn cancel_order(&self, id: &OrderRef) -> BrokerResult<()> {
        self.client.cancel_order(&id.0)
    }

    fn submit_order(&self, order: &BrokerOrder) -> BrokerResult<OrderRef> {
        let request = OrderRequest {
            symbol: order.symbol.as_str(),
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            time_in_force: order.time_in_force.as_str(),
        };
        let resp = self.client.submit_order(&request)?;
        debug!("Alpaca accepted order {} ({})", resp.id, resp.status);
        Ok(OrderRef(resp.id))
    }

    fn close_position(&self, symbol: &Symbol) -> BrokerResult<()> {
        self.client.close_position(symbol.as_str())
    }

    fn latest_price(&self, symbol: &Symbol) -> BrokerResult<i64> {
        let trade = self.client.latest_trade(symbol.as_str())?;
        dollars_to_cents(trade.trade.p)
    }
}

impl MarketCalendar for AlpacaBroker {
    fn clock(&self) -> BrokerResult<MarketClock> {
        let c = self.client.clock()?;
        // Alpaca stamps the clock in exchange time, so the local part is the
        // exchange wall clock.
        Ok(MarketClock {
            now: c.timestamp.naive_local(),
            is_open: c.is_open,
            next_open: c.next_open.naive_local(),
            next_close: c.next_close.naive_local(),
        })
    }

    fn is_trading_day(&self, date: NaiveDate) -> BrokerResult<bool> {
        let days = self.client.calendar(date, date)?;
        Ok(days.iter().any(|d| d.date == date))
    }
}

impl PriceHistory for AlpacaBroker {
    fn daily_closes(
        &self,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BrokerResult<PriceFrame> {
        let mut series: FxHashMap<Symbol, Vec<(NaiveDate, f64)>> = FxHashMap::default();

        for batch in symbols.chunks(BARS_BATCH) {
            let joined = batch
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let mut token: Option<String> = None;
            loop {
                let page = self
                    .client
                    .daily_bars_page(&joined, start, end, token.as_deref())?;
                for (name, bars) in page.bars.unwrap_or_default() {
                    let Some(sym) = Symbol::try_new(&name) else {
                        continue;
                    };
                    series
                        .entry(sym)
                        .or_default()
                        .extend(bars.iter().map(|b| (b.t.date_naive(), b.c)));
                }
                match page.next_page_token {
                    Some(t) if !t.is_empty() => token = Some(t),
                    _ => break,
                }
            }
        }

        // keep universe order for deterministic ranking ties
        let bars = symbols
            .iter()
            .filter_map(|s| series.remove(s).map(|b| (*s, b)))
            .collect::<Vec<_>>();
        debug!("Fetched daily bars for {}/{} symbols", bars.len(), symbols.len());
        Ok(PriceFrame::from_bars(bars))
    }
}

// === Conversions ===

/// Parse a decimal dollar string into cents, rounding to the nearest cent.
pub fn parse_cents(s: &str) -> BrokerResult<i64> {
    let val: f64 = s
        .trim()
        .parse()
        .map_err(|_| BrokerError::Parse(format!("not a decimal amount: '{s}'")))?;
    dollars_to_cents(val)
}

fn dollars_to_cents(val: f64) -> BrokerResult<i64> {
    if !val.is_finite() {
        return Err(BrokerError::Parse(format!("non-finite amount {val}")));
    }
    Ok((val * 100.0).round() as i64)
}

/// Whole shares; fractional remainders are ignored.
pub fn parse_whole_shares(s: &str) -> BrokerResult<i64> {
    let val: f64 = s
        .trim()
        .parse()
        .map_err(|_| BrokerError::Parse(format!("not a quantity: '{s}'")))?;
    Ok(val.trunc() as i64)
}

pub fn to_position(p: &PositionResponse) -> BrokerResult<Position> {
    let symbol = Symbol::try_new(&p.symbol).ok_or_else(|| BrokerError::InvalidSymbol(p.symbol.clone()))?;
    Ok(Position {
        symbol,
        quantity: parse_whole_shares(&p.qty)?,
        market_value_cents: parse_cents(&p.market_value)?,
        current_price_cents: parse_cents(&p.current_price)?,
        avg_cost_cents: parse_cents(&p.avg_entry_price)?,
    })
}

pub fn to_open_order(o: &OrderResponse) -> BrokerResult<OpenOrder> {
    let symbol = Symbol::try_new(&o.symbol).ok_or_else(|| BrokerError::InvalidSymbol(o.symbol.clone()))?;
    let side = match o.side.as_str() {
        "buy" => BrokerSide::Buy,
        "sell" => BrokerSide::Sell,
        other => return Err(BrokerError::Parse(format!("unknown order side '{other}'"))),
    };
    let quantity = match &o.qty {
        Some(q) => parse_whole_shares(q)?.max(0) as u64,
        None => 0,
    };
    Ok(OpenOrder {
        id: OrderRef(o.id.clone()),
        symbol,
        side,
        quantity,
    })
}
