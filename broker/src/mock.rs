//! Mock venue for testing: implements [`Broker`], [`MarketCalendar`] and
//! [`PriceHistory`] with scriptable state and failure injection.
//!
//! Every state-changing call is recorded so tests can assert on the exact
//! sequence the rebalancer produced.
//!
//! ```
//! use trendbook::Symbol;
//! use trendbook_broker::mock::MockBroker;
//! use trendbook_broker::Broker;
//!
//! let broker = MockBroker::builder()
//!     .with_account(10_000_00, 10_000_00)
//!     .with_position(Symbol::new("AAPL"), 10, 150_00)
//!     .with_price(Symbol::new("MSFT"), 400_00)
//!     .build();
//!
//! assert_eq!(broker.positions().unwrap().len(), 1);
//! assert_eq!(broker.latest_price(&Symbol::new("MSFT")).unwrap(), 400_00);
//! ```

use std::sync::Mutex;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use rustc_hash::{FxHashMap, FxHashSet};
use trendbook::{PriceFrame, Symbol};

use crate::error::BrokerError;
use crate::types::*;
use crate::{Broker, BrokerResult, MarketCalendar, PriceHistory};

/// A state-changing call the mock received, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VenueCall {
    Cancel(OrderRef),
    Submit(BrokerOrder),
    Close(Symbol),
}

/// Builder for [`MockBroker`].
pub struct MockBrokerBuilder {
    account: Account,
    positions: Vec<Position>,
    open_orders: Vec<OpenOrder>,
    prices: FxHashMap<Symbol, i64>,
    clock: MarketClock,
    holidays: FxHashSet<NaiveDate>,
    history: Option<PriceFrame>,
    reject_symbols: FxHashSet<Symbol>,
    fail_cancels: bool,
    fail_close: bool,
    fail_calendar: bool,
    calendar_failures: FxHashSet<NaiveDate>,
    fail_account: bool,
}

impl MockBrokerBuilder {
    /// Portfolio value and buying power (cash = buying power).
    pub fn with_account(mut self, portfolio_value_cents: i64, buying_power_cents: i64) -> Self {
        self.account = Account {
            portfolio_value_cents,
            buying_power_cents,
            cash_cents: buying_power_cents,
        };
        self
    }

    /// Long position valued at `price_cents`; also sets the latest price.
    pub fn with_position(mut self, symbol: Symbol, quantity: i64, price_cents: i64) -> Self {
        self.positions.push(Position {
            symbol,
            quantity,
            market_value_cents: quantity * price_cents,
            current_price_cents: price_cents,
            avg_cost_cents: price_cents,
        });
        self.prices.insert(symbol, price_cents);
        self
    }

    pub fn with_open_order(mut self, id: &str, symbol: Symbol, side: BrokerSide, quantity: u64) -> Self {
        self.open_orders.push(OpenOrder {
            id: OrderRef(id.to_string()),
            symbol,
            side,
            quantity,
        });
        self
    }

    pub fn with_price(mut self, symbol: Symbol, price_cents: i64) -> Self {
        self.prices.insert(symbol, price_cents);
        self
    }

    pub fn with_clock(mut self, clock: MarketClock) -> Self {
        self.clock = clock;
        self
    }

    /// A weekday that is nevertheless closed.
    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_history(mut self, frame: PriceFrame) -> Self {
        self.history = Some(frame);
        self
    }

    /// Every order for `symbol` is rejected.
    pub fn reject_orders_for(mut self, symbol: Symbol) -> Self {
        self.reject_symbols.insert(symbol);
        self
    }

    pub fn fail_cancels(mut self) -> Self {
        self.fail_cancels = true;
        self
    }

    pub fn fail_close_position(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// `is_trading_day` returns an error for every date.
    pub fn fail_calendar(mut self) -> Self {
        self.fail_calendar = true;
        self
    }

    /// `is_trading_day` returns an error for `date` only.
    pub fn fail_calendar_on(mut self, date: NaiveDate) -> Self {
        self.calendar_failures.insert(date);
        self
    }

    pub fn fail_account(mut self) -> Self {
        self.fail_account = true;
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            account: self.account,
            positions: self.positions,
            open_orders: self.open_orders,
            prices: self.prices,
            clock: Mutex::new(self.clock),
            holidays: self.holidays,
            history: self.history,
            reject_symbols: self.reject_symbols,
            fail_cancels: self.fail_cancels,
            fail_close: self.fail_close,
            fail_calendar: self.fail_calendar,
            calendar_failures: self.calendar_failures,
            fail_account: self.fail_account,
            calls: Mutex::new(Vec::new()),
            history_requests: Mutex::new(0),
            next_order_id: Mutex::new(1),
        }
    }
}

/// In-memory venue. Holdings are a fixed snapshot: submitted orders are
/// recorded, never filled.
pub struct MockBroker {
    account: Account,
    positions: Vec<Position>,
    open_orders: Vec<OpenOrder>,
    prices: FxHashMap<Symbol, i64>,
    clock: Mutex<MarketClock>,
    holidays: FxHashSet<NaiveDate>,
    history: Option<PriceFrame>,
    reject_symbols: FxHashSet<Symbol>,
    fail_cancels: bool,
    fail_close: bool,
    fail_calendar: bool,
    calendar_failures: FxHashSet<NaiveDate>,
    fail_account: bool,
    calls: Mutex<Vec<VenueCall>>,
    history_requests: Mutex<usize>,
    next_order_id: Mutex<u64>,
}

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        MockBrokerBuilder {
            account: Account {
                portfolio_value_cents: 10_000_00,
                buying_power_cents: 10_000_00,
                cash_cents: 10_000_00,
            },
            positions: Vec::new(),
            open_orders: Vec::new(),
            prices: FxHashMap::default(),
            clock: MarketClock {
                now: midnight,
                is_open: false,
                next_open: midnight,
                next_close: midnight,
            },
            holidays: FxHashSet::default(),
            history: None,
            reject_symbols: FxHashSet::default(),
            fail_cancels: false,
            fail_close: false,
            fail_calendar: false,
            calendar_failures: FxHashSet::default(),
            fail_account: false,
        }
    }

    /// Every state-changing call, in order.
    pub fn calls(&self) -> Vec<VenueCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the submitted orders.
    pub fn submitted_orders(&self) -> Vec<BrokerOrder> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VenueCall::Submit(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    /// How many times price history was requested.
    pub fn history_requests(&self) -> usize {
        *self.history_requests.lock().unwrap()
    }

    /// Replace the exchange clock (session state, next open).
    pub fn set_clock(&self, clock: MarketClock) {
        *self.clock.lock().unwrap() = clock;
    }

    fn record(&self, call: VenueCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Broker for MockBroker {
    fn account(&self) -> BrokerResult<Account> {
        if self.fail_account {
            return Err(BrokerError::Connection("mock: account unavailable".into()));
        }
        Ok(self.account.clone())
    }

    fn positions(&self) -> BrokerResult<Vec<Position>> {
        Ok(self.positions.clone())
    }

    fn open_orders(&self) -> BrokerResult<Vec<OpenOrder>> {
        Ok(self.open_orders.clone())
    }

    fn cancel_order(&self, id: &OrderRef) -> BrokerResult<()> {
        self.record(VenueCall::Cancel(id.clone()));
        if self.fail_cancels {
            return Err(BrokerError::Other(format!("mock: cannot cancel {id}")));
        }
        Ok(())
    }

    fn submit_order(&self, order: &BrokerOrder) -> BrokerResult<OrderRef> {
        self.record(VenueCall::Submit(order.clone()));
        if self.reject_symbols.contains(&order.symbol) {
            return Err(BrokerError::Rejected {
                symbol: order.symbol.as_str().to_string(),
                reason: "mock: order rejected".into(),
            });
        }
        let mut next = self.next_order_id.lock().unwrap();
        let id = OrderRef(format!("mock-{}", *next));
        *next += 1;
        Ok(id)
    }

    fn close_position(&self, symbol: &Symbol) -> BrokerResult<()> {
        self.record(VenueCall::Close(*symbol));
        if self.fail_close {
            return Err(BrokerError::Other(format!("mock: cannot close {symbol}")));
        }
        Ok(())
    }

    fn latest_price(&self, symbol: &Symbol) -> BrokerResult<i64> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BrokerError::InvalidSymbol(symbol.as_str().to_string()))
    }
}

impl MarketCalendar for MockBroker {
    fn clock(&self) -> BrokerResult<MarketClock> {
        Ok(*self.clock.lock().unwrap())
    }

    /// Weekdays that are not listed holidays.
    fn is_trading_day(&self, date: NaiveDate) -> BrokerResult<bool> {
        if self.fail_calendar || self.calendar_failures.contains(&date) {
            return Err(BrokerError::Connection("mock: calendar unavailable".into()));
        }
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        Ok(!weekend && !self.holidays.contains(&date))
    }
}

impl PriceHistory for MockBroker {
    fn daily_closes(
        &self,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> BrokerResult<PriceFrame> {
        *self.history_requests.lock().unwrap() += 1;
        let frame = self
            .history
            .as_ref()
            .ok_or_else(|| BrokerError::Connection("mock: no price history".into()))?;

        let bars = frame
            .columns()
            .filter(|(s, _)| symbols.contains(s))
            .map(|(s, prices)| {
                let series = frame
                    .dates()
                    .iter()
                    .copied()
                    .zip(prices.iter().copied())
                    .filter(|(d, _)| *d >= start && *d <= end)
                    .collect();
                (s, series)
            })
            .collect::<Vec<_>>();
        Ok(PriceFrame::from_bars(bars))
    }
}

/// Build a [`MarketClock`] from exchange-local parts.
pub fn clock_at(now: NaiveDateTime, is_open: bool, next_open: NaiveDateTime) -> MarketClock {
    MarketClock {
        now,
        is_open,
        next_open,
        next_close: next_open,
    }
}
