//! Point-in-time view of the account, read once per cycle.

use log::warn;
use rustc_hash::FxHashMap;
use trendbook::{Symbol, TargetWeights};
use trendbook_broker::{Broker, OpenOrder, OrderRef, Position};

use crate::error::Result;

/// Account state the planner works from.
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub total_value_cents: i64,
    pub buying_power_cents: i64,
    /// In venue order. Zero-quantity entries are dropped.
    pub positions: Vec<Position>,
    pub open_orders: Vec<OpenOrder>,
    /// Latest trade prices for target instruments; absent when unavailable.
    pub prices: FxHashMap<Symbol, i64>,
}

impl AccountSnapshot {
    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == *symbol)
    }

    /// Ids of all working orders for `symbol`.
    pub fn open_orders_for(&self, symbol: &Symbol) -> Vec<OrderRef> {
        self.open_orders
            .iter()
            .filter(|o| o.symbol == *symbol)
            .map(|o| o.id.clone())
            .collect()
    }

    pub fn price(&self, symbol: &Symbol) -> Option<i64> {
        self.prices.get(symbol).copied().filter(|&p| p > 0)
    }
}

/// Read account, positions, open orders and latest prices for `weights`.
///
/// A failed account or listing call fails the capture. A failed price for
/// one target only leaves that price out.
pub fn capture(broker: &dyn Broker, weights: &TargetWeights) -> Result<AccountSnapshot> {
    let account = broker.account()?;
    let positions = broker
        .positions()?
        .into_iter()
        .filter(|p| p.quantity != 0)
        .collect();
    let open_orders = broker.open_orders()?;

    let mut prices = FxHashMap::default();
    for symbol in weights.symbols() {
        match broker.latest_price(&symbol) {
            Ok(p) if p > 0 => {
                prices.insert(symbol, p);
            }
            Ok(p) => warn!("Ignoring non-positive price {p} for {symbol}"),
            Err(e) => warn!("No latest price for {symbol}: {e}"),
        }
    }

    Ok(AccountSnapshot {
        total_value_cents: account.portfolio_value_cents,
        buying_power_cents: account.buying_power_cents,
        positions,
        open_orders,
        prices,
    })
}
