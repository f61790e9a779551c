//! Two-phase rebalance planner.
//!
//! Phase 1 walks held positions and sells whatever is overweight relative
//! to the target (everything, for instruments that dropped out). Phase 2
//! walks the targets in rank order and buys towards each target value, capped
//! by what is left of the cycle budget. Any working order on an instrument is
//! cancelled before that instrument is traded.
//!
//! Planning is pure: it reads an [`AccountSnapshot`] and returns a
//! [`RebalancePlan`]. Nothing is sent to the venue here.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;
use trendbook::{Symbol, TargetWeights};

use crate::snapshot::AccountSnapshot;

/// One step of a plan, executed in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CancelOrder {
        symbol: Symbol,
        order_id: String,
    },
    Sell {
        symbol: Symbol,
        shares: u64,
        price_cents: i64,
    },
    Buy {
        symbol: Symbol,
        shares: u64,
        price_cents: i64,
    },
}

impl Action {
    pub fn symbol(&self) -> Symbol {
        match self {
            Action::CancelOrder { symbol, .. }
            | Action::Sell { symbol, .. }
            | Action::Buy { symbol, .. } => *symbol,
        }
    }

    /// Estimated value of a trade in cents; zero for cancels.
    pub fn notional_cents(&self) -> i64 {
        match self {
            Action::CancelOrder { .. } => 0,
            Action::Sell { shares, price_cents, .. } | Action::Buy { shares, price_cents, .. } => {
                *shares as i64 * price_cents
            }
        }
    }

    pub fn is_trade(&self) -> bool {
        !matches!(self, Action::CancelOrder { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CancelOrder { symbol, order_id } => write!(f, "CANCEL {symbol} order {order_id}"),
            Action::Sell { symbol, shares, price_cents } => {
                write!(f, "SELL {shares} {symbol} @ ${:.2}", *price_cents as f64 / 100.0)
            }
            Action::Buy { symbol, shares, price_cents } => {
                write!(f, "BUY {shares} {symbol} @ ${:.2}", *price_cents as f64 / 100.0)
            }
        }
    }
}

/// Why a target instrument was not bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The affordable trade is worth less than the minimum trade value.
    BelowMinimum,
    /// The trade would have cleared the minimum, but the remaining budget
    /// does not cover it.
    ExceedsBudget,
    /// No usable latest price.
    PriceUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BelowMinimum => f.write_str("below minimum trade value"),
            SkipReason::ExceedsBudget => f.write_str("exceeds remaining budget"),
            SkipReason::PriceUnavailable => f.write_str("price unavailable"),
        }
    }
}

/// A target that wanted capital but got none this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedBuy {
    pub symbol: Symbol,
    pub wanted_cents: i64,
    pub reason: SkipReason,
}

/// Ordered actions plus the buys that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebalancePlan {
    pub actions: Vec<Action>,
    pub skipped: Vec<SkippedBuy>,
    pub budget_start_cents: i64,
    pub budget_remaining_cents: i64,
}

impl RebalancePlan {
    pub fn trades(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.is_trade())
    }

    pub fn has_trades(&self) -> bool {
        self.actions.iter().any(Action::is_trade)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for RebalancePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Budget: ${:.2} start, ${:.2} remaining",
            self.budget_start_cents as f64 / 100.0,
            self.budget_remaining_cents as f64 / 100.0
        )?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {:>3}  {action}", i + 1)?;
        }
        for skip in &self.skipped {
            writeln!(
                f,
                "  skip {} (${:.2} wanted): {}",
                skip.symbol,
                skip.wanted_cents as f64 / 100.0,
                skip.reason
            )?;
        }
        Ok(())
    }
}

/// Build the plan that moves `snapshot` towards `weights`.
///
/// `budget_cents` caps the total value of buys; `min_trade_cents` is the
/// smallest trade worth sending. All share counts are whole and floored.
pub fn plan(
    weights: &TargetWeights,
    snapshot: &AccountSnapshot,
    budget_cents: i64,
    min_trade_cents: i64,
) -> RebalancePlan {
    let total = snapshot.total_value_cents;
    let mut actions = Vec::new();
    let mut skipped = Vec::new();
    let mut cancelled: FxHashSet<Symbol> = FxHashSet::default();
    let mut remaining = budget_cents.max(0);

    // Phase 1: reduce overweight positions and exit dropped instruments.
    for pos in &snapshot.positions {
        cancel_open_orders(snapshot, pos.symbol, &mut cancelled, &mut actions);

        let price = pos.current_price_cents;
        if pos.quantity <= 0 || price <= 0 || total <= 0 {
            continue;
        }
        let current_weight = pos.market_value_cents as f64 / total as f64;
        let target_weight = weights.get(&pos.symbol).unwrap_or(0.0);
        if current_weight <= target_weight {
            continue;
        }

        let target_shares = (total as f64 * target_weight / price as f64).floor() as i64;
        let shares_to_sell = pos.quantity - target_shares.max(0);
        if shares_to_sell > 0 && shares_to_sell * price >= min_trade_cents {
            actions.push(Action::Sell {
                symbol: pos.symbol,
                shares: shares_to_sell as u64,
                price_cents: price,
            });
        }
    }

    // Phase 2: fund targets in rank order from the remaining budget.
    for (symbol, weight) in weights.iter() {
        cancel_open_orders(snapshot, symbol, &mut cancelled, &mut actions);

        let target_value = (total as f64 * weight).floor() as i64;
        let current_value = snapshot
            .position(&symbol)
            .map(|p| p.market_value_cents)
            .unwrap_or(0);
        let value_to_buy = target_value - current_value;
        if value_to_buy <= 0 {
            continue;
        }

        let Some(price) = snapshot.price(&symbol) else {
            skipped.push(SkippedBuy {
                symbol,
                wanted_cents: value_to_buy,
                reason: SkipReason::PriceUnavailable,
            });
            continue;
        };

        let shares = value_to_buy.min(remaining) / price;
        let buy_value = shares * price;
        if buy_value >= min_trade_cents && buy_value <= remaining && shares > 0 {
            remaining -= buy_value;
            actions.push(Action::Buy {
                symbol,
                shares: shares as u64,
                price_cents: price,
            });
        } else {
            let uncapped = (value_to_buy / price) * price;
            let reason = if value_to_buy > remaining && uncapped >= min_trade_cents && uncapped > 0 {
                SkipReason::ExceedsBudget
            } else {
                SkipReason::BelowMinimum
            };
            skipped.push(SkippedBuy {
                symbol,
                wanted_cents: value_to_buy,
                reason,
            });
        }
    }

    RebalancePlan {
        actions,
        skipped,
        budget_start_cents: budget_cents.max(0),
        budget_remaining_cents: remaining,
    }
}

fn cancel_open_orders(
    snapshot: &AccountSnapshot,
    symbol: Symbol,
    cancelled: &mut FxHashSet<Symbol>,
    actions: &mut Vec<Action>,
) {
    if !cancelled.insert(symbol) {
        return;
    }
    for id in snapshot.open_orders_for(&symbol) {
        actions.push(Action::CancelOrder {
            symbol,
            order_id: id.0,
        });
    }
}
