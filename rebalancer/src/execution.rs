//! Plan execution, startup liquidation, and the CLI command handlers.
//!
//! Actions run strictly in plan order. A failed cancel or submit is logged
//! and recorded; the rest of the plan still runs.

use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;
use trendbook::Symbol;
use trendbook_broker::{Broker, BrokerOrder, BrokerSide, MarketCalendar, OrderRef, Position};

use crate::broker;
use crate::budget::CapitalBudget;
use crate::config::Config;
use crate::driver::{CycleDriver, DriverSettings, Proposal, Sleeper, ThreadSleeper};
use crate::error::{Error, Result};
use crate::plan::{Action, RebalancePlan};
use crate::schedule::Schedule;
use crate::universe::Universe;

/// Pause between cancelling working orders and closing positions.
const CANCEL_SETTLE: Duration = Duration::from_secs(5);

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Cancelled,
    Submitted(OrderRef),
    Failed(String),
    /// Not sent (dry run).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: Action,
    pub outcome: Outcome,
}

/// Per-action results of executing a plan, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
    pub cancelled: usize,
    pub submitted: usize,
    pub failed: usize,
}

impl ExecutionReport {
    fn record(&mut self, action: &Action, outcome: Outcome) {
        match &outcome {
            Outcome::Cancelled => self.cancelled += 1,
            Outcome::Submitted(_) => self.submitted += 1,
            Outcome::Failed(_) => self.failed += 1,
            Outcome::Skipped => {}
        }
        self.outcomes.push(ActionOutcome {
            action: action.clone(),
            outcome,
        });
    }
}

/// Send every action of `plan` to `broker`, in order.
pub fn execute(broker: &dyn Broker, plan: &RebalancePlan, dry_run: bool) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for action in &plan.actions {
        if dry_run {
            info!("[DRY RUN] {action}");
            report.record(action, Outcome::Skipped);
            continue;
        }

        let outcome = match action {
            Action::CancelOrder { symbol, order_id } => {
                match broker.cancel_order(&OrderRef(order_id.clone())) {
                    Ok(()) => {
                        info!("Cancelled order {order_id} for {symbol}");
                        Outcome::Cancelled
                    }
                    Err(e) => {
                        error!("Cancel of order {order_id} for {symbol} failed: {e}");
                        Outcome::Failed(e.to_string())
                    }
                }
            }
            Action::Sell { symbol, shares, .. } => {
                submit(broker, action, BrokerOrder::market_day(*symbol, BrokerSide::Sell, *shares))
            }
            Action::Buy { symbol, shares, .. } => {
                submit(broker, action, BrokerOrder::market_day(*symbol, BrokerSide::Buy, *shares))
            }
        };
        report.record(action, outcome);
    }

    report
}

fn submit(broker: &dyn Broker, action: &Action, order: BrokerOrder) -> Outcome {
    match broker.submit_order(&order) {
        Ok(id) => {
            info!("Submitted {action} as {id}");
            Outcome::Submitted(id)
        }
        Err(e) => {
            error!("Order failed for {}: {e}", order.symbol);
            Outcome::Failed(e.to_string())
        }
    }
}

/// Result of [`liquidate_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationReport {
    pub cancelled: usize,
    pub closed: usize,
    /// Closed with a market order after `close_position` failed.
    pub fallback_orders: usize,
    pub failed: Vec<Symbol>,
}

/// Cancel every working order and flatten every position, then wait
/// `settle` for the fills to land.
///
/// Listing orders or positions failing is an error; individual cancels and
/// closes are best effort.
pub fn liquidate_all(
    broker: &dyn Broker,
    sleeper: &dyn Sleeper,
    settle: Duration,
) -> Result<LiquidationReport> {
    let mut report = LiquidationReport::default();

    let orders = broker.open_orders()?;
    for order in &orders {
        match broker.cancel_order(&order.id) {
            Ok(()) => report.cancelled += 1,
            Err(e) => warn!("Could not cancel order {} for {}: {e}", order.id, order.symbol),
        }
    }
    if !orders.is_empty() {
        sleeper.sleep(CANCEL_SETTLE);
    }

    for pos in broker.positions()? {
        if pos.quantity == 0 {
            continue;
        }
        match broker.close_position(&pos.symbol) {
            Ok(()) => {
                info!("Closed position in {}", pos.symbol);
                report.closed += 1;
            }
            Err(e) => {
                warn!("close_position failed for {}: {e}; sending market order", pos.symbol);
                let side = if pos.quantity > 0 {
                    BrokerSide::Sell
                } else {
                    BrokerSide::Buy
                };
                let order = BrokerOrder::market_day(pos.symbol, side, pos.quantity.unsigned_abs());
                match broker.submit_order(&order) {
                    Ok(_) => report.fallback_orders += 1,
                    Err(e) => {
                        error!("Could not liquidate {}: {e}", pos.symbol);
                        report.failed.push(pos.symbol);
                    }
                }
            }
        }
    }

    info!(
        "Liquidation: {} orders cancelled, {} positions closed, {} by market order; waiting {}s",
        report.cancelled,
        report.closed,
        report.fallback_orders,
        settle.as_secs()
    );
    sleeper.sleep(settle);
    Ok(report)
}

// === CLI commands ===

/// Options for `rebalancer run`.
pub struct RunOptions {
    pub once: bool,
    pub dry_run: bool,
    pub liquidate: bool,
    pub force: bool,
}

/// Run the scheduled rebalance loop (or a single cycle with `once`).
pub fn run(config: &Config, opts: &RunOptions) -> Result<()> {
    let universe = Universe::load(&config.universe)?;
    let schedule = Schedule::from_config(&config.schedule)?;
    let venue = broker::connect(config)?;
    info!(
        "Universe of {} instruments, rebalancing {}",
        universe.len(),
        schedule.cadence
    );

    let liquidate = opts.liquidate || config.driver.liquidate_on_start;
    if liquidate && !opts.dry_run && !opts.force {
        confirm("Liquidate ALL positions before the first rebalance?")?;
    }

    let sleeper = ThreadSleeper;
    let mut driver = CycleDriver::new(
        &venue,
        &venue,
        &venue,
        &sleeper,
        universe,
        config.cascade(),
        schedule,
        CapitalBudget::new(config.rebalance.budget_fraction),
        DriverSettings::from_config(config, opts.dry_run),
    );

    if opts.once {
        driver.observe_budget()?;
        if liquidate && !opts.dry_run {
            liquidate_all(&venue, &sleeper, config.settle_delay())?;
        }
        let report = driver.run_cycle()?;
        display_plan(&report.proposal.plan);
        println!(
            "\n{} cancelled, {} submitted, {} failed{}",
            report.execution.cancelled,
            report.execution.submitted,
            report.execution.failed,
            if opts.dry_run { " [DRY RUN]" } else { "" }
        );
        return Ok(());
    }

    driver.run(liquidate, None)
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    as_of: String,
    weights: &'a trendbook::TargetWeights,
    dropped: Vec<&'a str>,
    plan: &'a RebalancePlan,
}

/// Rank and plan against the live account without trading.
pub fn show_plan(config: &Config, json: bool) -> Result<()> {
    let universe = Universe::load(&config.universe)?;
    let schedule = Schedule::from_config(&config.schedule)?;
    let venue = broker::connect(config)?;
    let sleeper = ThreadSleeper;
    let mut driver = CycleDriver::new(
        &venue,
        &venue,
        &venue,
        &sleeper,
        universe,
        config.cascade(),
        schedule,
        CapitalBudget::new(config.rebalance.budget_fraction),
        DriverSettings::from_config(config, true),
    );
    let proposal = driver.propose()?;

    if json {
        let out = PlanOutput {
            as_of: proposal.as_of.to_string(),
            weights: &proposal.weights,
            dropped: proposal.dropped.iter().map(|s| s.as_str()).collect(),
            plan: &proposal.plan,
        };
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| Error::Data(format!("failed to serialize plan: {e}")))?;
        println!("{text}");
    } else {
        display_proposal(&proposal);
    }
    Ok(())
}

/// Show current positions and account values.
pub fn show_positions(config: &Config) -> Result<()> {
    let venue = broker::connect(config)?;
    let account = venue.account()?;
    println!(
        "Portfolio ${:.2}, buying power ${:.2}, cash ${:.2}\n",
        account.portfolio_value_cents as f64 / 100.0,
        account.buying_power_cents as f64 / 100.0,
        account.cash_cents as f64 / 100.0,
    );
    display_positions(&venue.positions()?, account.portfolio_value_cents);
    Ok(())
}

/// Check connectivity, the exchange clock, and the next fire time.
pub fn check_status(config: &Config) -> Result<()> {
    print!("Connecting to {}... ", config.venue.trading_url);
    let venue = broker::connect(config)?;
    println!("OK");

    let clock = venue.clock()?;
    println!(
        "Exchange time {} (market {})",
        clock.now.format("%Y-%m-%d %H:%M"),
        if clock.is_open { "open" } else { "closed" }
    );
    let schedule = Schedule::from_config(&config.schedule)?;
    let next = schedule.next_fire_time(&clock, &venue)?;
    println!("Cadence: {}; next rebalance {}", schedule.cadence, next.format("%Y-%m-%d %H:%M"));
    Ok(())
}

/// Cancel all orders and close all positions.
pub fn liquidate(config: &Config, force: bool) -> Result<()> {
    let venue = broker::connect(config)?;
    if !force {
        confirm("Cancel all open orders and close ALL positions?")?;
    }
    let report = liquidate_all(&venue, &ThreadSleeper, Duration::ZERO)?;
    println!(
        "{} orders cancelled, {} positions closed, {} closed by market order",
        report.cancelled, report.closed, report.fallback_orders
    );
    if !report.failed.is_empty() {
        let names: Vec<&str> = report.failed.iter().map(|s| s.as_str()).collect();
        return Err(Error::Data(format!("could not liquidate: {}", names.join(", "))));
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<()> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;
    if confirmed {
        Ok(())
    } else {
        Err(Error::Aborted("Aborted.".into()))
    }
}

// === Display ===

fn display_positions(positions: &[Position], total_cents: i64) {
    if positions.is_empty() {
        println!("No positions.");
        return;
    }

    println!("CURRENT PORTFOLIO:");
    for pos in positions {
        let weight = if total_cents > 0 {
            pos.market_value_cents as f64 / total_cents as f64
        } else {
            0.0
        };
        println!(
            "  {:8} {:>6} @ ${:>8.2} = ${:>10.2}  ({:.1}%)",
            pos.symbol,
            pos.quantity,
            pos.current_price_cents as f64 / 100.0,
            pos.market_value_cents as f64 / 100.0,
            weight * 100.0,
        );
    }
}

fn display_proposal(proposal: &Proposal) {
    println!("TARGETS as of {}:", proposal.as_of);
    for (symbol, weight) in proposal.weights.iter() {
        println!("  {:8} {:>6.2}%", symbol, weight * 100.0);
    }
    if !proposal.dropped.is_empty() {
        println!("({} instruments dropped for incomplete history)", proposal.dropped.len());
    }
    display_plan(&proposal.plan);
}

fn display_plan(plan: &RebalancePlan) {
    if !plan.has_trades() && plan.skipped.is_empty() {
        println!("\nNo rebalancing needed.");
        return;
    }

    println!("\nREBALANCE PLAN:");
    println!("  {:>3}  {:8} {:8} {:>8} {:>12}", "#", "Action", "Symbol", "Shares", "Notional");
    for (i, action) in plan.actions.iter().enumerate() {
        let (label, shares) = match action {
            Action::CancelOrder { .. } => ("CANCEL", 0),
            Action::Sell { shares, .. } => ("SELL", *shares),
            Action::Buy { shares, .. } => ("BUY", *shares),
        };
        println!(
            "  {:>3}  {:8} {:8} {:>8} ${:>11.2}",
            i + 1,
            label,
            action.symbol(),
            shares,
            action.notional_cents() as f64 / 100.0,
        );
    }
    for skip in &plan.skipped {
        println!("  skip {:8} ${:>11.2}  {}", skip.symbol, skip.wanted_cents as f64 / 100.0, skip.reason);
    }
    println!(
        "\nBudget ${:.2}, ${:.2} left after buys",
        plan.budget_start_cents as f64 / 100.0,
        plan.budget_remaining_cents as f64 / 100.0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use trendbook_broker::mock::{MockBroker, VenueCall};

    #[derive(Default)]
    struct RecordingSleeper(RefCell<Vec<Duration>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn buy(symbol: &str, shares: u64) -> Action {
        Action::Buy {
            symbol: Symbol::new(symbol),
            shares,
            price_cents: 100,
        }
    }

    #[test]
    fn dry_run_sends_nothing() {
        let broker = MockBroker::builder().build();
        let plan = RebalancePlan {
            actions: vec![buy("A", 1)],
            ..Default::default()
        };
        let report = execute(&broker, &plan, true);
        assert!(broker.calls().is_empty());
        assert_eq!(report.outcomes[0].outcome, Outcome::Skipped);
        assert_eq!(report.submitted, 0);
    }

    #[test]
    fn failed_cancel_does_not_stop_plan() {
        let broker = MockBroker::builder().fail_cancels().build();
        let plan = RebalancePlan {
            actions: vec![
                Action::CancelOrder {
                    symbol: Symbol::new("A"),
                    order_id: "o-1".into(),
                },
                buy("A", 2),
            ],
            ..Default::default()
        };
        let report = execute(&broker, &plan, false);
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 1);
        assert_eq!(broker.calls().len(), 2);
    }

    #[test]
    fn trades_go_out_as_market_day_orders_on_their_side() {
        let broker = MockBroker::builder().build();
        let plan = RebalancePlan {
            actions: vec![
                Action::Sell {
                    symbol: Symbol::new("A"),
                    shares: 3,
                    price_cents: 10_00,
                },
                buy("B", 2),
            ],
            ..Default::default()
        };

        let report = execute(&broker, &plan, false);
        assert_eq!(report.submitted, 2);
        assert_eq!(
            broker.submitted_orders(),
            vec![
                BrokerOrder::market_day(Symbol::new("A"), BrokerSide::Sell, 3),
                BrokerOrder::market_day(Symbol::new("B"), BrokerSide::Buy, 2),
            ]
        );
    }

    #[test]
    fn liquidate_falls_back_to_market_sell() {
        let a = Symbol::new("A");
        let broker = MockBroker::builder()
            .with_position(a, 7, 10_00)
            .with_open_order("o-9", a, BrokerSide::Buy, 1)
            .fail_close_position()
            .build();
        let sleeper = RecordingSleeper::default();

        let report = liquidate_all(&broker, &sleeper, Duration::from_secs(60)).unwrap();
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.fallback_orders, 1);
        assert_eq!(
            broker.calls(),
            vec![
                VenueCall::Cancel(OrderRef("o-9".into())),
                VenueCall::Close(a),
                VenueCall::Submit(BrokerOrder::market_day(a, BrokerSide::Sell, 7)),
            ]
        );
        assert_eq!(
            *sleeper.0.borrow(),
            vec![CANCEL_SETTLE, Duration::from_secs(60)]
        );
    }
}
