//! The rebalance loop: wait for the next fire time, rank, plan, execute.
//!
//! The venue calendar is the clock, and sleeping goes through [`Sleeper`],
//! so a test can drive the loop with a mock venue and a sleeper that only
//! advances the mock clock.

use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use trendbook::{RankingCascade, Symbol, TargetWeights};
use trendbook_broker::{Broker, MarketCalendar, PriceHistory};

use crate::budget::CapitalBudget;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::execution::{self, ExecutionReport};
use crate::plan::{self, RebalancePlan};
use crate::schedule::Schedule;
use crate::snapshot;
use crate::universe::Universe;

/// Longest single pause while waiting for a fire time.
const MAX_SLEEP_CHUNK: Duration = Duration::from_secs(15 * 60);

/// How much longer than first estimated a wait may run before the driver
/// stops trusting the venue clock. Covers a UTC offset change.
const MAX_CLOCK_DRIFT: Duration = Duration::from_secs(2 * 3600);

/// Blocking pause between cycles.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed driver parameters.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub min_trade_cents: i64,
    pub lookback_days: u64,
    pub failure_backoff: Duration,
    pub settle_delay: Duration,
    pub dry_run: bool,
}

impl DriverSettings {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            min_trade_cents: config.min_trade_cents(),
            lookback_days: config.ranking.lookback_days,
            failure_backoff: config.failure_backoff(),
            settle_delay: config.settle_delay(),
            dry_run,
        }
    }
}

/// Target weights and the plan that would reach them.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub as_of: NaiveDate,
    pub weights: TargetWeights,
    pub dropped: Vec<Symbol>,
    pub plan: RebalancePlan,
}

/// What one executed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub proposal: Proposal,
    pub execution: ExecutionReport,
}

/// Outcome of one [`CycleDriver::step`].
#[derive(Debug)]
pub enum StepOutcome {
    Ran(CycleReport),
    /// Interval cadence woke while the market was closed.
    SkippedClosed,
}

pub struct CycleDriver<'a> {
    broker: &'a dyn Broker,
    calendar: &'a dyn MarketCalendar,
    history: &'a dyn PriceHistory,
    sleeper: &'a dyn Sleeper,
    universe: Universe,
    cascade: RankingCascade,
    schedule: Schedule,
    budget: CapitalBudget,
    settings: DriverSettings,
}

impl<'a> CycleDriver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: &'a dyn Broker,
        calendar: &'a dyn MarketCalendar,
        history: &'a dyn PriceHistory,
        sleeper: &'a dyn Sleeper,
        universe: Universe,
        cascade: RankingCascade,
        schedule: Schedule,
        budget: CapitalBudget,
        settings: DriverSettings,
    ) -> Self {
        Self {
            broker,
            calendar,
            history,
            sleeper,
            universe,
            cascade,
            schedule,
            budget,
            settings,
        }
    }

    pub fn budget(&self) -> &CapitalBudget {
        &self.budget
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Capture the budget baseline from live buying power if not yet set.
    pub fn observe_budget(&mut self) -> Result<i64> {
        if let Some(baseline) = self.budget.baseline_cents() {
            return Ok(baseline);
        }
        let account = self.broker.account()?;
        Ok(self.budget.observe(account.buying_power_cents))
    }

    /// Rank the universe and plan against the current account, without
    /// sending anything.
    pub fn propose(&mut self) -> Result<Proposal> {
        self.observe_budget()?;

        let today = self.calendar.clock()?.now.date();
        let start = today - Days::new(self.settings.lookback_days);
        let mut frame = self
            .history
            .daily_closes(self.universe.symbols(), start, today)?;
        let dropped = frame.drop_incomplete();
        if !dropped.is_empty() {
            warn!(
                "Dropped {} instruments with incomplete history: {}",
                dropped.len(),
                join_symbols(&dropped)
            );
        }

        let as_of = frame
            .last_date()
            .ok_or_else(|| Error::Data("no price history returned".into()))?;
        let weights = self.cascade.select_weights(&frame, as_of)?;
        if weights.is_empty() {
            return Err(Error::Data(format!(
                "ranking as of {as_of} selected nothing from {} instruments",
                frame.width()
            )));
        }
        info!(
            "Targets as of {as_of}: {}",
            weights
                .iter()
                .map(|(s, w)| format!("{s} {:.1}%", w * 100.0))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let snapshot = snapshot::capture(self.broker, &weights)?;
        let budget = self.budget.for_cycle().unwrap_or(0);
        let plan = plan::plan(&weights, &snapshot, budget, self.settings.min_trade_cents);

        Ok(Proposal {
            as_of,
            weights,
            dropped,
            plan,
        })
    }

    /// One full rebalance: propose, then execute the plan in order.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let proposal = self.propose()?;
        for skip in &proposal.plan.skipped {
            info!("Skipping buy of {}: {}", skip.symbol, skip.reason);
        }
        let execution = execution::execute(self.broker, &proposal.plan, self.settings.dry_run);
        info!(
            "Cycle complete: {} cancelled, {} submitted, {} failed",
            execution.cancelled, execution.submitted, execution.failed
        );
        Ok(CycleReport {
            proposal,
            execution,
        })
    }

    /// Sleep until the next fire time, then run a cycle unless an interval
    /// cadence finds the market closed.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let clock = self.calendar.clock()?;
        let fire = self.schedule.next_fire_time(&clock, self.calendar)?;
        let wait = time_until(clock.now, fire);
        info!("Next rebalance at {fire} (in {}s)", wait.as_secs());
        self.sleep_until(fire, wait)?;

        if self.schedule.is_interval() && !self.calendar.is_market_open()? {
            info!("Market closed, skipping cycle");
            return Ok(StepOutcome::SkippedClosed);
        }
        self.run_cycle().map(StepOutcome::Ran)
    }

    /// Optional startup liquidation, an immediate first cycle, then
    /// scheduled steps. Runs forever when `max_steps` is `None`.
    ///
    /// Cycle failures are logged and followed by the backoff pause; only the
    /// startup budget observation can fail the whole run.
    pub fn run(&mut self, liquidate_first: bool, max_steps: Option<usize>) -> Result<()> {
        self.observe_budget()?;

        if liquidate_first {
            if self.settings.dry_run {
                info!("Dry run: skipping startup liquidation");
            } else {
                execution::liquidate_all(self.broker, self.sleeper, self.settings.settle_delay)?;
            }
        }

        info!("Running initial rebalance");
        if let Err(e) = self.run_cycle() {
            self.back_off(&e);
        }

        let mut steps = 0usize;
        while max_steps.is_none_or(|max| steps < max) {
            steps += 1;
            if let Err(e) = self.step() {
                self.back_off(&e);
            }
        }
        Ok(())
    }

    /// Sleep in bounded chunks, re-reading the venue clock after each, until
    /// the exchange-local time reaches `fire`. Clock times carry no offset,
    /// so a daylight-saving change during the wait shows up here as a jump.
    fn sleep_until(&self, fire: NaiveDateTime, wait: Duration) -> Result<()> {
        let limit = wait + MAX_CLOCK_DRIFT;
        let mut slept = Duration::ZERO;
        let mut remaining = wait;
        while !remaining.is_zero() {
            if slept >= limit {
                warn!(
                    "Venue clock still {}s short of {fire} after waiting {}s; running now",
                    remaining.as_secs(),
                    slept.as_secs()
                );
                break;
            }
            let chunk = remaining.min(MAX_SLEEP_CHUNK);
            self.sleeper.sleep(chunk);
            slept += chunk;
            remaining = time_until(self.calendar.clock()?.now, fire);
        }
        Ok(())
    }

    fn back_off(&self, e: &Error) {
        let transient = matches!(e, Error::Venue(b) if b.is_transient());
        error!(
            "Rebalance cycle failed{}: {e}; retrying in {}s",
            if transient { " (transient)" } else { "" },
            self.settings.failure_backoff.as_secs()
        );
        self.sleeper.sleep(self.settings.failure_backoff);
    }
}

fn time_until(now: NaiveDateTime, fire: NaiveDateTime) -> Duration {
    (fire - now).to_std().unwrap_or(Duration::ZERO)
}

fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
