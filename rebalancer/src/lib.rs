//! trendbook-rebalancer: scheduled momentum rebalancing against a live venue.
//!
//! Each cycle fetches daily closes for the universe, runs the three-stage
//! momentum cascade, snapshots the account, plans sells then budget-capped
//! buys, and executes the plan in order. The loop runs on an interval, daily
//! or weekly cadence aligned to the exchange calendar.

pub mod broker;
pub mod budget;
pub mod config;
pub mod driver;
pub mod error;
pub mod execution;
pub mod plan;
pub mod schedule;
pub mod snapshot;
pub mod universe;
