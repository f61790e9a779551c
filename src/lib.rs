//! # trendbook
//!
//! Cascading momentum ranking over aligned daily price series.
//!
//! ## Pipeline
//!
//! 1. Build a [`PriceFrame`] from per-instrument daily closes and drop any
//!    instrument with gaps ([`PriceFrame::drop_incomplete`]).
//! 2. Compute rolling compounded returns at three horizons
//!    ([`ReturnSeries`]).
//! 3. Narrow the universe long -> medium -> short and normalize the survivors
//!    into [`TargetWeights`] ([`RankingCascade`]).
//!
//! ## Quick Start
//!
//! ```
//! use chrono::NaiveDate;
//! use trendbook::{Horizon, PriceFrame, RankingCascade, Symbol};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let dates: Vec<NaiveDate> = (0..8).map(|i| start + chrono::Days::new(i)).collect();
//!
//! let mut frame = PriceFrame::new(dates).unwrap();
//! frame.push(Symbol::new("FAST"), (0..8).map(|i| 100.0 * 1.02f64.powi(i)).collect()).unwrap();
//! frame.push(Symbol::new("SLOW"), (0..8).map(|i| 100.0 * 1.01f64.powi(i)).collect()).unwrap();
//!
//! let cascade = RankingCascade {
//!     long: Horizon { window: 6, keep: 2 },
//!     medium: Horizon { window: 4, keep: 2 },
//!     short: Horizon { window: 2, keep: 1 },
//! };
//! let weights = cascade.select_weights(&frame, frame.last_date().unwrap()).unwrap();
//!
//! assert_eq!(weights.len(), 1);
//! assert_eq!(weights.get(&Symbol::new("FAST")), Some(1.0));
//! ```

mod error;
pub mod ranking;
pub mod returns;
pub mod series;
mod types;

// Re-export public API
pub use error::SeriesError;
pub use ranking::{Horizon, RankingCascade, Selection, TargetWeights, top_k};
pub use returns::{ReturnSeries, growth_factors, rolling_compound_return};
pub use series::PriceFrame;
pub use types::{SYMBOL_MAX_LEN, Symbol};
