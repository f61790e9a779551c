//! Rolling compounded returns.
//!
//! # Conventions
//!
//! - A growth factor is `price_t / price_{t-1}`; a series of `n` prices has
//!   `n - 1` growth factors.
//! - The rolling compounded return over `window` bars is the *product* of the
//!   `window` growth factors ending at each bar. `1.25` means +25%. It is
//!   never an arithmetic mean of daily changes.
//! - Output holds only the defined positions: `n - window + 1` values for `n`
//!   growth factors, nothing when `n < window`.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::error::SeriesError;
use crate::series::PriceFrame;
use crate::types::Symbol;

/// Daily growth factors `prices[i] / prices[i - 1]` for `i >= 1`.
pub fn growth_factors(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0]).collect()
}

/// Product of each run of `window` consecutive growth factors.
///
/// `out[j]` covers `growth[j..j + window]`, i.e. it is the compounded return
/// ending at input position `j + window - 1`.
///
/// # Example
///
/// ```
/// use trendbook::returns::rolling_compound_return;
///
/// let growth = [1.10, 1.00, 0.90, 1.20];
/// let out = rolling_compound_return(&growth, 2);
/// assert_eq!(out.len(), 3);
/// assert!((out[0] - 1.10).abs() < 1e-12);
/// assert!((out[2] - 1.08).abs() < 1e-12);
/// ```
pub fn rolling_compound_return(growth: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || growth.len() < window {
        return Vec::new();
    }
    growth
        .windows(window)
        .map(|w| w.iter().product::<f64>())
        .collect()
}

/// Rolling compounded returns for every instrument of a [`PriceFrame`].
///
/// Values are indexed by the date of the last bar in each window. Recomputed
/// wholesale from the frame; there is no incremental update.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    columns: Vec<Vec<f64>>,
    index: FxHashMap<Symbol, usize>,
}

impl ReturnSeries {
    /// Compute the `window`-bar compounded return of every column in `frame`.
    pub fn from_frame(frame: &PriceFrame, window: usize) -> Result<Self, SeriesError> {
        if window == 0 {
            return Err(SeriesError::ZeroWindow);
        }

        // growth factor i belongs to frame date i + 1; window output j to
        // growth index j + window - 1
        let offset = window;
        let dates = if frame.len() > offset {
            frame.dates()[offset..].to_vec()
        } else {
            Vec::new()
        };

        let mut columns = Vec::with_capacity(frame.width());
        let mut index = FxHashMap::default();
        for (symbol, prices) in frame.columns() {
            let growth = growth_factors(prices);
            index.insert(symbol, columns.len());
            columns.push(rolling_compound_return(&growth, window));
        }

        Ok(Self {
            dates,
            columns,
            index,
        })
    }

    /// Dates at which a full window is available.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The compounded return of `symbol` for the window ending on `date`.
    ///
    /// `None` when the symbol is unknown, the date is not on the axis or has
    /// too little history, or the value is not finite.
    pub fn value_at(&self, symbol: &Symbol, date: NaiveDate) -> Option<f64> {
        let idx = self.dates.binary_search(&date).ok()?;
        self.column(symbol)?
            .get(idx)
            .copied()
            .filter(|v| v.is_finite())
    }

    /// `(date, value)` pairs for one instrument.
    pub fn series(&self, symbol: &Symbol) -> Option<Vec<(NaiveDate, f64)>> {
        self.column(symbol)
            .map(|c| self.dates.iter().copied().zip(c.iter().copied()).collect())
    }

    fn column(&self, symbol: &Symbol) -> Option<&[f64]> {
        self.index.get(symbol).map(|&i| self.columns[i].as_slice())
    }
}
