//! Aligned daily price series.
//!
//! A [`PriceFrame`] holds one adjusted-close column per instrument on a shared,
//! strictly ascending date axis. Columns may carry `NaN` for dates where the
//! provider had no bar; [`PriceFrame::drop_incomplete`] removes those
//! instruments before any return is computed.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::error::SeriesError;
use crate::types::Symbol;

/// Daily prices for a set of instruments on a shared calendar.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceFrame {
    dates: Vec<NaiveDate>,
    columns: Vec<(Symbol, Vec<f64>)>,
}

impl PriceFrame {
    /// Create an empty frame over the given date axis.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, SeriesError> {
        if let Some(i) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(SeriesError::UnsortedDates(i + 1));
        }
        Ok(Self {
            dates,
            columns: Vec::new(),
        })
    }

    /// Append one instrument's prices. Must match the date axis length.
    pub fn push(&mut self, symbol: Symbol, prices: Vec<f64>) -> Result<(), SeriesError> {
        if prices.len() != self.dates.len() {
            return Err(SeriesError::LengthMismatch {
                symbol,
                expected: self.dates.len(),
                got: prices.len(),
            });
        }
        if self.columns.iter().any(|(s, _)| *s == symbol) {
            return Err(SeriesError::DuplicateSymbol(symbol));
        }
        self.columns.push((symbol, prices));
        Ok(())
    }

    /// Align per-instrument `(date, price)` bars onto the union of all dates.
    ///
    /// Column order follows the first appearance of each symbol in `bars`.
    /// Dates an instrument has no bar for are filled with `NaN`. Repeated
    /// bars for the same (symbol, date) keep the last value.
    pub fn from_bars<I>(bars: I) -> Self
    where
        I: IntoIterator<Item = (Symbol, Vec<(NaiveDate, f64)>)>,
    {
        let bars: Vec<(Symbol, Vec<(NaiveDate, f64)>)> = bars.into_iter().collect();

        let axis: BTreeSet<NaiveDate> = bars
            .iter()
            .flat_map(|(_, series)| series.iter().map(|(d, _)| *d))
            .collect();
        let dates: Vec<NaiveDate> = axis.into_iter().collect();
        let index: FxHashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut order: Vec<Symbol> = Vec::new();
        let mut by_symbol: FxHashMap<Symbol, Vec<f64>> = FxHashMap::default();
        for (symbol, series) in bars {
            let column = by_symbol.entry(symbol).or_insert_with(|| {
                order.push(symbol);
                vec![f64::NAN; dates.len()]
            });
            for (date, price) in series {
                column[index[&date]] = price;
            }
        }

        let columns = order
            .into_iter()
            .filter_map(|s| by_symbol.remove(&s).map(|c| (s, c)))
            .collect();

        Self { dates, columns }
    }

    /// Remove every instrument with a missing, non-finite or non-positive
    /// price anywhere on the axis. Returns the dropped symbols in frame order.
    pub fn drop_incomplete(&mut self) -> Vec<Symbol> {
        let mut dropped = Vec::new();
        self.columns.retain(|(symbol, prices)| {
            let complete = prices.iter().all(|p| p.is_finite() && *p > 0.0);
            if !complete {
                dropped.push(*symbol);
            }
            complete
        });
        dropped
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Symbols in column order.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.columns.iter().map(|(s, _)| *s)
    }

    pub fn columns(&self) -> impl Iterator<Item = (Symbol, &[f64])> + '_ {
        self.columns.iter().map(|(s, c)| (*s, c.as_slice()))
    }

    pub fn column(&self, symbol: &Symbol) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, c)| c.as_slice())
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Number of instruments.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn new_rejects_unsorted_dates() {
        assert_eq!(
            PriceFrame::new(vec![d(1), d(3), d(2)]),
            Err(SeriesError::UnsortedDates(2))
        );
        assert!(PriceFrame::new(vec![d(1), d(1)]).is_err());
    }

    #[test]
    fn push_checks_length_and_duplicates() {
        let mut frame = PriceFrame::new(vec![d(1), d(2)]).unwrap();
        frame.push(sym("AAPL"), vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            frame.push(sym("MSFT"), vec![1.0]),
            Err(SeriesError::LengthMismatch { .. })
        ));
        assert_eq!(
            frame.push(sym("AAPL"), vec![1.0, 2.0]),
            Err(SeriesError::DuplicateSymbol(sym("AAPL")))
        );
    }

    #[test]
    fn from_bars_aligns_on_union() {
        let frame = PriceFrame::from_bars(vec![
            (sym("AAPL"), vec![(d(1), 10.0), (d(2), 11.0), (d(4), 12.0)]),
            (sym("MSFT"), vec![(d(2), 20.0), (d(4), 21.0)]),
        ]);

        assert_eq!(frame.dates(), &[d(1), d(2), d(4)]);
        assert_eq!(frame.column(&sym("AAPL")).unwrap(), &[10.0, 11.0, 12.0]);
        let msft = frame.column(&sym("MSFT")).unwrap();
        assert!(msft[0].is_nan());
        assert_eq!(&msft[1..], &[20.0, 21.0]);
    }

    #[test]
    fn from_bars_keeps_first_appearance_order() {
        let frame = PriceFrame::from_bars(vec![
            (sym("ZZZ"), vec![(d(1), 1.0)]),
            (sym("AAA"), vec![(d(1), 1.0)]),
        ]);
        let order: Vec<Symbol> = frame.symbols().collect();
        assert_eq!(order, vec![sym("ZZZ"), sym("AAA")]);
    }

    #[test]
    fn drop_incomplete_removes_gaps_and_bad_prices() {
        let mut frame = PriceFrame::from_bars(vec![
            (sym("GOOD"), vec![(d(1), 1.0), (d(2), 1.1)]),
            (sym("GAP"), vec![(d(2), 5.0)]),
            (sym("ZERO"), vec![(d(1), 0.0), (d(2), 1.0)]),
        ]);

        let dropped = frame.drop_incomplete();
        assert_eq!(dropped, vec![sym("GAP"), sym("ZERO")]);
        assert_eq!(frame.width(), 1);
        assert_eq!(frame.symbols().next(), Some(sym("GOOD")));
    }

    #[test]
    fn empty_frame() {
        let frame = PriceFrame::from_bars(Vec::new());
        assert!(frame.is_empty());
        assert_eq!(frame.last_date(), None);
    }
}
