//! Cascading momentum ranking.
//!
//! Three passes narrow the universe with successively *shorter* horizons:
//!
//! 1. rank everything by the long-horizon compounded return, keep the top K1;
//! 2. re-rank those by the medium horizon, keep the top K2;
//! 3. re-rank those by the short horizon, keep the top K3.
//!
//! The survivors' short-horizon values are normalized into [`TargetWeights`].
//! Ranking is purely "largest value wins": a basket of instruments that all
//! lost money over the short horizon is still fully weighted.

use chrono::NaiveDate;

use crate::error::SeriesError;
use crate::returns::ReturnSeries;
use crate::series::PriceFrame;
use crate::types::Symbol;

/// One pass of the cascade: a return window and how many names survive it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Horizon {
    /// Window length in bars.
    pub window: usize,
    /// Number of instruments kept after ranking.
    pub keep: usize,
}

/// Long / medium / short cascade configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingCascade {
    pub long: Horizon,
    pub medium: Horizon,
    pub short: Horizon,
}

impl Default for RankingCascade {
    /// 12 / 6 / 3 months of trading days, keeping 50 / 30 / 10.
    fn default() -> Self {
        Self {
            long: Horizon {
                window: 252,
                keep: 50,
            },
            medium: Horizon {
                window: 126,
                keep: 30,
            },
            short: Horizon {
                window: 63,
                keep: 10,
            },
        }
    }
}

/// Output of every stage, for inspection and reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub as_of: NaiveDate,
    pub long: Vec<(Symbol, f64)>,
    pub medium: Vec<(Symbol, f64)>,
    pub short: Vec<(Symbol, f64)>,
    pub weights: TargetWeights,
}

impl RankingCascade {
    /// Run all three stages as of `as_of` and keep the intermediate rankings.
    pub fn rank(&self, frame: &PriceFrame, as_of: NaiveDate) -> Result<Selection, SeriesError> {
        let long_rs = ReturnSeries::from_frame(frame, self.long.window)?;
        let medium_rs = ReturnSeries::from_frame(frame, self.medium.window)?;
        let short_rs = ReturnSeries::from_frame(frame, self.short.window)?;

        let long = top_k(frame.symbols(), &long_rs, as_of, self.long.keep);
        let medium = top_k(
            long.iter().map(|(s, _)| *s),
            &medium_rs,
            as_of,
            self.medium.keep,
        );
        let short = top_k(
            medium.iter().map(|(s, _)| *s),
            &short_rs,
            as_of,
            self.short.keep,
        );
        let weights = TargetWeights::normalized(&short);

        Ok(Selection {
            as_of,
            long,
            medium,
            short,
            weights,
        })
    }

    /// Target weights as of `as_of`.
    pub fn select_weights(
        &self,
        frame: &PriceFrame,
        as_of: NaiveDate,
    ) -> Result<TargetWeights, SeriesError> {
        self.rank(frame, as_of).map(|s| s.weights)
    }

    /// Longest window, i.e. the minimum number of growth factors needed.
    pub fn max_window(&self) -> usize {
        self.long
            .window
            .max(self.medium.window)
            .max(self.short.window)
    }
}

/// Rank `candidates` by their value on `as_of`, largest first, and keep `k`.
///
/// Candidates without a value on that date are ineligible. The sort is stable,
/// so ties keep candidate order.
pub fn top_k<I>(candidates: I, returns: &ReturnSeries, as_of: NaiveDate, k: usize) -> Vec<(Symbol, f64)>
where
    I: IntoIterator<Item = Symbol>,
{
    let mut ranked: Vec<(Symbol, f64)> = candidates
        .into_iter()
        .filter_map(|s| returns.value_at(&s, as_of).map(|v| (s, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// Instrument -> fraction of portfolio value, in rank order.
///
/// Weights are in `[0, 1]` and sum to 1.0, or the set is empty.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TargetWeights {
    entries: Vec<(Symbol, f64)>,
}

impl TargetWeights {
    /// Normalize scores to sum to one. Empty if the scores do not have a
    /// positive finite sum.
    pub fn normalized(scores: &[(Symbol, f64)]) -> Self {
        let total: f64 = scores.iter().map(|(_, v)| v).sum();
        if !(total.is_finite() && total > 0.0) {
            return Self::default();
        }
        Self {
            entries: scores.iter().map(|&(s, v)| (s, v / total)).collect(),
        }
    }

    /// Use the given weights as-is, keeping their order.
    pub fn from_pairs(entries: Vec<(Symbol, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, w)| *w)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.get(symbol).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Days::new(i as u64))
            .collect()
    }

    /// Prices compounding at a constant daily rate.
    fn geometric(n: usize, daily: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 * daily.powi(i as i32)).collect()
    }

    fn small_cascade() -> RankingCascade {
        RankingCascade {
            long: Horizon { window: 6, keep: 4 },
            medium: Horizon { window: 4, keep: 3 },
            short: Horizon { window: 2, keep: 2 },
        }
    }

    #[test]
    fn default_sizes() {
        let c = RankingCascade::default();
        assert_eq!((c.long.keep, c.medium.keep, c.short.keep), (50, 30, 10));
        assert_eq!(c.max_window(), 252);
    }

    #[test]
    fn cascade_narrows_and_normalizes() {
        let axis = dates(10);
        let mut frame = PriceFrame::new(axis.clone()).unwrap();
        for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            frame
                .push(sym(name), geometric(10, 1.0 + 0.01 * i as f64))
                .unwrap();
        }

        let sel = small_cascade().rank(&frame, axis[9]).unwrap();
        assert_eq!(sel.long.len(), 4);
        assert_eq!(sel.medium.len(), 3);
        assert_eq!(sel.short.len(), 2);

        // steadiest grower wins every stage
        assert_eq!(sel.short[0].0, sym("F"));
        assert_eq!(sel.short[1].0, sym("E"));
        assert!((sel.weights.total() - 1.0).abs() < 1e-12);
        assert!(sel.weights.iter().all(|(_, w)| w > 0.0));
    }

    #[test]
    fn shrinkage_below_nominal_size_is_fine() {
        let axis = dates(10);
        let mut frame = PriceFrame::new(axis.clone()).unwrap();
        frame.push(sym("ONLY"), geometric(10, 1.01)).unwrap();

        let weights = small_cascade().select_weights(&frame, axis[9]).unwrap();
        assert_eq!(weights.len(), 1);
        assert!((weights.get(&sym("ONLY")).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn losers_still_get_weight() {
        let axis = dates(10);
        let mut frame = PriceFrame::new(axis.clone()).unwrap();
        frame.push(sym("DOWN1"), geometric(10, 0.99)).unwrap();
        frame.push(sym("DOWN2"), geometric(10, 0.98)).unwrap();

        let weights = small_cascade().select_weights(&frame, axis[9]).unwrap();
        assert_eq!(weights.len(), 2);
        assert!(weights.iter().all(|(_, w)| w > 0.0));
        assert!(weights.get(&sym("DOWN1")).unwrap() > weights.get(&sym("DOWN2")).unwrap());
    }

    #[test]
    fn as_of_without_history_yields_empty_weights() {
        let axis = dates(10);
        let mut frame = PriceFrame::new(axis.clone()).unwrap();
        frame.push(sym("A"), geometric(10, 1.01)).unwrap();

        // long window needs 7 prices; the third date has 3
        let weights = small_cascade().select_weights(&frame, axis[2]).unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn ties_keep_candidate_order() {
        let axis = dates(10);
        let mut frame = PriceFrame::new(axis.clone()).unwrap();
        for name in ["X", "Y", "Z"] {
            frame.push(sym(name), geometric(10, 1.02)).unwrap();
        }
        let rs = ReturnSeries::from_frame(&frame, 3).unwrap();
        let ranked = top_k(frame.symbols(), &rs, axis[9], 2);
        let names: Vec<Symbol> = ranked.iter().map(|(s, _)| *s).collect();
        assert_eq!(names, vec![sym("X"), sym("Y")]);
    }

    #[test]
    fn normalized_rejects_non_positive_total() {
        assert!(TargetWeights::normalized(&[]).is_empty());
        assert!(TargetWeights::normalized(&[(sym("A"), 0.0)]).is_empty());
    }

    #[test]
    fn weights_keep_rank_order() {
        let w = TargetWeights::normalized(&[(sym("B"), 3.0), (sym("A"), 1.0)]);
        let order: Vec<Symbol> = w.symbols().collect();
        assert_eq!(order, vec![sym("B"), sym("A")]);
        assert_eq!(w.get(&sym("B")), Some(0.75));
        assert!(!w.contains(&sym("C")));
    }
}
