//! Per-cycle spending cap for buys.
//!
//! The baseline is the buying power seen the first time the account is
//! observed. Later observations are ignored, so a run that has deployed its
//! cash keeps the same cap instead of shrinking towards zero.

use log::info;

/// Capital budget with a once-initialized baseline.
#[derive(Debug, Clone)]
pub struct CapitalBudget {
    fraction: f64,
    baseline_cents: Option<i64>,
}

impl CapitalBudget {
    /// `fraction` is the share of the baseline available to each cycle.
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction,
            baseline_cents: None,
        }
    }

    /// Record `buying_power_cents` as the baseline if none is set yet.
    /// Returns the baseline in effect.
    pub fn observe(&mut self, buying_power_cents: i64) -> i64 {
        match self.baseline_cents {
            Some(baseline) => baseline,
            None => {
                let baseline = buying_power_cents.max(0);
                info!(
                    "Capital budget baseline ${:.2} ({:.0}% per cycle)",
                    baseline as f64 / 100.0,
                    self.fraction * 100.0
                );
                self.baseline_cents = Some(baseline);
                baseline
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline_cents.is_some()
    }

    pub fn baseline_cents(&self) -> Option<i64> {
        self.baseline_cents
    }

    /// Spendable amount for one cycle, or `None` before the first observation.
    pub fn for_cycle(&self) -> Option<i64> {
        self.baseline_cents
            .map(|b| (b as f64 * self.fraction).floor() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_has_no_budget() {
        let budget = CapitalBudget::new(0.45);
        assert!(!budget.is_initialized());
        assert_eq!(budget.for_cycle(), None);
    }

    #[test]
    fn first_observation_wins() {
        let mut budget = CapitalBudget::new(0.45);
        assert_eq!(budget.observe(10_000_00), 10_000_00);
        assert_eq!(budget.observe(2_000_00), 10_000_00);
        assert_eq!(budget.for_cycle(), Some(4_500_00));
    }

    #[test]
    fn negative_buying_power_clamps_to_zero() {
        let mut budget = CapitalBudget::new(0.5);
        budget.observe(-100);
        assert_eq!(budget.for_cycle(), Some(0));
    }
}
