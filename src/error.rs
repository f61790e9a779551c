//! Errors raised while building price frames and return series.

use crate::types::Symbol;

/// Malformed input to the series layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    /// A column's length does not match the frame's date axis.
    #[error("series for {symbol} has {got} values, expected {expected}")]
    LengthMismatch {
        symbol: Symbol,
        expected: usize,
        got: usize,
    },

    /// The same instrument appears twice in one frame.
    #[error("duplicate series for {0}")]
    DuplicateSymbol(Symbol),

    /// Dates must be strictly ascending.
    #[error("dates are not strictly ascending at index {0}")]
    UnsortedDates(usize),

    /// A rolling window must cover at least one observation.
    #[error("window must be > 0")]
    ZeroWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = SeriesError::LengthMismatch {
            symbol: Symbol::new("AAPL"),
            expected: 10,
            got: 9,
        };
        assert_eq!(err.to_string(), "series for AAPL has 9 values, expected 10");
        assert_eq!(SeriesError::ZeroWindow.to_string(), "window must be > 0");
    }
}
