//! Broker error types.

/// Errors that can occur talking to a venue or data provider.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport failure: DNS, TLS, timeout, connection reset.
    #[error("connection error: {0}")]
    Connection(String),

    /// The venue answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Order submission or cancellation refused by the venue.
    #[error("order rejected for {symbol}: {reason}")]
    Rejected { symbol: String, reason: String },

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("failed to parse venue response: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl BrokerError {
    /// Failures worth retrying on a later cycle without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            BrokerError::Connection(_) | BrokerError::RateLimit => true,
            BrokerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
