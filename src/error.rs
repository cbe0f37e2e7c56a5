use thiserror::Error;

/// Failure conditions surfaced by the trading core
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BotError {
    /// A market data or balance fetch failed
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// The exchange refused or failed to execute an order
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// The exchange refused an order for lack of funds
    #[error("insufficient funds: available {available:.8}, required {required:.8}")]
    InsufficientFunds { available: f64, required: f64 },

    /// Requested quantity rounded down to zero at the instrument's step size
    #[error("invalid order size: quantity {quantity} at step {step}")]
    InvalidOrderSize { quantity: f64, step: f64 },

    /// A state transition was requested from the wrong state
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::DataUnavailable(_) => "DataUnavailable",
            BotError::OrderRejected(_) => "OrderRejected",
            BotError::InsufficientFunds { .. } => "InsufficientFunds",
            BotError::InvalidOrderSize { .. } => "InvalidOrderSize",
            BotError::InvalidState(_) => "InvalidState",
            BotError::Persistence(_) => "Persistence",
            BotError::Config(_) => "Config",
        }
    }

    /// Whether the polling loop should cool down and keep going.
    ///
    /// Only configuration errors are raised before the loop starts; everything
    /// reached from inside a cycle is recoverable.
    pub fn is_transient(&self) -> bool {
        !matches!(self, BotError::Config(_))
    }
}

impl From<csv::Error> for BotError {
    fn from(e: csv::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}
