use thiserror::Error;

/// Failure conditions reported by the signal pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("no price data available for {symbol}")]
    DataUnavailable { symbol: String },

    #[error("insufficient history: {rows} aligned rows, none left after a warm-up of {required}")]
    InsufficientHistory { rows: usize, required: usize },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SignalError {
    pub fn length_mismatch(stage: &str, expected: usize, actual: usize) -> Self {
        SignalError::InvariantViolation(format!(
            "{} expected {} rows but received {}",
            stage, expected, actual
        ))
    }
}

pub type SignalResult<T> = std::result::Result<T, SignalError>;
