use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropValError {
    #[error("Invalid assumptions: {field} — {reason}")]
    InvalidAssumptions { field: String, reason: String },

    #[error("Invalid loan terms: {field} — {reason}")]
    InvalidLoanTerms { field: String, reason: String },

    #[error("Invalid cap rate: {cap_rate}% — cap rate must be positive")]
    InvalidCapRate { cap_rate: f64 },

    #[error("Invalid distribution shape for {variable}: {shape} — Pareto shape must exceed 1 for the mean to exist")]
    InvalidDistributionShape { variable: String, shape: f64 },

    #[error("Invalid simulation config: {field} — {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Simulation cancelled after {completed} of {requested} trials")]
    Cancelled { completed: u32, requested: u32 },

    #[error("Simulation worker failed: {0}")]
    WorkerFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PropValError {
    fn from(e: serde_json::Error) -> Self {
        PropValError::SerializationError(e.to_string())
    }
}
