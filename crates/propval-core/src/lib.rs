pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "valuation")]
pub mod real_estate;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::PropValError;
pub use types::*;

/// Standard result type for all propval operations
pub type PropValResult<T> = Result<T, PropValError>;
