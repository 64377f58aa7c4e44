pub mod direct_cap;
pub mod monte_carlo;
pub mod time_value;
pub mod valuation;
