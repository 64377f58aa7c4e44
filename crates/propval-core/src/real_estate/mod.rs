pub mod amortization;
pub mod assumptions;
pub mod cash_flow;
pub mod direct_cap;
pub mod valuation;

pub use amortization::{AmortizationCalculator, AmortizationYear};
pub use assumptions::{PropertyTaxTreatment, ValuationAssumptions};
pub use cash_flow::{
    net_cash_flows, npv, project_cash_flows, CashFlowProjector, CashFlowRow, RateScenario,
};
pub use direct_cap::{calculate_direct_cap, direct_cap_value, DirectCapInput, DirectCapResult};
pub use valuation::{run_valuation, LeverageMetrics, ValuationOutput, ValuationRequest};
