use serde::{Deserialize, Serialize};

use crate::error::PropValError;
use crate::types::{Money, Percent};
use crate::PropValResult;

/// How property tax enters the projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyTaxTreatment {
    /// Recurring operating expense in every projected year
    #[default]
    Annual,
    /// One-off acquisition cost paid in year 0
    OneTime,
}

/// Investment assumptions for one property valuation.
///
/// All rates are percentages (8.0 = 8%). Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationAssumptions {
    /// Purchase price paid at year 0
    pub initial_investment: Money,
    /// Year-1 gross rental income
    pub annual_rental_income: Money,
    /// Vacancy and collection loss (%)
    #[serde(default)]
    pub vacancy_rate: Percent,
    #[serde(default)]
    pub service_charge: Money,
    #[serde(default)]
    pub ground_rent: Money,
    pub maintenance: Money,
    pub property_tax: Money,
    #[serde(default)]
    pub insurance: Money,
    /// Management fee as a percentage of effective rent
    pub management_fees: Percent,
    /// Acquisition costs (stamp duty, legal fees) paid at year 0
    pub transaction_costs: Money,
    /// Annual rent growth (%), compounding from year 2
    pub annual_rent_growth: Percent,
    /// Discount rate (%)
    pub discount_rate: Percent,
    /// Holding period in years (>= 1)
    pub holding_period: u32,
    /// Loan-to-value (%), 0 means unlevered
    #[serde(default)]
    pub ltv: Percent,
    /// Mortgage interest rate (% p.a.), required when `ltv > 0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Percent>,
    /// Mortgage term in years; defaults to the holding period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_term_years: Option<u32>,
    /// Annual capital expenditure
    #[serde(default)]
    pub capex: Money,
    /// Exit cap rate (%) used to value the property at sale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_cap_rate: Option<Percent>,
    /// Selling costs as a percentage of gross sale proceeds
    #[serde(default)]
    pub selling_costs: Percent,
    #[serde(default)]
    pub property_tax_treatment: PropertyTaxTreatment,
}

impl ValuationAssumptions {
    /// Reject structurally invalid assumptions and flag implausible ones.
    ///
    /// Loan terms are checked separately by the amortization calculator.
    pub fn validate(&self, warnings: &mut Vec<String>) -> PropValResult<()> {
        if self.holding_period < 1 {
            return Err(PropValError::InvalidAssumptions {
                field: "holding_period".into(),
                reason: "Holding period must be at least 1 year".into(),
            });
        }

        for (field, value) in self.monetary_fields() {
            if !value.is_finite() {
                return Err(PropValError::InvalidAssumptions {
                    field: field.into(),
                    reason: "Must be a finite number".into(),
                });
            }
            if value < 0.0 {
                return Err(PropValError::InvalidAssumptions {
                    field: field.into(),
                    reason: format!("Must be non-negative, got {value}"),
                });
            }
        }

        for (field, value) in self.percentage_fields() {
            if !value.is_finite() {
                return Err(PropValError::InvalidAssumptions {
                    field: field.into(),
                    reason: "Must be a finite percentage".into(),
                });
            }
        }

        if self.discount_rate <= -100.0 {
            return Err(PropValError::InvalidAssumptions {
                field: "discount_rate".into(),
                reason: "Discount rate must be greater than -100%".into(),
            });
        }

        // --- Plausibility warnings ---
        for (field, value) in [
            ("management_fees", self.management_fees),
            ("vacancy_rate", self.vacancy_rate),
            ("discount_rate", self.discount_rate),
            ("selling_costs", self.selling_costs),
        ] {
            if !(0.0..=100.0).contains(&value) {
                warnings.push(format!(
                    "{field} of {value}% is outside 0–100% — implausible, verify input"
                ));
            }
        }

        if self.annual_rent_growth <= -100.0 {
            warnings.push(format!(
                "annual_rent_growth of {}% wipes out rental income",
                self.annual_rent_growth
            ));
        }

        if let Some(exit) = self.exit_cap_rate {
            if exit <= 0.0 {
                warnings.push(format!(
                    "exit_cap_rate of {exit}% is not positive — terminal value omitted"
                ));
            }
        }

        if self.annual_rental_income == 0.0 {
            warnings.push("annual_rental_income is zero — property generates no rent".into());
        }

        Ok(())
    }

    /// Whether the acquisition is financed with a mortgage.
    pub fn is_levered(&self) -> bool {
        self.ltv > 0.0
    }

    /// Mortgage term, falling back to the holding period.
    pub fn loan_term(&self) -> u32 {
        self.loan_term_years.unwrap_or(self.holding_period)
    }

    /// Cash paid out at year 0.
    pub fn acquisition_outlay(&self) -> Money {
        let one_time_tax = match self.property_tax_treatment {
            PropertyTaxTreatment::Annual => 0.0,
            PropertyTaxTreatment::OneTime => self.property_tax,
        };
        self.initial_investment + self.transaction_costs + one_time_tax
    }

    /// Fixed operating costs incurred every projected year.
    pub fn fixed_operating_costs(&self) -> Money {
        let annual_tax = match self.property_tax_treatment {
            PropertyTaxTreatment::Annual => self.property_tax,
            PropertyTaxTreatment::OneTime => 0.0,
        };
        self.service_charge + self.ground_rent + self.maintenance + annual_tax + self.insurance
    }

    fn monetary_fields(&self) -> [(&'static str, Money); 9] {
        [
            ("initial_investment", self.initial_investment),
            ("annual_rental_income", self.annual_rental_income),
            ("service_charge", self.service_charge),
            ("ground_rent", self.ground_rent),
            ("maintenance", self.maintenance),
            ("property_tax", self.property_tax),
            ("insurance", self.insurance),
            ("transaction_costs", self.transaction_costs),
            ("capex", self.capex),
        ]
    }

    fn percentage_fields(&self) -> Vec<(&'static str, Percent)> {
        let mut fields = vec![
            ("vacancy_rate", self.vacancy_rate),
            ("management_fees", self.management_fees),
            ("annual_rent_growth", self.annual_rent_growth),
            ("discount_rate", self.discount_rate),
            ("ltv", self.ltv),
            ("selling_costs", self.selling_costs),
        ];
        if let Some(rate) = self.interest_rate {
            fields.push(("interest_rate", rate));
        }
        if let Some(rate) = self.exit_cap_rate {
            fields.push(("exit_cap_rate", rate));
        }
        fields
    }
}
