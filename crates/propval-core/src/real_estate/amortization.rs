use serde::{Deserialize, Serialize};

use crate::error::PropValError;
use crate::time_value::level_payment;
use crate::types::{pct_to_rate, Money, Percent, Rate};
use crate::PropValResult;

use super::assumptions::ValuationAssumptions;

/// One year of the mortgage amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationYear {
    pub year: u32,
    /// Total paid in the year (12 monthly payments)
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub closing_balance: Money,
}

/// Fixed-rate, fully amortizing mortgage with monthly payments.
#[derive(Debug, Clone)]
pub struct AmortizationCalculator {
    loan_amount: Money,
    monthly_rate: Rate,
    term_years: u32,
    monthly_payment: Money,
}

impl AmortizationCalculator {
    /// Loan of `initial_investment * ltv/100` at `interest_rate` % p.a. over `term_years`.
    pub fn new(
        initial_investment: Money,
        ltv: Percent,
        interest_rate: Percent,
        term_years: u32,
    ) -> PropValResult<Self> {
        if !ltv.is_finite() || !(0.0..=100.0).contains(&ltv) {
            return Err(PropValError::InvalidLoanTerms {
                field: "ltv".into(),
                reason: format!("Loan-to-value must be between 0% and 100%, got {ltv}%"),
            });
        }
        if !interest_rate.is_finite() || interest_rate < 0.0 {
            return Err(PropValError::InvalidLoanTerms {
                field: "interest_rate".into(),
                reason: format!("Interest rate must be non-negative, got {interest_rate}%"),
            });
        }
        if term_years == 0 {
            return Err(PropValError::InvalidLoanTerms {
                field: "loan_term_years".into(),
                reason: "Loan term must be at least 1 year".into(),
            });
        }

        let loan_amount = initial_investment * pct_to_rate(ltv);
        let monthly_rate = pct_to_rate(interest_rate) / 12.0;
        let monthly_payment = level_payment(loan_amount, monthly_rate, term_years * 12)?;

        Ok(Self {
            loan_amount,
            monthly_rate,
            term_years,
            monthly_payment,
        })
    }

    /// Build the loan implied by the assumptions, or `None` when unlevered.
    ///
    /// `interest_rate` overrides the assumptions' point rate (Monte Carlo trials).
    pub fn for_assumptions(
        assumptions: &ValuationAssumptions,
        interest_rate: Option<Percent>,
    ) -> PropValResult<Option<Self>> {
        if assumptions.ltv == 0.0 {
            return Ok(None);
        }
        let rate = interest_rate
            .or(assumptions.interest_rate)
            .ok_or_else(|| PropValError::InvalidLoanTerms {
                field: "interest_rate".into(),
                reason: "Interest rate is required when ltv > 0".into(),
            })?;
        Self::new(
            assumptions.initial_investment,
            assumptions.ltv,
            rate,
            assumptions.loan_term(),
        )
        .map(Some)
    }

    pub fn loan_amount(&self) -> Money {
        self.loan_amount
    }

    pub fn monthly_payment(&self) -> Money {
        self.monthly_payment
    }

    pub fn term_years(&self) -> u32 {
        self.term_years
    }

    /// Debt service paid in `year` (1-based): 12 monthly payments while in term.
    pub fn annual_payment(&self, year: u32) -> Money {
        if year >= 1 && year <= self.term_years {
            12.0 * self.monthly_payment
        } else {
            0.0
        }
    }

    /// Principal outstanding after `after_year` full years of payments.
    pub fn outstanding_balance(&self, after_year: u32) -> Money {
        if after_year >= self.term_years {
            return 0.0;
        }
        let months = (after_year * 12) as i32;

        let balance = if self.monthly_rate == 0.0 {
            self.loan_amount - self.monthly_payment * f64::from(months)
        } else {
            let growth = (1.0 + self.monthly_rate).powi(months);
            self.loan_amount * growth - self.monthly_payment * (growth - 1.0) / self.monthly_rate
        };

        balance.max(0.0)
    }

    /// Year-by-year schedule over the full loan term.
    pub fn schedule(&self) -> Vec<AmortizationYear> {
        (1..=self.term_years)
            .map(|year| {
                let opening = self.outstanding_balance(year - 1);
                let closing = self.outstanding_balance(year);
                let payment = self.annual_payment(year);
                let principal = opening - closing;
                AmortizationYear {
                    year,
                    payment,
                    interest: payment - principal,
                    principal,
                    closing_balance: closing,
                }
            })
            .collect()
    }
}
