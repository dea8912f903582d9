//! Approval-terms calculator and the draft terms a reviewer edits before approving.

use serde::{Deserialize, Serialize};

use super::domain::LoanApplication;

/// Trial terms under review. Recomputed client-side and never the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalTerms {
    pub approved_loan_amount: f64,
    pub approved_mthly_rate: f64,
    pub approved_tenor_mths: u32,
    pub approved_dsr_rate: f64,
}

impl ApprovalTerms {
    /// Seeds from the loan, preferring previously approved values over the original request.
    pub fn seed(loan: &LoanApplication) -> Self {
        Self {
            approved_loan_amount: loan.approved_loan_amount.unwrap_or(loan.loan_amount),
            approved_mthly_rate: loan.approved_mthly_rate.unwrap_or_default(),
            approved_tenor_mths: loan.approved_tenor_mths.unwrap_or(loan.loan_tenor_mths),
            approved_dsr_rate: loan.approved_dsr_rate.unwrap_or_default(),
        }
    }

    pub fn quote(&self, net_monthly_income: f64) -> Result<TermsQuote, TermsError> {
        compute_terms(
            self.approved_loan_amount,
            self.approved_mthly_rate,
            self.approved_tenor_mths,
            self.approved_dsr_rate,
            net_monthly_income,
        )
    }
}

/// Derived repayment figures for a set of terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsQuote {
    pub monthly_repayment: f64,
    pub maximum_loan_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TermsError {
    #[error("tenor must be at least one month")]
    InvalidTenor,
    #[error("rate and tenor produce a degenerate repayment factor")]
    DegenerateFactor,
}

/// Flat-rate repayment and DSR-bounded maximum loan.
///
/// Interest accrues as `rate * tenor` on the full principal, so the repayment factor is
/// `1 + rate * tenor` rather than an amortising annuity.
pub fn compute_terms(
    principal: f64,
    monthly_rate_percent: f64,
    tenor_months: u32,
    dsr_rate_percent: f64,
    net_monthly_income: f64,
) -> Result<TermsQuote, TermsError> {
    if tenor_months == 0 {
        return Err(TermsError::InvalidTenor);
    }

    let tenor = f64::from(tenor_months);
    let rate = monthly_rate_percent / 100.0;
    let dsr = dsr_rate_percent / 100.0;
    let factor = 1.0 + rate * tenor;
    if factor == 0.0 || !factor.is_finite() {
        return Err(TermsError::DegenerateFactor);
    }

    let monthly_repayment = (principal * factor) / tenor;
    let maximum_loan_amount = (net_monthly_income * dsr * tenor) / factor;
    if !monthly_repayment.is_finite() || !maximum_loan_amount.is_finite() {
        return Err(TermsError::DegenerateFactor);
    }

    Ok(TermsQuote {
        monthly_repayment,
        maximum_loan_amount,
    })
}

/// A single committed edit to one terms field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum TermsChange {
    LoanAmount(f64),
    MonthlyRate(f64),
    TenorMonths(u32),
    DsrRate(f64),
}

pub fn apply_change(prior: ApprovalTerms, change: TermsChange) -> ApprovalTerms {
    let mut next = prior;
    match change {
        TermsChange::LoanAmount(value) => next.approved_loan_amount = value,
        TermsChange::MonthlyRate(value) => next.approved_mthly_rate = value,
        TermsChange::TenorMonths(value) => next.approved_tenor_mths = value,
        TermsChange::DsrRate(value) => next.approved_dsr_rate = value,
    }
    next
}

/// Terms being edited in the progress form. The quote goes stale on every edit and is
/// only refreshed by an explicit recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsDraft {
    pub terms: ApprovalTerms,
    pub quote: Option<TermsQuote>,
    pub edited: bool,
}

impl TermsDraft {
    pub fn seeded(loan: &LoanApplication) -> Self {
        let terms = ApprovalTerms::seed(loan);
        Self {
            quote: terms.quote(loan.net_mthly_income).ok(),
            terms,
            edited: false,
        }
    }

    pub fn commit(&mut self, change: TermsChange) {
        let next = apply_change(self.terms, change);
        if next != self.terms {
            self.terms = next;
            self.quote = None;
            self.edited = true;
        }
    }

    pub fn recompute(&mut self, net_monthly_income: f64) -> Result<TermsQuote, TermsError> {
        let quote = self.terms.quote(net_monthly_income)?;
        self.quote = Some(quote);
        Ok(quote)
    }
}
