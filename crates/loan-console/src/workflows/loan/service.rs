//! Summaries, quotes and role-gated decisions for one loan application.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::dispatch::{
    ApiAck, ApprovalTermsRequest, BookingDetails, BookingRequest, DecisionCall, DecisionRequest,
    DispatchError, LoanGateway,
};
use super::domain::{
    ActingUser, ApplicationStatus, ApprovalTrailEntry, DecisionFlag, LoanApplication,
    LoanApplicationId, Role, TrailOrder,
};
use super::policy::{self, PrimaryAction};
use super::terms::{compute_terms, ApprovalTerms, TermsError, TermsQuote};

/// Stateless facade used by the console HTTP API: every call re-reads the loan from
/// the backend and gates on the acting user before dispatching.
pub struct LoanWorkflowService<G> {
    gateway: Arc<G>,
}

/// Everything the console needs to render the workflow panel of one application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub loan: LoanApplication,
    pub acting_user: ActingUser,
    pub can_act: bool,
    pub action_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<PrimaryAction>,
    pub transitions: Vec<DecisionFlag>,
    pub terms_editable: bool,
    /// Whether `terms` were seeded from previously approved values.
    pub terms_approved: bool,
    pub terms: ApprovalTerms,
    pub quote: Option<TermsQuote>,
    pub trail: Vec<ApprovalTrailEntry>,
}

/// Decision posted by the console on behalf of the acting user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSubmission {
    pub decision_flag: DecisionFlag,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub booking: Option<BookingDetails>,
    #[serde(default)]
    pub terms: Option<ApprovalTerms>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(flatten)]
    pub terms: ApprovalTerms,
    pub net_mthly_income: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowServiceError {
    #[error(transparent)]
    Gateway(#[from] DispatchError),
    #[error("{role} may not submit {flag} while the application is {status}")]
    Forbidden {
        role: Role,
        status: ApplicationStatus,
        flag: DecisionFlag,
    },
    #[error(transparent)]
    Terms(#[from] TermsError),
    #[error("invalid decision: {0}")]
    InvalidRequest(String),
}

impl<G> LoanWorkflowService<G>
where
    G: LoanGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn summary(
        &self,
        id: &LoanApplicationId,
        user: &ActingUser,
    ) -> Result<WorkflowSummary, WorkflowServiceError> {
        let loan = self.gateway.fetch_loan(id).await?;
        Ok(summarize(loan, user))
    }

    pub fn quote(&self, request: QuoteRequest) -> Result<TermsQuote, WorkflowServiceError> {
        let QuoteRequest {
            terms,
            net_mthly_income,
        } = request;
        Ok(compute_terms(
            terms.approved_loan_amount,
            terms.approved_mthly_rate,
            terms.approved_tenor_mths,
            terms.approved_dsr_rate,
            net_mthly_income,
        )?)
    }

    /// Validates the submission against the current status and dispatches it.
    ///
    /// A backend rejection comes back as an unsuccessful `ApiAck`, not an error.
    pub async fn decide(
        &self,
        id: &LoanApplicationId,
        user: &ActingUser,
        submission: DecisionSubmission,
    ) -> Result<ApiAck, WorkflowServiceError> {
        let loan = self.gateway.fetch_loan(id).await?;
        let status = loan.application_status;
        let flag = submission.decision_flag;

        if !policy::allowed_transitions(user.role, status).contains(&flag) {
            return Err(WorkflowServiceError::Forbidden {
                role: user.role,
                status,
                flag,
            });
        }

        let call = build_call(&loan, user, submission)?;
        let ack = call.send(self.gateway.as_ref()).await?;
        info!(
            loan_id = %loan.id,
            %flag,
            kind = call.kind(),
            accepted = ack.is_successful,
            "console decision dispatched"
        );
        Ok(ack)
    }
}

pub fn summarize(loan: LoanApplication, user: &ActingUser) -> WorkflowSummary {
    let status = loan.application_status;
    let can_act = policy::can_act_on(user.role, status);
    let terms = ApprovalTerms::seed(&loan);
    let quote = terms.quote(loan.net_mthly_income).ok();
    let trail = loan
        .trail(TrailOrder::NewestFirst)
        .into_iter()
        .cloned()
        .collect();

    WorkflowSummary {
        acting_user: user.clone(),
        can_act,
        action_label: if can_act {
            policy::action_label(user.role)
        } else {
            ""
        },
        primary_action: can_act.then(|| policy::primary_action(status)),
        transitions: policy::allowed_transitions(user.role, status),
        terms_editable: can_act && user.role.edits_terms(),
        terms_approved: loan.has_approved_terms(),
        terms,
        quote,
        trail,
        loan,
    }
}

fn required_comment(comment: Option<String>) -> Result<String, WorkflowServiceError> {
    comment
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| WorkflowServiceError::InvalidRequest("a comment is required".to_string()))
}

fn build_call(
    loan: &LoanApplication,
    user: &ActingUser,
    submission: DecisionSubmission,
) -> Result<DecisionCall, WorkflowServiceError> {
    let DecisionSubmission {
        decision_flag,
        comment,
        booking,
        terms,
    } = submission;

    let request = |comment: String| DecisionRequest {
        decision_flag,
        comment,
        loan_application_id: loan.id.clone(),
        current_processor_uid: user.id.clone(),
    };

    if decision_flag != DecisionFlag::Approved {
        return Ok(DecisionCall::Decision(request(required_comment(comment)?)));
    }

    match policy::primary_action(loan.application_status) {
        PrimaryAction::Book => {
            let booking = booking.ok_or_else(|| {
                WorkflowServiceError::InvalidRequest("booking details are required".to_string())
            })?;
            if booking.loan_product_id.trim().is_empty() {
                return Err(WorkflowServiceError::InvalidRequest(
                    "a loan product must be selected".to_string(),
                ));
            }
            if !booking.management_fee.is_finite() || booking.management_fee < 0.0 {
                return Err(WorkflowServiceError::InvalidRequest(
                    "management fee must be zero or positive".to_string(),
                ));
            }
            let comment = comment
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| super::view::BOOKED_COMMENT.to_string());
            Ok(DecisionCall::Booking(BookingRequest {
                decision: request(comment),
                booking,
            }))
        }
        PrimaryAction::Confirm { comment: fixed } => {
            Ok(DecisionCall::Decision(request(fixed.to_string())))
        }
        PrimaryAction::Progress => {
            let comment = required_comment(comment)?;
            // Terms equal to the seeded ones were not edited.
            match terms {
                Some(terms)
                    if user.role.edits_terms() && terms != ApprovalTerms::seed(loan) =>
                {
                    terms.quote(loan.net_mthly_income)?;
                    Ok(DecisionCall::ApprovalTerms(ApprovalTermsRequest {
                        decision: request(comment),
                        terms,
                    }))
                }
                _ => Ok(DecisionCall::Decision(request(comment))),
            }
        }
    }
}
