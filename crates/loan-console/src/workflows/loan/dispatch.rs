//! Backend call shapes for workflow decisions and the gateway they travel through.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{DecisionFlag, LoanApplication, LoanApplicationId};
use super::terms::ApprovalTerms;

/// Shown when the backend could not be reached or answered with garbage.
pub const GENERIC_FAILURE: &str = "Unable to complete process";
/// Shown when the backend refused a request without saying why.
pub const REJECTED_FALLBACK: &str = "Request could not be completed";

/// Fields shared by every decision submitted to the workflow endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub decision_flag: DecisionFlag,
    pub comment: String,
    pub loan_application_id: LoanApplicationId,
    pub current_processor_uid: String,
}

/// Details collected by the booking form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub loan_product_id: String,
    pub management_fee: f64,
    pub first_repayment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    #[serde(flatten)]
    pub decision: DecisionRequest,
    #[serde(flatten)]
    pub booking: BookingDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalTermsRequest {
    #[serde(flatten)]
    pub decision: DecisionRequest,
    #[serde(flatten)]
    pub terms: ApprovalTerms,
}

/// Acknowledgement returned by every mutation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAck {
    pub is_successful: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            is_successful: true,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: Option<&str>) -> Self {
        Self {
            is_successful: false,
            message: message.map(str::to_string),
        }
    }

    /// Backend-supplied text, or `None` when it was missing or blank.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }

    /// User-facing failure text, `None` for a successful acknowledgement.
    pub fn failure_message(&self) -> Option<String> {
        if self.is_successful {
            None
        } else {
            Some(self.text().unwrap_or(REJECTED_FALLBACK).to_string())
        }
    }
}

/// Envelope of `GET /loan-application/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanEnvelope {
    pub is_successful: bool,
    #[serde(default)]
    pub data: Option<LoanApplication>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend responded with status {status}")]
    Status { status: u16, body: String },
    #[error("unreadable backend response: {0}")]
    Decode(String),
    #[error("loan application {id} not found")]
    NotFound { id: LoanApplicationId },
    #[error("'{id}' is not a usable loan application id")]
    InvalidId { id: LoanApplicationId },
    #[error("backend rejected request: {}", .0.as_deref().unwrap_or(REJECTED_FALLBACK))]
    Rejected(Option<String>),
}

impl DispatchError {
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::Rejected(Some(message)) if !message.trim().is_empty() => {
                message.trim().to_string()
            }
            DispatchError::Rejected(_) => REJECTED_FALLBACK.to_string(),
            DispatchError::NotFound { id } => format!("Loan application {id} was not found"),
            DispatchError::InvalidId { id } => format!("'{id}' is not a valid loan application id"),
            DispatchError::Transport(_)
            | DispatchError::Status { .. }
            | DispatchError::Decode(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// REST collaborator that owns every loan and workflow rule.
#[async_trait]
pub trait LoanGateway: Send + Sync {
    async fn fetch_loan(&self, id: &LoanApplicationId) -> Result<LoanApplication, DispatchError>;
    async fn submit_decision(&self, request: &DecisionRequest) -> Result<ApiAck, DispatchError>;
    async fn submit_booking(&self, request: &BookingRequest) -> Result<ApiAck, DispatchError>;
    async fn submit_approval_terms(
        &self,
        request: &ApprovalTermsRequest,
    ) -> Result<ApiAck, DispatchError>;
}

/// One of the three call shapes a decision can take.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionCall {
    Decision(DecisionRequest),
    Booking(BookingRequest),
    ApprovalTerms(ApprovalTermsRequest),
}

impl DecisionCall {
    pub fn decision(&self) -> &DecisionRequest {
        match self {
            DecisionCall::Decision(request) => request,
            DecisionCall::Booking(request) => &request.decision,
            DecisionCall::ApprovalTerms(request) => &request.decision,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            DecisionCall::Decision(_) => "decision",
            DecisionCall::Booking(_) => "booking",
            DecisionCall::ApprovalTerms(_) => "approval_terms",
        }
    }

    pub async fn send<G>(&self, gateway: &G) -> Result<ApiAck, DispatchError>
    where
        G: LoanGateway + ?Sized,
    {
        match self {
            DecisionCall::Decision(request) => gateway.submit_decision(request).await,
            DecisionCall::Booking(request) => gateway.submit_booking(request).await,
            DecisionCall::ApprovalTerms(request) => gateway.submit_approval_terms(request).await,
        }
    }
}
