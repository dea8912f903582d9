//! Loan-application workflow: role gating, approval terms, decision dispatch, and the
//! stateful view that ties them together.

pub mod dispatch;
pub mod domain;
pub mod http;
pub mod policy;
pub mod router;
pub mod service;
pub mod terms;
pub mod view;

#[cfg(test)]
mod tests;

pub use dispatch::{
    ApiAck, ApprovalTermsRequest, BookingDetails, BookingRequest, DecisionCall, DecisionRequest,
    DispatchError, LoanGateway, GENERIC_FAILURE, REJECTED_FALLBACK,
};
pub use domain::{
    ActingUser, ApplicationStatus, ApprovalTrailEntry, DecisionFlag, LoanApplication,
    LoanApplicationId, ParseCodeError, Role, TrailOrder, UserSession,
};
pub use http::HttpLoanGateway;
pub use policy::{
    action_label, allowed_transitions, can_act_on, can_cancel, can_return, primary_action,
    PrimaryAction,
};
pub use router::workflow_router;
pub use service::{
    DecisionSubmission, LoanWorkflowService, QuoteRequest, WorkflowServiceError, WorkflowSummary,
};
pub use terms::{
    apply_change, compute_terms, ApprovalTerms, TermsChange, TermsDraft, TermsError, TermsQuote,
};
pub use view::{
    ConfirmPrompt, ConsoleShell, Modal, ModalKind, Notice, TriggerOutcome, ViewError, ViewPhase,
    ViewSnapshot, WorkflowView, LOAN_LIST_ROUTE,
};
