//! Workflow view over a single loan application.
//!
//! A `WorkflowView` owns the loan snapshot and the draft approval terms for its
//! lifetime. Triggers take `&self` so a shell may fire them concurrently; a single
//! submitting flag keeps at most one confirm/modal/dispatch branch in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::dispatch::{
    ApprovalTermsRequest, BookingDetails, BookingRequest, DecisionCall, DecisionRequest,
    DispatchError, LoanGateway,
};
use super::domain::{ActingUser, ApplicationStatus, DecisionFlag, LoanApplication, LoanApplicationId};
use super::policy::{self, PrimaryAction};
use super::terms::{TermsChange, TermsDraft, TermsError, TermsQuote};

/// Route of the loan list the view returns to after a completed decision.
pub const LOAN_LIST_ROUTE: &str = "/loan-applications";
/// Comment attached to booking decisions.
pub const BOOKED_COMMENT: &str = "Loan booked";
const SUCCESS_FALLBACK: &str = "Process completed";

/// UI collaborators the view drives: confirmation dialog, toast, and router.
#[async_trait]
pub trait ConsoleShell: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
    fn notify(&self, notice: &Notice);
    fn navigate(&self, route: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmPrompt {
    pub title: String,
    pub comment: &'static str,
}

impl ConfirmPrompt {
    fn for_status(status: ApplicationStatus, comment: &'static str) -> Self {
        let title = match status {
            ApplicationStatus::PendingSubmission => "Resubmit this loan application?",
            ApplicationStatus::PendingAcceptance => "Accept this loan application?",
            _ => "Proceed with this loan application?",
        };
        Self {
            title: title.to_string(),
            comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPhase {
    Idle,
    Loading,
    Loaded,
    Submitting,
    Navigated,
    LoadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalKind {
    Progress,
    Book,
}

/// Form shown while collecting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modal {
    Progress {
        decision: DecisionFlag,
        terms_editable: bool,
    },
    Book,
}

impl Modal {
    pub const fn kind(&self) -> ModalKind {
        match self {
            Modal::Progress { .. } => ModalKind::Progress,
            Modal::Book => ModalKind::Book,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another trigger was already in flight.
    Ignored,
    /// The user declined the confirmation dialog.
    Dismissed,
    ModalOpened(ModalKind),
    Completed { message: String },
    Failed { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("no loan application loaded")]
    NotLoaded,
    #[error("a decision was already completed; reload the application")]
    Finished,
    #[error("no decision form is open")]
    NoActiveModal,
    #[error("the open form is not the {expected:?} form")]
    ModalMismatch { expected: ModalKind },
    #[error("{0} is not available for this application")]
    TransitionUnavailable(DecisionFlag),
    #[error("terms can only be edited by a reviewer approving the application")]
    TermsLocked,
    #[error("a comment is required")]
    CommentRequired,
    #[error("invalid booking details: {0}")]
    InvalidBooking(String),
    #[error(transparent)]
    Terms(#[from] TermsError),
    #[error(transparent)]
    Load(#[from] DispatchError),
}

/// Point-in-time copy of the view state for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub phase: ViewPhase,
    pub loan: Option<LoanApplication>,
    pub modal: Option<Modal>,
    pub terms: Option<TermsDraft>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub is_submitting: bool,
}

#[derive(Debug)]
struct ViewModel {
    phase: ViewPhase,
    loan: Option<LoanApplication>,
    modal: Option<Modal>,
    terms: Option<TermsDraft>,
    message: Option<String>,
    error: Option<String>,
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

/// Triggers and submissions only run against a freshly loaded snapshot.
fn require_loaded(phase: ViewPhase) -> Result<(), ViewError> {
    match phase {
        ViewPhase::Loaded => Ok(()),
        ViewPhase::Navigated => Err(ViewError::Finished),
        ViewPhase::Idle
        | ViewPhase::Loading
        | ViewPhase::Submitting
        | ViewPhase::LoadFailed => Err(ViewError::NotLoaded),
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WorkflowView<G, S> {
    gateway: Arc<G>,
    shell: Arc<S>,
    user: ActingUser,
    model: Mutex<ViewModel>,
    submitting: AtomicBool,
}

impl<G, S> WorkflowView<G, S>
where
    G: LoanGateway + 'static,
    S: ConsoleShell + 'static,
{
    /// `user` is the effective acting user, resolved by the caller.
    pub fn new(gateway: Arc<G>, shell: Arc<S>, user: ActingUser) -> Self {
        Self {
            gateway,
            shell,
            user,
            model: Mutex::new(ViewModel {
                phase: ViewPhase::Idle,
                loan: None,
                modal: None,
                terms: None,
                message: None,
                error: None,
            }),
            submitting: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user(&self) -> &ActingUser {
        &self.user
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let model = self.lock();
        ViewSnapshot {
            phase: model.phase,
            loan: model.loan.clone(),
            modal: model.modal,
            terms: model.terms.clone(),
            message: model.message.clone(),
            error: model.error.clone(),
            is_submitting: self.submitting.load(Ordering::Acquire),
        }
    }

    fn status(&self) -> Option<ApplicationStatus> {
        self.lock().loan.as_ref().map(|loan| loan.application_status)
    }

    /// Whether the acting user sees workflow actions for the loaded application.
    pub fn can_act(&self) -> bool {
        self.status()
            .map(|status| policy::can_act_on(self.user.role, status))
            .unwrap_or(false)
    }

    pub fn action_label(&self) -> &'static str {
        policy::action_label(self.user.role)
    }

    pub fn can_cancel(&self) -> bool {
        self.status().map(policy::can_cancel).unwrap_or(false)
    }

    pub fn can_return(&self) -> bool {
        self.status().map(policy::can_return).unwrap_or(false)
    }

    pub async fn load(&self, id: &LoanApplicationId) -> Result<(), ViewError> {
        {
            let mut model = self.lock();
            model.phase = ViewPhase::Loading;
            model.error = None;
        }

        match self.gateway.fetch_loan(id).await {
            Ok(loan) => {
                info!(loan_id = %loan.id, status = %loan.application_status, "loan application loaded");
                let mut model = self.lock();
                model.terms = Some(TermsDraft::seeded(&loan));
                model.loan = Some(loan);
                model.modal = None;
                model.phase = ViewPhase::Loaded;
                Ok(())
            }
            Err(err) => {
                warn!(loan_id = %id, error = %err, "unable to load loan application");
                let message = err.user_message();
                {
                    let mut model = self.lock();
                    model.phase = ViewPhase::LoadFailed;
                    model.error = Some(message.clone());
                }
                self.shell.notify(&Notice::Error(message));
                Err(ViewError::Load(err))
            }
        }
    }

    /// Runs the primary action for the current status.
    pub async fn trigger_primary(&self) -> Result<TriggerOutcome, ViewError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            debug!("primary action ignored while another is in flight");
            return Ok(TriggerOutcome::Ignored);
        };

        let (loan_id, status) = {
            let model = self.lock();
            require_loaded(model.phase)?;
            let loan = model.loan.as_ref().ok_or(ViewError::NotLoaded)?;
            (loan.id.clone(), loan.application_status)
        };
        if status.is_terminal() {
            return Err(ViewError::TransitionUnavailable(DecisionFlag::Approved));
        }

        match policy::primary_action(status) {
            PrimaryAction::Book => Ok(self.open_modal(Modal::Book)),
            PrimaryAction::Progress => Ok(self.open_modal(Modal::Progress {
                decision: DecisionFlag::Approved,
                terms_editable: self.user.role.edits_terms(),
            })),
            PrimaryAction::Confirm { comment } => {
                let prompt = ConfirmPrompt::for_status(status, comment);
                if !self.shell.confirm(&prompt).await {
                    return Ok(TriggerOutcome::Dismissed);
                }
                let request = self.decision_request(loan_id, DecisionFlag::Approved, comment);
                Ok(self.dispatch(DecisionCall::Decision(request)).await)
            }
        }
    }

    /// Opens the progress form for a decline.
    pub async fn trigger_cancel(&self) -> Result<TriggerOutcome, ViewError> {
        self.trigger_secondary(DecisionFlag::Declined, policy::can_cancel)
    }

    /// Opens the progress form for a return to the previous stage.
    pub async fn trigger_return(&self) -> Result<TriggerOutcome, ViewError> {
        self.trigger_secondary(DecisionFlag::Returned, policy::can_return)
    }

    fn trigger_secondary(
        &self,
        decision: DecisionFlag,
        offered: fn(ApplicationStatus) -> bool,
    ) -> Result<TriggerOutcome, ViewError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            return Ok(TriggerOutcome::Ignored);
        };

        let status = {
            let model = self.lock();
            require_loaded(model.phase)?;
            model
                .loan
                .as_ref()
                .map(|loan| loan.application_status)
                .ok_or(ViewError::NotLoaded)?
        };
        if status.is_terminal() || !offered(status) {
            return Err(ViewError::TransitionUnavailable(decision));
        }

        Ok(self.open_modal(Modal::Progress {
            decision,
            terms_editable: false,
        }))
    }

    fn open_modal(&self, modal: Modal) -> TriggerOutcome {
        let mut model = self.lock();
        model.modal = Some(modal);
        model.error = None;
        TriggerOutcome::ModalOpened(modal.kind())
    }

    pub fn close_modal(&self) {
        self.lock().modal = None;
    }

    /// Commits one terms field edit; the quote is stale until [`Self::recompute_terms`].
    pub fn commit_terms(&self, change: TermsChange) -> Result<(), ViewError> {
        let mut model = self.lock();
        match model.modal {
            Some(Modal::Progress {
                decision: DecisionFlag::Approved,
                terms_editable: true,
            }) => {}
            _ => return Err(ViewError::TermsLocked),
        }
        let draft = model.terms.as_mut().ok_or(ViewError::NotLoaded)?;
        draft.commit(change);
        Ok(())
    }

    pub fn recompute_terms(&self) -> Result<TermsQuote, ViewError> {
        let mut model = self.lock();
        let net_income = model
            .loan
            .as_ref()
            .map(|loan| loan.net_mthly_income)
            .ok_or(ViewError::NotLoaded)?;
        let draft = model.terms.as_mut().ok_or(ViewError::NotLoaded)?;
        Ok(draft.recompute(net_income)?)
    }

    /// Submits the open progress form.
    pub async fn submit_progress(&self, comment: &str) -> Result<TriggerOutcome, ViewError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            return Ok(TriggerOutcome::Ignored);
        };

        let comment = comment.trim();
        let call = {
            let model = self.lock();
            require_loaded(model.phase)?;
            let loan = model.loan.as_ref().ok_or(ViewError::NotLoaded)?;
            let (decision, terms_editable) = match model.modal {
                Some(Modal::Progress {
                    decision,
                    terms_editable,
                }) => (decision, terms_editable),
                Some(Modal::Book) => {
                    return Err(ViewError::ModalMismatch {
                        expected: ModalKind::Progress,
                    })
                }
                None => return Err(ViewError::NoActiveModal),
            };
            if comment.is_empty() {
                return Err(ViewError::CommentRequired);
            }

            let request = self.decision_request(loan.id.clone(), decision, comment);
            match model.terms.as_ref() {
                Some(draft)
                    if decision == DecisionFlag::Approved && terms_editable && draft.edited =>
                {
                    draft.terms.quote(loan.net_mthly_income)?;
                    DecisionCall::ApprovalTerms(ApprovalTermsRequest {
                        decision: request,
                        terms: draft.terms,
                    })
                }
                _ => DecisionCall::Decision(request),
            }
        };

        Ok(self.dispatch(call).await)
    }

    /// Submits the open booking form.
    pub async fn submit_booking(
        &self,
        details: BookingDetails,
    ) -> Result<TriggerOutcome, ViewError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting) else {
            return Ok(TriggerOutcome::Ignored);
        };
        require_loaded(self.lock().phase)?;

        if details.loan_product_id.trim().is_empty() {
            return Err(ViewError::InvalidBooking(
                "a loan product must be selected".to_string(),
            ));
        }
        if !details.management_fee.is_finite() || details.management_fee < 0.0 {
            return Err(ViewError::InvalidBooking(
                "management fee must be zero or positive".to_string(),
            ));
        }

        let call = {
            let model = self.lock();
            let loan = model.loan.as_ref().ok_or(ViewError::NotLoaded)?;
            match model.modal {
                Some(Modal::Book) => {}
                Some(Modal::Progress { .. }) => {
                    return Err(ViewError::ModalMismatch {
                        expected: ModalKind::Book,
                    })
                }
                None => return Err(ViewError::NoActiveModal),
            }
            DecisionCall::Booking(BookingRequest {
                decision: self.decision_request(
                    loan.id.clone(),
                    DecisionFlag::Approved,
                    BOOKED_COMMENT,
                ),
                booking: details,
            })
        };

        Ok(self.dispatch(call).await)
    }

    fn decision_request(
        &self,
        loan_application_id: LoanApplicationId,
        decision_flag: DecisionFlag,
        comment: &str,
    ) -> DecisionRequest {
        DecisionRequest {
            decision_flag,
            comment: comment.to_string(),
            loan_application_id,
            current_processor_uid: self.user.id.clone(),
        }
    }

    async fn dispatch(&self, call: DecisionCall) -> TriggerOutcome {
        {
            let mut model = self.lock();
            model.phase = ViewPhase::Submitting;
            model.error = None;
            model.message = None;
        }

        let loan_id = call.decision().loan_application_id.clone();
        let flag = call.decision().decision_flag;
        let result = call.send(self.gateway.as_ref()).await;

        let failure = match result {
            Ok(ack) if ack.is_successful => {
                let message = ack.text().unwrap_or(SUCCESS_FALLBACK).to_string();
                info!(%loan_id, %flag, kind = call.kind(), "workflow decision accepted");
                {
                    let mut model = self.lock();
                    model.modal = None;
                    model.message = Some(message.clone());
                    model.phase = ViewPhase::Navigated;
                }
                self.shell.notify(&Notice::Success(message.clone()));
                self.shell.navigate(LOAN_LIST_ROUTE);
                return TriggerOutcome::Completed { message };
            }
            Ok(ack) => {
                let message = ack.failure_message().unwrap_or_default();
                warn!(%loan_id, %flag, kind = call.kind(), %message, "workflow decision rejected");
                message
            }
            Err(err) => {
                error!(%loan_id, %flag, kind = call.kind(), error = %err, "workflow decision failed");
                err.user_message()
            }
        };

        {
            let mut model = self.lock();
            model.phase = ViewPhase::Loaded;
            model.error = Some(failure.clone());
        }
        self.shell.notify(&Notice::Error(failure.clone()));
        TriggerOutcome::Failed { message: failure }
    }
}
