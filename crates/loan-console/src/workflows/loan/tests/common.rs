use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::loan::dispatch::{
    ApiAck, ApprovalTermsRequest, BookingRequest, DecisionCall, DecisionRequest, DispatchError,
    LoanGateway,
};
use crate::workflows::loan::domain::{
    ActingUser, ApplicationStatus, ApprovalTrailEntry, DecisionFlag, LoanApplication,
    LoanApplicationId, Role,
};
use crate::workflows::loan::view::{ConfirmPrompt, ConsoleShell, Notice, WorkflowView};
use crate::workflows::loan::{workflow_router, LoanWorkflowService};

pub(super) fn loan(status: ApplicationStatus) -> LoanApplication {
    LoanApplication {
        id: LoanApplicationId::from("LN-1001"),
        application_status: status,
        loan_amount: 100000.0,
        approved_loan_amount: None,
        loan_tenor_mths: 12,
        approved_tenor_mths: None,
        net_mthly_income: 50000.0,
        approved_dsr_rate: Some(30.0),
        approved_mthly_rate: Some(2.0),
        approved_mthly_repayment: None,
        approval_trail: vec![
            ApprovalTrailEntry {
                processor: "officer-7".to_string(),
                decision_flag: DecisionFlag::Approved,
                comment: Some("Submitted".to_string()),
                date_completed: Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).single(),
            },
            ApprovalTrailEntry {
                processor: "reviewer-1".to_string(),
                decision_flag: DecisionFlag::Returned,
                comment: Some("Missing payslip".to_string()),
                date_completed: Utc.with_ymd_and_hms(2024, 4, 5, 15, 30, 0).single(),
            },
        ],
    }
}

pub(super) fn user(role: Role) -> ActingUser {
    ActingUser::new(format!("{}-uid", role.code().to_ascii_lowercase()), role)
}

#[derive(Debug, Clone)]
pub(super) enum Reply {
    Ack(ApiAck),
    TransportFailure,
}

/// Gateway double serving one loan and recording every dispatched call.
pub(super) struct MockGateway {
    loan: Mutex<Option<LoanApplication>>,
    reply: Mutex<Reply>,
    calls: Mutex<Vec<DecisionCall>>,
}

impl MockGateway {
    pub(super) fn serving(loan: LoanApplication) -> Self {
        Self {
            loan: Mutex::new(Some(loan)),
            reply: Mutex::new(Reply::Ack(ApiAck::success("Workflow updated"))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn empty() -> Self {
        Self {
            loan: Mutex::new(None),
            reply: Mutex::new(Reply::Ack(ApiAck::success("Workflow updated"))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn replying(self, reply: Reply) -> Self {
        *self.reply.lock().expect("reply mutex poisoned") = reply;
        self
    }

    pub(super) fn calls(&self) -> Vec<DecisionCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn record(&self, call: DecisionCall) -> Result<ApiAck, DispatchError> {
        self.calls.lock().expect("calls mutex poisoned").push(call);
        match self.reply.lock().expect("reply mutex poisoned").clone() {
            Reply::Ack(ack) => Ok(ack),
            Reply::TransportFailure => {
                Err(DispatchError::Transport("connection refused".to_string()))
            }
        }
    }
}

#[async_trait]
impl LoanGateway for MockGateway {
    async fn fetch_loan(&self, id: &LoanApplicationId) -> Result<LoanApplication, DispatchError> {
        self.loan
            .lock()
            .expect("loan mutex poisoned")
            .clone()
            .filter(|loan| &loan.id == id)
            .ok_or_else(|| DispatchError::NotFound { id: id.clone() })
    }

    async fn submit_decision(&self, request: &DecisionRequest) -> Result<ApiAck, DispatchError> {
        self.record(DecisionCall::Decision(request.clone()))
    }

    async fn submit_booking(&self, request: &BookingRequest) -> Result<ApiAck, DispatchError> {
        self.record(DecisionCall::Booking(request.clone()))
    }

    async fn submit_approval_terms(
        &self,
        request: &ApprovalTermsRequest,
    ) -> Result<ApiAck, DispatchError> {
        self.record(DecisionCall::ApprovalTerms(request.clone()))
    }
}

/// Shell double answering confirmations and recording toasts and navigation.
#[derive(Default)]
pub(super) struct RecordingShell {
    decline_confirmations: bool,
    gate: Option<Arc<Notify>>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
    notices: Mutex<Vec<Notice>>,
    routes: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub(super) fn declining() -> Self {
        Self {
            decline_confirmations: true,
            ..Self::default()
        }
    }

    /// Confirmations stay open until `gate` is notified.
    pub(super) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(super) fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().expect("prompt mutex poisoned").clone()
    }

    pub(super) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }

    pub(super) fn routes(&self) -> Vec<String> {
        self.routes.lock().expect("route mutex poisoned").clone()
    }
}

#[async_trait]
impl ConsoleShell for RecordingShell {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts
            .lock()
            .expect("prompt mutex poisoned")
            .push(prompt.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        !self.decline_confirmations
    }

    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push(notice.clone());
    }

    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .expect("route mutex poisoned")
            .push(route.to_string());
    }
}

pub(super) type TestView = WorkflowView<MockGateway, RecordingShell>;

pub(super) async fn loaded_view(
    status: ApplicationStatus,
    role: Role,
) -> (TestView, Arc<MockGateway>, Arc<RecordingShell>) {
    view_with(MockGateway::serving(loan(status)), RecordingShell::default(), role).await
}

pub(super) async fn view_with(
    gateway: MockGateway,
    shell: RecordingShell,
    role: Role,
) -> (TestView, Arc<MockGateway>, Arc<RecordingShell>) {
    let gateway = Arc::new(gateway);
    let shell = Arc::new(shell);
    let view = WorkflowView::new(gateway.clone(), shell.clone(), user(role));
    view.load(&LoanApplicationId::from("LN-1001"))
        .await
        .expect("loan loads");
    (view, gateway, shell)
}

pub(super) fn router_for(gateway: Arc<MockGateway>) -> axum::Router {
    workflow_router(Arc::new(LoanWorkflowService::new(gateway)))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
