//! HTTP routes for the loan workflow.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::dispatch::{DispatchError, LoanGateway};
use super::domain::{ActingUser, LoanApplicationId, Role, UserSession};
use super::service::{
    DecisionSubmission, LoanWorkflowService, QuoteRequest, WorkflowServiceError,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const IMPERSONATED_ID_HEADER: &str = "x-impersonated-user-id";
pub const IMPERSONATED_ROLE_HEADER: &str = "x-impersonated-user-role";

/// Router builder exposing the console workflow endpoints.
pub fn workflow_router<G>(service: Arc<LoanWorkflowService<G>>) -> Router
where
    G: LoanGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/loan-applications/:loan_id/workflow",
            get(summary_handler::<G>),
        )
        .route(
            "/api/v1/loan-applications/:loan_id/decisions",
            post(decision_handler::<G>),
        )
        .route("/api/v1/terms/quote", post(quote_handler::<G>))
        .with_state(service)
}

/// Resolves the effective acting user once, at the request boundary.
pub(crate) fn acting_user(headers: &HeaderMap) -> Result<ActingUser, String> {
    let user = header_user(headers, USER_ID_HEADER, USER_ROLE_HEADER)?
        .ok_or_else(|| format!("{USER_ID_HEADER} and {USER_ROLE_HEADER} headers are required"))?;
    let impersonated = header_user(headers, IMPERSONATED_ID_HEADER, IMPERSONATED_ROLE_HEADER)?;

    let session = UserSession { user, impersonated };
    Ok(session.effective().clone())
}

fn resolve_request(
    raw_id: String,
    headers: &HeaderMap,
) -> Result<(LoanApplicationId, ActingUser), String> {
    let id = LoanApplicationId(raw_id);
    if !id.is_addressable() {
        return Err(format!("'{id}' is not a valid loan application id"));
    }
    Ok((id, acting_user(headers)?))
}

fn header_user(
    headers: &HeaderMap,
    id_header: &str,
    role_header: &str,
) -> Result<Option<ActingUser>, String> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    match (read(id_header), read(role_header)) {
        (None, None) => Ok(None),
        (Some(id), Some(role)) => {
            let role: Role = role.parse().map_err(|err| format!("{err}"))?;
            Ok(Some(ActingUser::new(id, role)))
        }
        _ => Err(format!("{id_header} and {role_header} must be sent together")),
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({ "error": message })),
    )
        .into_response()
}

fn error_response(error: WorkflowServiceError) -> Response {
    let (status, message) = match &error {
        WorkflowServiceError::Gateway(DispatchError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, error.to_string())
        }
        WorkflowServiceError::Gateway(inner @ DispatchError::InvalidId { .. }) => {
            (StatusCode::BAD_REQUEST, inner.user_message())
        }
        WorkflowServiceError::Gateway(inner) => (StatusCode::BAD_GATEWAY, inner.user_message()),
        WorkflowServiceError::Forbidden { .. } => (StatusCode::FORBIDDEN, error.to_string()),
        WorkflowServiceError::Terms(_) | WorkflowServiceError::InvalidRequest(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
    };
    (status, axum::Json(json!({ "error": message }))).into_response()
}

pub(crate) async fn summary_handler<G>(
    State(service): State<Arc<LoanWorkflowService<G>>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    G: LoanGateway + 'static,
{
    let (id, user) = match resolve_request(loan_id, &headers) {
        Ok(resolved) => resolved,
        Err(message) => return bad_request(message),
    };

    match service.summary(&id, &user).await {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<G>(
    State(service): State<Arc<LoanWorkflowService<G>>>,
    Path(loan_id): Path<String>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<DecisionSubmission>,
) -> Response
where
    G: LoanGateway + 'static,
{
    let (id, user) = match resolve_request(loan_id, &headers) {
        Ok(resolved) => resolved,
        Err(message) => return bad_request(message),
    };

    match service.decide(&id, &user, submission).await {
        Ok(ack) => (StatusCode::OK, axum::Json(ack)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn quote_handler<G>(
    State(service): State<Arc<LoanWorkflowService<G>>>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    G: LoanGateway + 'static,
{
    match service.quote(request) {
        Ok(quote) => (StatusCode::OK, axum::Json(quote)).into_response(),
        Err(error) => error_response(error),
    }
}
