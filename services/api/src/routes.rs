use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_console::workflows::loan::{workflow_router, LoanGateway, LoanWorkflowService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_console_routes<G>(service: Arc<LoanWorkflowService<G>>) -> axum::Router
where
    G: LoanGateway + 'static,
{
    workflow_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use loan_console::workflows::loan::{
        ApiAck, ApprovalTermsRequest, BookingRequest, DecisionRequest, DispatchError,
        LoanApplication, LoanApplicationId,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    /// Backend that is never reachable.
    struct OfflineGateway;

    fn offline() -> DispatchError {
        DispatchError::Transport("connection refused".to_string())
    }

    #[async_trait]
    impl LoanGateway for OfflineGateway {
        async fn fetch_loan(
            &self,
            _id: &LoanApplicationId,
        ) -> Result<LoanApplication, DispatchError> {
            Err(offline())
        }

        async fn submit_decision(&self, _: &DecisionRequest) -> Result<ApiAck, DispatchError> {
            Err(offline())
        }

        async fn submit_booking(&self, _: &BookingRequest) -> Result<ApiAck, DispatchError> {
            Err(offline())
        }

        async fn submit_approval_terms(
            &self,
            _: &ApprovalTermsRequest,
        ) -> Result<ApiAck, DispatchError> {
            Err(offline())
        }
    }

    fn app(ready: bool) -> axum::Router {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_console_routes(Arc::new(LoanWorkflowService::new(Arc::new(OfflineGateway))))
            .layer(Extension(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "initializing");

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_metrics_are_served() {
        let response = app(true)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(true)
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_bad_gateway() {
        let request = Request::get("/api/v1/loan-applications/LN-1/workflow")
            .header("x-user-id", "rev-1")
            .header("x-user-role", "FIRST_REVIEWER")
            .body(Body::empty())
            .expect("request");
        let response = app(true).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await["error"],
            "Unable to complete process"
        );
    }
}
