use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::loan::dispatch::DecisionCall;
use crate::workflows::loan::domain::{ApplicationStatus, DecisionFlag};
use crate::workflows::loan::router::{
    IMPERSONATED_ID_HEADER, IMPERSONATED_ROLE_HEADER, USER_ID_HEADER, USER_ROLE_HEADER,
};

const WORKFLOW_URI: &str = "/api/v1/loan-applications/LN-1001/workflow";
const DECISIONS_URI: &str = "/api/v1/loan-applications/LN-1001/decisions";

fn get_as(uri: &str, id: &str, role: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(USER_ID_HEADER, id)
        .header(USER_ROLE_HEADER, role)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, headers: &[(&str, &str)], body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn workflow_summary_returns_capabilities() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingFirstReview,
    )));
    let response = router_for(gateway)
        .oneshot(get_as(WORKFLOW_URI, "rev-9", "first_reviewer"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["canAct"], json!(true));
    assert_eq!(body["actionLabel"], json!("Approve"));
    assert_eq!(body["actingUser"]["id"], json!("rev-9"));
    assert_eq!(body["loan"]["applicationStatus"], json!("PENDING_FIRST_REVIEW"));
    assert_eq!(body["trail"][0]["processor"], json!("reviewer-1"));
}

#[tokio::test]
async fn missing_identity_headers_are_rejected() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingFirstReview,
    )));
    let request = Request::builder()
        .uri(WORKFLOW_URI)
        .body(Body::empty())
        .expect("request");
    let response = router_for(gateway).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error text")
        .contains(USER_ID_HEADER));
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingFirstReview,
    )));
    let response = router_for(gateway)
        .oneshot(get_as(WORKFLOW_URI, "rev-9", "AUDITOR"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_application_maps_to_not_found() {
    let gateway = Arc::new(MockGateway::empty());
    let response = router_for(gateway)
        .oneshot(get_as(WORKFLOW_URI, "rev-9", "FIRST_REVIEWER"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn impersonated_role_drives_permissions() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingAcceptance,
    )));
    let request = post_json(
        DECISIONS_URI,
        &[
            (USER_ID_HEADER, "admin-1"),
            (USER_ROLE_HEADER, "ADMINISTRATOR"),
            (IMPERSONATED_ID_HEADER, "ops-4"),
            (IMPERSONATED_ROLE_HEADER, "ACCEPTANCE_OPERATIONS"),
        ],
        json!({ "decisionFlag": "APPROVED" }),
    );
    let response = router_for(gateway.clone())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["isSuccessful"], json!(true));

    match gateway.calls().as_slice() {
        [DecisionCall::Decision(request)] => {
            assert_eq!(request.current_processor_uid, "ops-4");
            assert_eq!(request.comment, "Accepted");
        }
        other => panic!("expected one decision, got {other:?}"),
    }
}

#[tokio::test]
async fn half_impersonation_is_rejected() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingAcceptance,
    )));
    let request = post_json(
        DECISIONS_URI,
        &[
            (USER_ID_HEADER, "admin-1"),
            (USER_ROLE_HEADER, "ADMINISTRATOR"),
            (IMPERSONATED_ID_HEADER, "ops-4"),
        ],
        json!({ "decisionFlag": "APPROVED" }),
    );
    let response = router_for(gateway.clone())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn out_of_stage_decision_is_forbidden() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingSecondReview,
    )));
    let request = post_json(
        DECISIONS_URI,
        &[(USER_ID_HEADER, "officer-7"), (USER_ROLE_HEADER, "ACCOUNT_OFFICER")],
        json!({ "decisionFlag": "DECLINED", "comment": "withdrawn" }),
    );
    let response = router_for(gateway.clone())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn return_decision_is_dispatched() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingSecondReview,
    )));
    let request = post_json(
        DECISIONS_URI,
        &[(USER_ID_HEADER, "rev-2"), (USER_ROLE_HEADER, "SECOND_REVIEWER")],
        json!({ "decisionFlag": "RETURNED", "comment": "Recheck income" }),
    );
    let response = router_for(gateway.clone())
        .oneshot(request)
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].decision().decision_flag, DecisionFlag::Returned);
}

#[tokio::test]
async fn quote_endpoint_computes_terms() {
    let gateway = Arc::new(MockGateway::empty());
    let request = post_json(
        "/api/v1/terms/quote",
        &[],
        json!({
            "approvedLoanAmount": 100000.0,
            "approvedMthlyRate": 2.0,
            "approvedTenorMths": 12,
            "approvedDsrRate": 30.0,
            "netMthlyIncome": 50000.0
        }),
    );
    let response = router_for(gateway).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let repayment = body["monthlyRepayment"].as_f64().expect("number");
    assert!((repayment - 10333.33).abs() < 1e-2);
}

#[tokio::test]
async fn quote_endpoint_rejects_zero_tenor() {
    let gateway = Arc::new(MockGateway::empty());
    let request = post_json(
        "/api/v1/terms/quote",
        &[],
        json!({
            "approvedLoanAmount": 100000.0,
            "approvedMthlyRate": 2.0,
            "approvedTenorMths": 0,
            "approvedDsrRate": 30.0,
            "netMthlyIncome": 50000.0
        }),
    );
    let response = router_for(gateway).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unusable_loan_ids_are_rejected_before_the_backend() {
    let gateway = Arc::new(MockGateway::serving(loan(
        ApplicationStatus::PendingFirstReview,
    )));

    for uri in [
        "/api/v1/loan-applications/%20/workflow",
        "/api/v1/loan-applications/%2E%2E/workflow",
    ] {
        let response = router_for(gateway.clone())
            .oneshot(get_as(uri, "rev-9", "FIRST_REVIEWER"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    let request = post_json(
        "/api/v1/loan-applications/%2E%2E/decisions",
        &[(USER_ID_HEADER, "rev-9"), (USER_ROLE_HEADER, "FIRST_REVIEWER")],
        json!({ "decisionFlag": "APPROVED", "comment": "ok" }),
    );
    let response = router_for(gateway.clone())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(gateway.calls().is_empty());
}
