//! HTTP implementation of `LoanGateway` against the core-banking backend.
//!
//! Loan ids travel as a single percent-encoded path segment; ids that cannot
//! (blank, `.` or `..`) are refused before any request is sent.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, warn};

use super::dispatch::{
    ApiAck, ApprovalTermsRequest, BookingRequest, DecisionRequest, DispatchError, LoanEnvelope,
    LoanGateway,
};
use super::domain::{LoanApplication, LoanApplicationId};
use crate::config::BackendConfig;

const LOAN_SEGMENT: &str = "loan-application";
const DECISION_PATH: &[&str] = &["workflow"];
const BOOKING_PATH: &[&str] = &[LOAN_SEGMENT, "booking-workflow"];
const APPROVAL_TERMS_PATH: &[&str] = &[LOAN_SEGMENT, "approval-workflow"];

/// `LoanGateway` over the core-banking JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpLoanGateway {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpLoanGateway {
    pub fn new(config: &BackendConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| DispatchError::Transport(err.to_string()))?;

        Ok(Self::with_client(
            client,
            config.base_url.clone(),
            config.api_token.clone(),
        ))
    }

    pub fn with_client(client: Client, base_url: String, api_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DispatchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| DispatchError::Transport(format!("invalid backend url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| DispatchError::Transport("backend url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_ack<T>(&self, path: &[&str], body: &T) -> Result<ApiAck, DispatchError>
    where
        T: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "submitting workflow request");

        let response = self
            .authorize(self.client.post(url.clone()).json(body))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        match serde_json::from_str::<ApiAck>(&body) {
            Ok(mut ack) => {
                if !status.is_success() {
                    ack.is_successful = false;
                }
                if !ack.is_successful {
                    warn!(%url, status = status.as_u16(), message = ack.text().unwrap_or(""), "backend rejected workflow request");
                }
                Ok(ack)
            }
            Err(_) if !status.is_success() => Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(err) => Err(DispatchError::Decode(err.to_string())),
        }
    }
}

fn transport(err: reqwest::Error) -> DispatchError {
    DispatchError::Transport(err.to_string())
}

#[async_trait]
impl LoanGateway for HttpLoanGateway {
    async fn fetch_loan(&self, id: &LoanApplicationId) -> Result<LoanApplication, DispatchError> {
        if !id.is_addressable() {
            return Err(DispatchError::InvalidId { id: id.clone() });
        }
        let url = self.endpoint(&[LOAN_SEGMENT, id.0.as_str()])?;
        debug!(%url, "fetching loan application");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DispatchError::NotFound { id: id.clone() });
        }
        let body = response.text().await.map_err(transport)?;

        let envelope = match serde_json::from_str::<LoanEnvelope>(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(DispatchError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(err) => return Err(DispatchError::Decode(err.to_string())),
        };

        match envelope {
            LoanEnvelope {
                is_successful: true,
                data: Some(loan),
                ..
            } if status.is_success() => Ok(loan),
            LoanEnvelope {
                is_successful: true,
                data: None,
                ..
            } if status.is_success() => Err(DispatchError::Decode(
                "loan envelope is missing data".to_string(),
            )),
            LoanEnvelope { message, .. } => Err(DispatchError::Rejected(message)),
        }
    }

    async fn submit_decision(&self, request: &DecisionRequest) -> Result<ApiAck, DispatchError> {
        self.post_ack(DECISION_PATH, request).await
    }

    async fn submit_booking(&self, request: &BookingRequest) -> Result<ApiAck, DispatchError> {
        self.post_ack(BOOKING_PATH, request).await
    }

    async fn submit_approval_terms(
        &self,
        request: &ApprovalTermsRequest,
    ) -> Result<ApiAck, DispatchError> {
        self.post_ack(APPROVAL_TERMS_PATH, request).await
    }
}
