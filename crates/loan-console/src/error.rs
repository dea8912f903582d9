use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::loan::{DispatchError, ViewError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Gateway(DispatchError),
    View(ViewError),
    /// The backend declined a decision the operator submitted.
    Rejected(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Gateway(err) => write!(f, "loan backend error: {}", err),
            AppError::View(err) => write!(f, "workflow error: {}", err),
            AppError::Rejected(message) => write!(f, "decision not completed: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Gateway(err) => Some(err),
            AppError::View(err) => Some(err),
            AppError::Rejected(_) => None,
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Gateway(DispatchError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Gateway(DispatchError::InvalidId { .. }) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::View(ViewError::Load(DispatchError::NotFound { .. })) => {
                StatusCode::NOT_FOUND
            }
            AppError::View(ViewError::Load(_)) | AppError::Rejected(_) => StatusCode::BAD_GATEWAY,
            AppError::View(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        Self::Gateway(value)
    }
}

impl From<ViewError> for AppError {
    fn from(value: ViewError) -> Self {
        match value {
            ViewError::Load(err) => Self::Gateway(err),
            other => Self::View(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::LoanApplicationId;

    #[test]
    fn gateway_errors_map_to_upstream_statuses() {
        let missing = AppError::from(DispatchError::NotFound {
            id: LoanApplicationId::from("LN-404"),
        });
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let transport = AppError::from(DispatchError::Transport("connection reset".to_string()));
        assert_eq!(transport.status_code(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            AppError::from(ConfigError::InvalidPort).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn view_errors_unwrap_load_failures() {
        let load = AppError::from(ViewError::Load(DispatchError::Decode("eof".to_string())));
        assert!(matches!(load, AppError::Gateway(DispatchError::Decode(_))));

        let comment = AppError::from(ViewError::CommentRequired);
        assert_eq!(comment.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(comment.to_string(), "workflow error: a comment is required");
    }
}
