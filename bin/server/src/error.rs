//! Error responses for the JSON API.
//!
//! Every failure body has the same shape:
//! `{ "success": false, "error": <kind>, "message": <text> }`.

use std::fmt;

use airform_integration::{AirtableError, SubmissionError};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::prelude::Report;
use serde_json::json;

use crate::auth::guard::GuardError;
use crate::db::StoreError;

/// Builds a JSON error response.
pub fn json_error(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "message": message,
        })),
    )
        .into_response()
}

/// Errors from the form, response and metadata routes.
#[derive(Debug)]
pub enum ApiError {
    /// The request is missing a field or has a malformed one.
    BadRequest { message: String },
    /// The resource does not exist or belongs to someone else.
    NotFound { what: &'static str },
    /// The answers do not satisfy the form.
    InvalidSubmission(SubmissionError),
    /// No usable provider token.
    Guard(GuardError),
    /// Airtable rejected or failed a call.
    Upstream { details: String },
    /// A store failed.
    Store(StoreError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message } => write!(f, "bad request: {message}"),
            Self::NotFound { what } => write!(f, "{what} not found"),
            Self::InvalidSubmission(e) => write!(f, "{e}"),
            Self::Guard(e) => write!(f, "{e}"),
            Self::Upstream { details } => write!(f, "Airtable call failed: {details}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        Self::Guard(e)
    }
}

impl From<SubmissionError> for ApiError {
    fn from(e: SubmissionError) -> Self {
        Self::InvalidSubmission(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<Report<AirtableError>> for ApiError {
    fn from(report: Report<AirtableError>) -> Self {
        Self::Upstream {
            details: report.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest { message } => {
                json_error(StatusCode::BAD_REQUEST, "bad_request", &message)
            }
            Self::NotFound { what } => {
                json_error(StatusCode::NOT_FOUND, "not_found", &format!("{what} not found"))
            }
            Self::InvalidSubmission(e) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_submission", &e.to_string())
            }
            Self::Guard(e) => e.into_response(),
            Self::Upstream { details } => {
                tracing::error!(%details, "Airtable call failed");
                json_error(
                    StatusCode::BAD_GATEWAY,
                    "airtable_error",
                    "Airtable request failed",
                )
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "store error");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn error_body_has_stable_shape() {
        let response = ApiError::NotFound { what: "Form" }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Form not found");
    }

    #[tokio::test]
    async fn upstream_details_are_not_returned() {
        let response = ApiError::Upstream {
            details: "secret provider body".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(!body.to_string().contains("secret provider body"));
    }

    #[test]
    fn airtable_reports_become_upstream_errors() {
        let report: Report<AirtableError> = AirtableError::Status {
            operation: "create record",
            status: 422,
            body: "bad".to_string(),
        }
        .into();
        assert!(matches!(ApiError::from(report), ApiError::Upstream { .. }));
    }
}
