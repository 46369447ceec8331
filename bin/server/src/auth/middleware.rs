//! Session credential extractor for Axum.

use airform_core::UserId;
use airform_platform_access::SessionError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::AppState;
use crate::error::json_error;

/// Extractor for requiring a valid session credential.
///
/// The credential is read from `Authorization: Bearer <credential>`.
#[derive(Debug, Clone, Copy)]
pub struct RequireSession {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for RequireSession
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);

        let credential = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SessionRejection::MissingCredential)?;

        let claims = app_state
            .sessions
            .verify(credential)
            .map_err(SessionRejection::Invalid)?;

        Ok(RequireSession {
            user_id: claims.user_id(),
        })
    }
}

/// Rejection type for the session extractor.
#[derive(Debug)]
pub enum SessionRejection {
    MissingCredential,
    Invalid(SessionError),
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingCredential => json_error(
                StatusCode::UNAUTHORIZED,
                "missing_credential",
                "Authorization token missing",
            ),
            Self::Invalid(SessionError::Expired) => json_error(
                StatusCode::UNAUTHORIZED,
                SessionError::Expired.kind(),
                "Session expired; please sign in again",
            ),
            Self::Invalid(e) => json_error(StatusCode::UNAUTHORIZED, e.kind(), "Invalid session"),
        }
    }
}
