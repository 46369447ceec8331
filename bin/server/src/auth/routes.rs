//! Authentication routes for login, callback, and logout.

use airform_platform_access::{
    ConfigurationError, PkceError, PkceMaterial, ProviderIdentity, SessionError,
};
use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::pending::{PENDING_TTL_MINUTES, RegistryFull};
use super::{AppState, airtable::ExchangeError};
use crate::db::StoreError;
use crate::error::json_error;

/// Cookie holding the `state` issued by `/auth/login`.
pub const STATE_COOKIE: &str = "oauth_state";

/// Cookie holding the PKCE verifier issued by `/auth/login`.
pub const VERIFIER_COOKIE: &str = "pkce_verifier";

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn pending_cookie(state: &AppState, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(PENDING_TTL_MINUTES))
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

/// Always emits expiring cookies, whether or not the request carried them.
fn clear_pending_cookies(jar: CookieJar) -> CookieJar {
    jar.add(expired_cookie(STATE_COOKIE))
        .add(expired_cookie(VERIFIER_COOKIE))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Starts the sign-in flow by redirecting to Airtable.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let oauth = state.exchanger.config();
    oauth.credentials()?;

    let material = PkceMaterial::generate()?;
    let url = oauth.authorization_url(&material.state, &material.challenge)?;

    state
        .pending
        .issue(&material.state, &material.verifier, Utc::now())?;
    tracing::debug!("issued sign-in attempt");

    let jar = jar
        .add(pending_cookie(&state, STATE_COOKIE, material.state))
        .add(pending_cookie(&state, VERIFIER_COOKIE, material.verifier));

    Ok((jar, found(url.as_str())))
}

/// Completes the sign-in flow after Airtable redirects back.
///
/// The pending-attempt cookies are cleared whatever the outcome.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let result = complete_sign_in(&state, query, &jar).await;
    if let Err(e) = &result {
        tracing::warn!(error = %e, "sign-in callback rejected");
    }
    (clear_pending_cookies(jar), result)
}

async fn complete_sign_in(
    state: &AppState,
    query: CallbackQuery,
    jar: &CookieJar,
) -> Result<Response, AuthError> {
    state.exchanger.config().credentials()?;

    let returned_state = query
        .state
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidState)?;
    let issued_state = jar.get(STATE_COOKIE).map(|c| c.value());
    if issued_state != Some(returned_state.as_str()) {
        return Err(AuthError::InvalidState);
    }

    let code = match query.code.filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => {
            if let Some(error) = query.error {
                tracing::info!(%error, "provider denied authorization");
            }
            return Err(AuthError::MissingAuthorizationArtifact { artifact: "code" });
        }
    };
    let cookie_verifier = jar
        .get(VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingAuthorizationArtifact {
            artifact: "code_verifier",
        })?;

    let issued_verifier = state
        .pending
        .consume(&returned_state, Utc::now())
        .ok_or(AuthError::InvalidState)?;
    if issued_verifier != cookie_verifier {
        return Err(AuthError::InvalidState);
    }

    let tokens = state.exchanger.exchange_code(&code, &issued_verifier).await?;
    let profile = state.exchanger.fetch_identity(&tokens.access_token).await?;

    let now = Utc::now();
    let identity = match state
        .identities
        .find_by_provider_user_id(&profile.provider_user_id)
        .await?
    {
        Some(mut existing) => {
            existing.record_login(profile, tokens, now);
            existing
        }
        None => ProviderIdentity::from_login(profile, tokens, now),
    };
    let identity = state.identities.upsert(&identity).await?;
    tracing::info!(user_id = %identity.id(), "signed in");

    let credential = state.sessions.issue(&identity)?;
    let location = format!(
        "{}/auth/success?token={}",
        state.frontend_url,
        credential.as_str()
    );
    Ok(found(&location))
}

/// Clears sign-in artifacts. Session credentials are stateless, so the
/// client discards its own copy.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        clear_pending_cookies(jar),
        Json(json!({
            "success": true,
            "message": "Logged out successfully",
        })),
    )
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    Configuration(ConfigurationError),
    Entropy(PkceError),
    TooManyPendingSignIns(RegistryFull),
    InvalidState,
    MissingAuthorizationArtifact { artifact: &'static str },
    Exchange(ExchangeError),
    Signing(SessionError),
    Store(StoreError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "{e}"),
            Self::Entropy(e) => write!(f, "{e}"),
            Self::TooManyPendingSignIns(e) => write!(f, "{e}"),
            Self::InvalidState => {
                write!(f, "state is missing, mismatched, expired or already used")
            }
            Self::MissingAuthorizationArtifact { artifact } => write!(f, "missing {artifact}"),
            Self::Exchange(e) => write!(f, "{e}"),
            Self::Signing(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ConfigurationError> for AuthError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<PkceError> for AuthError {
    fn from(e: PkceError) -> Self {
        Self::Entropy(e)
    }
}

impl From<RegistryFull> for AuthError {
    fn from(e: RegistryFull) -> Self {
        Self::TooManyPendingSignIns(e)
    }
}

impl From<ExchangeError> for AuthError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::Configuration(e) => Self::Configuration(e),
            other => Self::Exchange(other),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        Self::Signing(e)
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

fn provider_failure(error: &str, message: &str, detail: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": error,
            "message": message,
            "detail": detail,
        })),
    )
        .into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Configuration(e) => {
                tracing::error!(error = %e, "provider is not configured");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "Sign-in is not configured",
                )
            }
            Self::Entropy(e) => {
                tracing::error!(error = %e, "cannot generate sign-in material");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
            Self::TooManyPendingSignIns(e) => {
                tracing::warn!(error = %e, "refusing sign-in attempt");
                json_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "sign_in_unavailable",
                    "Too many sign-in attempts in progress; try again shortly",
                )
            }
            Self::InvalidState => {
                json_error(StatusCode::BAD_REQUEST, "invalid_state", "Invalid state")
            }
            Self::MissingAuthorizationArtifact { artifact } => json_error(
                StatusCode::BAD_REQUEST,
                "missing_authorization_artifact",
                match artifact {
                    "code" => "Authorization code missing",
                    _ => "Missing PKCE verifier",
                },
            ),
            Self::Exchange(ExchangeError::TokenExchangeFailed(failure)) => provider_failure(
                "token_exchange_failed",
                "Failed to obtain token",
                &failure.detail,
            ),
            Self::Exchange(ExchangeError::IdentityFetchFailed(failure)) => provider_failure(
                "identity_fetch_failed",
                "Failed to fetch Airtable user info",
                &failure.detail,
            ),
            Self::Exchange(e) => {
                tracing::error!(error = %e, "sign-in failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
            Self::Signing(e) => {
                tracing::error!(error = %e, "cannot issue session credential");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "identity store error");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        }
    }
}
