//! Token refresh guard.
//!
//! Every provider-bound operation asks the guard for a bearer token. A
//! stored token is handed out while `now < expires_at`; otherwise it is
//! refreshed first. Refreshes for one identity are serialized: a request
//! that loses the race waits, reloads the identity and uses the token the
//! winner stored.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use airform_core::UserId;
use airform_platform_access::{ProviderIdentity, TokenState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use super::airtable::{ExchangeError, TokenExchanger};
use super::db::IdentityStore;
use crate::db::StoreError;
use crate::error::json_error;

/// Hands out valid provider access tokens.
pub struct TokenGuard {
    identities: Arc<dyn IdentityStore>,
    exchanger: TokenExchanger,
    refresh_locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl TokenGuard {
    /// Creates a guard over `identities`.
    pub fn new(identities: Arc<dyn IdentityStore>, exchanger: TokenExchanger) -> Self {
        Self {
            identities,
            exchanger,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a usable access token for `user_id`, refreshing it if the
    /// stored one has expired.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::RefreshFailed`] if a needed refresh fails; the
    /// stale token is never returned.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn access_token(&self, user_id: UserId) -> Result<String, GuardError> {
        let identity = self.load(user_id).await?;
        if identity.token_state(Utc::now()) == TokenState::Valid {
            return Ok(identity.access_token().to_string());
        }

        let lock = self.lock_for(user_id);
        let _refreshing = lock.lock().await;

        // Another request may have refreshed while this one waited.
        let mut identity = self.load(user_id).await?;
        if identity.token_state(Utc::now()) == TokenState::Valid {
            tracing::debug!("using token refreshed by a concurrent request");
            return Ok(identity.access_token().to_string());
        }

        tracing::info!("refreshing expired provider token");
        let tokens = self
            .exchanger
            .refresh(&identity)
            .await
            .map_err(GuardError::RefreshFailed)?;
        identity.apply_refresh(tokens, Utc::now());
        self.identities.update_tokens(&identity).await?;

        Ok(identity.access_token().to_string())
    }

    async fn load(&self, user_id: UserId) -> Result<ProviderIdentity, GuardError> {
        self.identities
            .find_by_id(user_id)
            .await?
            .ok_or(GuardError::UnknownIdentity { user_id })
    }

    fn lock_for(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        self.refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .clone()
    }
}

/// Failures obtaining a provider token.
#[derive(Debug)]
pub enum GuardError {
    /// No identity is stored under this id.
    UnknownIdentity { user_id: UserId },
    /// The token had expired and could not be refreshed.
    RefreshFailed(ExchangeError),
    /// The identity store failed.
    Store(StoreError),
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIdentity { user_id } => write!(f, "identity '{user_id}' not found"),
            Self::RefreshFailed(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GuardError {}

impl From<StoreError> for GuardError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownIdentity { user_id } => {
                tracing::warn!(%user_id, "session refers to an unknown identity");
                json_error(
                    StatusCode::UNAUTHORIZED,
                    "unknown_identity",
                    "Account not found; please sign in again",
                )
            }
            Self::RefreshFailed(e) => {
                tracing::error!(error = %e, "provider token refresh failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "token_refresh_failed",
                    "Airtable access has expired; please sign in again",
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
