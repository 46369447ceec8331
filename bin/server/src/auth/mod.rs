//! Authentication module for the airform server.
//!
//! This module provides:
//! - The Airtable OAuth2/PKCE sign-in flow (`/auth/login`, `/auth/callback`, `/auth/logout`)
//! - Token exchange, refresh and identity lookup against Airtable
//! - The token refresh guard used by every provider-bound operation
//! - The session credential extractor for API routes
//!
//! Provider tokens never leave the server. Clients hold a signed session
//! credential naming their identity, and the guard resolves the current
//! access token from the identity store whenever Airtable is called.

pub mod airtable;
pub mod db;
pub mod guard;
pub mod middleware;
pub mod pending;
pub mod routes;

use std::fmt;
use std::sync::Arc;

use airform_integration::{AirtableClient, AirtableError};
use airform_platform_access::{ConfigurationError, SessionIssuer};
use rootcause::prelude::Report;

use crate::config::{ServerConfig, SessionConfig, WebhookConfig};
use crate::db::{FormStore, ResponseStore};

pub use airtable::{ExchangeError, TokenExchanger};
pub use db::{IdentityStore, PgIdentityStore};
pub use guard::{GuardError, TokenGuard};
pub use middleware::{RequireSession, SessionRejection};
pub use pending::PendingAuthorizations;
pub use routes::{callback, login, logout};

/// Store handles the application runs against.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub forms: Arc<dyn FormStore>,
    pub responses: Arc<dyn ResponseStore>,
}

/// Shared application state.
pub struct AppState {
    pub identities: Arc<dyn IdentityStore>,
    pub forms: Arc<dyn FormStore>,
    pub responses: Arc<dyn ResponseStore>,
    /// Token endpoint and identity lookup client.
    pub exchanger: TokenExchanger,
    /// Refreshing source of provider access tokens.
    pub guard: TokenGuard,
    /// Airtable Web API client.
    pub airtable: AirtableClient,
    /// Session credential issuer and verifier.
    pub sessions: SessionIssuer,
    /// Sign-in attempts awaiting their callback.
    pub pending: PendingAuthorizations,
    /// Session configuration.
    pub session_config: SessionConfig,
    /// Front-end origin for the post-login redirect.
    pub frontend_url: String,
    /// Webhook configuration.
    pub webhook: WebhookConfig,
}

impl AppState {
    /// Builds the application state, refusing to start without provider
    /// credentials or a signing secret.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] if configuration is incomplete or a client
    /// cannot be built.
    pub fn new(config: &ServerConfig, stores: Stores) -> Result<Self, StartupError> {
        config.airtable.credentials()?;
        if config.session.signing_secret.trim().is_empty() {
            return Err(StartupError::EmptySigningSecret);
        }

        let exchanger = TokenExchanger::new(config.airtable.clone())?;
        let airtable = AirtableClient::new(
            config.airtable.api_base_url(),
            config.airtable.http_timeout(),
        )?;
        let sessions = SessionIssuer::new(
            config.session.signing_secret.as_bytes(),
            chrono::Duration::days(config.session.duration_days),
        );

        Ok(Self {
            guard: TokenGuard::new(stores.identities.clone(), exchanger.clone()),
            identities: stores.identities,
            forms: stores.forms,
            responses: stores.responses,
            exchanger,
            airtable,
            sessions,
            pending: PendingAuthorizations::new(),
            session_config: config.session.clone(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            webhook: config.webhook.clone(),
        })
    }
}

/// Reasons the server refuses to start.
#[derive(Debug)]
pub enum StartupError {
    Configuration(ConfigurationError),
    EmptySigningSecret,
    Exchanger(ExchangeError),
    Airtable(Report<AirtableError>),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "{e}"),
            Self::EmptySigningSecret => write!(f, "session signing secret is empty"),
            Self::Exchanger(e) => write!(f, "{e}"),
            Self::Airtable(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigurationError> for StartupError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ExchangeError> for StartupError {
    fn from(e: ExchangeError) -> Self {
        Self::Exchanger(e)
    }
}

impl From<Report<AirtableError>> for StartupError {
    fn from(e: Report<AirtableError>) -> Self {
        Self::Airtable(e)
    }
}
