//! Airtable token endpoint and identity lookup.
//!
//! The token endpoint takes a form-encoded body. The authorization-code
//! grant carries the PKCE verifier and is authenticated with HTTP Basic
//! client credentials; the refresh grant sends the client secret in the
//! body. A response without an `access_token` is a failure whatever its
//! status code, and the provider body is kept for operators.

use airform_platform_access::{
    AirtableOAuthConfig, ConfigurationError, ProviderIdentity, ProviderProfile, TokenPair,
};
use serde::Deserialize;
use std::fmt;

/// Upper bound on the provider body kept for diagnostics.
const MAX_DETAIL_LEN: usize = 2048;

/// Calls the Airtable token and "who am I" endpoints.
#[derive(Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    config: AirtableOAuthConfig,
}

impl TokenExchanger {
    /// Creates an exchanger for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: AirtableOAuthConfig) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| ExchangeError::HttpClient(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Returns the provider configuration.
    pub fn config(&self) -> &AirtableOAuthConfig {
        &self.config
    }

    /// Exchanges an authorization code and its PKCE verifier for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] if the credentials are
    /// missing and [`ExchangeError::TokenExchangeFailed`] if the provider
    /// does not return an access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPair, ExchangeError> {
        let credentials = self.config.credentials()?;

        let request = self
            .http
            .post(self.config.token_url())
            .basic_auth(credentials.client_id, Some(credentials.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", credentials.client_id),
                ("redirect_uri", credentials.redirect_uri),
                ("code_verifier", code_verifier),
            ]);

        self.token_request(request)
            .await
            .map_err(ExchangeError::TokenExchangeFailed)
    }

    /// Obtains a new access token with the identity's refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] if the credentials are
    /// missing and [`ExchangeError::TokenRefreshFailed`] if no refresh token
    /// is stored or the provider does not return an access token.
    pub async fn refresh(&self, identity: &ProviderIdentity) -> Result<TokenPair, ExchangeError> {
        let credentials = self.config.credentials()?;
        let refresh_token = identity.refresh_token().ok_or_else(|| {
            ExchangeError::TokenRefreshFailed(ProviderFailure {
                status: None,
                detail: "no refresh token stored for identity".to_string(),
            })
        })?;

        let request = self.http.post(self.config.token_url()).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id),
            ("client_secret", credentials.client_secret),
        ]);

        self.token_request(request)
            .await
            .map_err(ExchangeError::TokenRefreshFailed)
    }

    async fn token_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<TokenPair, ProviderFailure> {
        let (status, body) = send(request).await?;
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_default();
        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(TokenPair {
                access_token,
                refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
                expires_in: parsed.expires_in,
            }),
            None => {
                tracing::error!(
                    status,
                    body = %truncate(&body),
                    "token endpoint returned no access token"
                );
                Err(ProviderFailure {
                    status: Some(status),
                    detail: truncate(&body),
                })
            }
        }
    }

    /// Looks up the signed-in user with a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::IdentityFetchFailed`] if the request fails
    /// or the response has no user id.
    pub async fn fetch_identity(
        &self,
        access_token: &str,
    ) -> Result<ProviderProfile, ExchangeError> {
        let url = format!("{}/v0/meta/whoami", self.config.api_base_url());
        let request = self.http.get(url).bearer_auth(access_token);
        let (status, body) = send(request)
            .await
            .map_err(ExchangeError::IdentityFetchFailed)?;

        let parsed: WhoAmIResponse = serde_json::from_str(&body).unwrap_or_default();
        match parsed.id.filter(|id| !id.trim().is_empty()) {
            Some(provider_user_id) if (200..300).contains(&status) => Ok(ProviderProfile {
                provider_user_id,
                email: parsed.email,
                display_name: parsed.name,
            }),
            _ => {
                tracing::error!(
                    status,
                    body = %truncate(&body),
                    "identity lookup returned no user id"
                );
                Err(ExchangeError::IdentityFetchFailed(ProviderFailure {
                    status: Some(status),
                    detail: truncate(&body),
                }))
            }
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<(u16, String), ProviderFailure> {
    let response = request.send().await.map_err(|e| {
        let detail = if e.is_timeout() {
            "provider request timed out".to_string()
        } else {
            format!("provider request failed: {e}")
        };
        tracing::error!(%detail, "provider call failed");
        ProviderFailure {
            status: None,
            detail,
        }
    })?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| ProviderFailure {
        status: Some(status),
        detail: format!("failed to read provider response: {e}"),
    })?;
    Ok((status, body))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_DETAIL_LEN) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Default, Deserialize)]
struct WhoAmIResponse {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

/// What the provider said when a call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status, if a response arrived at all.
    pub status: Option<u16>,
    /// Provider body or transport error, for operators.
    pub detail: String,
}

/// Token exchange, refresh and identity lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Provider credentials are missing.
    Configuration(ConfigurationError),
    /// The HTTP client could not be built.
    HttpClient(String),
    /// The authorization-code grant produced no access token.
    TokenExchangeFailed(ProviderFailure),
    /// The refresh grant produced no access token.
    TokenRefreshFailed(ProviderFailure),
    /// The "who am I" lookup produced no user id.
    IdentityFetchFailed(ProviderFailure),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "{e}"),
            Self::HttpClient(e) => write!(f, "failed to build HTTP client: {e}"),
            Self::TokenExchangeFailed(failure) => {
                write!(f, "token exchange failed: {}", failure.detail)
            }
            Self::TokenRefreshFailed(failure) => {
                write!(f, "token refresh failed: {}", failure.detail)
            }
            Self::IdentityFetchFailed(failure) => {
                write!(f, "identity fetch failed: {}", failure.detail)
            }
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<ConfigurationError> for ExchangeError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}
