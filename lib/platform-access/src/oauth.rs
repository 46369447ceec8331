//! Airtable OAuth configuration and authorization URL construction.
//!
//! The provider credentials are read once at startup into
//! [`AirtableOAuthConfig`] and handed to the components that need them.
//! Credentials are optional while deserializing so that a partially
//! configured deployment can still report a precise [`ConfigurationError`].

use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::pkce::CHALLENGE_METHOD;

/// Scopes requested on every sign-in: record read/write, schema read, and
/// the user's email address.
pub const AIRTABLE_SCOPES: &[&str] = &[
    "data.records:read",
    "data.records:write",
    "schema.bases:read",
    "user.email:read",
];

/// Configuration for the Airtable OAuth integration.
#[derive(Clone, Deserialize)]
pub struct AirtableOAuthConfig {
    /// OAuth client ID registered with Airtable.
    #[serde(default)]
    client_id: Option<String>,
    /// OAuth client secret (Airtable requires confidential-client auth).
    #[serde(default)]
    client_secret: Option<String>,
    /// Callback URL registered with Airtable.
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default = "default_authorize_url")]
    authorize_url: String,
    #[serde(default = "default_token_url")]
    token_url: String,
    /// Base URL of the Web API (`/v0/...` paths are appended).
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    /// Upper bound for every provider HTTP call.
    #[serde(default = "default_http_timeout_seconds")]
    http_timeout_seconds: u64,
}

fn default_authorize_url() -> String {
    "https://airtable.com/oauth2/v1/authorize".to_string()
}

fn default_token_url() -> String {
    "https://airtable.com/oauth2/v1/token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.airtable.com".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    10
}

impl Default for AirtableOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for AirtableOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableOAuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

/// Validated, non-blank provider credentials.
#[derive(Clone, Copy)]
pub struct ProviderCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

impl AirtableOAuthConfig {
    /// Creates a configuration pointing at the public Airtable endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
            redirect_uri: Some(redirect_uri),
            ..Self::default()
        }
    }

    /// Overrides the authorization endpoint.
    #[must_use]
    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    /// Overrides the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Overrides the Web API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Returns the credentials, or the first one that is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingCredential`] when the client id,
    /// client secret or redirect URI is absent or blank.
    pub fn credentials(&self) -> Result<ProviderCredentials<'_>, ConfigurationError> {
        Ok(ProviderCredentials {
            client_id: required(&self.client_id, "client_id")?,
            client_secret: required(&self.client_secret, "client_secret")?,
            redirect_uri: required(&self.redirect_uri, "redirect_uri")?,
        })
    }

    /// Returns the token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns the Web API base URL without a trailing slash.
    #[must_use]
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Returns the timeout applied to provider HTTP calls.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Builds the authorization URL for a sign-in attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if a provider credential is missing
    /// or the configured URLs are malformed.
    pub fn authorization_url(
        &self,
        state: &str,
        challenge: &str,
    ) -> Result<Url, ConfigurationError> {
        let credentials = self.credentials()?;
        build_authorization_url(
            &self.authorize_url,
            &AuthorizationRequest {
                client_id: credentials.client_id,
                redirect_uri: credentials.redirect_uri,
                scopes: AIRTABLE_SCOPES,
                state,
                challenge,
            },
        )
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ConfigurationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::MissingCredential { name })
}

/// Parameters of a single authorization redirect.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [&'a str],
    pub state: &'a str,
    pub challenge: &'a str,
}

/// Builds the provider authorization URL with an S256 PKCE challenge.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] when the client id, redirect URI or
/// scope list is empty, or a URL does not parse.
pub fn build_authorization_url(
    authorize_url: &str,
    request: &AuthorizationRequest<'_>,
) -> Result<Url, ConfigurationError> {
    if request.client_id.trim().is_empty() {
        return Err(ConfigurationError::MissingCredential { name: "client_id" });
    }
    if request.redirect_uri.trim().is_empty() {
        return Err(ConfigurationError::MissingCredential {
            name: "redirect_uri",
        });
    }
    if request.scopes.is_empty() {
        return Err(ConfigurationError::NoScopes);
    }

    let auth_url = AuthUrl::new(authorize_url.to_string()).map_err(|e| {
        ConfigurationError::InvalidUrl {
            name: "authorize_url",
            reason: e.to_string(),
        }
    })?;
    let redirect_url = RedirectUrl::new(request.redirect_uri.to_string()).map_err(|e| {
        ConfigurationError::InvalidUrl {
            name: "redirect_uri",
            reason: e.to_string(),
        }
    })?;

    let client = BasicClient::new(ClientId::new(request.client_id.to_string()))
        .set_auth_uri(auth_url)
        .set_redirect_uri(redirect_url);

    let state = request.state.to_string();
    let (url, _) = client
        .authorize_url(move || CsrfToken::new(state))
        .add_scopes(request.scopes.iter().map(|s| Scope::new((*s).to_string())))
        .add_extra_param("code_challenge", request.challenge.to_string())
        .add_extra_param("code_challenge_method", CHALLENGE_METHOD.to_string())
        .url();

    Ok(url)
}
