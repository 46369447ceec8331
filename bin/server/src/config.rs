//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested
//! settings use `__` as the separator, e.g. `AIRTABLE__CLIENT_ID`.
//!
//! See [`AirtableOAuthConfig`] for the provider settings.

use airform_platform_access::AirtableOAuthConfig;
use airform_platform_access::session::DEFAULT_SESSION_DAYS;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Front-end origin that receives the post-login redirect.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Session configuration.
    pub session: SessionConfig,

    /// Airtable OAuth configuration.
    #[serde(default)]
    pub airtable: AirtableOAuthConfig,

    /// Webhook configuration.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

/// Session-related configuration.
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign session credentials.
    pub signing_secret: String,

    /// Credential lifetime in days.
    #[serde(default = "default_session_duration_days")]
    pub duration_days: i64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_session_duration_days() -> i64 {
    DEFAULT_SESSION_DAYS
}

fn default_secure_cookies() -> bool {
    true
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("signing_secret", &"<redacted>")
            .field("duration_days", &self.duration_days)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

/// Webhook receiver configuration.
#[derive(Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for signature checks. Deliveries are refused while unset.
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
