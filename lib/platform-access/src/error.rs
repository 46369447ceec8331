//! Error types for the platform-access crate.
//!
//! - `ConfigurationError`: provider credentials missing or malformed
//! - `PkceError`: random source failures while generating sign-in material
//! - `SessionError`: issuing or verifying session credentials

use std::fmt;

/// Provider configuration problems.
///
/// Raised at startup and re-checked on every request that needs the
/// provider credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required setting is absent or blank.
    MissingCredential { name: &'static str },
    /// A URL setting could not be parsed.
    InvalidUrl { name: &'static str, reason: String },
    /// No scopes were configured for the authorization request.
    NoScopes,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential { name } => {
                write!(f, "missing provider setting: {name}")
            }
            Self::InvalidUrl { name, reason } => {
                write!(f, "invalid URL for {name}: {reason}")
            }
            Self::NoScopes => write!(f, "no OAuth scopes configured"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Failures producing PKCE material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkceError {
    /// The operating system random source could not be read.
    EntropyUnavailable { reason: String },
}

impl fmt::Display for PkceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntropyUnavailable { reason } => {
                write!(f, "random source unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for PkceError {}

/// Errors from issuing or verifying a session credential.
///
/// `Expired` and `InvalidSignature` are kept apart so callers can prompt a
/// re-login for the former and reject the latter outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The credential is well formed and authentic but past its expiry.
    Expired,
    /// The credential is forged, tampered with, or not a credential at all.
    InvalidSignature,
    /// The credential could not be signed.
    Signing { reason: String },
}

impl SessionError {
    /// Stable machine-readable kind for API responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::InvalidSignature => "invalid_signature",
            Self::Signing { .. } => "signing_failed",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "session credential has expired"),
            Self::InvalidSignature => write!(f, "session credential is invalid"),
            Self::Signing { reason } => {
                write!(f, "failed to sign session credential: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_setting() {
        let err = ConfigurationError::MissingCredential { name: "client_id" };
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn session_error_kinds_are_distinct() {
        assert_eq!(SessionError::Expired.kind(), "expired");
        assert_eq!(SessionError::InvalidSignature.kind(), "invalid_signature");
        assert_ne!(
            SessionError::Expired.to_string(),
            SessionError::InvalidSignature.to_string()
        );
    }

    #[test]
    fn pkce_error_display() {
        let err = PkceError::EntropyUnavailable {
            reason: "no device".to_string(),
        };
        assert!(err.to_string().contains("no device"));
    }
}
