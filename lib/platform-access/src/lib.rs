//! Provider sign-in building blocks for airform.
//!
//! This crate provides:
//! - PKCE verifier/challenge/state generation (`pkce`)
//! - Airtable OAuth configuration and authorization URLs (`oauth`)
//! - Provider identities and token pairs (`identity`)
//! - Signed, time-boxed session credentials (`session`)
//!
//! # Example
//!
//! ```
//! use airform_platform_access::{AirtableOAuthConfig, PkceMaterial, challenge_for};
//!
//! let config = AirtableOAuthConfig::new(
//!     "client-id".to_string(),
//!     "client-secret".to_string(),
//!     "http://localhost:4000/auth/callback".to_string(),
//! );
//! let material = PkceMaterial::generate().expect("entropy");
//! assert_eq!(material.challenge, challenge_for(&material.verifier));
//!
//! let url = config
//!     .authorization_url(&material.state, &material.challenge)
//!     .expect("configured");
//! assert!(url.as_str().contains("code_challenge_method=S256"));
//! ```

pub mod error;
pub mod identity;
pub mod oauth;
pub mod pkce;
pub mod session;

pub use error::{ConfigurationError, PkceError, SessionError};
pub use identity::{IdentitySummary, ProviderIdentity, ProviderProfile, TokenPair, TokenState};
pub use oauth::{
    AIRTABLE_SCOPES, AirtableOAuthConfig, AuthorizationRequest, build_authorization_url,
};
pub use pkce::{PkceMaterial, challenge_for, generate_state, generate_verifier};
pub use session::{SessionClaims, SessionIssuer, SignedCredential};
