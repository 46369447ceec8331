//! PKCE (Proof Key for Code Exchange, RFC 7636) material for the sign-in flow.
//!
//! Every login attempt gets a fresh verifier, the S256 challenge derived from
//! it, and an unrelated anti-CSRF `state` token. All three are URL-safe
//! base64 without padding.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::PkceError;

/// Random bytes behind a verifier (256 bits, 43 encoded characters).
pub const VERIFIER_BYTES: usize = 32;

/// Random bytes behind a state token.
pub const STATE_BYTES: usize = 32;

/// The only challenge method this service sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// Generates a new code verifier.
///
/// # Errors
///
/// Returns [`PkceError::EntropyUnavailable`] if the operating system
/// random source cannot be read.
pub fn generate_verifier() -> Result<String, PkceError> {
    random_token(VERIFIER_BYTES)
}

/// Generates a new opaque `state` token.
///
/// # Errors
///
/// Returns [`PkceError::EntropyUnavailable`] if the operating system
/// random source cannot be read.
pub fn generate_state() -> Result<String, PkceError> {
    random_token(STATE_BYTES)
}

/// Computes `BASE64URL(SHA256(verifier))` with padding stripped.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn random_token(len: usize) -> Result<String, PkceError> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes).map_err(|e| PkceError::EntropyUnavailable {
        reason: e.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Verifier, challenge and state for a single authorization attempt.
#[derive(Clone)]
pub struct PkceMaterial {
    /// Secret kept by this service until the code exchange.
    pub verifier: String,
    /// Public derivation sent with the authorization request.
    pub challenge: String,
    /// Anti-CSRF token echoed back by the provider.
    pub state: String,
}

impl PkceMaterial {
    /// Generates fresh material.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source is unavailable.
    pub fn generate() -> Result<Self, PkceError> {
        let verifier = generate_verifier()?;
        let challenge = challenge_for(&verifier);
        let state = generate_state()?;
        Ok(Self {
            verifier,
            challenge,
            state,
        })
    }
}

impl std::fmt::Debug for PkceMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceMaterial")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .field("state", &self.state)
            .finish()
    }
}
