//! Session credentials handed to clients after a successful sign-in.
//!
//! A credential is an HS256-signed JWT binding the internal [`UserId`] with
//! a fixed lifetime. Provider tokens stay server-side in the identity
//! store; the credential only names the identity.

use airform_core::UserId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::identity::ProviderIdentity;

/// Default credential lifetime.
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Claims carried by a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal identity reference.
    pub sub: UserId,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl SessionClaims {
    /// Returns the identity this credential was issued for.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.sub
    }

    /// Returns when the credential stops being accepted.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// An encoded, signed session credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedCredential(String);

impl SignedCredential {
    /// Returns the encoded credential.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the encoded credential.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for SignedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignedCredential(<redacted>)")
    }
}

/// Issues and verifies session credentials with a shared secret.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl SessionIssuer {
    /// Creates an issuer signing with `secret`.
    #[must_use]
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    /// Returns how long newly issued credentials remain valid.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a credential for `identity`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if encoding fails.
    pub fn issue(&self, identity: &ProviderIdentity) -> Result<SignedCredential, SessionError> {
        self.issue_at(identity.id(), Utc::now())
    }

    /// Issues a credential for `user_id` as if issued at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if encoding fails.
    pub fn issue_at(
        &self,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> Result<SignedCredential, SessionError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map(SignedCredential)
            .map_err(|e| SessionError::Signing {
                reason: e.to_string(),
            })
    }

    /// Verifies a credential and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Expired`] for an authentic credential past
    /// its expiry and [`SessionError::InvalidSignature`] for anything else
    /// that fails verification.
    pub fn verify(&self, credential: &str) -> Result<SessionClaims, SessionError> {
        jsonwebtoken::decode::<SessionClaims>(credential, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                other => {
                    tracing::debug!(reason = ?other, "rejected session credential");
                    SessionError::InvalidSignature
                }
            })
    }
}
