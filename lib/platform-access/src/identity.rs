//! Provider identities and the tokens they hold.
//!
//! A [`ProviderIdentity`] is created the first time an Airtable user
//! completes the callback and is updated on every later login or token
//! refresh. It is never deleted by the sign-in flow.

use airform_core::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the provider keeps the previous refresh token valid.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: Option<u64>,
}

impl TokenPair {
    /// Computes the absolute expiry of the access token.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| now + Duration::seconds(secs))
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Profile returned by the provider's "who am I" endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Stable provider user id (`usr...` for Airtable).
    pub provider_user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Whether a stored access token can still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// `now < expires_at`.
    Valid,
    /// `now >= expires_at`, or no expiry is known.
    Expired,
}

/// A person signed in through the provider, with their current tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    id: UserId,
    provider_user_id: String,
    display_name: Option<String>,
    email: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    login_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProviderIdentity {
    /// Creates the identity for a first successful login.
    #[must_use]
    pub fn from_login(profile: ProviderProfile, tokens: TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            token_expires_at: tokens.expires_at(now),
            provider_user_id: profile.provider_user_id,
            display_name: profile.display_name,
            email: profile.email,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            login_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes an identity from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        provider_user_id: String,
        display_name: Option<String>,
        email: Option<String>,
        access_token: String,
        refresh_token: Option<String>,
        token_expires_at: Option<DateTime<Utc>>,
        login_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider_user_id,
            display_name,
            email,
            access_token,
            refresh_token,
            token_expires_at,
            login_at,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn provider_user_id(&self) -> &str {
        &self.provider_user_id
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at
    }

    #[must_use]
    pub fn login_at(&self) -> DateTime<Utc> {
        self.login_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the state of the stored access token at `now`.
    #[must_use]
    pub fn token_state(&self, now: DateTime<Utc>) -> TokenState {
        match self.token_expires_at {
            Some(expires_at) if now < expires_at => TokenState::Valid,
            _ => TokenState::Expired,
        }
    }

    /// Replaces profile and tokens after a repeat login.
    pub fn record_login(
        &mut self,
        profile: ProviderProfile,
        tokens: TokenPair,
        now: DateTime<Utc>,
    ) {
        self.display_name = profile.display_name;
        self.email = profile.email;
        self.login_at = now;
        self.replace_tokens(tokens, now);
    }

    /// Replaces tokens after a refresh grant. A missing refresh token in
    /// the grant keeps the one already stored.
    pub fn apply_refresh(&mut self, tokens: TokenPair, now: DateTime<Utc>) {
        self.replace_tokens(tokens, now);
    }

    fn replace_tokens(&mut self, tokens: TokenPair, now: DateTime<Utc>) {
        self.token_expires_at = tokens.expires_at(now);
        self.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.updated_at = now;
    }

    /// Public view with the secrets stripped.
    #[must_use]
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            provider_user_id: self.provider_user_id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

impl std::fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderIdentity")
            .field("id", &self.id)
            .field("provider_user_id", &self.provider_user_id)
            .field("email", &self.email)
            .field("token_expires_at", &self.token_expires_at)
            .finish_non_exhaustive()
    }
}

/// Identity fields safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: UserId,
    pub provider_user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProviderProfile {
        ProviderProfile {
            provider_user_id: "usr_1".to_string(),
            email: Some("a@b.com".to_string()),
            display_name: None,
        }
    }

    fn tokens(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in,
        }
    }

    #[test]
    fn login_sets_expiry_from_expires_in() {
        let now = Utc::now();
        let identity =
            ProviderIdentity::from_login(profile(), tokens("T1", Some("R1"), Some(3600)), now);

        assert_eq!(identity.provider_user_id(), "usr_1");
        assert_eq!(identity.access_token(), "T1");
        assert_eq!(identity.refresh_token(), Some("R1"));
        assert_eq!(identity.token_expires_at(), Some(now + Duration::seconds(3600)));
        assert_eq!(identity.token_state(now), TokenState::Valid);
    }

    #[test]
    fn token_is_expired_at_the_boundary() {
        let now = Utc::now();
        let identity = ProviderIdentity::from_login(profile(), tokens("T1", None, Some(60)), now);
        assert_eq!(identity.token_state(now + Duration::seconds(59)), TokenState::Valid);
        assert_eq!(identity.token_state(now + Duration::seconds(60)), TokenState::Expired);
    }

    #[test]
    fn unknown_expiry_counts_as_expired() {
        let now = Utc::now();
        let identity = ProviderIdentity::from_login(profile(), tokens("T1", None, None), now);
        assert_eq!(identity.token_state(now), TokenState::Expired);
    }

    #[test]
    fn refresh_keeps_previous_refresh_token_when_omitted() {
        let now = Utc::now();
        let mut identity =
            ProviderIdentity::from_login(profile(), tokens("T1", Some("R1"), Some(0)), now);
        let id = identity.id();

        identity.apply_refresh(tokens("T2", None, Some(3600)), now);

        assert_eq!(identity.id(), id);
        assert_eq!(identity.access_token(), "T2");
        assert_eq!(identity.refresh_token(), Some("R1"));
        assert_eq!(identity.token_state(now), TokenState::Valid);
    }

    #[test]
    fn repeat_login_replaces_tokens_and_profile() {
        let now = Utc::now();
        let mut identity =
            ProviderIdentity::from_login(profile(), tokens("T1", Some("R1"), Some(10)), now);
        let later = now + Duration::days(1);
        let mut new_profile = profile();
        new_profile.display_name = Some("Ada".to_string());

        identity.record_login(new_profile, tokens("T9", Some("R9"), Some(10)), later);

        assert_eq!(identity.access_token(), "T9");
        assert_eq!(identity.refresh_token(), Some("R9"));
        assert_eq!(identity.display_name(), Some("Ada"));
        assert_eq!(identity.login_at(), later);
        assert_eq!(identity.created_at(), now);
    }

    #[test]
    fn debug_and_summary_hide_tokens() {
        let identity =
            ProviderIdentity::from_login(
                profile(),
                tokens("secret-access", Some("secret-refresh"), Some(1)),
                Utc::now(),
            );
        let debug = format!("{identity:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));

        let json = serde_json::to_string(&identity.summary()).expect("serialize");
        assert!(!json.contains("secret"));
        assert!(json.contains("\"providerUserId\":\"usr_1\""));
    }
}
