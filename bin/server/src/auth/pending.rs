//! Single-use registry of sign-in attempts awaiting their callback.
//!
//! Each `/auth/login` registers its `state` with the PKCE verifier it was
//! issued with. The callback consumes the entry, so a replayed callback
//! finds nothing and is rejected. The registry holds at most
//! [`MAX_PENDING`] attempts; further logins are refused until older ones
//! are redeemed or expire.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// How long a sign-in attempt stays redeemable.
pub const PENDING_TTL_MINUTES: i64 = 5;

/// Default bound on attempts held at once.
pub const MAX_PENDING: usize = 10_000;

struct PendingEntry {
    code_verifier: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, PendingEntry>,
    // Issue order, which is also expiry order since every attempt gets the same TTL.
    expiries: VecDeque<(DateTime<Utc>, String)>,
}

impl Registry {
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        while let Some((expires_at, _)) = self.expiries.front() {
            if *expires_at > now {
                break;
            }
            if let Some((expires_at, state)) = self.expiries.pop_front() {
                // Already consumed entries leave a stale queue slot behind.
                if self
                    .entries
                    .get(&state)
                    .is_some_and(|entry| entry.expires_at == expires_at)
                {
                    self.entries.remove(&state);
                }
            }
        }
    }
}

/// Returned when the registry already holds its maximum number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryFull {
    pub limit: usize,
}

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sign-in attempts already pending", self.limit)
    }
}

impl std::error::Error for RegistryFull {}

/// In-process map of `state` to the verifier issued with it.
pub struct PendingAuthorizations {
    registry: Mutex<Registry>,
    limit: usize,
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING)
    }
}

impl PendingAuthorizations {
    /// Creates an empty registry bounded by [`MAX_PENDING`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry holding at most `limit` attempts.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            limit,
        }
    }

    /// Registers a sign-in attempt issued at `now`, purging expired ones.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFull`] if the registry is at its limit after
    /// purging.
    pub fn issue(
        &self,
        state: &str,
        code_verifier: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryFull> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.purge_expired(now);
        if registry.entries.len() >= self.limit {
            return Err(RegistryFull { limit: self.limit });
        }

        let expires_at = now + Duration::minutes(PENDING_TTL_MINUTES);
        registry.entries.insert(
            state.to_string(),
            PendingEntry {
                code_verifier: code_verifier.to_string(),
                expires_at,
            },
        );
        registry.expiries.push_back((expires_at, state.to_string()));
        Ok(())
    }

    /// Removes the attempt for `state` and returns its verifier if it had
    /// not yet expired at `now`.
    pub fn consume(&self, state: &str, now: DateTime<Utc>) -> Option<String> {
        let entry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(state)?;
        if entry.expires_at <= now {
            tracing::debug!("sign-in attempt expired before callback");
            return None;
        }
        Some(entry.code_verifier)
    }

    /// Number of attempts currently held.
    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns true if no attempts are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
