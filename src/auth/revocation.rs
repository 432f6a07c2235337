/// Token revocation
///
/// Revoked tokens are tracked by `jti`. The store behind the registry is
/// injected so the process-local set can be swapped for a keyed store
/// whose entries expire with the token they revoke.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::error::AuthError;

/// Storage capability for revoked `jti`s
///
/// `expires_at` is the revoked token's own `exp`; stores may forget an
/// entry once that instant has passed since the codec rejects the token
/// on its own from then on.
pub trait RevocationStore: Send + Sync {
    fn add(&self, jti: &str, expires_at: i64);

    fn contains(&self, jti: &str) -> bool;
}

/// Set that only grows for the lifetime of the process
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    revoked: RwLock<HashSet<String>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revoked.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn add(&self, jti: &str, _expires_at: i64) {
        let mut revoked = self.revoked.write().unwrap_or_else(|e| e.into_inner());
        revoked.insert(jti.to_string());
    }

    fn contains(&self, jti: &str) -> bool {
        let revoked = self.revoked.read().unwrap_or_else(|e| e.into_inner());
        revoked.contains(jti)
    }
}

/// Keyed store where every entry lives until the revoked token's expiry
pub struct ExpiringRevocationStore {
    revoked: RwLock<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
}

impl ExpiringRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            revoked: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Drop entries whose token has expired; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.timestamp();
        let mut revoked = self.revoked.write().unwrap_or_else(|e| e.into_inner());
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at > now);
        before - revoked.len()
    }

    pub fn len(&self) -> usize {
        self.revoked.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationStore for ExpiringRevocationStore {
    fn add(&self, jti: &str, expires_at: i64) {
        let now = self.clock.timestamp();
        let mut revoked = self.revoked.write().unwrap_or_else(|e| e.into_inner());
        // Every insert sweeps, so the map never outgrows the live revocations
        revoked.retain(|_, at| *at > now);

        // Already expired: the codec rejects it without our help
        if expires_at <= now {
            return;
        }
        // Keep the later expiry if the same jti is revoked twice
        let entry = revoked.entry(jti.to_string()).or_insert(expires_at);
        *entry = (*entry).max(expires_at);
    }

    fn contains(&self, jti: &str) -> bool {
        let now = self.clock.timestamp();
        let revoked = self.revoked.read().unwrap_or_else(|e| e.into_inner());
        revoked
            .get(jti)
            .is_some_and(|expires_at| *expires_at > now)
    }
}

/// Front door to whichever store is configured
#[derive(Clone)]
pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store }
    }

    /// Idempotently mark `jti` as revoked
    ///
    /// # Errors
    /// `TokenInvalid` if `jti` is not a UUID, which no token we issue has
    pub fn revoke(&self, jti: &str, expires_at: i64) -> Result<(), AuthError> {
        Self::check_jti(jti)?;
        self.store.add(jti, expires_at);
        Ok(())
    }

    /// `TokenInvalid` unless `jti` has the shape of an id we issue
    pub fn check_jti(jti: &str) -> Result<(), AuthError> {
        Uuid::parse_str(jti)
            .map(|_| ())
            .map_err(|_| AuthError::TokenInvalid)
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.store.contains(jti)
    }
}
