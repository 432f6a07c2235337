/// JWT Claims structure
///
/// Payload carried by both admin token kinds. Timestamps are Unix seconds
/// so the encoding never depends on a datetime serialization format.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::directory::Principal;
use crate::error::AuthError;

/// Which half of the token pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT Claims for admin tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (principal id as decimal string)
    pub sub: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token kind, never changes after issuance
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique token id, the handle used for revocation
    pub jti: String,
    pub iss: String,
}

impl Claims {
    /// Build claims for `principal` issued at `issued_at` and living `ttl_seconds`
    ///
    /// A fresh v4 UUID is generated for `jti` on every call.
    pub fn new(
        principal: &Principal,
        kind: TokenKind,
        issued_at: i64,
        ttl_seconds: i64,
        issuer: &str,
    ) -> Self {
        Self {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            is_staff: principal.is_staff,
            is_superuser: principal.is_superuser,
            iat: issued_at,
            exp: issued_at + ttl_seconds,
            kind,
            jti: Uuid::new_v4().to_string(),
            iss: issuer.to_string(),
        }
    }

    /// Extract the principal id from `sub`
    ///
    /// # Errors
    /// Returns `TokenInvalid` if the subject is not an integer id
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|_| AuthError::TokenInvalid)
    }

    /// A token is valid strictly before its `exp` second
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Seconds left before expiry, zero once expired
    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }
}
