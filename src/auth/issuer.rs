/// Token Issuer
///
/// Builds and signs the two admin token kinds. Lifetimes are policy,
/// not configuration.

use serde::Serialize;

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::jwt::TokenCodec;
use crate::directory::Principal;
use crate::error::AppError;

/// Access tokens live 20 minutes
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 20 * 60;
/// Refresh tokens live 7 days
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const TOKEN_TYPE: &str = "Bearer";

/// A signed token plus the metadata clients need
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub kind: TokenKind,
    pub expires_in: i64,
    pub expires_at: i64,
    pub token_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn issue_access(&self, principal: &Principal) -> Result<IssuedToken, AppError> {
        self.issue(principal, TokenKind::Access, ACCESS_TOKEN_TTL_SECONDS)
    }

    pub fn issue_refresh(&self, principal: &Principal) -> Result<IssuedToken, AppError> {
        self.issue(principal, TokenKind::Refresh, REFRESH_TOKEN_TTL_SECONDS)
    }

    /// Access and refresh token with independent `jti`s
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.issue_access(principal)?,
            refresh: self.issue_refresh(principal)?,
        })
    }

    fn issue(
        &self,
        principal: &Principal,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<IssuedToken, AppError> {
        let now = self.codec.clock().timestamp();
        let claims = Claims::new(principal, kind, now, ttl_seconds, self.codec.issuer());

        let token = self
            .codec
            .encode(&claims)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        tracing::debug!(
            user_id = principal.id,
            jti = %claims.jti,
            kind = %kind,
            "Token issued"
        );

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            kind,
            expires_in: ttl_seconds,
            expires_at: claims.exp,
            token_type: TOKEN_TYPE,
        })
    }
}
