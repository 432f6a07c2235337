/// Admin Auth Gate
///
/// Façade over issuer, verifier and revocation registry. A token moves
/// through ISSUED -> ACTIVE -> EXPIRED | REVOKED; the gate is the only
/// place that moves it to REVOKED.

use std::sync::Arc;

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::clock::Clock;
use crate::auth::issuer::{IssuedToken, TokenIssuer, TokenPair};
use crate::auth::jwt::TokenCodec;
use crate::auth::revocation::{RevocationRegistry, RevocationStore};
use crate::auth::verifier::{Session, TokenVerifier};
use crate::configuration::JwtSettings;
use crate::directory::{Principal, UserDirectory};
use crate::error::{AppError, AuthError};

/// Result of a successful admin login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AdminAuthGate {
    codec: TokenCodec,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    revocations: RevocationRegistry,
    directory: Arc<dyn UserDirectory>,
}

impl AdminAuthGate {
    pub fn new(
        config: &JwtSettings,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let codec = TokenCodec::new(config, clock);
        let revocations = RevocationRegistry::new(store);

        Self {
            issuer: TokenIssuer::new(codec.clone()),
            verifier: TokenVerifier::new(codec.clone(), revocations.clone(), directory.clone()),
            codec,
            revocations,
            directory,
        }
    }

    /// Authenticate an administrator and issue a token pair
    ///
    /// # Errors
    /// `InvalidCredentials` for every rejection (unknown email, wrong
    /// password, inactive, not staff/superuser) so callers cannot tell
    /// them apart. `DirectoryUnavailable` if the lookup itself failed.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let principal = self
            .directory
            .authenticate(email, password)?
            .filter(|principal| principal.is_active && principal.is_admin())
            .ok_or(AuthError::InvalidCredentials)?;

        let tokens = self.issuer.issue_pair(&principal)?;

        tracing::info!(
            user_id = principal.id,
            access_jti = %tokens.access.jti,
            refresh_jti = %tokens.refresh.jti,
            "Admin logged in"
        );

        Ok(LoginOutcome { principal, tokens })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token is not rotated.
    pub fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, AppError> {
        let session = self.verifier.verify(refresh_token, TokenKind::Refresh)?;
        let access = self.issuer.issue_access(&session.principal)?;

        tracing::info!(
            user_id = session.principal.id,
            refresh_jti = %session.claims.jti,
            access_jti = %access.jti,
            "Access token refreshed"
        );

        Ok(access)
    }

    /// Self-service logout
    ///
    /// Revokes `token` and, when given, `refresh_token`. Either kind is
    /// accepted, and an expired token is still revoked as long as its
    /// signature holds. Both tokens are parsed before anything is revoked,
    /// so a failure leaves no partial state. Returns the claims of `token`.
    ///
    /// # Errors
    /// `TokenInvalid` if either token cannot be parsed or verified at all
    pub fn logout(&self, token: &str, refresh_token: Option<&str>) -> Result<Claims, AppError> {
        let claims = self.revocable_claims(token)?;
        let refresh = refresh_token
            .map(|refresh_token| self.revocable_claims(refresh_token))
            .transpose()?;

        self.revocations.revoke(&claims.jti, claims.exp)?;
        if let Some(refresh) = &refresh {
            self.revocations.revoke(&refresh.jti, refresh.exp)?;
        }

        tracing::info!(
            user_id = %claims.sub,
            jti = %claims.jti,
            refresh_jti = refresh.as_ref().map(|refresh| refresh.jti.as_str()),
            "Admin logged out"
        );

        Ok(claims)
    }

    /// Revoke another principal's token on behalf of a superuser
    ///
    /// # Errors
    /// `TokenInvalid` if the token cannot be parsed or verified at all
    pub fn revoke(&self, token: &str, revoked_by: &Principal) -> Result<Claims, AppError> {
        let claims = self.revocable_claims(token)?;
        self.revocations.revoke(&claims.jti, claims.exp)?;

        tracing::info!(
            revoked_by = revoked_by.id,
            user_id = %claims.sub,
            jti = %claims.jti,
            kind = %claims.kind,
            "Token revoked by superuser"
        );

        Ok(claims)
    }

    /// Per-request gate for admin operations
    pub fn guard(&self, token: &str) -> Result<Session, AppError> {
        Ok(self.verifier.verify_admin(token)?)
    }

    /// `guard` restricted to superusers
    pub fn guard_superuser(&self, token: &str) -> Result<Session, AppError> {
        let session = self.guard(token)?;
        if !session.principal.is_superuser {
            return Err(AuthError::InsufficientPrivilege.into());
        }
        Ok(session)
    }

    /// Seconds left before the session's token expires
    pub fn remaining_seconds(&self, session: &Session) -> i64 {
        session.claims.remaining_seconds(self.codec.clock().timestamp())
    }

    /// Signature-checked claims with a revocable `jti`, expiry ignored
    fn revocable_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self
            .codec
            .decode_allow_expired(token)
            .map_err(|_| AuthError::TokenInvalid)?;
        RevocationRegistry::check_jti(&claims.jti)?;
        Ok(claims)
    }
}
