/// Token Verifier / Session Resolver
///
/// Turns a presented token into a `Session`: signature and expiry via the
/// codec, then kind, revocation and the principal's live state. Claims
/// alone are never trusted for roles or activity; the directory is asked
/// on every verification.

use std::sync::Arc;

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::jwt::{CodecError, TokenCodec};
use crate::auth::revocation::RevocationRegistry;
use crate::directory::{Principal, UserDirectory};
use crate::error::AuthError;

/// A verified token and the live principal behind it
///
/// Lives for one request; inserted into request extensions by the guard.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub claims: Claims,
}

#[derive(Clone)]
pub struct TokenVerifier {
    codec: TokenCodec,
    revocations: RevocationRegistry,
    directory: Arc<dyn UserDirectory>,
}

impl TokenVerifier {
    pub fn new(
        codec: TokenCodec,
        revocations: RevocationRegistry,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            codec,
            revocations,
            directory,
        }
    }

    /// Verify `token` as `expected_kind` and resolve its principal
    ///
    /// # Errors
    /// - `TokenExpired` at or past `exp`
    /// - `TokenInvalid` for bad signature/structure or the wrong kind
    /// - `TokenRevoked` if the `jti` was revoked
    /// - `PrincipalNotFound` if the principal is gone or inactive
    /// - `DirectoryUnavailable` if the lookup failed
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Session, AuthError> {
        let claims = self.codec.decode(token).map_err(|e| match e {
            CodecError::Expired => AuthError::TokenExpired,
            CodecError::Malformed(_) | CodecError::Encoding(_) => AuthError::TokenInvalid,
        })?;

        if claims.kind != expected_kind {
            tracing::warn!(
                jti = %claims.jti,
                expected = %expected_kind,
                presented = %claims.kind,
                "Token kind mismatch"
            );
            return Err(AuthError::TokenInvalid);
        }

        if self.revocations.is_revoked(&claims.jti) {
            return Err(AuthError::TokenRevoked);
        }

        let principal = self.resolve_principal(&claims)?;

        Ok(Session { principal, claims })
    }

    /// `verify` for an access token plus the staff/superuser requirement
    pub fn verify_admin(&self, token: &str) -> Result<Session, AuthError> {
        let session = self.verify(token, TokenKind::Access)?;
        if !session.principal.is_admin() {
            return Err(AuthError::InsufficientPrivilege);
        }
        Ok(session)
    }

    fn resolve_principal(&self, claims: &Claims) -> Result<Principal, AuthError> {
        let user_id = claims.subject_id()?;

        let principal = self.directory.get_by_id(user_id).map_err(|e| {
            tracing::error!(user_id, error = %e, "Principal lookup failed");
            AuthError::DirectoryUnavailable
        })?;

        match principal {
            Some(principal) if principal.is_active => Ok(principal),
            _ => Err(AuthError::PrincipalNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::issuer::TokenIssuer;
    use crate::auth::revocation::InMemoryRevocationStore;
    use crate::configuration::JwtSettings;
    use crate::directory::{DirectoryError, InMemoryUserDirectory};
    use chrono::Duration;

    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        verifier: TokenVerifier,
        issuer: TokenIssuer,
        revocations: RevocationRegistry,
        directory: Arc<InMemoryUserDirectory>,
        clock: Arc<ManualClock>,
    }

    fn principal(id: i64, is_staff: bool) -> Principal {
        Principal {
            id,
            email: format!("user{}@x.com", id),
            is_staff,
            is_superuser: false,
            is_active: true,
        }
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at_timestamp(NOW));
        let config = JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
        };
        let codec = TokenCodec::new(&config, clock.clone());
        let directory = Arc::new(InMemoryUserDirectory::new());
        directory
            .insert_hashed(principal(1, true), "unused".to_string())
            .unwrap();
        directory
            .insert_hashed(principal(2, false), "unused".to_string())
            .unwrap();
        let revocations = RevocationRegistry::new(Arc::new(InMemoryRevocationStore::new()));

        Fixture {
            verifier: TokenVerifier::new(codec.clone(), revocations.clone(), directory.clone()),
            issuer: TokenIssuer::new(codec),
            revocations,
            directory,
            clock,
        }
    }

    #[test]
    fn test_access_token_resolves_to_principal() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();

        let session = f.verifier.verify(&access.token, TokenKind::Access).unwrap();
        assert_eq!(session.principal.id, 1);
        assert_eq!(session.claims.jti, access.jti);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let f = fixture();
        let pair = f.issuer.issue_pair(&principal(1, true)).unwrap();

        assert!(matches!(
            f.verifier.verify(&pair.refresh.token, TokenKind::Access),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            f.verifier.verify(&pair.access.token, TokenKind::Refresh),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn test_revoked_token_is_rejected_before_expiry() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();
        f.revocations.revoke(&access.jti, access.expires_at).unwrap();

        assert!(matches!(
            f.verifier.verify(&access.token, TokenKind::Access),
            Err(AuthError::TokenRevoked)
        ));
    }

    #[test]
    fn test_expired_token() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();

        f.clock.advance(Duration::seconds(1199));
        assert!(f.verifier.verify(&access.token, TokenKind::Access).is_ok());

        f.clock.advance(Duration::seconds(1));
        assert!(matches!(
            f.verifier.verify(&access.token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_deactivated_principal_is_not_found() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();
        f.directory.set_active(1, false);

        assert!(matches!(
            f.verifier.verify(&access.token, TokenKind::Access),
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[test]
    fn test_deleted_principal_is_not_found() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();
        f.directory.remove(1);

        assert!(matches!(
            f.verifier.verify(&access.token, TokenKind::Access),
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[test]
    fn test_admin_check_uses_live_roles() {
        let f = fixture();
        let staff = f.issuer.issue_access(&principal(1, true)).unwrap();
        let regular = f.issuer.issue_access(&principal(2, false)).unwrap();

        assert!(f.verifier.verify_admin(&staff.token).is_ok());
        assert!(matches!(
            f.verifier.verify_admin(&regular.token),
            Err(AuthError::InsufficientPrivilege)
        ));

        f.directory.set_roles(1, false, false);
        assert!(matches!(
            f.verifier.verify_admin(&staff.token),
            Err(AuthError::InsufficientPrivilege)
        ));
    }

    struct FailingDirectory;

    impl UserDirectory for FailingDirectory {
        fn authenticate(&self, _: &str, _: &str) -> Result<Option<Principal>, DirectoryError> {
            Err(DirectoryError::Unavailable("down".to_string()))
        }

        fn get_by_id(&self, _: i64) -> Result<Option<Principal>, DirectoryError> {
            Err(DirectoryError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn test_directory_failure_is_surfaced() {
        let f = fixture();
        let access = f.issuer.issue_access(&principal(1, true)).unwrap();
        let codec = TokenCodec::new(
            &JwtSettings {
                secret: "test-secret-key-at-least-32-characters-long".to_string(),
                issuer: "test".to_string(),
            },
            f.clock.clone(),
        );
        let verifier = TokenVerifier::new(codec, f.revocations.clone(), Arc::new(FailingDirectory));

        assert!(matches!(
            verifier.verify(&access.token, TokenKind::Access),
            Err(AuthError::DirectoryUnavailable)
        ));
    }
}
