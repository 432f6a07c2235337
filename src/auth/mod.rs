/// Authentication module
///
/// Admin JWT lifecycle: issuance, verification, refresh and revocation,
/// plus password hashing for the accounts behind it.

mod claims;
mod clock;
mod gate;
mod issuer;
mod jwt;
mod password;
mod revocation;
mod verifier;

pub use claims::{Claims, TokenKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{AdminAuthGate, LoginOutcome};
pub use issuer::{
    IssuedToken, TokenIssuer, TokenPair, ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS,
    TOKEN_TYPE,
};
pub use jwt::{CodecError, TokenCodec};
pub use password::{hash_password_with_cost, verify_password};
pub use revocation::{
    ExpiringRevocationStore, InMemoryRevocationStore, RevocationRegistry, RevocationStore,
};
pub use verifier::{Session, TokenVerifier};
