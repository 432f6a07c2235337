/// JWT Token Codec
///
/// Signs claims with HS256 over the server secret and turns token strings
/// back into claims. Expiry is checked here against the injected clock,
/// not by `jsonwebtoken`, so the boundary is exact: a token is valid
/// strictly before its `exp` second and there is no leeway.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::sync::Arc;

use crate::auth::claims::Claims;
use crate::auth::clock::Clock;
use crate::configuration::JwtSettings;

/// Failures of the codec itself
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Claims violate an invariant and were not signed
    Encoding(String),
    Expired,
    /// Bad signature, bad structure, missing claim or foreign issuer
    Malformed(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encoding(msg) => write!(f, "Token encoding failed: {}", msg),
            CodecError::Expired => write!(f, "Token has expired"),
            CodecError::Malformed(msg) => write!(f, "Malformed token: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is evaluated in `decode` against our own clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            clock,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign `claims` into a compact JWT
    ///
    /// # Errors
    /// `Encoding` if `iat >= exp` or `jti` is empty
    pub fn encode(&self, claims: &Claims) -> Result<String, CodecError> {
        if claims.iat >= claims.exp {
            return Err(CodecError::Encoding("issued_at must precede expiry".to_string()));
        }
        if claims.jti.is_empty() {
            return Err(CodecError::Encoding("jti is empty".to_string()));
        }

        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    /// Verify signature and structure, then reject tokens at or past `exp`
    pub fn decode(&self, token: &str) -> Result<Claims, CodecError> {
        let claims = self.decode_signed(token)?;
        if claims.is_expired_at(self.clock.timestamp()) {
            return Err(CodecError::Expired);
        }
        Ok(claims)
    }

    /// Like `decode` but accepts expired tokens. Only for logout.
    pub fn decode_allow_expired(&self, token: &str) -> Result<Claims, CodecError> {
        self.decode_signed(token)
    }

    fn decode_signed(&self, token: &str) -> Result<Claims, CodecError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;
    use crate::auth::clock::ManualClock;
    use crate::directory::Principal;
    use chrono::Duration;

    const NOW: i64 = 1_700_000_000;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
        }
    }

    fn principal() -> Principal {
        Principal {
            id: 1,
            email: "a@x.com".to_string(),
            is_staff: true,
            is_superuser: false,
            is_active: true,
        }
    }

    fn codec_at(now: i64) -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_timestamp(now));
        (TokenCodec::new(&get_test_config(), clock.clone()), clock)
    }

    fn claims_expiring_in(seconds: i64) -> Claims {
        // Issued an hour ago so that `exp = now` still satisfies iat < exp
        let issued_at = NOW - 3_600;
        Claims::new(&principal(), TokenKind::Access, issued_at, 3_600 + seconds, "test")
    }

    #[test]
    fn test_encode_and_decode_token() {
        let (codec, _) = codec_at(NOW);
        let claims = claims_expiring_in(60);

        let token = codec.encode(&claims).expect("Failed to encode token");
        let decoded = codec.decode(&token).expect("Failed to decode token");

        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let (codec, _) = codec_at(NOW);

        let at_now = codec.encode(&claims_expiring_in(0)).unwrap();
        assert_eq!(codec.decode(&at_now), Err(CodecError::Expired));

        let one_second_left = codec.encode(&claims_expiring_in(1)).unwrap();
        assert!(codec.decode(&one_second_left).is_ok());
    }

    #[test]
    fn test_token_expires_as_clock_moves() {
        let (codec, clock) = codec_at(NOW);
        let token = codec.encode(&claims_expiring_in(30)).unwrap();
        assert!(codec.decode(&token).is_ok());

        clock.advance(Duration::seconds(30));
        assert_eq!(codec.decode(&token), Err(CodecError::Expired));
        assert!(codec.decode_allow_expired(&token).is_ok());
    }

    #[test]
    fn test_invalid_token() {
        let (codec, _) = codec_at(NOW);
        assert!(matches!(
            codec.decode("invalid.token.here"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(codec.decode(""), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_tampered_signature_never_decodes() {
        let (codec, _) = codec_at(NOW);
        let token = codec.encode(&claims_expiring_in(60)).unwrap();
        let signature_start = token.rfind('.').unwrap() + 1;

        for index in signature_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            assert!(
                matches!(codec.decode(&tampered), Err(CodecError::Malformed(_))),
                "Tampered byte {} was accepted",
                index
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let (codec, clock) = codec_at(NOW);
        let token = codec.encode(&claims_expiring_in(60)).unwrap();

        let mut other = get_test_config();
        other.secret = "another-secret-key-at-least-32-characters".to_string();
        let foreign = TokenCodec::new(&other, clock);

        assert!(matches!(foreign.decode(&token), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_wrong_issuer() {
        let (codec, clock) = codec_at(NOW);
        let token = codec.encode(&claims_expiring_in(60)).unwrap();

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other = TokenCodec::new(&config, clock);

        assert!(matches!(other.decode(&token), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_missing_claim_is_malformed() {
        let (codec, _) = codec_at(NOW);
        let config = get_test_config();
        let payload = serde_json::json!({
            "sub": "1",
            "email": "a@x.com",
            "is_staff": true,
            "is_superuser": false,
            "iat": NOW - 10,
            "exp": NOW + 600,
            "type": "access",
            "iss": "test"
        });
        let token = encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec.decode(&token), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_encode_rejects_inverted_timestamps() {
        let (codec, _) = codec_at(NOW);
        let mut claims = claims_expiring_in(60);
        claims.iat = claims.exp;

        assert!(matches!(codec.encode(&claims), Err(CodecError::Encoding(_))));
    }
}
