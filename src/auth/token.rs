//! Credential codec: HS256-signed session tokens.

use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use super::error::TokenError;

/// Lifetime of a session credential when none is configured ("remember me").
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Principal
///
/// The verified identity carried by a session credential. It exists only inside the
/// signed token and, once verified, in the request's extensions. It carries no role:
/// roles are always read from the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds. The credential is rejected once the clock passes this instant.
    pub expires_at: i64,
}

impl Principal {
    pub fn new(email: impl Into<String>, issued_at: i64, ttl: Duration) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            email: email.into(),
            issued_at,
            expires_at: issued_at.saturating_add(ttl),
        }
    }
}

/// Wire claims. Anything else in the payload is ignored on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    email: String,
    iat: i64,
    exp: i64,
}

impl From<&Principal> for Claims {
    fn from(p: &Principal) -> Self {
        Self {
            email: p.email.clone(),
            iat: p.issued_at,
            exp: p.expires_at,
        }
    }
}

impl From<Claims> for Principal {
    fn from(c: Claims) -> Self {
        Self {
            email: c.email,
            issued_at: c.iat,
            expires_at: c.exp,
        }
    }
}

/// TokenCodec
///
/// Stateless signer/verifier bound to the server-held secret. Expiry is checked
/// against the `now` supplied by the caller rather than the library's own clock.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Builds the principal for `email` issued at `now` with this codec's lifetime.
    pub fn principal_for(&self, email: impl Into<String>, now: i64) -> Principal {
        Principal::new(email, now, self.ttl)
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims::from(principal),
            &self.encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str, now: i64) -> Result<Principal, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if now > data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.into())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
