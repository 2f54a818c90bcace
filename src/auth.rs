//! Short-lived signed credentials gating stream access
//!
//! Tokens are HS256 JWTs carrying `sub`, `iat` and `exp`. The gate is checked
//! exactly once, before a session starts streaming; a token that expires
//! while its stream is running does not interrupt that stream.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, StreamError};

/// Claims carried by a stream credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued to
    pub sub: String,
    /// Issued-at, Unix seconds
    pub iat: u64,
    /// Absolute expiry, Unix seconds
    pub exp: u64,
}

/// A freshly signed token and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Absolute expiry, Unix seconds
    pub expires_at: u64,
}

/// Yes/no check applied to a token before streaming begins
///
/// Every kind of rejection (malformed, expired, wrong signature) is reported
/// as the same [`StreamError::Unauthorized`].
pub trait CredentialGate: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims>;
}

/// Signs stream credentials with a shared secret
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self { key: EncodingKey::from_secret(secret), ttl }
    }

    /// Lifetime of issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` valid from now for [`ttl`](Self::ttl)
    pub fn issue(&self, subject: &str) -> Result<IssuedToken> {
        self.issue_at(subject, unix_now())
    }

    /// Issue a token as if the current time were `now` (Unix seconds)
    pub fn issue_at(&self, subject: &str, now: u64) -> Result<IssuedToken> {
        let claims =
            Claims { sub: subject.to_string(), iat: now, exp: now.saturating_add(self.ttl.as_secs()) };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| StreamError::Credential { reason: e.to_string() })?;

        debug!(subject, expires_at = claims.exp, "Issued stream token");
        Ok(IssuedToken { token, expires_at: claims.exp })
    }
}

/// [`CredentialGate`] verifying HS256 JWTs with a shared secret
pub struct JwtGate {
    key: DecodingKey,
    validation: Validation,
}

impl JwtGate {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        Self { key: DecodingKey::from_secret(secret), validation }
    }
}

impl CredentialGate for JwtGate {
    fn verify(&self, token: &str) -> Result<Claims> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                debug!("Token rejected: {}", e);
                Err(StreamError::Unauthorized)
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
