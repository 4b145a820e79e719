// common/src/signer.rs
use crate::error::{AuthError, ConfigError};
use crate::models::session::{Credential, SessionClaims};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{crypto, encode, Algorithm, EncodingKey, Header};
use subtle::ConstantTimeEq;

/// Issues and verifies session credentials.
///
/// Credentials use the compact JWT layout `header.claims.signature`. The
/// signature is a keyed HMAC over `header.claims` as issued, so any change to
/// the encoded claims invalidates it.
pub struct CredentialSigner {
    algorithm: Algorithm,
    key: EncodingKey,
    lifetime: Duration,
}

impl CredentialSigner {
    pub fn new(secret: &[u8], algorithm: Algorithm, lifetime: Duration) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        // Only shared-secret schemes: the same SECRET_KEY signs and verifies.
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(ConfigError::UnsupportedAlgorithm(format!("{:?}", algorithm)));
        }
        if lifetime <= Duration::zero() {
            return Err(ConfigError::InvalidLifetime);
        }

        Ok(Self {
            algorithm,
            key: EncodingKey::from_secret(secret),
            lifetime,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a new credential for `subject`, valid from `now` for the configured lifetime.
    pub fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<Credential, jsonwebtoken::errors::Error> {
        let issued_at = now.timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at + self.lifetime.num_seconds(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.key)?;

        Credential::from_parts(claims, token)
            .ok_or_else(|| jsonwebtoken::errors::ErrorKind::InvalidToken.into())
    }

    /// Verify an encoded credential as of `now`.
    ///
    /// The signature is checked before the claims are parsed, and compared in
    /// constant time.
    pub fn verify(&self, raw: &str, now: DateTime<Utc>) -> Result<Credential, AuthError> {
        let (message, signature) = raw.rsplit_once('.').ok_or(AuthError::Malformed)?;
        let (_, encoded_claims) = message.split_once('.').ok_or(AuthError::Malformed)?;

        let header = jsonwebtoken::decode_header(raw).map_err(|_| AuthError::Malformed)?;
        if header.alg != self.algorithm {
            return Err(AuthError::InvalidSignature);
        }

        let expected = crypto::sign(message.as_bytes(), &self.key, self.algorithm)
            .map_err(|_| AuthError::InvalidSignature)?;
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Err(AuthError::InvalidSignature);
        }

        let bytes = base64::decode_config(encoded_claims, base64::URL_SAFE_NO_PAD)
            .map_err(|_| AuthError::Malformed)?;
        let claims: SessionClaims = serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)?;

        let credential = Credential::from_parts(claims, raw.to_string()).ok_or(AuthError::Malformed)?;
        if credential.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(credential)
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
