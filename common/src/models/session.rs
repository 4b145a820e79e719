// common/src/models/session.rs
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried inside a session credential.
///
/// Field order is the canonical serialization order; the signature covers the
/// encoded bytes exactly as issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Opaque user identifier
    pub sub: String,
    /// Issued at, seconds since the unix epoch
    pub iat: i64,
    /// Expires at, seconds since the unix epoch
    pub exp: i64,
}

/// A signed, self-contained session credential.
///
/// There is no way to change the claims of an existing credential; a new login
/// produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    claims: SessionClaims,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    token: String,
}

impl Credential {
    /// Assemble a credential from already-signed parts. Returns `None` when the
    /// timestamps are outside chrono's range.
    pub(crate) fn from_parts(claims: SessionClaims, token: String) -> Option<Self> {
        let issued_at = Utc.timestamp_opt(claims.iat, 0).single()?;
        let expires_at = Utc.timestamp_opt(claims.exp, 0).single()?;
        Some(Self {
            claims,
            issued_at,
            expires_at,
            token,
        })
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The signature segment of the encoded credential.
    pub fn signature(&self) -> &str {
        self.token
            .rsplit_once('.')
            .map(|(_, signature)| signature)
            .unwrap_or_default()
    }

    /// The opaque encoded form carried in the cookie value.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Identity attached to a request after its session cookie verified.
///
/// Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Credential> for Principal {
    fn from(credential: &Credential) -> Self {
        Self {
            subject: credential.subject().to_string(),
            expires_at: credential.expires_at(),
        }
    }
}
