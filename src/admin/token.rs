use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::password::SecretDigest;
use crate::config::AdminConfig;

const ISSUER: &str = "guestbook";
const AUDIENCE: &str = "guestbook-admin";

/// Payload of an admin session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sid: Uuid,   // admin session id
    pub iat: usize,  // issued at
    pub exp: usize,  // expiration time
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Shared-secret gate in front of the administrative routes.
#[derive(Clone)]
pub struct AdminGate {
    secret: SecretDigest,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AdminGate {
    pub fn new(cfg: &AdminConfig) -> anyhow::Result<Self> {
        Ok(Self {
            secret: SecretDigest::derive(&cfg.secret)?,
            encoding: EncodingKey::from_secret(cfg.token_secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.token_secret.as_bytes()),
            ttl: Duration::minutes(cfg.session_minutes.max(1)),
        })
    }

    /// Issues a session token when `attempt` matches the configured secret.
    pub fn login(&self, attempt: &str) -> anyhow::Result<Option<String>> {
        if !self.secret.matches(attempt)? {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let claims = AdminClaims {
            sid: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
            iss: ISSUER.into(),
            aud: AUDIENCE.into(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(sid = %claims.sid, "admin session opened");
        Ok(Some(token))
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<AdminClaims> {
        let mut validation = Validation::default();
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        let data = decode::<AdminClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
