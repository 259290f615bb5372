use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Argon2 digest of the admin secret, derived once at startup so the plain
/// secret does not have to stay in memory.
#[derive(Clone)]
pub struct SecretDigest {
    phc: String,
}

impl SecretDigest {
    pub fn derive(secret: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!secret.trim().is_empty(), "admin secret must not be empty");
        let salt = SaltString::generate(&mut OsRng);
        let phc = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("hashing admin secret: {e}"))?
            .to_string();
        Ok(Self { phc })
    }

    /// Exact match: no trimming, no case folding. The final comparison inside
    /// argon2 is constant-time.
    pub fn matches(&self, attempt: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(&self.phc)
            .map_err(|e| anyhow::anyhow!("admin secret digest is corrupt: {e}"))?;
        match Argon2::default().verify_password(attempt.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("verifying admin secret: {e}")),
        }
    }
}
