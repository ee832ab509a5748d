use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const PRIVATE_KEY_PREFIX: &str = "APrivateKey1";

/// Oracle signing key. Parsed once at startup, read-only afterwards, and
/// redacted from all `Debug` output.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// 32-byte MAC seed derived from the key material.
    pub fn seed(&self) -> [u8; 32] {
        let digest = Sha256::digest(self.0.as_bytes());
        digest.into()
    }
}

impl FromStr for PrivateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.starts_with(PRIVATE_KEY_PREFIX) {
            anyhow::bail!("private key must start with {PRIVATE_KEY_PREFIX}");
        }
        if s.len() < PRIVATE_KEY_PREFIX.len() + 20 {
            anyhow::bail!("private key is too short");
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            anyhow::bail!("private key contains invalid characters");
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}
