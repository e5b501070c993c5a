use sha2::{Digest, Sha256};

/// One-way transform applied to owner identifiers before they are stored.
pub trait Anonymizer: Send + Sync {
    fn anonymize(&self, value: &str) -> String;
}

/// Salted SHA-256, hex encoded.
#[derive(Debug, Clone, Default)]
pub struct Sha256Anonymizer {
    salt: String,
}

impl Sha256Anonymizer {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl Anonymizer for Sha256Anonymizer {
    fn anonymize(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(value.as_bytes());
        hex::encode(hasher.finalize())
    }
}
