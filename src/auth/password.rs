use tracing::error;

/// Slow salted one-way hash used for stored credentials.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        bcrypt::hash(plain, self.cost).map_err(|e| {
            error!(error = %e, "bcrypt hash error");
            anyhow::anyhow!(e.to_string())
        })
    }

    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        bcrypt::verify(plain, hash).map_err(|e| {
            error!(error = %e, "bcrypt verify error");
            anyhow::anyhow!(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = BcryptHasher::new(TEST_COST);
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn hash_embeds_the_configured_cost() {
        let hash = BcryptHasher::new(TEST_COST).hash("correct-horse").unwrap();
        assert!(hash.starts_with("$2b$04$"), "unexpected hash prefix: {hash}");
    }

    #[test]
    fn default_cost_is_ten() {
        let hash = BcryptHasher::new(crate::config::DEFAULT_BCRYPT_COST)
            .hash("password123")
            .unwrap();
        assert!(hash.starts_with("$2b$10$"), "unexpected hash prefix: {hash}");
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let hasher = BcryptHasher::new(TEST_COST);
        assert_ne!(hasher.hash("password123").unwrap(), hasher.hash("password123").unwrap());
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = BcryptHasher::new(TEST_COST);
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = BcryptHasher::new(TEST_COST)
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
