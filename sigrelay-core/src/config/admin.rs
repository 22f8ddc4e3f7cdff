//! Admin configuration.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Admin configuration with an optional hashed secret.
///
/// Without a secret the admin API is open.
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    /// The argon2 hashed admin secret.
    pub secret_hash: Option<String>,
}

impl AdminConfig {
    pub fn new(secret_hash: Option<String>) -> Self {
        Self { secret_hash }
    }

    pub fn is_open(&self) -> bool {
        self.secret_hash.is_none()
    }

    /// Verify a plaintext secret against the stored hash.
    ///
    /// Always `true` in open mode.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Some(secret_hash) = &self.secret_hash else {
            return true;
        };
        let Ok(parsed_hash) = PasswordHash::new(secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{
        Argon2, PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    #[test]
    fn test_verify_secret() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"relay-admin", &salt)
            .unwrap()
            .to_string();

        let admin_config = AdminConfig::new(Some(hash));
        assert!(admin_config.verify_secret("relay-admin"));
        assert!(!admin_config.verify_secret("wrong"));
        assert!(!admin_config.is_open());
    }

    #[test]
    fn test_open_mode_accepts_anything() {
        let admin_config = AdminConfig::default();
        assert!(admin_config.is_open());
        assert!(admin_config.verify_secret(""));
    }

    #[test]
    fn test_garbage_hash_rejects() {
        let admin_config = AdminConfig::new(Some("not-a-hash".to_string()));
        assert!(!admin_config.verify_secret("not-a-hash"));
    }
}
