//! Password Hashing
//!
//! Argon2id hashing, verification, strength validation, and the
//! rehash-on-login parameter check.

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Password hashing service
#[derive(Debug, Clone)]
pub struct PasswordManager {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
    min_length: usize,
}

impl PasswordManager {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            memory_cost: config.argon2_memory_cost,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
            min_length: config.min_password_length,
        }
    }

    fn params(&self) -> Result<Params, LifecycleError> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|_| LifecycleError::Internal)
    }

    fn argon2(&self) -> Result<Argon2<'_>, LifecycleError> {
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params()?))
    }

    /// Hash a password using Argon2id
    pub fn hash(&self, password: &str) -> Result<String, LifecycleError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, LifecycleError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| LifecycleError::Internal)?;
        Ok(self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Validate password strength
    pub fn validate_strength(&self, password: &str) -> Result<(), LifecycleError> {
        if password.len() < self.min_length {
            return Err(LifecycleError::WeakPassword);
        }

        // Check for at least one uppercase, lowercase, and digit
        let has_upper = password.chars().any(|c| c.is_uppercase());
        let has_lower = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_upper || !has_lower || !has_digit {
            return Err(LifecycleError::WeakPassword);
        }

        Ok(())
    }

    /// Whether a stored hash was produced with different parameters than the
    /// currently configured ones.
    ///
    /// Reports true even when the configured cost is lower than the hash's,
    /// so lowering the cost still converges all hashes onto it.
    pub fn needs_rehash(&self, hash: &str) -> Result<bool, LifecycleError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| LifecycleError::Internal)?;

        if parsed_hash.algorithm != argon2::ARGON2ID_IDENT {
            return Ok(true);
        }

        let stored_params =
            Params::try_from(&parsed_hash).map_err(|_| LifecycleError::Internal)?;
        let current = self.params()?;

        Ok(stored_params.m_cost() != current.m_cost()
            || stored_params.t_cost() != current.t_cost()
            || stored_params.p_cost() != current.p_cost())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low-cost parameters keep the hashing tests fast
    fn fast_manager() -> PasswordManager {
        PasswordManager {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            min_length: 8,
        }
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let manager = fast_manager();
        let hash = manager.hash("Correct1Horse").unwrap();

        assert!(manager.verify("Correct1Horse", &hash).unwrap());
        assert!(!manager.verify("Wrong1Horse", &hash).unwrap());
    }

    #[test]
    fn test_validate_strength() {
        let manager = fast_manager();

        assert!(manager.validate_strength("Abcdef12").is_ok());
        // Too short
        assert!(manager.validate_strength("Ab1").is_err());
        // Missing digit
        assert!(manager.validate_strength("Abcdefgh").is_err());
        // Missing uppercase
        assert!(manager.validate_strength("abcdefg1").is_err());
    }

    #[test]
    fn test_needs_rehash_on_parameter_change() {
        let manager = fast_manager();
        let hash = manager.hash("Correct1Horse").unwrap();
        assert!(!manager.needs_rehash(&hash).unwrap());

        let stronger = PasswordManager {
            time_cost: 2,
            ..fast_manager()
        };
        assert!(stronger.needs_rehash(&hash).unwrap());

        // Lowering a cost also triggers a rehash
        let weaker = PasswordManager {
            memory_cost: 512,
            ..fast_manager()
        };
        assert!(weaker.needs_rehash(&hash).unwrap());
    }
}
