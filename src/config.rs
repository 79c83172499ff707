//! Lifecycle Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::LifecycleError;
use std::env;

/// Account lifecycle configuration loaded from environment
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Email change token lifetime in seconds (from EMAIL_CHANGE_TOKEN_LIFETIME env var)
    pub email_change_token_lifetime: i64,

    /// Minimum delay between email change requests in seconds
    /// (from EMAIL_CHANGE_RETRY_DELAY env var)
    pub email_change_retry_delay: i64,

    /// Password reset token lifetime in seconds (from PASSWORD_RESET_TOKEN_LIFETIME env var)
    pub password_reset_token_lifetime: i64,

    /// Minimum delay between password reset requests in seconds
    /// (from PASSWORD_RESET_RETRY_DELAY env var)
    pub password_reset_retry_delay: i64,

    /// Maximum attempts to generate a collision-free token
    /// (from TOKEN_ISSUE_MAX_ATTEMPTS env var)
    pub token_issue_max_attempts: u32,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,
}

impl LifecycleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            email_change_token_lifetime: env::var("EMAIL_CHANGE_TOKEN_LIFETIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600), // 1 hour

            email_change_retry_delay: env::var("EMAIL_CHANGE_RETRY_DELAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600), // 10 minutes

            password_reset_token_lifetime: env::var("PASSWORD_RESET_TOKEN_LIFETIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600), // 1 hour

            password_reset_retry_delay: env::var("PASSWORD_RESET_RETRY_DELAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600), // 10 minutes

            token_issue_max_attempts: env::var("TOKEN_ISSUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),

            argon2_memory_cost: env::var("ARGON2_MEMORY_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(65536), // 64 MiB

            argon2_time_cost: env::var("ARGON2_TIME_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),

            argon2_parallelism: env::var("ARGON2_PARALLELISM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),

            min_password_length: env::var("MIN_PASSWORD_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.email_change_token_lifetime <= 0 {
            return Err(LifecycleError::Config(
                "EMAIL_CHANGE_TOKEN_LIFETIME must be positive".to_string(),
            ));
        }

        if self.password_reset_token_lifetime <= 0 {
            return Err(LifecycleError::Config(
                "PASSWORD_RESET_TOKEN_LIFETIME must be positive".to_string(),
            ));
        }

        if self.email_change_retry_delay <= 0 || self.password_reset_retry_delay <= 0 {
            return Err(LifecycleError::Config(
                "Retry delays must be positive".to_string(),
            ));
        }

        if self.token_issue_max_attempts == 0 {
            return Err(LifecycleError::Config(
                "TOKEN_ISSUE_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.min_password_length < 8 {
            return Err(LifecycleError::Config(
                "MIN_PASSWORD_LENGTH must be at least 8".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            email_change_token_lifetime: 3600,
            email_change_retry_delay: 600,
            password_reset_token_lifetime: 3600,
            password_reset_retry_delay: 600,
            token_issue_max_attempts: 16,
            argon2_memory_cost: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            min_password_length: 8,
        }
    }
}
