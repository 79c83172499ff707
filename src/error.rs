//! Account Lifecycle Error Types
//!
//! Centralized error handling for all lifecycle operations.
//!
//! Unknown and expired tokens are deliberately not errors: flows report them
//! as outcome values so callers can render a generic "expired or invalid"
//! response without leaking which case occurred.

/// Account lifecycle errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LifecycleError {
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Password does not meet requirements")]
    WeakPassword,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Could not generate a unique token")]
    TokenGeneration,

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl From<argon2::password_hash::Error> for LifecycleError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        LifecycleError::Internal
    }
}
