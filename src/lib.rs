//! Account Lifecycle Library
//!
//! User-account lifecycle flows for a web application:
//! - Registration with email activation
//! - Email address change with verification
//! - Password reset
//! - Password rehash on login after parameter changes
//!
//! At the center is the single-use secure token lifecycle: issuing
//! (cryptographically random, retried until collision-free), expiry and
//! retry-delay gating, and exactly-once clearing. Everything around it —
//! account storage, outbound email, absolute URL building, even the clock —
//! is a collaborator trait supplied by the embedding application; this crate
//! introduces no HTTP surface, template rendering, or persistence of its own.
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `EMAIL_CHANGE_TOKEN_LIFETIME` - Email change token lifetime in seconds (default: 3600)
//! - `EMAIL_CHANGE_RETRY_DELAY` - Delay between email change requests in seconds (default: 600)
//! - `PASSWORD_RESET_TOKEN_LIFETIME` - Reset token lifetime in seconds (default: 3600)
//! - `PASSWORD_RESET_RETRY_DELAY` - Delay between reset requests in seconds (default: 600)
//! - `TOKEN_ISSUE_MAX_ATTEMPTS` - Cap on token generation retries (default: 16)
//! - `ARGON2_MEMORY_COST` / `ARGON2_TIME_COST` / `ARGON2_PARALLELISM` - Hashing parameters
//! - `MIN_PASSWORD_LENGTH` - Minimum accepted password length (default: 8)
//!
//! # Usage
//!
//! ```rust,ignore
//! use account_lifecycle::{LifecycleConfig, LifecycleService, RegisterRequest};
//!
//! let config = LifecycleConfig::from_env();
//! config.validate()?;
//!
//! let service = LifecycleService::new(directory, notifier, urls, config);
//! let outcome = service.register(RegisterRequest { username, email, password }).await?;
//! ```

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod notifier;
pub mod password;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LifecycleConfig;
pub use directory::{InMemoryDirectory, UserDirectory};
pub use error::LifecycleError;
pub use models::*;
pub use notifier::{LogNotifier, Notifier, UrlBuilder};
pub use password::PasswordManager;
pub use service::LifecycleService;
pub use token::{RandomTokenGenerator, TokenGenerator, TokenManager, MAX_TOKEN_FIELD_LEN};
