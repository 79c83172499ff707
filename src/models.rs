//! Account Lifecycle Models
//!
//! Data structures for the account entity, token purposes, flow requests,
//! and flow outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================
// Token Purposes
// ============================================

/// The three single-use token purposes attached to an account.
///
/// Each purpose owns one token field on [`Account`]. Email-change and
/// password-reset tokens carry a paired request timestamp and expire;
/// activation tokens have no timestamp and never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Activation,
    EmailChange,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::EmailChange => "email_change",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Whether this purpose stamps a request timestamp when a token is issued
    pub fn has_request_timestamp(&self) -> bool {
        !matches!(self, TokenPurpose::Activation)
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directly queryable account fields, used for duplicate checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Username,
    Email,
}

// ============================================
// Account Entity
// ============================================

/// User account entity
///
/// Token fields and their paired request timestamps are set and cleared
/// together; mutate them through the token manager rather than directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    pub activation_token: Option<String>,
    pub email_change_pending: Option<String>,
    pub email_change_token: Option<String>,
    pub email_change_requested_at: Option<DateTime<Utc>>,
    pub password_reset_token: Option<String>,
    pub password_reset_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, not yet activated account
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            activated: false,
            activation_token: None,
            email_change_pending: None,
            email_change_token: None,
            email_change_requested_at: None,
            password_reset_token: None,
            password_reset_requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account completed activation
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// The token currently held for a purpose, if any
    pub fn token_for(&self, purpose: TokenPurpose) -> Option<&str> {
        match purpose {
            TokenPurpose::Activation => self.activation_token.as_deref(),
            TokenPurpose::EmailChange => self.email_change_token.as_deref(),
            TokenPurpose::PasswordReset => self.password_reset_token.as_deref(),
        }
    }

    /// When the token for a purpose was requested (activation has no timestamp)
    pub fn requested_at(&self, purpose: TokenPurpose) -> Option<DateTime<Utc>> {
        match purpose {
            TokenPurpose::Activation => None,
            TokenPurpose::EmailChange => self.email_change_requested_at,
            TokenPurpose::PasswordReset => self.password_reset_requested_at,
        }
    }

    /// Assign a freshly issued token, stamping the request timestamp for
    /// purposes that expire
    pub(crate) fn assign_token(
        &mut self,
        purpose: TokenPurpose,
        token: String,
        now: DateTime<Utc>,
    ) {
        match purpose {
            TokenPurpose::Activation => {
                self.activation_token = Some(token);
            }
            TokenPurpose::EmailChange => {
                self.email_change_token = Some(token);
                self.email_change_requested_at = Some(now);
            }
            TokenPurpose::PasswordReset => {
                self.password_reset_token = Some(token);
                self.password_reset_requested_at = Some(now);
            }
        }
        self.updated_at = now;
    }

    /// Clear all token state for a purpose; safe to call when already clear
    pub(crate) fn clear_token_state(&mut self, purpose: TokenPurpose) {
        match purpose {
            TokenPurpose::Activation => {
                self.activation_token = None;
            }
            TokenPurpose::EmailChange => {
                self.email_change_token = None;
                self.email_change_requested_at = None;
                self.email_change_pending = None;
            }
            TokenPurpose::PasswordReset => {
                self.password_reset_token = None;
                self.password_reset_requested_at = None;
            }
        }
    }
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 40, message = "Username must be 2-40 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Email change request (initiate)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailChangeRequest {
    #[validate(email(message = "Invalid email format"))]
    pub new_email: String,
}

/// Password reset request (initiate)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username_or_email: String,
}

/// Password reset request (complete)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompletePasswordResetRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

// ============================================
// Flow Outcomes
// ============================================

/// Result of a registration attempt
///
/// `DuplicateEmail` must be rendered identically to `Registered` by callers;
/// the existing address holder is notified out of band instead.
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    Registered(Account),
    DuplicateEmail,
}

/// Result of confirming an activation token
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    Activated(Account),
    AlreadyActivated(Account),
    NotFound,
}

/// Result of requesting an email address change
#[derive(Debug, Clone)]
pub enum EmailChangeRequestOutcome {
    /// Token issued and, unless the target address is taken, email sent
    Requested(Account),
    /// A previous request is still within its retry delay; nothing was
    /// issued or sent, but callers report success all the same
    AlreadyRequested,
    /// The requested address is the account's current address
    UnchangedAddress,
}

/// Result of confirming an email change token
#[derive(Debug, Clone)]
pub enum EmailChangeConfirmOutcome {
    Changed(Account),
    /// Another account now holds the pending address; token state was
    /// cleared but the email was left unchanged
    AddressTaken(Account),
    Expired,
    NotFound,
}

/// Result of requesting a password reset
#[derive(Debug, Clone)]
pub enum PasswordResetRequestOutcome {
    Requested(Account),
    /// A previous request is still within its retry delay; the caller should
    /// tell the user to wait this many whole minutes
    RetryDelayActive { wait_minutes: i64 },
    NotActivated,
    NotFound,
}

/// Result of completing a password reset
#[derive(Debug, Clone)]
pub enum PasswordResetOutcome {
    Reset(Account),
    Expired,
    NotFound,
}
