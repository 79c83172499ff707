//! Notification Collaborators
//!
//! Outbound notifications and absolute URL building are external services;
//! the flows only see these traits. Actual email transport is out of scope
//! for this crate.

use crate::error::LifecycleError;
use crate::models::Account;

use async_trait::async_trait;

/// Route name for the activation confirmation page
pub const ACTIVATION_ROUTE: &str = "account_activation_confirmation";
/// Route name for the password reset page
pub const PASSWORD_RESET_ROUTE: &str = "password_reset";

/// Outbound account notifications (typically email)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Welcome message carrying the activation link
    async fn registration_success(
        &self,
        account: &Account,
        activation_url: &str,
    ) -> Result<(), LifecycleError>;

    /// Warns the holder of an address that someone tried to register with it
    async fn duplicate_registration(
        &self,
        account: &Account,
        already_activated: bool,
    ) -> Result<(), LifecycleError>;

    /// Verification message for a pending email change
    async fn email_change(
        &self,
        account: &Account,
        lifetime_minutes: i64,
    ) -> Result<(), LifecycleError>;

    /// Password reset message carrying the reset link
    async fn password_reset(
        &self,
        account: &Account,
        reset_url: &str,
        lifetime_seconds: i64,
    ) -> Result<(), LifecycleError>;
}

/// Builds absolute URLs for emailed links
///
/// Relative URLs break inside email clients, so the embedding application
/// must produce fully qualified ones.
pub trait UrlBuilder: Send + Sync {
    fn absolute_url(&self, route: &str, params: &[(&str, &str)]) -> String;
}

/// Notifier that only logs, for environments without outbound email
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn registration_success(
        &self,
        account: &Account,
        activation_url: &str,
    ) -> Result<(), LifecycleError> {
        tracing::info!(
            account_id = %account.id,
            activation_url,
            "Registration succeeded, activation link ready"
        );
        Ok(())
    }

    async fn duplicate_registration(
        &self,
        account: &Account,
        already_activated: bool,
    ) -> Result<(), LifecycleError> {
        tracing::info!(
            account_id = %account.id,
            already_activated,
            "Registration attempt on an existing email address"
        );
        Ok(())
    }

    async fn email_change(
        &self,
        account: &Account,
        lifetime_minutes: i64,
    ) -> Result<(), LifecycleError> {
        tracing::info!(
            account_id = %account.id,
            lifetime_minutes,
            "Email change verification ready"
        );
        Ok(())
    }

    async fn password_reset(
        &self,
        account: &Account,
        reset_url: &str,
        lifetime_seconds: i64,
    ) -> Result<(), LifecycleError> {
        tracing::info!(
            account_id = %account.id,
            reset_url,
            lifetime_seconds,
            "Password reset link ready"
        );
        Ok(())
    }
}
