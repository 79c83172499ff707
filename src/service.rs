//! Lifecycle Service
//!
//! The account lifecycle flows: registration, activation, email change,
//! password reset, and rehash-on-login. Each flow runs to completion within
//! one call, talking only to the directory, notifier, and URL builder
//! collaborators; callers are expected to surface the returned outcome and
//! propagate collaborator errors as a generic failure.

use crate::clock::{Clock, SystemClock};
use crate::config::LifecycleConfig;
use crate::directory::UserDirectory;
use crate::error::LifecycleError;
use crate::models::*;
use crate::notifier::{Notifier, UrlBuilder, ACTIVATION_ROUTE, PASSWORD_RESET_ROUTE};
use crate::password::PasswordManager;
use crate::token::{TokenGenerator, TokenManager};

use std::sync::Arc;
use validator::Validate;

/// Account lifecycle service
pub struct LifecycleService<D, N, U> {
    directory: Arc<D>,
    notifier: Arc<N>,
    urls: Arc<U>,
    clock: Arc<dyn Clock>,
    tokens: TokenManager<D>,
    passwords: PasswordManager,
    config: LifecycleConfig,
}

impl<D, N, U> LifecycleService<D, N, U>
where
    D: UserDirectory,
    N: Notifier,
    U: UrlBuilder,
{
    /// Create a service running on wall-clock time
    pub fn new(
        directory: Arc<D>,
        notifier: Arc<N>,
        urls: Arc<U>,
        config: LifecycleConfig,
    ) -> Self {
        Self::with_clock(directory, notifier, urls, config, Arc::new(SystemClock))
    }

    /// Create a service with an explicit clock
    pub fn with_clock(
        directory: Arc<D>,
        notifier: Arc<N>,
        urls: Arc<U>,
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenManager::new(
            directory.clone(),
            clock.clone(),
            config.token_issue_max_attempts,
        );
        let passwords = PasswordManager::new(&config);

        Self {
            directory,
            notifier,
            urls,
            clock,
            tokens,
            passwords,
            config,
        }
    }

    /// Replace the token random source
    pub fn with_token_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = self.tokens.with_generator(generator);
        self
    }

    /// Access the underlying token manager
    pub fn tokens(&self) -> &TokenManager<D> {
        &self.tokens
    }

    /// Access the underlying password manager
    pub fn passwords(&self) -> &PasswordManager {
        &self.passwords
    }

    // ============================================
    // Registration
    // ============================================

    /// Register a new account and send the activation link.
    ///
    /// When the email is already registered, no account is created; the
    /// existing holder is notified instead and the outcome must be rendered
    /// identically to a success so the attempt leaks nothing.
    pub async fn register(
        &self,
        req: RegisterRequest,
    ) -> Result<RegistrationOutcome, LifecycleError> {
        req.validate()
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;
        self.passwords.validate_strength(&req.password)?;

        if let Some(existing) = self
            .directory
            .find_by_field(AccountField::Email, &req.email)
            .await?
        {
            tracing::warn!(
                account_id = %existing.id,
                "Registration attempt with an email already on file"
            );
            self.notifier
                .duplicate_registration(&existing, existing.is_activated())
                .await?;
            return Ok(RegistrationOutcome::DuplicateEmail);
        }

        if self
            .directory
            .find_by_field(AccountField::Username, &req.username)
            .await?
            .is_some()
        {
            return Err(LifecycleError::UsernameTaken);
        }

        let password_hash = self.passwords.hash(&req.password)?;
        let mut account = Account::new(req.username, req.email, password_hash);

        let token = self
            .tokens
            .issue(TokenPurpose::Activation, &mut account)
            .await?;
        let activation_url = self.urls.absolute_url(ACTIVATION_ROUTE, &[("token", &token)]);
        self.notifier
            .registration_success(&account, &activation_url)
            .await?;

        self.directory.persist(&account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Account registered, awaiting activation");
        Ok(RegistrationOutcome::Registered(account))
    }

    // ============================================
    // Activation
    // ============================================

    /// Activate the account holding `token`.
    ///
    /// Activation tokens never expire; an unknown token is the only failure
    /// mode and is reported as `NotFound`, not an error.
    pub async fn confirm_activation(
        &self,
        token: &str,
    ) -> Result<ActivationOutcome, LifecycleError> {
        let Some(mut account) = self.tokens.resolve(TokenPurpose::Activation, token).await?
        else {
            return Ok(ActivationOutcome::NotFound);
        };

        if account.is_activated() {
            return Ok(ActivationOutcome::AlreadyActivated(account));
        }

        account.activated = true;
        account.updated_at = self.clock.now();
        self.tokens.consume(TokenPurpose::Activation, &mut account);

        self.directory.persist(&account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Account activated");
        Ok(ActivationOutcome::Activated(account))
    }

    // ============================================
    // Email Change
    // ============================================

    /// Request a change of email address for an account.
    ///
    /// While a previous request's retry delay is running, nothing is issued
    /// or sent; callers still report success. The verification email is only
    /// sent when the target address is free, but the token is written either
    /// way so the confirmation step can clean up uniformly.
    pub async fn request_email_change(
        &self,
        account: &mut Account,
        req: EmailChangeRequest,
    ) -> Result<EmailChangeRequestOutcome, LifecycleError> {
        req.validate()
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;

        if req.new_email == account.email {
            return Ok(EmailChangeRequestOutcome::UnchangedAddress);
        }

        if !self.tokens.is_retry_delay_expired(
            TokenPurpose::EmailChange,
            account,
            self.config.email_change_retry_delay,
        ) {
            tracing::info!(
                account_id = %account.id,
                "Email change retry delay still running, nothing sent"
            );
            return Ok(EmailChangeRequestOutcome::AlreadyRequested);
        }

        account.email_change_pending = Some(req.new_email.clone());
        self.tokens
            .issue(TokenPurpose::EmailChange, account)
            .await?;

        let address_is_free = self
            .directory
            .find_by_field(AccountField::Email, &req.new_email)
            .await?
            .is_none();

        if address_is_free {
            let lifetime_minutes = ceil_minutes(self.config.email_change_token_lifetime);
            self.notifier.email_change(account, lifetime_minutes).await?;
        } else {
            tracing::warn!(
                account_id = %account.id,
                "Email change requested to an address already registered, skipping email"
            );
        }

        self.directory.persist(account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Email change requested");
        Ok(EmailChangeRequestOutcome::Requested(account.clone()))
    }

    /// Apply a pending email change identified by `token`.
    ///
    /// Token state is cleared on every resolvable outcome: success, expiry,
    /// and the pending address having been taken meanwhile.
    pub async fn confirm_email_change(
        &self,
        token: &str,
    ) -> Result<EmailChangeConfirmOutcome, LifecycleError> {
        let Some(mut account) = self.tokens.resolve(TokenPurpose::EmailChange, token).await?
        else {
            return Ok(EmailChangeConfirmOutcome::NotFound);
        };

        if self.tokens.is_token_expired(
            TokenPurpose::EmailChange,
            &account,
            self.config.email_change_token_lifetime,
        ) {
            self.tokens.consume(TokenPurpose::EmailChange, &mut account);
            self.directory.persist(&account).await?;
            self.directory.flush().await?;
            return Ok(EmailChangeConfirmOutcome::Expired);
        }

        let Some(pending) = account.email_change_pending.clone() else {
            // Token without a pending address should not occur; clear it
            self.tokens.consume(TokenPurpose::EmailChange, &mut account);
            self.directory.persist(&account).await?;
            self.directory.flush().await?;
            return Ok(EmailChangeConfirmOutcome::Expired);
        };

        let address_is_free = self
            .directory
            .find_by_field(AccountField::Email, &pending)
            .await?
            .is_none();

        let applied = if address_is_free {
            account.email = pending;
            account.updated_at = self.clock.now();
            true
        } else {
            tracing::warn!(
                account_id = %account.id,
                "Pending email address was registered meanwhile, leaving address unchanged"
            );
            false
        };

        self.tokens.consume(TokenPurpose::EmailChange, &mut account);
        self.directory.persist(&account).await?;
        self.directory.flush().await?;

        if applied {
            tracing::info!(account_id = %account.id, "Email address changed");
            Ok(EmailChangeConfirmOutcome::Changed(account))
        } else {
            Ok(EmailChangeConfirmOutcome::AddressTaken(account))
        }
    }

    // ============================================
    // Password Reset
    // ============================================

    /// Request a password reset for a username or email address.
    ///
    /// Only activated accounts may reset; repeated requests within the retry
    /// delay leave the existing token untouched and report how long to wait.
    pub async fn request_password_reset(
        &self,
        req: PasswordResetRequest,
    ) -> Result<PasswordResetRequestOutcome, LifecycleError> {
        req.validate()
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;

        let field = if looks_like_email(&req.username_or_email) {
            AccountField::Email
        } else {
            AccountField::Username
        };

        let Some(mut account) = self
            .directory
            .find_by_field(field, &req.username_or_email)
            .await?
        else {
            return Ok(PasswordResetRequestOutcome::NotFound);
        };

        if !account.is_activated() {
            return Ok(PasswordResetRequestOutcome::NotActivated);
        }

        if !self.tokens.is_retry_delay_expired(
            TokenPurpose::PasswordReset,
            &account,
            self.config.password_reset_retry_delay,
        ) {
            return Ok(PasswordResetRequestOutcome::RetryDelayActive {
                wait_minutes: ceil_minutes(self.config.password_reset_retry_delay),
            });
        }

        let token = self
            .tokens
            .issue(TokenPurpose::PasswordReset, &mut account)
            .await?;
        let reset_url = self
            .urls
            .absolute_url(PASSWORD_RESET_ROUTE, &[("token", &token)]);
        self.notifier
            .password_reset(
                &account,
                &reset_url,
                self.config.password_reset_token_lifetime,
            )
            .await?;

        self.directory.persist(&account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Password reset requested");
        Ok(PasswordResetRequestOutcome::Requested(account))
    }

    /// Complete a password reset identified by `token`.
    ///
    /// An expired token is cleared without completing, so the user has to
    /// start over.
    pub async fn reset_password(
        &self,
        token: &str,
        req: CompletePasswordResetRequest,
    ) -> Result<PasswordResetOutcome, LifecycleError> {
        let Some(mut account) = self
            .tokens
            .resolve(TokenPurpose::PasswordReset, token)
            .await?
        else {
            return Ok(PasswordResetOutcome::NotFound);
        };

        if self.tokens.is_token_expired(
            TokenPurpose::PasswordReset,
            &account,
            self.config.password_reset_token_lifetime,
        ) {
            self.tokens
                .consume(TokenPurpose::PasswordReset, &mut account);
            self.directory.persist(&account).await?;
            self.directory.flush().await?;
            return Ok(PasswordResetOutcome::Expired);
        }

        req.validate()
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;
        self.passwords.validate_strength(&req.password)?;

        account.password_hash = self.passwords.hash(&req.password)?;
        account.updated_at = self.clock.now();
        self.tokens
            .consume(TokenPurpose::PasswordReset, &mut account);

        self.directory.persist(&account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Password reset completed");
        Ok(PasswordResetOutcome::Reset(account))
    }

    // ============================================
    // Rehash On Login
    // ============================================

    /// After a successful authentication, rehash the password when the
    /// stored hash was produced with different parameters than the current
    /// configuration. Returns whether a rehash happened.
    pub async fn rehash_password_on_login(
        &self,
        account: &mut Account,
        plain_password: &str,
    ) -> Result<bool, LifecycleError> {
        if !self.passwords.needs_rehash(&account.password_hash)? {
            return Ok(false);
        }

        account.password_hash = self.passwords.hash(plain_password)?;
        account.updated_at = self.clock.now();

        self.directory.persist(account).await?;
        self.directory.flush().await?;

        tracing::info!(account_id = %account.id, "Password rehashed with current parameters");
        Ok(true)
    }
}

/// Round seconds up to whole minutes for user-facing wait messages
fn ceil_minutes(seconds: i64) -> i64 {
    (seconds + 59) / 60
}

/// Heuristic matching the reset form's behavior: inputs shaped like an email
/// address are looked up by email, everything else by username.
fn looks_like_email(input: &str) -> bool {
    let Some((local, domain)) = input.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || domain.chars().any(char::is_whitespace) {
        return false;
    }
    domain
        .match_indices('.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}
