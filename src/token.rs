//! Token Lifecycle Manager
//!
//! Issues, validates, expires, and clears the single-use secure tokens
//! attached to an account (activation, email change, password reset).
//!
//! Uniqueness is guaranteed by generate-and-retry against the directory
//! rather than by a storage constraint, so two concurrent requests could in
//! principle race to the same value; with 256 bits of randomness per token
//! that collision window is accepted.

use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::error::LifecycleError;
use crate::models::{Account, TokenPurpose};

use rand::RngCore;
use std::sync::Arc;

/// Maximum indexable length of a token column in the backing store.
/// Lookup input is truncated to this length so oversized input can never
/// error out of the directory or match nothing it should.
pub const MAX_TOKEN_FIELD_LEN: usize = 255;

/// Source of candidate token strings
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Cryptographically random hex tokens
pub struct RandomTokenGenerator {
    bytes: usize,
}

impl RandomTokenGenerator {
    pub fn new(bytes: usize) -> Self {
        Self { bytes }
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        // 32 bytes -> 64 hex chars
        Self { bytes: 32 }
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let mut buf = vec![0u8; self.bytes];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        hex_encode(&buf)
    }
}

/// Lowercase hex encoding
fn hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        write!(result, "{:02x}", byte).expect("writing to a String cannot fail");
    }
    result
}

/// Truncate lookup input to the maximum indexable token length.
///
/// Silent normalization: never errors, even for pathological input, and
/// backs off to a char boundary so multi-byte input cannot panic a slice.
pub fn normalize_token(value: &str) -> &str {
    if value.len() <= MAX_TOKEN_FIELD_LEN {
        return value;
    }
    let mut end = MAX_TOKEN_FIELD_LEN;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Token lifecycle manager
///
/// Mutates accounts in memory only; persisting them is the caller's job.
pub struct TokenManager<D> {
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    max_issue_attempts: u32,
}

impl<D: UserDirectory> TokenManager<D> {
    pub fn new(directory: Arc<D>, clock: Arc<dyn Clock>, max_issue_attempts: u32) -> Self {
        Self {
            directory,
            clock,
            generator: Arc::new(RandomTokenGenerator::default()),
            max_issue_attempts,
        }
    }

    /// Replace the random source (scripted generators in tests)
    pub fn with_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Generate a token no other account holds and assign it to the
    /// account's field for `purpose`, stamping the request timestamp for
    /// purposes that expire.
    ///
    /// Retries only on a collision; a directory error aborts the loop.
    /// Exceeding the retry cap is a `TokenGeneration` error.
    pub async fn issue(
        &self,
        purpose: TokenPurpose,
        account: &mut Account,
    ) -> Result<String, LifecycleError> {
        for attempt in 1..=self.max_issue_attempts {
            let candidate = self.generator.generate();

            if self
                .directory
                .find_by_token(purpose, &candidate)
                .await?
                .is_some()
            {
                tracing::warn!(
                    purpose = %purpose,
                    attempt,
                    "Token collision, generating a new candidate"
                );
                continue;
            }

            account.assign_token(purpose, candidate.clone(), self.clock.now());
            return Ok(candidate);
        }

        tracing::error!(
            purpose = %purpose,
            attempts = self.max_issue_attempts,
            "Exhausted token generation attempts"
        );
        Err(LifecycleError::TokenGeneration)
    }

    /// Whether enough time has passed since the last request for `purpose`
    /// to allow issuing again.
    ///
    /// True when no prior request exists or `delay_seconds` have elapsed
    /// (inclusive boundary). Activation has no retry delay and is always
    /// allowed.
    pub fn is_retry_delay_expired(
        &self,
        purpose: TokenPurpose,
        account: &Account,
        delay_seconds: i64,
    ) -> bool {
        if !purpose.has_request_timestamp() {
            return true;
        }
        match account.requested_at(purpose) {
            None => true,
            Some(requested_at) => {
                let elapsed = self.clock.now().signed_duration_since(requested_at);
                elapsed.num_seconds() >= delay_seconds
            }
        }
    }

    /// Whether the token for `purpose` has outlived `lifetime_seconds`.
    ///
    /// A missing request timestamp counts as expired (no active request).
    /// Activation tokens never expire.
    pub fn is_token_expired(
        &self,
        purpose: TokenPurpose,
        account: &Account,
        lifetime_seconds: i64,
    ) -> bool {
        if !purpose.has_request_timestamp() {
            return false;
        }
        match account.requested_at(purpose) {
            None => true,
            Some(requested_at) => {
                let elapsed = self.clock.now().signed_duration_since(requested_at);
                elapsed.num_seconds() >= lifetime_seconds
            }
        }
    }

    /// Clear the token, its request timestamp, and (for email change) the
    /// pending address. Idempotent.
    pub fn consume(&self, purpose: TokenPurpose, account: &mut Account) {
        account.clear_token_state(purpose);
    }

    /// Look up the account holding a token, normalizing the input first.
    ///
    /// A miss is a normal `None`, indistinguishable from expiry to callers.
    pub async fn resolve(
        &self,
        purpose: TokenPurpose,
        value: &str,
    ) -> Result<Option<Account>, LifecycleError> {
        self.directory
            .find_by_token(purpose, normalize_token(value))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::InMemoryDirectory;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    /// Generator that replays a script, then falls back to a counter
    struct SequenceGenerator {
        values: Mutex<Vec<String>>,
    }

    impl SequenceGenerator {
        fn new(values: Vec<&str>) -> Self {
            Self {
                values: Mutex::new(values.into_iter().rev().map(String::from).collect()),
            }
        }
    }

    impl TokenGenerator for SequenceGenerator {
        fn generate(&self) -> String {
            self.values
                .lock()
                .unwrap()
                .pop()
                .expect("sequence generator exhausted")
        }
    }

    fn manager_at(
        directory: Arc<InMemoryDirectory>,
        clock: Arc<ManualClock>,
    ) -> TokenManager<InMemoryDirectory> {
        TokenManager::new(directory, clock, 16)
    }

    #[tokio::test]
    async fn test_issue_then_resolve_returns_same_account() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager_at(directory.clone(), clock);

        for purpose in [
            TokenPurpose::Activation,
            TokenPurpose::EmailChange,
            TokenPurpose::PasswordReset,
        ] {
            let mut account = Account::new("alice", "alice@example.com", "hash");
            let token = manager.issue(purpose, &mut account).await.unwrap();
            directory.persist(&account).await.unwrap();

            let resolved = manager.resolve(purpose, &token).await.unwrap().unwrap();
            assert_eq!(resolved.id, account.id);
        }
    }

    #[tokio::test]
    async fn test_issue_retries_past_taken_token() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        // Pre-seed an account that already owns the first candidate
        let mut holder = Account::new("bob", "bob@example.com", "hash");
        holder.assign_token(TokenPurpose::PasswordReset, "taken".into(), Utc::now());
        directory.persist(&holder).await.unwrap();

        let manager = manager_at(directory.clone(), clock)
            .with_generator(Arc::new(SequenceGenerator::new(vec!["taken", "fresh"])));

        let mut account = Account::new("alice", "alice@example.com", "hash");
        let token = manager
            .issue(TokenPurpose::PasswordReset, &mut account)
            .await
            .unwrap();

        assert_eq!(token, "fresh");
        assert_eq!(
            account.token_for(TokenPurpose::PasswordReset),
            Some("fresh")
        );
    }

    #[tokio::test]
    async fn test_issue_fails_when_attempts_exhausted() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let mut holder = Account::new("bob", "bob@example.com", "hash");
        holder.assign_token(TokenPurpose::PasswordReset, "taken".into(), Utc::now());
        directory.persist(&holder).await.unwrap();

        let manager = TokenManager::new(directory, clock, 3).with_generator(Arc::new(
            SequenceGenerator::new(vec!["taken", "taken", "taken"]),
        ));

        let mut account = Account::new("alice", "alice@example.com", "hash");
        let err = manager
            .issue(TokenPurpose::PasswordReset, &mut account)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TokenGeneration));
        assert!(account.token_for(TokenPurpose::PasswordReset).is_none());
    }

    #[tokio::test]
    async fn test_consume_is_idempotent() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager_at(directory, clock);

        let mut account = Account::new("alice", "alice@example.com", "hash");
        account.email_change_pending = Some("new@example.com".into());
        account.assign_token(TokenPurpose::EmailChange, "tok".into(), Utc::now());

        manager.consume(TokenPurpose::EmailChange, &mut account);
        assert!(account.token_for(TokenPurpose::EmailChange).is_none());
        assert!(account.email_change_pending.is_none());

        // Second consume is a no-op
        manager.consume(TokenPurpose::EmailChange, &mut account);
        assert!(account.token_for(TokenPurpose::EmailChange).is_none());
    }

    #[tokio::test]
    async fn test_token_expiry_boundary_is_inclusive() {
        let start = Utc::now();
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(start));
        let manager = manager_at(directory, clock.clone());

        let mut account = Account::new("alice", "alice@example.com", "hash");
        account.assign_token(TokenPurpose::PasswordReset, "tok".into(), start);

        let lifetime = 3600;

        clock.set(start + Duration::seconds(lifetime - 1));
        assert!(!manager.is_token_expired(TokenPurpose::PasswordReset, &account, lifetime));

        clock.set(start + Duration::seconds(lifetime));
        assert!(manager.is_token_expired(TokenPurpose::PasswordReset, &account, lifetime));
    }

    #[tokio::test]
    async fn test_retry_delay_boundary_is_inclusive() {
        let start = Utc::now();
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(start));
        let manager = manager_at(directory, clock.clone());

        let mut account = Account::new("alice", "alice@example.com", "hash");
        account.assign_token(TokenPurpose::EmailChange, "tok".into(), start);

        let delay = 600;

        clock.set(start + Duration::seconds(delay - 1));
        assert!(!manager.is_retry_delay_expired(TokenPurpose::EmailChange, &account, delay));

        clock.set(start + Duration::seconds(delay));
        assert!(manager.is_retry_delay_expired(TokenPurpose::EmailChange, &account, delay));
    }

    #[tokio::test]
    async fn test_no_prior_request_counts_as_delay_expired_and_token_expired() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager_at(directory, clock);

        let account = Account::new("alice", "alice@example.com", "hash");
        assert!(manager.is_retry_delay_expired(TokenPurpose::PasswordReset, &account, 600));
        assert!(manager.is_token_expired(TokenPurpose::PasswordReset, &account, 3600));
    }

    #[tokio::test]
    async fn test_activation_tokens_never_expire() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager_at(directory, clock.clone());

        let mut account = Account::new("alice", "alice@example.com", "hash");
        account.assign_token(TokenPurpose::Activation, "tok".into(), clock.now());

        clock.advance(Duration::days(365 * 10));
        assert!(!manager.is_token_expired(TokenPurpose::Activation, &account, 1));
        assert!(manager.is_retry_delay_expired(TokenPurpose::Activation, &account, i64::MAX));
    }

    #[tokio::test]
    async fn test_resolve_truncates_oversized_input() {
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager_at(directory.clone(), clock);

        let stored = "a".repeat(MAX_TOKEN_FIELD_LEN);
        let mut account = Account::new("alice", "alice@example.com", "hash");
        account.assign_token(TokenPurpose::Activation, stored.clone(), Utc::now());
        directory.persist(&account).await.unwrap();

        // Oversized input still matches the stored, truncated value
        let oversized = "a".repeat(MAX_TOKEN_FIELD_LEN + 100);
        let resolved = manager
            .resolve(TokenPurpose::Activation, &oversized)
            .await
            .unwrap();
        assert_eq!(resolved.unwrap().id, account.id);
    }

    #[test]
    fn test_normalize_token_respects_char_boundaries() {
        let short = "abc";
        assert_eq!(normalize_token(short), "abc");

        // Multi-byte char straddling the cut point must not panic
        let mut pathological = "a".repeat(MAX_TOKEN_FIELD_LEN - 1);
        pathological.push('é');
        pathological.push_str("trailing");
        let normalized = normalize_token(&pathological);
        assert!(normalized.len() <= MAX_TOKEN_FIELD_LEN);
        assert!(pathological.starts_with(normalized));
    }

    #[test]
    fn test_random_generator_produces_distinct_hex() {
        let generator = RandomTokenGenerator::default();
        let a = generator.generate();
        let b = generator.generate();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
