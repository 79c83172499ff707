//! User Directory
//!
//! Storage-agnostic account lookup and persistence. The token manager and
//! the lifecycle flows only ever talk to this trait; how accounts are
//! actually stored is the embedding application's concern.

use crate::error::LifecycleError;
use crate::models::{Account, AccountField, TokenPurpose};

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Account lookup and persistence collaborator
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact-match lookup on the token field owned by `purpose`
    async fn find_by_token(
        &self,
        purpose: TokenPurpose,
        value: &str,
    ) -> Result<Option<Account>, LifecycleError>;

    /// Exact-match lookup on a queryable account field
    async fn find_by_field(
        &self,
        field: AccountField,
        value: &str,
    ) -> Result<Option<Account>, LifecycleError>;

    /// Stage an account (new or modified) for the next flush
    async fn persist(&self, account: &Account) -> Result<(), LifecycleError>;

    /// Commit staged changes
    async fn flush(&self) -> Result<(), LifecycleError>;
}

/// In-memory directory backed by a map
///
/// Reference implementation used by the test suite; `persist` applies
/// immediately and `flush` is a no-op.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an account by id
    pub async fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_token(
        &self,
        purpose: TokenPurpose,
        value: &str,
    ) -> Result<Option<Account>, LifecycleError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.token_for(purpose) == Some(value))
            .cloned())
    }

    async fn find_by_field(
        &self,
        field: AccountField,
        value: &str,
    ) -> Result<Option<Account>, LifecycleError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| match field {
                AccountField::Username => a.username == value,
                AccountField::Email => a.email == value,
            })
            .cloned())
    }

    async fn persist(&self, account: &Account) -> Result<(), LifecycleError> {
        self.accounts
            .write()
            .await
            .insert(account.id, account.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), LifecycleError> {
        Ok(())
    }
}
