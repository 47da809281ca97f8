//! Storage contracts for accounts and snippets.
//!
//! DESIGN
//! ======
//! Each store is an object that owns its state exclusively. Callers only see
//! the trait; the in-memory and Postgres backends satisfy the same contract
//! and are interchangeable behind `Arc<dyn ...>`.
//!
//! CONCURRENCY
//! ===========
//! Mutations and the expiry sweep are serialized per store instance. Reads
//! may run concurrently with each other but never observe a half-applied
//! write. In the snippet store the primary map and the owner index change
//! together inside one critical section (memory) or one statement (Postgres).

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::{MemoryCredentialStore, MemorySnippetStore};
pub use models::*;
pub use postgres::{PgCredentialStore, PgSnippetStore};

use async_trait::async_trait;

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "E_ALREADY_EXISTS",
            Self::NotFound => "E_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Accounts keyed by id and by login. Logins are unique.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store a new account under a fresh id.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the login is taken. Of any number of concurrent
    /// calls with the same login, at most one succeeds.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no account has this id.
    async fn get_account_by_id(&self, id: AccountId) -> Result<Account, StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no account has this login.
    async fn get_account_by_login(&self, login: &str) -> Result<Account, StoreError>;
}

/// Snippets keyed by id, with a per-owner index in creation order and
/// TTL-based expiry.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Store an anonymous snippet as `Unchecked` with `created_at = now`.
    async fn create_snippet(&self, snippet: NewSnippet) -> Result<SnippetId, StoreError>;

    /// Store a snippet and append its id to the owner's index.
    async fn create_snippet_with_owner(&self, snippet: NewSnippet, owner: AccountId)
    -> Result<SnippetId, StoreError>;

    /// # Errors
    ///
    /// `NotFound` if the snippet never existed or has expired.
    async fn get_snippet_by_id(&self, id: SnippetId) -> Result<Snippet, StoreError>;

    /// Unexpired ids owned by `owner`, oldest first. Empty if none.
    async fn get_owned_snippet_ids(&self, owner: AccountId) -> Result<Vec<SnippetId>, StoreError>;

    /// Move an `Unchecked` snippet to `Checked`. Already-checked snippets keep
    /// their first verdict.
    ///
    /// # Errors
    ///
    /// `NotFound` if the snippet expired or never existed. Callers racing
    /// expiry must treat this as benign.
    async fn set_status(&self, id: SnippetId, correct: bool, message: &str) -> Result<(), StoreError>;

    /// Remove every snippet with `created_at + ttl <= now` from the primary
    /// map and all owner indexes. Returns how many were removed.
    async fn delete_expired_snippets(&self) -> Result<u64, StoreError>;
}
