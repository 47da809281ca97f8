//! Records persisted by the credential and snippet stores.

use std::time::Duration;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type SnippetId = Uuid;

// =============================================================================
// ACCOUNTS
// =============================================================================

/// A registered account. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    /// bcrypt hash in modular crypt format. Never the plaintext password.
    pub password_hash: String,
}

/// Input to `CredentialStore::create_account`. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    pub password_hash: String,
}

// =============================================================================
// SNIPPETS
// =============================================================================

/// Lint verdict attached to a snippet. `Checked` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SnippetStatus {
    Unchecked,
    Checked { correct: bool, message: String },
}

impl SnippetStatus {
    #[must_use]
    pub fn is_checked(&self) -> bool {
        matches!(self, Self::Checked { .. })
    }
}

/// Input to `SnippetStore::create_snippet*`. Id, timestamp and status are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSnippet {
    pub code: String,
    pub language: Option<String>,
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: SnippetId,
    pub code: String,
    pub language: Option<String>,
    pub owner_id: Option<AccountId>,
    pub created_at: OffsetDateTime,
    pub ttl: Duration,
    pub status: SnippetStatus,
}

impl Snippet {
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        expires_at(self.created_at, self.ttl)
    }

    /// A snippet is expired once `created_at + ttl <= now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at() <= now
    }
}

/// `created_at + ttl`, saturating at the largest representable date.
#[must_use]
pub fn expires_at(created_at: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
    time::Duration::try_from(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add(ttl))
        .unwrap_or_else(|| Date::MAX.midnight().assume_utc())
}
