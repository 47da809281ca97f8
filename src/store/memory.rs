//! In-memory store backends.
//!
//! DESIGN
//! ======
//! Each store wraps its maps in a single `RwLock`. Writers (create, status
//! update, sweep) take the write half, so they are mutually exclusive with
//! everything else; lookups share the read half.
//!
//! Lock poisoning is ignored: every critical section leaves the maps
//! consistent before it can panic, so the data behind a poisoned lock is
//! still valid.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    Account, AccountId, CredentialStore, NewAccount, NewSnippet, Snippet, SnippetId, SnippetStatus, SnippetStore,
    StoreError,
};

// =============================================================================
// CREDENTIALS
// =============================================================================

#[derive(Default)]
struct AccountsInner {
    by_id: HashMap<AccountId, Account>,
    id_by_login: HashMap<String, AccountId>,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<AccountsInner>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AccountsInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AccountsInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.write();
        let Entry::Vacant(slot) = inner.id_by_login.entry(account.login.clone()) else {
            return Err(StoreError::AlreadyExists);
        };

        let id = Uuid::new_v4();
        slot.insert(id);
        let record = Account { id, login: account.login, password_hash: account.password_hash };
        inner.by_id.insert(id, record.clone());
        Ok(record)
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        self.read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_account_by_login(&self, login: &str) -> Result<Account, StoreError> {
        let inner = self.read();
        inner
            .id_by_login
            .get(login)
            .and_then(|id| inner.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// SNIPPETS
// =============================================================================

#[derive(Default)]
struct SnippetsInner {
    snippets: HashMap<SnippetId, Snippet>,
    /// Owner -> owned snippet ids in creation order.
    owned: HashMap<AccountId, Vec<SnippetId>>,
}

#[derive(Default)]
pub struct MemorySnippetStore {
    inner: RwLock<SnippetsInner>,
}

impl MemorySnippetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SnippetsInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SnippetsInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, snippet: NewSnippet, owner: Option<AccountId>) -> SnippetId {
        let id = Uuid::new_v4();
        let record = Snippet {
            id,
            code: snippet.code,
            language: snippet.language,
            owner_id: owner,
            created_at: OffsetDateTime::now_utc(),
            ttl: snippet.ttl,
            status: SnippetStatus::Unchecked,
        };

        let mut inner = self.write();
        inner.snippets.insert(id, record);
        if let Some(owner) = owner {
            inner.owned.entry(owner).or_default().push(id);
        }
        id
    }

    fn get_at(&self, id: SnippetId, now: OffsetDateTime) -> Result<Snippet, StoreError> {
        self.read()
            .snippets
            .get(&id)
            .filter(|s| !s.is_expired_at(now))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn owned_ids_at(&self, owner: AccountId, now: OffsetDateTime) -> Vec<SnippetId> {
        let inner = self.read();
        let Some(ids) = inner.owned.get(&owner) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|id| inner.snippets.get(*id).is_some_and(|s| !s.is_expired_at(now)))
            .copied()
            .collect()
    }

    fn set_status_at(&self, id: SnippetId, correct: bool, message: &str, now: OffsetDateTime) -> Result<(), StoreError> {
        let mut inner = self.write();
        let snippet = inner
            .snippets
            .get_mut(&id)
            .filter(|s| !s.is_expired_at(now))
            .ok_or(StoreError::NotFound)?;

        // EDGE: Checked is terminal; a second verdict is ignored.
        if !snippet.status.is_checked() {
            snippet.status = SnippetStatus::Checked { correct, message: message.to_owned() };
        }
        Ok(())
    }

    fn delete_expired_at(&self, now: OffsetDateTime) -> u64 {
        let mut inner = self.write();
        let before = inner.snippets.len();
        inner.snippets.retain(|_, s| !s.is_expired_at(now));
        let removed = before - inner.snippets.len();
        if removed == 0 {
            return 0;
        }

        let SnippetsInner { snippets, owned } = &mut *inner;
        owned.retain(|_, ids| {
            ids.retain(|id| snippets.contains_key(id));
            !ids.is_empty()
        });

        debug!(removed, "expired snippets swept");
        removed as u64
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn create_snippet(&self, snippet: NewSnippet) -> Result<SnippetId, StoreError> {
        Ok(self.insert(snippet, None))
    }

    async fn create_snippet_with_owner(
        &self,
        snippet: NewSnippet,
        owner: AccountId,
    ) -> Result<SnippetId, StoreError> {
        Ok(self.insert(snippet, Some(owner)))
    }

    async fn get_snippet_by_id(&self, id: SnippetId) -> Result<Snippet, StoreError> {
        self.get_at(id, OffsetDateTime::now_utc())
    }

    async fn get_owned_snippet_ids(&self, owner: AccountId) -> Result<Vec<SnippetId>, StoreError> {
        Ok(self.owned_ids_at(owner, OffsetDateTime::now_utc()))
    }

    async fn set_status(&self, id: SnippetId, correct: bool, message: &str) -> Result<(), StoreError> {
        self.set_status_at(id, correct, message, OffsetDateTime::now_utc())
    }

    async fn delete_expired_snippets(&self) -> Result<u64, StoreError> {
        Ok(self.delete_expired_at(OffsetDateTime::now_utc()))
    }
}

#[cfg(test)]
impl MemorySnippetStore {
    /// Number of snippets physically held, expired or not.
    pub(crate) fn stored_len(&self) -> usize {
        self.read().snippets.len()
    }

    /// Owner index entry as stored, without expiry filtering.
    pub(crate) fn raw_owned_ids(&self, owner: AccountId) -> Vec<SnippetId> {
        self.read().owned.get(&owner).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
