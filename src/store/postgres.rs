//! Postgres store backends over the `accounts` and `snippets` tables.
//!
//! DESIGN
//! ======
//! Login uniqueness and snippet ownership live in the schema
//! (`UNIQUE (login)`, `owner_id REFERENCES accounts`), so every contract
//! operation maps to a single statement and Postgres provides the
//! serialization. The owner index is the `owner_id` column itself, so a
//! swept row can never leave a dangling index entry.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{
    Account, AccountId, CredentialStore, NewAccount, NewSnippet, Snippet, SnippetId, SnippetStatus, SnippetStore,
    StoreError,
};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Predicate shared by every read: the row has not reached its expiry.
const UNEXPIRED: &str = "created_at + lifetime > now()";

// =============================================================================
// CREDENTIALS
// =============================================================================

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account { id: row.get("id"), login: row.get("login"), password_hash: row.get("password_hash") }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO accounts (id, login, password_hash)
              VALUES ($1, $2, $3)
              ON CONFLICT (login) DO NOTHING
              RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&account.login)
        .bind(&account.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::AlreadyExists);
        };
        Ok(Account { id: row.get("id"), login: account.login, password_hash: account.password_hash })
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query("SELECT id, login, password_hash FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(account_from_row(&row))
    }

    async fn get_account_by_login(&self, login: &str) -> Result<Account, StoreError> {
        let row = sqlx::query("SELECT id, login, password_hash FROM accounts WHERE login = $1")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(account_from_row(&row))
    }
}

// =============================================================================
// SNIPPETS
// =============================================================================

#[derive(Clone)]
pub struct PgSnippetStore {
    pool: PgPool,
}

impl PgSnippetStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, snippet: NewSnippet, owner: Option<AccountId>) -> Result<SnippetId, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r"INSERT INTO snippets (id, code, language, owner_id, lifetime)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&snippet.code)
        .bind(&snippet.language)
        .bind(owner)
        .bind(lifetime_to_interval(snippet.ttl))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Lifetimes beyond what an interval can hold are capped; they are clamped
/// far below this by the snippet service anyway.
pub(crate) fn lifetime_to_interval(ttl: Duration) -> PgInterval {
    let micros = i64::try_from(ttl.as_micros()).unwrap_or(i64::MAX);
    PgInterval { months: 0, days: 0, microseconds: micros }
}

pub(crate) fn interval_to_lifetime(interval: &PgInterval) -> Duration {
    let micros = i64::from(interval.days)
        .saturating_mul(MICROS_PER_DAY)
        .saturating_add(interval.microseconds);
    Duration::from_micros(u64::try_from(micros).unwrap_or(0))
}

fn snippet_from_row(row: &PgRow) -> Snippet {
    let status = if row.get::<bool, _>("is_checked") {
        SnippetStatus::Checked { correct: row.get("is_correct"), message: row.get("message") }
    } else {
        SnippetStatus::Unchecked
    };
    let lifetime: PgInterval = row.get("lifetime");

    Snippet {
        id: row.get("id"),
        code: row.get("code"),
        language: row.get("language"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        ttl: interval_to_lifetime(&lifetime),
        status,
    }
}

#[async_trait]
impl SnippetStore for PgSnippetStore {
    async fn create_snippet(&self, snippet: NewSnippet) -> Result<SnippetId, StoreError> {
        self.insert(snippet, None).await
    }

    async fn create_snippet_with_owner(
        &self,
        snippet: NewSnippet,
        owner: AccountId,
    ) -> Result<SnippetId, StoreError> {
        self.insert(snippet, Some(owner)).await
    }

    async fn get_snippet_by_id(&self, id: SnippetId) -> Result<Snippet, StoreError> {
        let row = sqlx::query(&format!(
            r"SELECT id, code, language, owner_id, created_at, lifetime, is_checked, is_correct, message
              FROM snippets
              WHERE id = $1 AND {UNEXPIRED}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(snippet_from_row(&row))
    }

    async fn get_owned_snippet_ids(&self, owner: AccountId) -> Result<Vec<SnippetId>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(&format!(
            r"SELECT id FROM snippets
              WHERE owner_id = $1 AND {UNEXPIRED}
              ORDER BY seq"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn set_status(&self, id: SnippetId, correct: bool, message: &str) -> Result<(), StoreError> {
        // Only live rows count; `is_checked` guards the terminal state.
        let row = sqlx::query(&format!(
            r"WITH target AS (
                  SELECT id FROM snippets WHERE id = $1 AND {UNEXPIRED} FOR UPDATE
              ), updated AS (
                  UPDATE snippets s
                  SET is_checked = TRUE, is_correct = $2, message = $3
                  FROM target
                  WHERE s.id = target.id AND NOT s.is_checked
                  RETURNING s.id
              )
              SELECT EXISTS (SELECT 1 FROM target) AS found"
        ))
        .bind(id)
        .bind(correct)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        if row.get::<bool, _>("found") { Ok(()) } else { Err(StoreError::NotFound) }
    }

    async fn delete_expired_snippets(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM snippets WHERE created_at + lifetime <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
