//! Snippet service: creation with language and TTL rules, lazy expiry on
//! reads, and hand-off to the lint pipeline.
//!
//! DESIGN
//! ======
//! Expired snippets are swept at the start of every read and listing call
//! rather than on a timer. Creation persists first and only then queues the
//! check, so a worker never sees an id the store does not know.
//!
//! ERROR HANDLING
//! ==============
//! Language validation happens before storage. A failure to queue the check
//! is logged and the snippet stays `Unchecked`; the create still succeeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::env_parse;
use crate::error::ErrorCode;
use crate::services::lint::{CheckRequest, LintQueue};
use crate::store::{AccountId, NewSnippet, Snippet, SnippetId, SnippetStore, StoreError};

/// Languages a snippet may declare, matched case-insensitively.
pub const SUPPORTED_LANGUAGES: &[&str] =
    &["Python", "JavaScript", "Java", "Kotlin", "C#", "C", "C++", "PHP", "Swift", "Go", "Rust", "PETOOH"];

const DEFAULT_SNIPPET_TTL_SECS: u64 = 3600;
const DEFAULT_SNIPPET_MAX_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("snippet not found")]
    NotFound,
    #[error(transparent)]
    Storage(StoreError),
}

impl ErrorCode for SnippetError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage(_) => "E_UNSUPPORTED_LANGUAGE",
            Self::NotFound => "E_SNIPPET_NOT_FOUND",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.retryable())
    }
}

impl From<StoreError> for SnippetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Who is creating a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Account(AccountId),
}

/// TTL applied when the caller gives none, and the ceiling for requested TTLs.
#[derive(Debug, Clone, Copy)]
pub struct SnippetLimits {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl SnippetLimits {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            default_ttl: Duration::from_secs(env_parse("SNIPPET_DEFAULT_TTL_SECS", DEFAULT_SNIPPET_TTL_SECS)),
            max_ttl: Duration::from_secs(env_parse("SNIPPET_MAX_TTL_SECS", DEFAULT_SNIPPET_MAX_TTL_SECS)),
        }
    }

    /// Zero or absent becomes the default; anything above the maximum is clamped.
    #[must_use]
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(ttl) if !ttl.is_zero() => ttl.min(self.max_ttl),
            _ => self.default_ttl.min(self.max_ttl),
        }
    }
}

impl Default for SnippetLimits {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_SNIPPET_TTL_SECS),
            max_ttl: Duration::from_secs(DEFAULT_SNIPPET_MAX_TTL_SECS),
        }
    }
}

/// Check `language` against [`SUPPORTED_LANGUAGES`].
///
/// # Errors
///
/// `UnsupportedLanguage` carrying the caller's spelling.
pub fn validate_language(language: &str) -> Result<(), SnippetError> {
    if SUPPORTED_LANGUAGES.iter().any(|l| l.eq_ignore_ascii_case(language)) {
        Ok(())
    } else {
        Err(SnippetError::UnsupportedLanguage(language.to_owned()))
    }
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct SnippetService {
    store: Arc<dyn SnippetStore>,
    lint: LintQueue,
    limits: SnippetLimits,
}

impl SnippetService {
    #[must_use]
    pub fn new(store: Arc<dyn SnippetStore>, lint: LintQueue, limits: SnippetLimits) -> Self {
        Self { store, lint, limits }
    }

    /// Store a snippet and queue its lint check. Returns once the check is
    /// queued, never waiting for its result.
    ///
    /// # Errors
    ///
    /// `UnsupportedLanguage` before any write, or `Storage`.
    pub async fn create_snippet(
        &self,
        caller: Caller,
        code: String,
        language: Option<String>,
        ttl: Option<Duration>,
    ) -> Result<SnippetId, SnippetError> {
        let language = language.filter(|l| !l.is_empty());
        if let Some(lang) = &language {
            validate_language(lang)?;
        }
        let ttl = self.limits.effective_ttl(ttl);
        let snippet = NewSnippet { code: code.clone(), language: language.clone(), ttl };

        let snippet_id = match caller {
            Caller::Anonymous => self.store.create_snippet(snippet).await?,
            Caller::Account(owner) => self.store.create_snippet_with_owner(snippet, owner).await?,
        };
        info!(
            %snippet_id,
            owner = ?caller,
            language = language.as_deref().unwrap_or("-"),
            code_len = code.len(),
            ttl_secs = ttl.as_secs(),
            "snippet created"
        );

        match self.lint.enqueue(CheckRequest { snippet_id, code, language }).await {
            Ok(()) => debug!(%snippet_id, "lint check queued"),
            Err(e) => warn!(%snippet_id, error = %e, "lint check not queued; snippet stays unchecked"),
        }
        Ok(snippet_id)
    }

    /// # Errors
    ///
    /// `NotFound` if the snippet never existed or has expired.
    pub async fn get_snippet_by_id(&self, id: SnippetId) -> Result<Snippet, SnippetError> {
        self.sweep().await?;
        Ok(self.store.get_snippet_by_id(id).await?)
    }

    /// Unexpired snippets owned by `owner`, oldest first.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    pub async fn get_owned_snippet_ids(&self, owner: AccountId) -> Result<Vec<SnippetId>, SnippetError> {
        self.sweep().await?;
        Ok(self.store.get_owned_snippet_ids(owner).await?)
    }

    async fn sweep(&self) -> Result<(), SnippetError> {
        self.store.delete_expired_snippets().await.map_err(SnippetError::Storage)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "snippet_test.rs"]
mod tests;
