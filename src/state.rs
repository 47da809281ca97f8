//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the two request-facing services. Stores, keys, and the lint
//! pool are wired in `main` and reached only through these services.

use std::sync::Arc;

use crate::services::account::AccountService;
use crate::services::snippet::SnippetService;

/// Clone is required by Axum; every field is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub snippets: Arc<SnippetService>,
}

impl AppState {
    #[must_use]
    pub fn new(accounts: AccountService, snippets: SnippetService) -> Self {
        Self { accounts: Arc::new(accounts), snippets: Arc::new(snippets) }
    }
}
