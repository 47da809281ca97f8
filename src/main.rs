mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::services::account::AccountService;
use crate::services::lint::{LintPool, build_linter};
use crate::services::snippet::SnippetService;
use crate::services::token::{TokenService, load_or_generate_signing_key};
use crate::store::{
    CredentialStore, MemoryCredentialStore, MemorySnippetStore, PgCredentialStore, PgSnippetStore, SnippetStore,
};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codeswamp=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();

    let credentials: Arc<dyn CredentialStore>;
    let snippet_store: Arc<dyn SnippetStore>;
    if let Some(database_url) = &config.database_url {
        let pool = db::init_pool(database_url, config.db_max_connections)
            .await
            .expect("database init failed");
        tracing::info!(max_connections = config.db_max_connections, "using postgres stores");
        credentials = Arc::new(PgCredentialStore::new(pool.clone()));
        snippet_store = Arc::new(PgSnippetStore::new(pool));
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores");
        credentials = Arc::new(MemoryCredentialStore::new());
        snippet_store = Arc::new(MemorySnippetStore::new());
    }

    let signing_key = load_or_generate_signing_key(config.token_key_file.as_deref()).expect("token signing key");
    let tokens = Arc::new(TokenService::new(signing_key));

    let lint = LintPool::spawn(&config.lint, build_linter(&config.lint), snippet_store.clone());

    let accounts = AccountService::new(credentials, tokens, config.token_ttl, config.bcrypt_cost);
    let snippets = SnippetService::new(snippet_store, lint.queue(), config.snippets);
    let app = routes::app(state::AppState::new(accounts, snippets));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "codeswamp listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    lint.shutdown().await;
    tracing::info!("codeswamp stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
