//! Router assembly and the JSON error envelope.
//!
//! SYSTEM CONTEXT
//! ==============
//! Thin HTTP surface over `AccountService` and `SnippetService`. Handlers
//! decode the request, call one service operation, and translate its error
//! kind into a status code exactly once via the `*_error_to_status`
//! functions in the route modules.

pub mod auth;
pub mod snippets;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::ErrorCode;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/signin", post(auth::signin))
        .route("/api/account", get(auth::account))
        .route("/api/snippets", post(snippets::create_snippet))
        .route("/api/snippets/mine", get(snippets::my_snippets))
        .route("/api/snippets/{id}", get(snippets::get_snippet))
        .route("/api/snippets/{id}/raw", get(snippets::get_snippet_raw))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERROR ENVELOPE
// =============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    retryable: bool,
}

/// A service error rendered as `{ "code", "message", "retryable" }` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// Internal failures are logged here and reach the client without detail.
    pub fn new(status: StatusCode, err: &impl ErrorCode) -> Self {
        let message = if status.is_server_error() {
            error!(code = err.error_code(), error = %err, "request failed");
            "internal error".to_owned()
        } else {
            err.to_string()
        };
        Self { status, body: ErrorBody { code: err.error_code(), message, retryable: err.retryable() } }
    }

    pub(crate) fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody { code: "E_UNAUTHORIZED", message: message.to_owned(), retryable: false },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support;
