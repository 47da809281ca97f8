//! Snippet routes: create, fetch, raw download, and the caller's own list.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::ApiError;
use super::auth::{AuthUser, MaybeAuthUser};
use crate::services::snippet::{Caller, SnippetError};
use crate::state::AppState;
use crate::store::{AccountId, Snippet, SnippetId, SnippetStatus};

pub(crate) fn snippet_error_to_status(err: &SnippetError) -> StatusCode {
    match err {
        SnippetError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
        SnippetError::NotFound => StatusCode::NOT_FOUND,
        SnippetError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn snippet_error(err: &SnippetError) -> ApiError {
    ApiError::new(snippet_error_to_status(err), err)
}

#[derive(Deserialize)]
pub struct CreateSnippetBody {
    pub code: String,
    pub language: Option<String>,
    pub ttl_secs: Option<u64>,
}

#[derive(Serialize)]
pub struct CreatedSnippet {
    pub id: SnippetId,
}

/// Snippet as returned to clients. Timestamps are unix seconds.
#[derive(Serialize)]
pub struct SnippetResponse {
    pub id: SnippetId,
    pub code: String,
    pub language: Option<String>,
    pub owner_id: Option<AccountId>,
    pub status: SnippetStatus,
    pub created_at: i64,
    pub expires_at: i64,
}

impl From<Snippet> for SnippetResponse {
    fn from(snippet: Snippet) -> Self {
        let expires_at = snippet.expires_at().unix_timestamp();
        Self {
            id: snippet.id,
            code: snippet.code,
            language: snippet.language,
            owner_id: snippet.owner_id,
            status: snippet.status,
            created_at: snippet.created_at.unix_timestamp(),
            expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct OwnedSnippets {
    pub ids: Vec<SnippetId>,
}

/// `POST /api/snippets`: anonymous unless a bearer token is sent.
pub async fn create_snippet(
    State(state): State<AppState>,
    MaybeAuthUser(account): MaybeAuthUser,
    Json(body): Json<CreateSnippetBody>,
) -> Result<Response, ApiError> {
    let caller = account.map_or(Caller::Anonymous, Caller::Account);
    let id = state
        .snippets
        .create_snippet(caller, body.code, body.language, body.ttl_secs.map(Duration::from_secs))
        .await
        .map_err(|e| snippet_error(&e))?;

    let location = format!("/api/snippets/{id}");
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(CreatedSnippet { id })).into_response())
}

/// `GET /api/snippets/{id}`
pub async fn get_snippet(
    State(state): State<AppState>,
    Path(id): Path<SnippetId>,
) -> Result<Json<SnippetResponse>, ApiError> {
    let snippet = state
        .snippets
        .get_snippet_by_id(id)
        .await
        .map_err(|e| snippet_error(&e))?;
    Ok(Json(snippet.into()))
}

/// `GET /api/snippets/{id}/raw`: the code body as plain text.
pub async fn get_snippet_raw(
    State(state): State<AppState>,
    Path(id): Path<SnippetId>,
) -> Result<Response, ApiError> {
    let snippet = state
        .snippets
        .get_snippet_by_id(id)
        .await
        .map_err(|e| snippet_error(&e))?;
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], snippet.code).into_response())
}

/// `GET /api/snippets/mine`
pub async fn my_snippets(State(state): State<AppState>, auth: AuthUser) -> Result<Json<OwnedSnippets>, ApiError> {
    let ids = state
        .snippets
        .get_owned_snippet_ids(auth.account_id)
        .await
        .map_err(|e| snippet_error(&e))?;
    Ok(Json(OwnedSnippets { ids }))
}

#[cfg(test)]
#[path = "snippets_test.rs"]
mod tests;
