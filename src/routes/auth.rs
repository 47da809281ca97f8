//! Auth routes: signup, signin, and the bearer-token extractors.

use axum::Json;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Serialize;

use super::ApiError;
use crate::services::account::{AccountError, Credentials};
use crate::state::AppState;
use crate::store::AccountId;

pub(crate) fn account_error_to_status(err: &AccountError) -> StatusCode {
    match err {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        AccountError::AlreadyExists => StatusCode::CONFLICT,
        AccountError::NotFound => StatusCode::NOT_FOUND,
        AccountError::InvalidLogin | AccountError::InvalidPassword | AccountError::InvalidToken => {
            StatusCode::UNAUTHORIZED
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn account_error(err: &AccountError) -> ApiError {
    ApiError::new(account_error_to_status(err), err)
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// The token from an `Authorization: Bearer <token>` header.
///
/// `Ok(None)` when the header is absent, `Err` when it is present but not a
/// bearer credential.
pub(crate) fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("malformed authorization header"))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(ApiError::unauthorized("expected a bearer token")),
    }
}

/// Authenticated account. Use as a handler parameter to require a token.
pub struct AuthUser {
    pub account_id: AccountId,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
        let app_state = AppState::from_ref(state);
        let account_id = app_state.accounts.authenticate(token).map_err(|e| account_error(&e))?;
        Ok(Self { account_id })
    }
}

/// Account if a token was sent, `None` for anonymous callers. A token that
/// is sent but invalid is still rejected.
pub struct MaybeAuthUser(pub Option<AccountId>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(Self(None));
        };
        let app_state = AppState::from_ref(state);
        let account_id = app_state.accounts.authenticate(token).map_err(|e| account_error(&e))?;
        Ok(Self(Some(account_id)))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Serialize)]
pub struct SignupResponse {
    pub id: AccountId,
}

#[derive(Serialize)]
pub struct SigninResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub login: String,
}

/// `POST /api/signup`
pub async fn signup(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let account = state
        .accounts
        .create_account(credentials)
        .await
        .map_err(|e| account_error(&e))?;
    Ok((StatusCode::CREATED, Json(SignupResponse { id: account.id })))
}

/// `POST /api/signin`
pub async fn signin(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SigninResponse>, ApiError> {
    let token = state
        .accounts
        .login_to_account(credentials)
        .await
        .map_err(|e| account_error(&e))?;
    Ok(Json(SigninResponse { token }))
}

/// `GET /api/account`: the caller's own account. A valid token for an
/// account the store no longer knows is 404.
pub async fn account(State(state): State<AppState>, auth: AuthUser) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .accounts
        .get_account_by_id(auth.account_id)
        .await
        .map_err(|e| account_error(&e))?;
    Ok(Json(AccountResponse { id: account.id, login: account.login }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
