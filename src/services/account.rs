//! Account service: signup, login, and token-to-account resolution.
//!
//! DESIGN
//! ======
//! Login and password rules are checked before any storage call, so a
//! rejected request never leaves partial state. Passwords are hashed with
//! bcrypt on the blocking pool; only the hash reaches the credential store.
//!
//! ERROR HANDLING
//! ==============
//! Each validation rule has its own error variant so the HTTP layer can
//! render a specific message. A login that does not exist and a wrong
//! password are distinct kinds (`InvalidLogin` vs `InvalidPassword`).

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::services::token::{TokenError, TokenService};
use crate::store::{Account, AccountId, CredentialStore, NewAccount, StoreError};

pub const MIN_LOGIN_LENGTH: usize = 6;
pub const MAX_LOGIN_LENGTH: usize = 30;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 40;

// =============================================================================
// TYPES
// =============================================================================

/// Signup and signin input. Never stored or logged.
#[derive(Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("login must contain only letters and digits")]
    LoginInvalidCharacter,
    #[error("login must start with a letter")]
    LoginMustStartWithLetter,
    #[error("login must be at least {} characters", MIN_LOGIN_LENGTH)]
    LoginTooShort,
    #[error("login must be at most {} characters", MAX_LOGIN_LENGTH)]
    LoginTooLong,
    #[error("password must contain only letters and digits")]
    PasswordInvalidCharacter,
    #[error("password must be at least {} characters", MIN_PASSWORD_LENGTH)]
    PasswordTooShort,
    #[error("password must be at most {} characters", MAX_PASSWORD_LENGTH)]
    PasswordTooLong,
    #[error("password must contain a lowercase letter")]
    PasswordMissingLowercase,
    #[error("password must contain an uppercase letter")]
    PasswordMissingUppercase,
    #[error("password must contain a digit")]
    PasswordMissingDigit,
    #[error("login already registered")]
    AlreadyExists,
    #[error("account not found")]
    NotFound,
    #[error("unknown login")]
    InvalidLogin,
    #[error("wrong password")]
    InvalidPassword,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Storage(StoreError),
}

impl ErrorCode for AccountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LoginInvalidCharacter => "E_LOGIN_INVALID_CHARACTER",
            Self::LoginMustStartWithLetter => "E_LOGIN_MUST_START_WITH_LETTER",
            Self::LoginTooShort => "E_LOGIN_TOO_SHORT",
            Self::LoginTooLong => "E_LOGIN_TOO_LONG",
            Self::PasswordInvalidCharacter => "E_PASSWORD_INVALID_CHARACTER",
            Self::PasswordTooShort => "E_PASSWORD_TOO_SHORT",
            Self::PasswordTooLong => "E_PASSWORD_TOO_LONG",
            Self::PasswordMissingLowercase => "E_PASSWORD_MISSING_LOWERCASE",
            Self::PasswordMissingUppercase => "E_PASSWORD_MISSING_UPPERCASE",
            Self::PasswordMissingDigit => "E_PASSWORD_MISSING_DIGIT",
            Self::AlreadyExists => "E_ALREADY_EXISTS",
            Self::NotFound => "E_ACCOUNT_NOT_FOUND",
            Self::InvalidLogin => "E_INVALID_LOGIN",
            Self::InvalidPassword => "E_INVALID_PASSWORD",
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::Hashing(_) => "E_HASHING",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.retryable())
    }
}

impl AccountError {
    /// True for the format-rule variants checked before any storage call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::LoginInvalidCharacter
                | Self::LoginMustStartWithLetter
                | Self::LoginTooShort
                | Self::LoginTooLong
                | Self::PasswordInvalidCharacter
                | Self::PasswordTooShort
                | Self::PasswordTooLong
                | Self::PasswordMissingLowercase
                | Self::PasswordMissingUppercase
                | Self::PasswordMissingDigit
        )
    }
}

impl From<TokenError> for AccountError {
    fn from(_: TokenError) -> Self {
        Self::InvalidToken
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Unicode letter. Letter-numbers such as 'Ⅷ' are alphabetic but not letters.
fn is_letter(c: char) -> bool {
    c.is_alphabetic() && !c.is_numeric()
}

/// Decimal digit `0-9`. Fractions and roman numerals do not count.
fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_letter_or_digit(c: char) -> bool {
    is_letter(c) || is_digit(c)
}

/// First character, then character classes, then length.
///
/// # Errors
///
/// The first rule the login breaks.
pub fn validate_login(login: &str) -> Result<(), AccountError> {
    if login.chars().next().is_some_and(|c| !is_letter(c)) {
        return Err(AccountError::LoginMustStartWithLetter);
    }
    if !login.chars().all(is_letter_or_digit) {
        return Err(AccountError::LoginInvalidCharacter);
    }
    let len = login.chars().count();
    if len < MIN_LOGIN_LENGTH {
        return Err(AccountError::LoginTooShort);
    }
    if len > MAX_LOGIN_LENGTH {
        return Err(AccountError::LoginTooLong);
    }
    Ok(())
}

/// Character classes, then length, then lowercase, uppercase and digit
/// presence in that order.
///
/// # Errors
///
/// The first rule the password breaks.
pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if !password.chars().all(is_letter_or_digit) {
        return Err(AccountError::PasswordInvalidCharacter);
    }
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AccountError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AccountError::PasswordTooLong);
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(AccountError::PasswordMissingLowercase);
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(AccountError::PasswordMissingUppercase);
    }
    if !password.chars().any(is_digit) {
        return Err(AccountError::PasswordMissingDigit);
    }
    Ok(())
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AccountService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        token_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self { store, tokens, token_ttl, bcrypt_cost }
    }

    /// Validate, hash, and store a new account.
    ///
    /// # Errors
    ///
    /// A validation variant, `AlreadyExists` if the login is taken, or
    /// `Hashing`/`Storage` on internal failure.
    pub async fn create_account(&self, credentials: Credentials) -> Result<Account, AccountError> {
        validate_login(&credentials.login)?;
        validate_password(&credentials.password)?;

        let password_hash = hash_password(credentials.password, self.bcrypt_cost).await?;
        let account = self
            .store
            .create_account(NewAccount { login: credentials.login, password_hash })
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => AccountError::AlreadyExists,
                other => AccountError::Storage(other),
            })?;

        info!(account_id = %account.id, login = %account.login, "account created");
        Ok(account)
    }

    /// Check credentials and issue a bearer token.
    ///
    /// # Errors
    ///
    /// A validation variant, `InvalidLogin` for an unknown login,
    /// `InvalidPassword` on hash mismatch.
    pub async fn login_to_account(&self, credentials: Credentials) -> Result<String, AccountError> {
        validate_login(&credentials.login)?;
        validate_password(&credentials.password)?;

        let account = match self.store.get_account_by_login(&credentials.login).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                warn!(login = %credentials.login, "login failed: unknown login");
                return Err(AccountError::InvalidLogin);
            }
            Err(e) => return Err(AccountError::Storage(e)),
        };

        if !verify_password(credentials.password, account.password_hash).await? {
            warn!(account_id = %account.id, "login failed: wrong password");
            return Err(AccountError::InvalidPassword);
        }

        info!(account_id = %account.id, "login succeeded");
        Ok(self.tokens.issue_token(account.id, self.token_ttl))
    }

    /// # Errors
    ///
    /// `InvalidToken` if the token is malformed, forged, or expired.
    pub fn authenticate(&self, token: &str) -> Result<AccountId, AccountError> {
        Ok(self.tokens.user_id_by_token(token)?)
    }

    /// # Errors
    ///
    /// `NotFound` if no account has this id.
    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store.get_account_by_id(id).await.map_err(|e| match e {
            StoreError::NotFound => AccountError::NotFound,
            other => AccountError::Storage(other),
        })
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
