//! Signed, time-limited bearer tokens.
//!
//! ARCHITECTURE
//! ============
//! Tokens are compact JWS strings (`header.claims.signature`, base64url, no
//! padding) signed with Ed25519. The claims carry the account id and an
//! absolute expiry in unix seconds. Verification needs only the public key,
//! so a [`TokenVerifier`] can be handed to any component without access to
//! the credential store or the signing key.
//!
//! TRADE-OFFS
//! ==========
//! Verification is stateless: there is no revocation list, and a valid,
//! unexpired token is accepted even if its account no longer exists.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::store::AccountId;

const TOKEN_HEADER: &str = r#"{"alg":"EdDSA","typ":"JWT"}"#;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("signing key file {path}: {reason}")]
    KeyFile { path: String, reason: String },
}

impl ErrorCode for TokenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::KeyFile { .. } => "E_SIGNING_KEY",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: AccountId,
    exp: i64,
}

fn now_secs() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_secs()).unwrap_or(i64::MAX)
}

// =============================================================================
// KEYS
// =============================================================================

/// Generate a fresh random signing key.
#[must_use]
pub fn generate_signing_key() -> SigningKey {
    let seed: [u8; 32] = rand::rng().random();
    SigningKey::from_bytes(&seed)
}

/// Load the signing key seed from `path`, creating it if the file is missing.
///
/// The file holds the 32-byte Ed25519 seed as base64url without padding.
/// With no path the key is ephemeral and tokens die with the process.
///
/// # Errors
///
/// Returns `KeyFile` if an existing file is unreadable or malformed, or if a
/// new key cannot be written. This is a startup failure, never a per-call one.
pub fn load_or_generate_signing_key(path: Option<&Path>) -> Result<SigningKey, TokenError> {
    let Some(path) = path else {
        warn!("TOKEN_KEY_FILE not set; using an ephemeral signing key");
        return Ok(generate_signing_key());
    };
    let key_file_error = |reason: String| TokenError::KeyFile { path: path.display().to_string(), reason };

    if !path.exists() {
        let key = generate_signing_key();
        std::fs::write(path, URL_SAFE_NO_PAD.encode(key.to_bytes())).map_err(|e| key_file_error(e.to_string()))?;
        info!(path = %path.display(), "generated new token signing key");
        return Ok(key);
    }

    let raw = std::fs::read_to_string(path).map_err(|e| key_file_error(e.to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(raw.trim())
        .map_err(|e| key_file_error(e.to_string()))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| key_file_error("seed must be 32 bytes".into()))?;
    info!(path = %path.display(), "loaded token signing key");
    Ok(SigningKey::from_bytes(&seed))
}

// =============================================================================
// VERIFIER
// =============================================================================

/// Public-key-only half of the token scheme.
#[derive(Clone)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Resolve a token to its account id.
    ///
    /// # Errors
    ///
    /// `InvalidToken` if the token is malformed, its signature does not
    /// verify, or it has expired.
    pub fn user_id_by_token(&self, token: &str) -> Result<AccountId, TokenError> {
        self.user_id_by_token_at(token, now_secs())
    }

    fn user_id_by_token_at(&self, token: &str, now: i64) -> Result<AccountId, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::InvalidToken);
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != "EdDSA" {
            return Err(TokenError::InvalidToken);
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::InvalidToken)?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|_| TokenError::InvalidToken)?;
        let message = &token[..header_b64.len() + 1 + claims_b64.len()];
        self.key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidToken)?;

        let claims: Claims = decode_json(claims_b64)?;
        if now >= claims.exp {
            return Err(TokenError::InvalidToken);
        }
        Ok(claims.sub)
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| TokenError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::InvalidToken)
}

// =============================================================================
// SERVICE
// =============================================================================

/// Issues tokens with the private key; verifies through its [`TokenVerifier`].
pub struct TokenService {
    signing_key: SigningKey,
    verifier: TokenVerifier,
}

impl TokenService {
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        let verifier = TokenVerifier::new(signing_key.verifying_key());
        Self { signing_key, verifier }
    }

    /// Issue a token for `account_id` that expires `ttl` from now.
    ///
    /// Expiry has one-second granularity; a sub-second `ttl` yields a token
    /// that is already expired.
    #[must_use]
    pub fn issue_token(&self, account_id: AccountId, ttl: Duration) -> String {
        self.issue_token_at(account_id, ttl, now_secs())
    }

    fn issue_token_at(&self, account_id: AccountId, ttl: Duration, now: i64) -> String {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = serde_json::json!({
            "sub": account_id,
            "iat": now,
            "exp": now.saturating_add(ttl_secs),
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(TOKEN_HEADER);
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
        let message = format!("{header_b64}.{claims_b64}");
        let signature = self.signing_key.sign(message.as_bytes());
        format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    /// # Errors
    ///
    /// See [`TokenVerifier::user_id_by_token`].
    pub fn user_id_by_token(&self, token: &str) -> Result<AccountId, TokenError> {
        self.verifier.user_id_by_token(token)
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
