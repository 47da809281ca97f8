//! Shared error plumbing.
//!
//! Every service error enum implements [`ErrorCode`] so the HTTP boundary can
//! render a stable, grepable code next to the human-readable message without
//! matching on message text.

/// Grepable error code and retryable flag for structured error responses.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
