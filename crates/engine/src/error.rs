//! Error types for Fingertrust engine operations.
//!
//! The variants mirror the taxonomy enforced at the HTTP boundary:
//! validation failures are rejected before any storage or classifier call,
//! authentication failures are distinct from validation, and upstream
//! failures (store, classifier) carry internal detail that must only be
//! logged, never returned verbatim to a caller.

use thiserror::Error;

/// Errors that can occur in trust-decision operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed input, rejected before touching storage
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown email or password hash mismatch. Deliberately carries no
    /// detail so callers cannot distinguish the two cases.
    #[error("invalid email or password")]
    Credentials,

    /// Session token missing from the store or expired
    #[error("invalid or expired session")]
    InvalidSession,

    /// Signup attempted with an email that already has an account
    #[error("account already exists: {email}")]
    DuplicateEmail { email: String },

    /// Account store lookup or persistence failure
    #[error("account store error: {0}")]
    Store(String),

    /// Classifier transport failure or malformed classifier response
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
