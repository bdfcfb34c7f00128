//! # DomainError
//!
//! Centralized error handling for the Rusty-Forum ecosystem.
//! Every port and service returns this type; transports map it to a status code.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing/empty required field or malformed value. The message names the field.
    #[error("{0}")]
    Validation(String),

    /// Resource not found (e.g., thread, comment, account)
    #[error("{0} '{1}' not found")]
    NotFound(String, String),

    /// Credential or session failure. Messages for credential mismatches stay vague.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not the owner of the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Resource already exists (e.g., duplicate username or thread title)
    #[error("{0}")]
    Conflict(String),

    /// A store call did not complete in time, or the backend is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Infrastructure failure (e.g., DB error, disk error)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &str, key: impl Into<String>) -> Self {
        Self::NotFound(entity.to_string(), key.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// True for failures worth retrying (timeouts, lost connections).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A specialized Result type for Rusty-Forum logic.
pub type Result<T> = std::result::Result<T, DomainError>;
