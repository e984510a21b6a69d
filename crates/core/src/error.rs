//! Domain error model.

use thiserror::Error;

/// Result type used across the report domain.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only deterministic failures live here (bad identifiers, unknown statuses,
/// malformed image references). Storage and inference failures belong to the
/// crates that own those concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A status string did not name a known report status.
    #[error("unknown report status: {0}")]
    UnknownStatus(String),

    /// An image reference was empty or otherwise unusable.
    #[error("invalid image reference: {0}")]
    InvalidImageRef(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_image_ref(msg: impl Into<String>) -> Self {
        Self::InvalidImageRef(msg.into())
    }
}
