//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Koppeling
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum KoppelingError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Koppeling operations
pub type Result<T> = std::result::Result<T, KoppelingError>;

/// Failure of a single call against the Recras or Exact Online API.
///
/// Callers match on the variant rather than on the message: `NotFound` drives
/// create-or-skip decisions, `Validation` stops a write before it is sent and
/// the fatal variants abort a tenant run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The lookup completed but returned no matching entity.
    #[error("{entity} not found for `{key}`")]
    NotFound { entity: String, key: String },

    /// A mandatory field was empty; nothing was sent.
    #[error("Field `{field}` on type `{entity}` is mandatory")]
    Validation { entity: String, field: String },

    /// The server answered with an unexpected status code.
    #[error("HTTP error {status} for {method} {url}: {body}")]
    Http { status: u16, method: String, url: String, body: String },

    /// The server could not be reached or the request timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials were rejected or the token could not be refreshed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The response body did not match the expected shape.
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// A division-scoped call was made without a division.
    #[error("Client has no division, resolve the current division first")]
    NoDivision,

    /// The tenant run was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Build a [`ApiError::NotFound`] for `entity` looked up by `key`.
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound { entity: entity.into(), key: key.to_string() }
    }

    /// Build a [`ApiError::Validation`] for an empty mandatory field.
    pub fn validation(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation { entity: entity.into(), field: field.into() }
    }

    /// Whether this is an expected "nothing matched" outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this failure must abort the whole tenant run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Transport(_) | Self::Cancelled)
    }
}

/// Result alias for API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<ApiError> for KoppelingError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound { .. } => Self::NotFound(err.to_string()),
            ApiError::Validation { .. } => Self::InvalidInput(err.to_string()),
            ApiError::Auth(msg) => Self::Auth(msg),
            ApiError::Transport(msg) => Self::Network(msg),
            ApiError::Http { .. } | ApiError::Decode(_) => Self::Network(err.to_string()),
            ApiError::NoDivision | ApiError::Cancelled => Self::Internal(err.to_string()),
        }
    }
}

impl From<KoppelingError> for ApiError {
    fn from(err: KoppelingError) -> Self {
        match err {
            KoppelingError::Network(msg) => Self::Transport(msg),
            KoppelingError::Auth(msg) => Self::Auth(msg),
            KoppelingError::NotFound(msg) => Self::NotFound { entity: "resource".into(), key: msg },
            other => Self::Transport(other.to_string()),
        }
    }
}
