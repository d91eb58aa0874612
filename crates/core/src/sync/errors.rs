//! Error types of the synchronization engine

use koppeling_domain::ApiError;
use thiserror::Error;

/// Failure converting Recras invoice lines into sales entry lines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("no revenue account for product {product_id}")]
    NoRevenueAccount { product_id: i64 },

    #[error("no VAT code for percentage {percentage}")]
    NoVatCode { percentage: f64 },

    #[error(transparent)]
    Resolve(#[from] ApiError),
}

impl MappingError {
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Resolve(err) => err.is_fatal(),
            _ => false,
        }
    }
}

/// Failure inside a tenant run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("journal `{code}` not found in division {division}")]
    MissingJournal { code: String, division: i64 },

    #[error("synchronization cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether the tenant run must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Api(err) => err.is_fatal(),
            Self::Mapping(err) => err.is_fatal(),
            Self::MissingJournal { .. } => false,
            Self::Cancelled => true,
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
