//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation,
/// stock/transfer rules, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A tenant-scoped resource was not found (`"stock"`, `"transfer"`, ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Quantity was zero/negative where positive is required, or negative
    /// where non-negative is required.
    #[error("invalid quantity")]
    InvalidQuantity,

    /// The change would leave reserved quantity above total quantity.
    #[error("reserved quantity cannot exceed total quantity")]
    InvalidReservedAmount,

    /// Available quantity is lower than the requested amount.
    #[error("insufficient stock")]
    InsufficientStock,

    /// Same store on both sides, or a store not owned by the tenant.
    #[error("invalid transfer stores")]
    InvalidTransferStores,

    #[error("transfer is not pending")]
    TransferNotPending,

    #[error("transfer is already completed")]
    TransferAlreadyCompleted,

    #[error("transfer is already cancelled")]
    TransferAlreadyCancelled,

    /// A value failed validation (e.g. empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A uniqueness or referential rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }
}
