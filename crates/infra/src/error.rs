//! Error type returned by repositories and inventory services.

use thiserror::Error;

use motico_core::DomainError;

pub type InventoryResult<T> = Result<T, InventoryError>;

/// A business-rule rejection or an infrastructure failure.
///
/// Domain errors are deterministic and never retried. Storage errors are
/// propagated unchanged so the caller decides on retry policy.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing store rejected or failed an operation.
    #[error("storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// The backing store could not be reached (pool closed, timeout, IO).
    #[error("storage unavailable in {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },
}

impl InventoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    /// The domain rejection, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            InventoryError::Domain(e) => Some(e),
            _ => None,
        }
    }
}
