//! Error types for ledger allocation.

use dlog_coord::CoordError;
use dlog_ledger::{LedgerError, StatusCode};
use thiserror::Error;

/// Errors that can occur while allocating or handing over ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocatorError {
    /// Reading or writing the allocation record failed.
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordError),

    /// A ledger store request failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The allocation record does not hold a ledger id.
    #[error("invalid allocation data at {path}: {reason}")]
    InvalidAllocationData { path: String, reason: String },

    #[error("invalid allocation path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("allocator at {0} is closed")]
    Closed(String),

    /// No allocator in a pool could supply a ledger.
    #[error("no ledger ready at {0}")]
    NotReady(String),
}

impl AllocatorError {
    /// Status code of an underlying ledger store failure.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Ledger(e) => e.code(),
            _ => None,
        }
    }
}

/// Convenience type alias for allocator operations.
pub type AllocatorResult<T> = std::result::Result<T, AllocatorError>;
