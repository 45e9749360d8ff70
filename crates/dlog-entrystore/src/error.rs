//! Error types for entry store operations.

use dlog_allocator::AllocatorError;
use dlog_ledger::{LedgerError, StatusCode};
use dlog_types::{EntryId, LedgerId};
use thiserror::Error;

/// Errors surfaced by the entry store and the readers and writers it builds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryStoreError {
    /// A ledger store request failed, the client is unavailable, or the
    /// request was dropped before completing.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Building or driving a ledger allocator failed.
    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    /// A reader or writer could not be built after its ledger was opened.
    #[error("failed to construct {what} for log segment {segment}: {reason}")]
    Construction {
        what: &'static str,
        segment: String,
        reason: String,
    },

    /// Raised by the failure injector.
    #[error("injected failure reading log segment {0}")]
    Injected(String),

    /// A sealed segment has no entries past the last one read.
    #[error("reached end of log segment {0}")]
    EndOfSegment(String),

    #[error("invalid entry range [{first}, {last}] on ledger {ledger_id}")]
    InvalidRange {
        ledger_id: LedgerId,
        first: EntryId,
        last: EntryId,
    },

    #[error("{0} is closed")]
    Closed(String),
}

impl EntryStoreError {
    /// Status code reported by the ledger store, if this error carries one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Ledger(e) => e.code(),
            Self::Allocator(e) => e.status_code(),
            _ => None,
        }
    }
}

/// Convenience type alias for entry store operations.
pub type EntryStoreResult<T> = std::result::Result<T, EntryStoreError>;
