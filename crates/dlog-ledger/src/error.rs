use crate::status::StatusCode;

/// Errors surfaced by ledger store requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The store completed a request with a non-success status.
    #[error("{description} : {code}")]
    Transmit {
        description: String,
        code: StatusCode,
    },

    /// The ledger client handle has been closed or was never connected.
    #[error("ledger client {0} is unavailable")]
    ClientUnavailable(String),

    /// The request was dropped by the store without ever completing.
    #[error("{0} was interrupted before completion")]
    Interrupted(String),

    #[error("invalid quorum configuration: {0}")]
    InvalidQuorum(String),
}

impl LedgerError {
    /// Build a transmission error for a failed request.
    pub fn transmit(description: impl Into<String>, code: StatusCode) -> Self {
        Self::Transmit {
            description: description.into(),
            code,
        }
    }

    /// Status code reported by the store, if the store reported one.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Transmit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
