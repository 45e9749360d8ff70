//! Error types for coordination requests.

use thiserror::Error;

/// Errors returned by a coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// The node (or, on create, its parent) does not exist.
    #[error("no node: {path}")]
    NoNode { path: String },

    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// A conditional write named a version other than the current one.
    #[error("bad version for {path}: expected {expected}, found {actual}")]
    BadVersion {
        path: String,
        expected: i64,
        actual: i64,
    },

    #[error("node has children: {path}")]
    NotEmpty { path: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The session to the service was lost.
    #[error("coordination service unavailable: {0}")]
    Unavailable(String),
}

impl CoordError {
    pub fn is_no_node(&self) -> bool {
        matches!(self, Self::NoNode { .. })
    }

    pub fn is_node_exists(&self) -> bool {
        matches!(self, Self::NodeExists { .. })
    }
}

/// Convenience type alias for coordination requests.
pub type Result<T> = std::result::Result<T, CoordError>;
