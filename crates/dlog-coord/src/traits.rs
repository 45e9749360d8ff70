//! The [`CoordinationClient`] trait defining the coordination interface.
//!
//! The coordination service is a hierarchical store of small versioned
//! nodes. The distributed log uses it to record allocation intent and to
//! enumerate allocator pools.

use async_trait::async_trait;
use dlog_types::Versioned;

use crate::error::Result;
use crate::path;

/// How a node is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    /// The service appends a monotonically increasing, zero-padded counter
    /// to the requested name.
    PersistentSequential,
}

/// Client of the coordination service.
///
/// Every node carries a version that starts at 0 on creation and increases
/// by one on each write. Conditional writes and deletes take the expected
/// version; `None` means unconditional.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Create a node. Returns the actual path, which differs from `path`
    /// for sequential nodes. The parent must exist.
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<String>;

    /// Read a node's data and version.
    async fn get_data(&self, path: &str) -> Result<Versioned<Vec<u8>>>;

    /// Overwrite a node's data, returning the new version.
    async fn set_data(&self, path: &str, data: &[u8], expected_version: Option<i64>)
        -> Result<i64>;

    /// Delete a childless node.
    async fn delete(&self, path: &str, expected_version: Option<i64>) -> Result<()>;

    /// Version of the node, or `None` if it does not exist.
    async fn exists(&self, path: &str) -> Result<Option<i64>>;

    /// Names (not paths) of a node's children, sorted.
    async fn get_children(&self, path: &str) -> Result<Vec<String>>;

    /// Create a persistent node, creating any missing ancestors with empty
    /// data first.
    async fn create_full_path(&self, full_path: &str, data: &[u8]) -> Result<String> {
        path::validate_path(full_path)?;
        for ancestor in path::ancestors(full_path) {
            match self.create(ancestor, &[], CreateMode::Persistent).await {
                Ok(_) => {}
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e),
            }
        }
        self.create(full_path, data, CreateMode::Persistent).await
    }
}
