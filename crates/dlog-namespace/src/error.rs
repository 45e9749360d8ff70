use dlog_allocator::AllocatorError;
use dlog_config::ConfigError;
use dlog_coord::CoordError;
use dlog_entrystore::EntryStoreError;
use dlog_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("coordination error: {0}")]
    Coordination(#[from] CoordError),

    #[error("allocator error: {0}")]
    Allocator(#[from] AllocatorError),

    #[error("entry store error: {0}")]
    EntryStore(#[from] EntryStoreError),

    #[error("invalid log: {0}")]
    InvalidLog(#[from] TypeError),

    #[error("namespace {0} is closed")]
    Closed(String),
}

pub type NamespaceResult<T> = Result<T, NamespaceError>;
