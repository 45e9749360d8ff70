use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dlog_ledger::LedgerHandle;
use tracing::debug;

use crate::error::AllocatorResult;
use crate::traits::LedgerAllocator;

/// Forwards to another allocator, optionally without owning it.
///
/// `allocate` and `try_obtain` always pass through. `close` and `delete`
/// reach the inner allocator only when this delegator owns it, so a shared
/// allocator survives the release of any one log's handle on it.
pub struct LedgerAllocatorDelegator {
    inner: Arc<dyn LedgerAllocator>,
    owns: bool,
}

impl LedgerAllocatorDelegator {
    pub fn new(inner: Arc<dyn LedgerAllocator>, owns: bool) -> Self {
        Self { inner, owns }
    }

    pub fn inner(&self) -> &Arc<dyn LedgerAllocator> {
        &self.inner
    }

    pub fn owns_allocator(&self) -> bool {
        self.owns
    }
}

#[async_trait]
impl LedgerAllocator for LedgerAllocatorDelegator {
    async fn allocate(&self) -> AllocatorResult<()> {
        self.inner.allocate().await
    }

    async fn try_obtain(&self) -> AllocatorResult<LedgerHandle> {
        self.inner.try_obtain().await
    }

    async fn close(&self) -> AllocatorResult<()> {
        if !self.owns {
            debug!("skipping close of unowned allocator");
            return Ok(());
        }
        self.inner.close().await
    }

    async fn delete(&self) -> AllocatorResult<()> {
        if !self.owns {
            debug!("skipping delete of unowned allocator");
            return Ok(());
        }
        self.inner.delete().await
    }
}

impl fmt::Debug for LedgerAllocatorDelegator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerAllocatorDelegator")
            .field("owns", &self.owns)
            .finish()
    }
}
