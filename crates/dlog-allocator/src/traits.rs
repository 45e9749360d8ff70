use async_trait::async_trait;
use dlog_ledger::LedgerHandle;

use crate::error::AllocatorResult;

/// Supplies fresh, writable ledgers to log segment writers.
///
/// An allocator creates ledgers ahead of need and records each one in the
/// coordination service until it is handed over, so a crash between the two
/// steps never leaks a ledger.
#[async_trait]
pub trait LedgerAllocator: Send + Sync {
    /// Make a ledger ready for the next [`try_obtain`](LedgerAllocator::try_obtain).
    /// A no-op if one is already ready.
    async fn allocate(&self) -> AllocatorResult<()>;

    /// Hand over a ready ledger, allocating one first if needed. The caller
    /// owns the returned handle.
    async fn try_obtain(&self) -> AllocatorResult<LedgerHandle>;

    /// Stop allocating. A ledger that is ready but not handed over stays
    /// recorded so a later owner reclaims it.
    async fn close(&self) -> AllocatorResult<()>;

    /// Close, then delete any ledger not handed over along with the
    /// allocation record itself.
    async fn delete(&self) -> AllocatorResult<()>;
}
