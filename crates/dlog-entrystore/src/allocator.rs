use std::fmt;
use std::sync::Arc;

use dlog_allocator::LedgerAllocator;
use tracing::debug;

use crate::error::EntryStoreResult;
use crate::writer::LedgerSegmentEntryWriter;

/// Allocates the ledgers backing new log segments of one log.
///
/// Returned by [`LogSegmentEntryStore::new_log_segment_allocator`]; every
/// call goes to the ledger allocator chosen for the log at that time.
///
/// [`LogSegmentEntryStore::new_log_segment_allocator`]: crate::store::LogSegmentEntryStore::new_log_segment_allocator
pub struct LogSegmentAllocator {
    allocator: Arc<dyn LedgerAllocator>,
}

impl LogSegmentAllocator {
    pub fn new(allocator: Arc<dyn LedgerAllocator>) -> Self {
        Self { allocator }
    }

    /// The ledger allocator backing this log.
    pub fn ledger_allocator(&self) -> &Arc<dyn LedgerAllocator> {
        &self.allocator
    }

    /// Get a ledger ready ahead of the next [`try_obtain`](Self::try_obtain).
    pub async fn allocate(&self) -> EntryStoreResult<()> {
        Ok(self.allocator.allocate().await?)
    }

    /// Take a ready ledger and wrap it in a segment writer.
    pub async fn try_obtain(&self) -> EntryStoreResult<LedgerSegmentEntryWriter> {
        let handle = self.allocator.try_obtain().await?;
        debug!(ledger_id = %handle.id(), "obtained ledger for new log segment");
        Ok(LedgerSegmentEntryWriter::new(handle))
    }

    pub async fn close(&self) -> EntryStoreResult<()> {
        Ok(self.allocator.close().await?)
    }

    pub async fn delete(&self) -> EntryStoreResult<()> {
        Ok(self.allocator.delete().await?)
    }
}

impl fmt::Debug for LogSegmentAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSegmentAllocator").finish_non_exhaustive()
    }
}
