use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use dlog_ledger::LedgerHandle;
use dlog_types::{EntryId, LedgerId};
use tracing::debug;

use crate::error::{EntryStoreError, EntryStoreResult};

/// Appends entries to the ledger backing a new log segment.
#[async_trait]
pub trait LogSegmentEntryWriter: Send + Sync + fmt::Debug {
    fn ledger_id(&self) -> LedgerId;

    fn last_add_confirmed(&self) -> Option<EntryId>;

    async fn add_entry(&self, payload: Bytes) -> EntryStoreResult<EntryId>;

    /// Seal the ledger. Later appends fail with `Closed`.
    async fn close(&mut self) -> EntryStoreResult<()>;
}

/// [`LogSegmentEntryWriter`] over a write handle obtained from an allocator.
pub struct LedgerSegmentEntryWriter {
    ledger_id: LedgerId,
    handle: Option<LedgerHandle>,
}

impl LedgerSegmentEntryWriter {
    pub fn new(handle: LedgerHandle) -> Self {
        Self {
            ledger_id: handle.id(),
            handle: Some(handle),
        }
    }

    fn open_handle(&self) -> EntryStoreResult<&LedgerHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| EntryStoreError::Closed(format!("writer of ledger {}", self.ledger_id)))
    }
}

#[async_trait]
impl LogSegmentEntryWriter for LedgerSegmentEntryWriter {
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    fn last_add_confirmed(&self) -> Option<EntryId> {
        self.handle.as_ref().and_then(LedgerHandle::last_add_confirmed)
    }

    async fn add_entry(&self, payload: Bytes) -> EntryStoreResult<EntryId> {
        Ok(self.open_handle()?.add_entry(payload).await?)
    }

    async fn close(&mut self) -> EntryStoreResult<()> {
        if let Some(handle) = self.handle.take() {
            handle.close().await?;
            debug!(ledger_id = %self.ledger_id, "closed segment writer");
        }
        Ok(())
    }
}

impl fmt::Debug for LedgerSegmentEntryWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSegmentEntryWriter")
            .field("ledger_id", &self.ledger_id)
            .field("last_add_confirmed", &self.last_add_confirmed())
            .finish()
    }
}
