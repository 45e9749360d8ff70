//! Point reads over a log segment's ledger.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dlog_config::DistributedLogConfiguration;
use dlog_ledger::{LedgerEntry, LedgerError, LedgerHandle, StatusCode};
use dlog_types::{EntryId, LogSegmentMetadata};
use tracing::debug;

use crate::error::{EntryStoreError, EntryStoreResult};

/// Chunk requests one `read_entries` call keeps in flight.
const MAX_CHUNKS_IN_FLIGHT: usize = 4;

/// Reads arbitrary entry ranges of a segment.
#[async_trait]
pub trait LogSegmentRandomAccessEntryReader: Send + Sync + fmt::Debug {
    fn segment(&self) -> &LogSegmentMetadata;

    /// Last confirmed entry as of the open or the latest refresh.
    fn last_add_confirmed(&self) -> Option<EntryId>;

    /// Read the inclusive range `first..=last`.
    async fn read_entries(&self, first: EntryId, last: EntryId)
        -> EntryStoreResult<Vec<LedgerEntry>>;

    /// Refresh the last confirmed entry from the ledger store.
    async fn read_last_confirmed(&self) -> EntryStoreResult<Option<EntryId>>;

    async fn close(&mut self) -> EntryStoreResult<()>;
}

/// [`LogSegmentRandomAccessEntryReader`] backed by a ledger store handle.
///
/// A range wider than `read_ahead_max_records` is fetched in chunks, a few
/// at a time, stopping at the first failed chunk. On a sealed ledger a range
/// past the last entry is rejected before anything is sent.
pub struct LedgerSegmentRandomAccessReader {
    segment: LogSegmentMetadata,
    handle: Option<LedgerHandle>,
    conf: Arc<DistributedLogConfiguration>,
}

impl LedgerSegmentRandomAccessReader {
    pub fn new(
        segment: LogSegmentMetadata,
        handle: LedgerHandle,
        conf: Arc<DistributedLogConfiguration>,
    ) -> Self {
        Self {
            segment,
            handle: Some(handle),
            conf,
        }
    }

    pub fn handle(&self) -> Option<&LedgerHandle> {
        self.handle.as_ref()
    }

    fn open_handle(&self) -> EntryStoreResult<&LedgerHandle> {
        self.handle.as_ref().ok_or_else(|| {
            EntryStoreError::Closed(format!("random access reader of {}", self.segment))
        })
    }
}

#[async_trait]
impl LogSegmentRandomAccessEntryReader for LedgerSegmentRandomAccessReader {
    fn segment(&self) -> &LogSegmentMetadata {
        &self.segment
    }

    fn last_add_confirmed(&self) -> Option<EntryId> {
        self.handle.as_ref().and_then(LedgerHandle::last_add_confirmed)
    }

    async fn read_entries(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> EntryStoreResult<Vec<LedgerEntry>> {
        let handle = self.open_handle()?;
        if first > last {
            return Err(EntryStoreError::InvalidRange {
                ledger_id: handle.id(),
                first,
                last,
            });
        }
        if handle.metadata().closed && handle.last_add_confirmed().map_or(true, |lac| last > lac) {
            return Err(LedgerError::transmit(
                format!(
                    "Failed to read entries [{first}, {last}] of ledger {}",
                    handle.id()
                ),
                StatusCode::NO_SUCH_ENTRY,
            )
            .into());
        }

        let chunk = self.conf.read_ahead_max_records.max(1) as EntryId;
        let mut entries = Vec::new();
        let mut next = Some(first);
        while next.is_some() {
            let mut window = Vec::with_capacity(MAX_CHUNKS_IN_FLIGHT);
            while let Some(start) = next.filter(|_| window.len() < MAX_CHUNKS_IN_FLIGHT) {
                let end = last.min(start.saturating_add(chunk - 1));
                window.push(handle.read_entries(start, end));
                next = if end == last { None } else { Some(end + 1) };
            }
            // Later chunks of a failed window are dropped unread.
            for completion in window {
                entries.extend(completion.await?);
            }
        }
        Ok(entries)
    }

    async fn read_last_confirmed(&self) -> EntryStoreResult<Option<EntryId>> {
        Ok(self.open_handle()?.read_last_confirmed().await?)
    }

    async fn close(&mut self) -> EntryStoreResult<()> {
        if let Some(handle) = self.handle.take() {
            handle.close().await?;
            debug!(segment = %self.segment, "closed random access reader");
        }
        Ok(())
    }
}

impl fmt::Debug for LedgerSegmentRandomAccessReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSegmentRandomAccessReader")
            .field("segment", &self.segment.to_string())
            .field("closed", &self.handle.is_none())
            .finish()
    }
}
