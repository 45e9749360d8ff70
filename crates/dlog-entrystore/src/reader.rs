//! Sequential readers over a log segment's ledger.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dlog_config::DistributedLogConfiguration;
use dlog_ledger::{handle, LedgerClient, LedgerEntry, LedgerHandle};
use dlog_types::{EntryId, LedgerId, LogSegmentMetadata};
use tracing::{debug, trace};

use crate::error::{EntryStoreError, EntryStoreResult};
use crate::injector::AsyncFailureInjector;
use crate::scheduler::OrderedScheduler;

/// Reads a segment's entries in order, starting from a given entry.
#[async_trait]
pub trait LogSegmentEntryReader: Send + Sync + fmt::Debug {
    fn segment(&self) -> &LogSegmentMetadata;

    fn ledger_id(&self) -> LedgerId;

    /// Entry the reader was opened at.
    fn start_entry_id(&self) -> EntryId;

    /// Entry the next call to [`read_next`](LogSegmentEntryReader::read_next)
    /// starts from.
    fn next_entry_id(&self) -> EntryId;

    /// Read up to `max` entries.
    ///
    /// On an in-progress segment an empty batch means the reader has caught
    /// up with the writer. A sealed segment fails with
    /// [`EntryStoreError::EndOfSegment`] once every entry has been read.
    async fn read_next(&mut self, max: usize) -> EntryStoreResult<Vec<LedgerEntry>>;

    /// Release the ledger handle. Later reads fail with `Closed`.
    async fn close(&mut self) -> EntryStoreResult<()>;
}

/// [`LogSegmentEntryReader`] backed by a ledger store handle.
///
/// Reads are split into read-ahead batches and dispatched through the
/// ordered scheduler keyed by ledger id, so all reads of one ledger are
/// issued in order.
pub struct LedgerSegmentEntryReader {
    segment: LogSegmentMetadata,
    handle: Option<LedgerHandle>,
    client: Arc<dyn LedgerClient>,
    scheduler: Arc<OrderedScheduler>,
    conf: Arc<DistributedLogConfiguration>,
    injector: Arc<dyn AsyncFailureInjector>,
    start_entry_id: EntryId,
    next_entry_id: EntryId,
}

impl LedgerSegmentEntryReader {
    pub fn new(
        segment: LogSegmentMetadata,
        handle: LedgerHandle,
        start_entry_id: EntryId,
        client: Arc<dyn LedgerClient>,
        scheduler: Arc<OrderedScheduler>,
        conf: Arc<DistributedLogConfiguration>,
        injector: Arc<dyn AsyncFailureInjector>,
    ) -> Self {
        Self {
            segment,
            handle: Some(handle),
            client,
            scheduler,
            conf,
            injector,
            start_entry_id,
            next_entry_id: start_entry_id,
        }
    }

    /// The handle this reader reads through, `None` once closed.
    pub fn handle(&self) -> Option<&LedgerHandle> {
        self.handle.as_ref()
    }

    fn open_handle(&self) -> EntryStoreResult<&LedgerHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| EntryStoreError::Closed(format!("reader of {}", self.segment)))
    }

    /// Last entry that may be read right now, refreshing it from the store
    /// when the reader has caught up with an unsealed ledger.
    async fn readable_until(&self) -> EntryStoreResult<Option<EntryId>> {
        let handle = self.open_handle()?;
        let known = handle.last_add_confirmed();
        let caught_up = known.map_or(true, |lac| self.next_entry_id > lac);
        if caught_up && !handle.metadata().closed {
            let refreshed = handle.read_last_confirmed().await?;
            trace!(ledger_id = %handle.id(), lac = ?refreshed, "refreshed last add confirmed");
            return Ok(refreshed);
        }
        Ok(known)
    }
}

#[async_trait]
impl LogSegmentEntryReader for LedgerSegmentEntryReader {
    fn segment(&self) -> &LogSegmentMetadata {
        &self.segment
    }

    fn ledger_id(&self) -> LedgerId {
        self.segment.ledger_id()
    }

    fn start_entry_id(&self) -> EntryId {
        self.start_entry_id
    }

    fn next_entry_id(&self) -> EntryId {
        self.next_entry_id
    }

    async fn read_next(&mut self, max: usize) -> EntryStoreResult<Vec<LedgerEntry>> {
        let sealed = self.open_handle()?.metadata().closed;
        if self.injector.should_inject_stops() {
            return Ok(Vec::new());
        }
        if self.injector.should_inject_errors() {
            return Err(EntryStoreError::Injected(self.segment.to_string()));
        }
        if self.injector.should_inject_delays() {
            tokio::time::sleep(self.injector.injected_delay()).await;
        }

        let limit = max.min(self.conf.read_ahead_max_records);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let available = match self.readable_until().await? {
            Some(lac) if lac >= self.next_entry_id => lac,
            _ if sealed => return Err(EntryStoreError::EndOfSegment(self.segment.to_string())),
            _ => return Ok(Vec::new()),
        };
        let last = available.min(self.next_entry_id.saturating_add(limit as EntryId - 1));

        let ledger_id = self.ledger_id();
        let batch = self.conf.read_ahead_batch_size.max(1) as EntryId;
        let mut pending = Vec::new();
        let mut first = self.next_entry_id;
        while first <= last {
            let batch_last = last.min(first.saturating_add(batch - 1));
            let (completer, completion) =
                dlog_ledger::completion::<Vec<LedgerEntry>, EntryStoreError>();
            let client = Arc::clone(&self.client);
            self.scheduler.submit(ledger_id.get(), async move {
                let result = handle::read_entries(&client, ledger_id, first, batch_last).await;
                completer.complete(result.map_err(EntryStoreError::from));
            })?;
            pending.push(completion);
            first = batch_last + 1;
        }

        let mut entries = Vec::with_capacity((last - self.next_entry_id + 1) as usize);
        for completion in pending {
            entries.extend(completion.await?);
        }
        self.next_entry_id = last + 1;
        Ok(entries)
    }

    async fn close(&mut self) -> EntryStoreResult<()> {
        if let Some(handle) = self.handle.take() {
            handle.close().await?;
            debug!(segment = %self.segment, next_entry = self.next_entry_id, "closed segment reader");
        }
        Ok(())
    }
}

impl fmt::Debug for LedgerSegmentEntryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSegmentEntryReader")
            .field("segment", &self.segment.to_string())
            .field("start_entry_id", &self.start_entry_id)
            .field("next_entry_id", &self.next_entry_id)
            .field("closed", &self.handle.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::{FailureInjectionConfig, NoopFailureInjector, RandomFailureInjector};
    use crate::testing::Fixture;
    use bytes::Bytes;
    use dlog_ledger::OpenMode;

    async fn reader(
        fx: &Fixture,
        segment: &LogSegmentMetadata,
        mode: OpenMode,
        start: EntryId,
        injector: Arc<dyn AsyncFailureInjector>,
    ) -> LedgerSegmentEntryReader {
        let handle = fx.open(segment.ledger_id(), mode).await;
        LedgerSegmentEntryReader::new(
            segment.clone(),
            handle,
            start,
            fx.client(),
            Arc::clone(&fx.scheduler),
            Arc::clone(&fx.conf),
            injector,
        )
    }

    fn payloads(entries: &[LedgerEntry]) -> Vec<Bytes> {
        entries.iter().map(|e| e.payload.clone()).collect()
    }

    #[tokio::test]
    async fn reads_sealed_segment_to_the_end() {
        let fx = Fixture::new();
        let segment = fx.sealed_segment(5);
        let mut reader = reader(&fx, &segment, OpenMode::Recovery, 1, Arc::new(NoopFailureInjector)).await;

        let first = reader.read_next(3).await.unwrap();
        assert_eq!(payloads(&first), vec![Fixture::payload(1), Fixture::payload(2), Fixture::payload(3)]);
        assert_eq!(reader.next_entry_id(), 4);

        let rest = reader.read_next(10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(matches!(
            reader.read_next(10).await,
            Err(EntryStoreError::EndOfSegment(_))
        ));
    }

    #[tokio::test]
    async fn batches_are_capped_by_max_records() {
        let fx = Fixture::new();
        let segment = fx.sealed_segment(40);
        let mut reader = reader(&fx, &segment, OpenMode::Recovery, 0, Arc::new(NoopFailureInjector)).await;
        let batch = reader.read_next(usize::MAX).await.unwrap();
        assert_eq!(batch.len(), fx.conf.read_ahead_max_records);
        let ids: Vec<EntryId> = batch.iter().map(|e| e.entry_id).collect();
        assert_eq!(ids, (0..fx.conf.read_ahead_max_records as EntryId).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn tails_in_progress_segment() {
        let fx = Fixture::new();
        let (segment, writer) = fx.in_progress_segment(2).await;
        let mut reader = reader(&fx, &segment, OpenMode::NoRecovery, 0, Arc::new(NoopFailureInjector)).await;

        assert_eq!(reader.read_next(10).await.unwrap().len(), 2);
        assert!(reader.read_next(10).await.unwrap().is_empty());

        writer.add_entry(Fixture::payload(2)).await.unwrap();
        let tail = reader.read_next(10).await.unwrap();
        assert_eq!(payloads(&tail), vec![Fixture::payload(2)]);
        assert!(!fx.store.is_fenced(segment.ledger_id()));
    }

    #[tokio::test]
    async fn injected_errors_and_stops() {
        let fx = Fixture::new();
        let segment = fx.sealed_segment(3);
        let failing = Arc::new(RandomFailureInjector::new(FailureInjectionConfig {
            error_percent: 100,
            ..FailureInjectionConfig::default()
        }));
        let mut reader = reader(&fx, &segment, OpenMode::Recovery, 0, failing).await;
        assert!(matches!(
            reader.read_next(1).await,
            Err(EntryStoreError::Injected(_))
        ));

        let stopping = Arc::new(RandomFailureInjector::new(FailureInjectionConfig {
            stop_percent: 100,
            ..FailureInjectionConfig::default()
        }));
        let mut reader = self::reader(&fx, &segment, OpenMode::Recovery, 0, stopping).await;
        assert!(reader.read_next(1).await.unwrap().is_empty());
        assert_eq!(reader.next_entry_id(), 0);
    }

    #[tokio::test]
    async fn close_releases_handle() {
        let fx = Fixture::new();
        let segment = fx.sealed_segment(1);
        let mut reader = reader(&fx, &segment, OpenMode::Recovery, 0, Arc::new(NoopFailureInjector)).await;
        assert_eq!(fx.store.open_handle_count(segment.ledger_id()), 1);

        reader.close().await.unwrap();
        assert_eq!(fx.store.open_handle_count(segment.ledger_id()), 0);
        assert!(reader.handle().is_none());
        assert!(matches!(
            reader.read_next(1).await,
            Err(EntryStoreError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn dropping_reader_releases_handle() {
        let fx = Fixture::new();
        let segment = fx.sealed_segment(1);
        let reader = reader(&fx, &segment, OpenMode::Recovery, 0, Arc::new(NoopFailureInjector)).await;
        drop(reader);
        assert_eq!(fx.store.open_handle_count(segment.ledger_id()), 0);
    }
}
