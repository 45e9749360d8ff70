//! The ledger-backed log segment entry store.
//!
//! Each log segment lives in one ledger. [`LedgerEntryStore`] opens that
//! ledger for sequential or random-access reading, deletes it when the
//! segment is retired, and builds the allocator writers use to get ledgers
//! for new segments.
//!
//! Every operation issues its ledger store request before returning. The
//! returned [`Completion`] resolves when the store's callback fires, through
//! a continuation owned by that one request.

use std::fmt;
use std::sync::Arc;

use dlog_allocator::{
    DynamicQuorumConfigProvider, LedgerAllocator, LedgerAllocatorDelegator, SimpleLedgerAllocator,
};
use dlog_config::{DistributedLogConfiguration, DynamicDistributedLogConfiguration};
use dlog_coord::CoordinationClient;
use dlog_ledger::{
    submit, Completer, Completion, DigestType, LedgerClient, LedgerClientHandle, LedgerError,
    LedgerHandle, LedgerMetadata, OpenMode, StatusCode,
};
use dlog_types::{EntryId, LogMetadataForWriter, LogSegmentMetadata};
use tracing::{debug, error, warn};

use crate::allocator::LogSegmentAllocator;
use crate::error::{EntryStoreError, EntryStoreResult};
use crate::injector::AsyncFailureInjector;
use crate::random_access::{LedgerSegmentRandomAccessReader, LogSegmentRandomAccessEntryReader};
use crate::reader::{LedgerSegmentEntryReader, LogSegmentEntryReader};
use crate::scheduler::OrderedScheduler;

/// Digest protecting every segment ledger.
pub const DIGEST_TYPE: DigestType = DigestType::Crc32;

/// Storage of log segment entries.
pub trait LogSegmentEntryStore: Send + Sync {
    /// Delete the ledger backing `segment`. Resolves with `segment` once the
    /// ledger is gone, including when it was already gone.
    fn delete_log_segment(
        &self,
        segment: &LogSegmentMetadata,
    ) -> Completion<LogSegmentMetadata, EntryStoreError>;

    /// Open `segment` for sequential reading from `start_entry_id`.
    ///
    /// An in-progress segment is opened without recovery so its writer is
    /// left alone. A sealed segment is opened with recovery.
    fn open_reader(
        &self,
        segment: &LogSegmentMetadata,
        start_entry_id: EntryId,
    ) -> Completion<Box<dyn LogSegmentEntryReader>, EntryStoreError>;

    /// Open `segment` for point reads. `fence` forces a recovery open even
    /// when the segment is in progress.
    fn open_random_access_reader(
        &self,
        segment: &LogSegmentMetadata,
        fence: bool,
    ) -> Completion<Box<dyn LogSegmentRandomAccessEntryReader>, EntryStoreError>;

    /// Build the allocator a log's writer uses to get ledgers for new
    /// segments. Fails if the log's allocation path or data is unusable.
    fn new_log_segment_allocator(
        &self,
        log_metadata: &LogMetadataForWriter,
        dyn_conf: Arc<DynamicDistributedLogConfiguration>,
    ) -> EntryStoreResult<LogSegmentAllocator>;
}

/// How new log segment allocators get their ledgers. Fixed when the store
/// is built.
#[derive(Clone)]
pub enum AllocatorStrategy {
    /// Each log allocates its own ledgers under its allocation path.
    Direct,
    /// Logs share this allocator while the dynamic configuration enables
    /// pooling, and fall back to direct allocation otherwise.
    SharedPool(Arc<dyn LedgerAllocator>),
}

impl fmt::Debug for AllocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "Direct"),
            Self::SharedPool(_) => write!(f, "SharedPool(..)"),
        }
    }
}

/// Open mode for a sequential reader of `segment`.
pub fn reader_open_mode(segment: &LogSegmentMetadata) -> OpenMode {
    if segment.is_in_progress() {
        OpenMode::NoRecovery
    } else {
        OpenMode::Recovery
    }
}

/// Open mode for a random-access reader of `segment`.
pub fn random_access_open_mode(segment: &LogSegmentMetadata, fence: bool) -> OpenMode {
    if segment.is_in_progress() && !fence {
        OpenMode::NoRecovery
    } else {
        OpenMode::Recovery
    }
}

fn open_failure(segment: &LogSegmentMetadata, code: StatusCode) -> EntryStoreError {
    LedgerError::transmit(
        format!("Failed to open ledger handle for log segment {segment}"),
        code,
    )
    .into()
}

/// Collaborators a sequential reader is built with.
struct ReaderContext {
    ledgers: Arc<LedgerClientHandle>,
    scheduler: Arc<OrderedScheduler>,
    conf: Arc<DistributedLogConfiguration>,
    injector: Arc<dyn AsyncFailureInjector>,
}

struct OpenReaderRequest {
    segment: LogSegmentMetadata,
    start_entry_id: EntryId,
    completer: Completer<Box<dyn LogSegmentEntryReader>, EntryStoreError>,
}

impl OpenReaderRequest {
    fn open_complete(
        self,
        ctx: &ReaderContext,
        client: Arc<dyn LedgerClient>,
        mode: OpenMode,
        result: Result<LedgerMetadata, StatusCode>,
    ) {
        let metadata = match result {
            Ok(metadata) => metadata,
            Err(code) => {
                debug!(segment = %self.segment, %code, "failed to open segment ledger");
                self.completer.fail(open_failure(&self.segment, code));
                return;
            }
        };
        // Owned from here on: dropped unclaimed, it releases itself.
        let handle = LedgerHandle::opened(client, metadata, mode);
        let reader_client = match ctx.ledgers.get() {
            Ok(client) => client,
            Err(e) => {
                self.completer.fail(EntryStoreError::Construction {
                    what: "segment reader",
                    segment: self.segment.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };
        let reader = LedgerSegmentEntryReader::new(
            self.segment,
            handle,
            self.start_entry_id,
            reader_client,
            Arc::clone(&ctx.scheduler),
            Arc::clone(&ctx.conf),
            Arc::clone(&ctx.injector),
        );
        if !self.completer.succeed(Box::new(reader)) {
            debug!("segment reader opened after its caller left, released");
        }
    }
}

struct DeleteLogSegmentRequest {
    segment: LogSegmentMetadata,
    completer: Completer<LogSegmentMetadata, EntryStoreError>,
}

impl DeleteLogSegmentRequest {
    fn delete_complete(self, result: Result<(), StatusCode>) {
        let ledger_id = self.segment.ledger_id();
        match result {
            Ok(()) => {}
            Err(code) if code == StatusCode::NO_SUCH_LEDGER_EXISTS => {
                warn!(ledger_id = %ledger_id, segment = %self.segment, "no ledger found to delete");
            }
            Err(code) => {
                error!(ledger_id = %ledger_id, segment = %self.segment, %code, "couldn't delete ledger");
                self.completer.fail(
                    LedgerError::transmit(
                        format!("Couldn't delete log segment {}", self.segment),
                        code,
                    )
                    .into(),
                );
                return;
            }
        }
        self.completer.succeed(self.segment);
    }
}

/// [`LogSegmentEntryStore`] over a ledger store.
pub struct LedgerEntryStore {
    ctx: Arc<ReaderContext>,
    coord: Arc<dyn CoordinationClient>,
    strategy: AllocatorStrategy,
    password: Arc<[u8]>,
}

impl LedgerEntryStore {
    /// The digest password is read from `conf` once, here.
    pub fn new(
        conf: Arc<DistributedLogConfiguration>,
        coord: Arc<dyn CoordinationClient>,
        ledgers: Arc<LedgerClientHandle>,
        scheduler: Arc<OrderedScheduler>,
        strategy: AllocatorStrategy,
        injector: Arc<dyn AsyncFailureInjector>,
    ) -> Self {
        let password = Arc::from(conf.digest_password());
        Self {
            ctx: Arc::new(ReaderContext {
                ledgers,
                scheduler,
                conf,
                injector,
            }),
            coord,
            strategy,
            password,
        }
    }

    pub fn strategy(&self) -> &AllocatorStrategy {
        &self.strategy
    }

    pub fn conf(&self) -> &DistributedLogConfiguration {
        &self.ctx.conf
    }

    fn client(&self) -> EntryStoreResult<Arc<dyn LedgerClient>> {
        Ok(self.ctx.ledgers.get()?)
    }

    fn direct_allocator(
        &self,
        log_metadata: &LogMetadataForWriter,
        dyn_conf: Arc<DynamicDistributedLogConfiguration>,
    ) -> EntryStoreResult<Arc<dyn LedgerAllocator>> {
        let quorum = Arc::new(DynamicQuorumConfigProvider::new(dyn_conf));
        let allocator = SimpleLedgerAllocator::new(
            log_metadata.allocation_path(),
            log_metadata.allocation_data().clone(),
            quorum,
            Arc::clone(&self.coord),
            Arc::clone(&self.ctx.ledgers),
            Arc::clone(&self.password),
        )?;
        Ok(Arc::new(LedgerAllocatorDelegator::new(Arc::new(allocator), true)))
    }
}

impl LogSegmentEntryStore for LedgerEntryStore {
    fn delete_log_segment(
        &self,
        segment: &LogSegmentMetadata,
    ) -> Completion<LogSegmentMetadata, EntryStoreError> {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return Completion::ready(Err(e)),
        };
        submit(|completer| {
            let request = DeleteLogSegmentRequest {
                segment: segment.clone(),
                completer,
            };
            client.async_delete_ledger(
                segment.ledger_id(),
                Box::new(move |result| request.delete_complete(result)),
            );
        })
    }

    fn open_reader(
        &self,
        segment: &LogSegmentMetadata,
        start_entry_id: EntryId,
    ) -> Completion<Box<dyn LogSegmentEntryReader>, EntryStoreError> {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return Completion::ready(Err(e)),
        };
        let mode = reader_open_mode(segment);
        debug!(segment = %segment, %mode, start_entry_id, "opening segment reader");
        submit(|completer| {
            let request = OpenReaderRequest {
                segment: segment.clone(),
                start_entry_id,
                completer,
            };
            let ctx = Arc::clone(&self.ctx);
            let handle_client = Arc::clone(&client);
            client.async_open_ledger(
                segment.ledger_id(),
                mode,
                DIGEST_TYPE,
                &self.password,
                Box::new(move |result| request.open_complete(&ctx, handle_client, mode, result)),
            );
        })
    }

    fn open_random_access_reader(
        &self,
        segment: &LogSegmentMetadata,
        fence: bool,
    ) -> Completion<Box<dyn LogSegmentRandomAccessEntryReader>, EntryStoreError> {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return Completion::ready(Err(e)),
        };
        let mode = random_access_open_mode(segment, fence);
        debug!(segment = %segment, %mode, fence, "opening random access reader");
        submit(|completer: Completer<Box<dyn LogSegmentRandomAccessEntryReader>, EntryStoreError>| {
            let segment = segment.clone();
            let conf = Arc::clone(&self.ctx.conf);
            let handle_client = Arc::clone(&client);
            client.async_open_ledger(
                segment.ledger_id(),
                mode,
                DIGEST_TYPE,
                &self.password,
                Box::new(move |result| match result {
                    Ok(metadata) => {
                        let handle = LedgerHandle::opened(handle_client, metadata, mode);
                        completer.succeed(Box::new(LedgerSegmentRandomAccessReader::new(
                            segment, handle, conf,
                        )));
                    }
                    Err(code) => {
                        completer.fail(open_failure(&segment, code));
                    }
                }),
            );
        })
    }

    fn new_log_segment_allocator(
        &self,
        log_metadata: &LogMetadataForWriter,
        dyn_conf: Arc<DynamicDistributedLogConfiguration>,
    ) -> EntryStoreResult<LogSegmentAllocator> {
        let allocator = match &self.strategy {
            AllocatorStrategy::SharedPool(pool) if dyn_conf.enable_ledger_allocator_pool() => {
                debug!(log = %log_metadata.log_name(), "using shared ledger allocator pool");
                Arc::clone(pool)
            }
            _ => {
                debug!(log = %log_metadata.log_name(), path = %log_metadata.allocation_path(),
                    "building direct ledger allocator");
                self.direct_allocator(log_metadata, dyn_conf)?
            }
        };
        Ok(LogSegmentAllocator::new(allocator))
    }
}

impl fmt::Debug for LedgerEntryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEntryStore")
            .field("ledgers", &self.ctx.ledgers)
            .field("strategy", &self.strategy)
            .finish()
    }
}
