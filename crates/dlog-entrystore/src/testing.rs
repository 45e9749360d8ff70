//! Shared fixture for this crate's tests.

use std::sync::Arc;

use bytes::Bytes;
use dlog_config::DistributedLogConfiguration;
use dlog_coord::{CoordinationClient, InMemoryCoordination};
use dlog_ledger::{
    classify, submit, Completion, InMemoryLedgerStore, LedgerClient, LedgerClientHandle,
    LedgerHandle, LedgerMetadata, OpenMode, QuorumConfig,
};
use dlog_types::{EntryId, LedgerId, LogSegmentMetadata};

use crate::injector::NoopFailureInjector;
use crate::scheduler::OrderedScheduler;
use crate::store::{AllocatorStrategy, LedgerEntryStore, DIGEST_TYPE};

pub(crate) const LOG: &str = "orders";

pub(crate) struct Fixture {
    pub store: InMemoryLedgerStore,
    pub coord: Arc<InMemoryCoordination>,
    pub ledgers: Arc<LedgerClientHandle>,
    pub scheduler: Arc<OrderedScheduler>,
    pub conf: Arc<DistributedLogConfiguration>,
}

impl Fixture {
    /// Must run inside a tokio runtime.
    pub fn new() -> Self {
        let store = InMemoryLedgerStore::new();
        let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
        let conf = DistributedLogConfiguration {
            bk_digest_pw: "secret".into(),
            ..DistributedLogConfiguration::default()
        };
        Self {
            store,
            coord: Arc::new(InMemoryCoordination::new()),
            ledgers: Arc::new(LedgerClientHandle::new("test", client)),
            scheduler: Arc::new(OrderedScheduler::new("test", 2)),
            conf: Arc::new(conf),
        }
    }

    pub fn client(&self) -> Arc<dyn LedgerClient> {
        Arc::new(self.store.clone())
    }

    pub fn coordination(&self) -> Arc<dyn CoordinationClient> {
        Arc::clone(&self.coord) as Arc<dyn CoordinationClient>
    }

    pub fn entry_store(&self, strategy: AllocatorStrategy) -> LedgerEntryStore {
        LedgerEntryStore::new(
            Arc::clone(&self.conf),
            self.coordination(),
            Arc::clone(&self.ledgers),
            Arc::clone(&self.scheduler),
            strategy,
            Arc::new(NoopFailureInjector),
        )
    }

    pub fn payload(i: EntryId) -> Bytes {
        Bytes::from(format!("entry-{i}"))
    }

    fn quorum() -> QuorumConfig {
        QuorumConfig::new(3, 3, 2)
    }

    /// Put a ledger with `entries` entries in the store under `ledger_id`.
    pub fn insert_ledger(&self, ledger_id: LedgerId, entries: EntryId) {
        self.store.insert_with_entries(
            ledger_id,
            Self::quorum(),
            DIGEST_TYPE,
            &self.conf.digest_password(),
            (0..entries).map(Self::payload),
        );
    }

    pub fn segment(ledger_id: LedgerId, in_progress: bool) -> LogSegmentMetadata {
        let segment = LogSegmentMetadata::in_progress(LOG, ledger_id.get(), ledger_id, 1);
        if in_progress {
            segment
        } else {
            segment
                .complete(1, None, 0)
                .expect("fresh segment is in progress")
        }
    }

    /// A sealed segment over a new ledger holding `entries` entries.
    pub fn sealed_segment(&self, entries: EntryId) -> LogSegmentMetadata {
        let ledger_id = self.store.create_with_entries(
            Self::quorum(),
            DIGEST_TYPE,
            &self.conf.digest_password(),
            (0..entries).map(Self::payload),
        );
        LogSegmentMetadata::in_progress(LOG, 1, ledger_id, 1)
            .complete(entries as i64, entries.checked_sub(1), entries)
            .expect("fresh segment is in progress")
    }

    /// An in-progress segment whose writer has appended `entries` entries.
    pub async fn in_progress_segment(&self, entries: EntryId) -> (LogSegmentMetadata, LedgerHandle) {
        let writer = self.create().await;
        for i in 0..entries {
            writer.add_entry(Self::payload(i)).await.unwrap();
        }
        let segment = LogSegmentMetadata::in_progress(LOG, 1, writer.id(), 1);
        (segment, writer)
    }

    pub async fn create(&self) -> LedgerHandle {
        let client = self.client();
        let password = self.conf.digest_password();
        let created: Completion<LedgerMetadata> = submit(|completer| {
            client.async_create_ledger(
                Self::quorum(),
                DIGEST_TYPE,
                &password,
                Box::new(move |r| {
                    completer.complete(classify(r, || "create".into()));
                }),
            );
        });
        LedgerHandle::created(client, created.await.unwrap())
    }

    pub async fn open(&self, ledger_id: LedgerId, mode: OpenMode) -> LedgerHandle {
        let client = self.client();
        let password = self.conf.digest_password();
        let opened: Completion<LedgerMetadata> = submit(|completer| {
            client.async_open_ledger(
                ledger_id,
                mode,
                DIGEST_TYPE,
                &password,
                Box::new(move |r| {
                    completer.complete(classify(r, || format!("open {ledger_id}")));
                }),
            );
        });
        LedgerHandle::opened(client, opened.await.unwrap(), mode)
    }
}
