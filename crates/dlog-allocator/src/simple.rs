//! Direct allocation of one ledger at a time.
//!
//! A [`SimpleLedgerAllocator`] owns a single coordination node, its
//! allocation path. While a ledger is allocated but not yet handed over,
//! the node holds that ledger's id (decimal UTF-8). Handing the ledger over
//! clears the node. If the process dies in between, the next allocator
//! constructed on the same path finds the id and deletes that leftover
//! ledger before creating a new one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dlog_coord::{validate_path, CoordError, CoordinationClient, CreateMode};
use dlog_ledger::{
    classify, submit, Completion, DigestType, LedgerClientHandle, LedgerHandle, LedgerMetadata,
    QuorumConfig, StatusCode,
};
use dlog_types::{LedgerId, Versioned};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AllocatorError, AllocatorResult};
use crate::quorum::QuorumConfigProvider;
use crate::traits::LedgerAllocator;

enum Phase {
    Idle,
    Allocated(LedgerHandle),
    Closed,
}

struct State {
    phase: Phase,
    /// Ledger recorded by a previous owner and never handed over.
    leftover: Option<LedgerId>,
    /// Version of the allocation node, `None` while it does not exist.
    version: Option<i64>,
}

/// Allocates ledgers one at a time under a single allocation path.
pub struct SimpleLedgerAllocator {
    path: String,
    quorum: Arc<dyn QuorumConfigProvider>,
    coord: Arc<dyn CoordinationClient>,
    ledgers: Arc<LedgerClientHandle>,
    password: Arc<[u8]>,
    state: Mutex<State>,
}

/// Decode an allocation record: empty means nothing is allocated.
fn decode_allocation(path: &str, data: &[u8]) -> AllocatorResult<Option<LedgerId>> {
    if data.is_empty() {
        return Ok(None);
    }
    LedgerId::from_bytes(data)
        .map(Some)
        .map_err(|e| AllocatorError::InvalidAllocationData {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

impl SimpleLedgerAllocator {
    /// Build an allocator over `path`, whose current content is
    /// `allocation_data`. Fails without side effects if the path is invalid
    /// or the data is not a ledger id.
    pub fn new(
        path: impl Into<String>,
        allocation_data: Versioned<Vec<u8>>,
        quorum: Arc<dyn QuorumConfigProvider>,
        coord: Arc<dyn CoordinationClient>,
        ledgers: Arc<LedgerClientHandle>,
        password: Arc<[u8]>,
    ) -> AllocatorResult<Self> {
        let path = path.into();
        validate_path(&path).map_err(|e| match e {
            CoordError::InvalidPath { path, reason } => AllocatorError::InvalidPath { path, reason },
            other => AllocatorError::Coordination(other),
        })?;
        let leftover = decode_allocation(&path, &allocation_data.value)?;
        if let Some(ledger_id) = leftover {
            debug!(path = %path, ledger_id = %ledger_id, "found leftover allocated ledger");
        }
        Ok(Self {
            path,
            quorum,
            coord,
            ledgers,
            password,
            state: Mutex::new(State {
                phase: Phase::Idle,
                leftover,
                version: allocation_data.version,
            }),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Ledger currently allocated and waiting to be handed over.
    pub async fn allocated_ledger(&self) -> Option<LedgerId> {
        match &self.state.lock().await.phase {
            Phase::Allocated(handle) => Some(handle.id()),
            _ => None,
        }
    }

    pub async fn is_closed(&self) -> bool {
        matches!(self.state.lock().await.phase, Phase::Closed)
    }

    async fn allocate_locked(&self, state: &mut State) -> AllocatorResult<()> {
        match state.phase {
            Phase::Closed => return Err(AllocatorError::Closed(self.path.clone())),
            Phase::Allocated(_) => return Ok(()),
            Phase::Idle => {}
        }

        if let Some(leftover) = state.leftover {
            self.delete_ledger(leftover).await?;
            state.leftover = None;
        }

        let quorum = self.quorum.quorum_config();
        quorum.validate()?;
        let handle = self.create_ledger(quorum).await?;
        let ledger_id = handle.id();

        let recorded = match state.version {
            None => self
                .coord
                .create(&self.path, &ledger_id.to_bytes(), CreateMode::Persistent)
                .await
                .map(|_| 0),
            Some(version) => {
                self.coord
                    .set_data(&self.path, &ledger_id.to_bytes(), Some(version))
                    .await
            }
        };
        match recorded {
            Ok(version) => {
                debug!(path = %self.path, ledger_id = %ledger_id, %quorum, "allocated ledger");
                state.version = Some(version);
                state.phase = Phase::Allocated(handle);
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path, ledger_id = %ledger_id, error = %e,
                    "failed to record allocated ledger, deleting it");
                if let Err(close_err) = handle.close().await {
                    debug!(ledger_id = %ledger_id, error = %close_err, "close before delete failed");
                }
                if let Err(delete_err) = self.delete_ledger(ledger_id).await {
                    warn!(ledger_id = %ledger_id, error = %delete_err, "failed to delete unrecorded ledger");
                }
                Err(e.into())
            }
        }
    }

    async fn create_ledger(&self, quorum: QuorumConfig) -> AllocatorResult<LedgerHandle> {
        let client = self.ledgers.get()?;
        let path = self.path.clone();
        let created: Completion<LedgerMetadata> = submit(|completer| {
            client.async_create_ledger(
                quorum,
                DigestType::Crc32,
                &self.password,
                Box::new(move |result| {
                    completer.complete(classify(result, || {
                        format!("Failed to create ledger for allocation path {path}")
                    }));
                }),
            );
        });
        let metadata = created.await?;
        Ok(LedgerHandle::created(client, metadata))
    }

    /// Delete a ledger; one that no longer exists counts as deleted.
    async fn delete_ledger(&self, ledger_id: LedgerId) -> AllocatorResult<()> {
        let client = self.ledgers.get()?;
        let deleted: Completion<()> = submit(|completer| {
            client.async_delete_ledger(
                ledger_id,
                Box::new(move |result| {
                    let result = match result {
                        Err(code) if code == StatusCode::NO_SUCH_LEDGER_EXISTS => {
                            warn!(ledger_id = %ledger_id, "ledger to delete is already gone");
                            Ok(())
                        }
                        other => other,
                    };
                    completer.complete(classify(result, || {
                        format!("Failed to delete allocated ledger {ledger_id}")
                    }));
                }),
            );
        });
        deleted.await?;
        debug!(ledger_id = %ledger_id, "deleted allocated ledger");
        Ok(())
    }
}

#[async_trait]
impl LedgerAllocator for SimpleLedgerAllocator {
    async fn allocate(&self) -> AllocatorResult<()> {
        let mut state = self.state.lock().await;
        self.allocate_locked(&mut state).await
    }

    async fn try_obtain(&self) -> AllocatorResult<LedgerHandle> {
        let mut state = self.state.lock().await;
        self.allocate_locked(&mut state).await?;
        let handle = match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Allocated(handle) => handle,
            other => {
                state.phase = other;
                return Err(AllocatorError::NotReady(self.path.clone()));
            }
        };
        match self.coord.set_data(&self.path, &[], state.version).await {
            Ok(version) => {
                state.version = Some(version);
                debug!(path = %self.path, ledger_id = %handle.id(), "handed over ledger");
                Ok(handle)
            }
            Err(e) => {
                warn!(path = %self.path, ledger_id = %handle.id(), error = %e,
                    "failed to clear allocation record, keeping ledger");
                state.phase = Phase::Allocated(handle);
                Err(e.into())
            }
        }
    }

    async fn close(&self) -> AllocatorResult<()> {
        let mut state = self.state.lock().await;
        if let Phase::Allocated(handle) = std::mem::replace(&mut state.phase, Phase::Closed) {
            let ledger_id = handle.id();
            handle.close().await?;
            debug!(path = %self.path, ledger_id = %ledger_id, "closed allocator, ledger left recorded");
        }
        Ok(())
    }

    async fn delete(&self) -> AllocatorResult<()> {
        let mut state = self.state.lock().await;
        if let Phase::Allocated(handle) = std::mem::replace(&mut state.phase, Phase::Closed) {
            let ledger_id = handle.id();
            if let Err(e) = handle.close().await {
                debug!(ledger_id = %ledger_id, error = %e, "close before delete failed");
            }
            self.delete_ledger(ledger_id).await?;
        }
        if let Some(leftover) = state.leftover.take() {
            self.delete_ledger(leftover).await?;
        }
        match self.coord.delete(&self.path, None).await {
            Ok(()) => {}
            Err(e) if e.is_no_node() => {}
            Err(e) => return Err(e.into()),
        }
        state.version = None;
        debug!(path = %self.path, "deleted allocator");
        Ok(())
    }
}

impl fmt::Debug for SimpleLedgerAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleLedgerAllocator")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::{DynamicQuorumConfigProvider, ImmutableQuorumConfigProvider};
    use dlog_config::{
        DistributedLogConfiguration, DynamicDistributedLogConfiguration, DynamicSettings,
    };
    use dlog_coord::InMemoryCoordination;
    use dlog_ledger::{InMemoryLedgerStore, LedgerClient};

    const PATH: &str = "/logs/orders/<allocation>";

    struct Fixture {
        store: InMemoryLedgerStore,
        coord: Arc<InMemoryCoordination>,
        ledgers: Arc<LedgerClientHandle>,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = InMemoryLedgerStore::new();
            let coord = Arc::new(InMemoryCoordination::new());
            coord.create_full_path("/logs/orders", b"").await.unwrap();
            let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
            Self {
                store,
                coord,
                ledgers: Arc::new(LedgerClientHandle::new("test", client)),
            }
        }

        fn allocator(&self, data: Versioned<Vec<u8>>) -> AllocatorResult<SimpleLedgerAllocator> {
            let quorum = ImmutableQuorumConfigProvider::new(QuorumConfig::new(3, 3, 2));
            self.allocator_with(data, Arc::new(quorum))
        }

        fn allocator_with(
            &self,
            data: Versioned<Vec<u8>>,
            quorum: Arc<dyn QuorumConfigProvider>,
        ) -> AllocatorResult<SimpleLedgerAllocator> {
            SimpleLedgerAllocator::new(
                PATH,
                data,
                quorum,
                Arc::clone(&self.coord) as Arc<dyn CoordinationClient>,
                Arc::clone(&self.ledgers),
                Arc::from(&b"pw"[..]),
            )
        }

        async fn record(&self) -> Versioned<Vec<u8>> {
            match self.coord.get_data(PATH).await {
                Ok(data) => data,
                Err(e) if e.is_no_node() => Versioned::absent(Vec::new()),
                Err(e) => panic!("unexpected {e}"),
            }
        }
    }

    #[tokio::test]
    async fn allocate_records_ledger_then_handover_clears_it() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();

        allocator.allocate().await.unwrap();
        let id = allocator.allocated_ledger().await.unwrap();
        assert_eq!(fx.record().await.value, id.to_bytes());
        assert!(fx.store.contains(id));

        let handle = allocator.try_obtain().await.unwrap();
        assert_eq!(handle.id(), id);
        assert!(handle.is_writable());
        assert!(fx.record().await.value.is_empty());
        assert_eq!(allocator.allocated_ledger().await, None);
    }

    #[tokio::test]
    async fn allocate_is_idempotent() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        allocator.allocate().await.unwrap();
        allocator.allocate().await.unwrap();
        assert_eq!(fx.store.ledger_ids().len(), 1);
    }

    #[tokio::test]
    async fn try_obtain_allocates_on_demand() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        let first = allocator.try_obtain().await.unwrap();
        let second = allocator.try_obtain().await.unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn leftover_ledger_is_deleted_on_next_allocation() {
        let fx = Fixture::new().await;
        let first = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        first.allocate().await.unwrap();
        let leftover = first.allocated_ledger().await.unwrap();
        first.close().await.unwrap();
        assert!(fx.store.contains(leftover));

        let second = fx.allocator(fx.record().await).unwrap();
        second.allocate().await.unwrap();
        assert!(!fx.store.contains(leftover));
        let fresh = second.allocated_ledger().await.unwrap();
        assert_eq!(fx.record().await.value, fresh.to_bytes());
    }

    #[tokio::test]
    async fn leftover_already_gone_is_benign() {
        let fx = Fixture::new().await;
        fx.coord
            .create(PATH, &LedgerId::new(999).to_bytes(), CreateMode::Persistent)
            .await
            .unwrap();
        let allocator = fx.allocator(fx.record().await).unwrap();
        allocator.allocate().await.unwrap();
        assert!(allocator.allocated_ledger().await.is_some());
    }

    #[tokio::test]
    async fn malformed_allocation_data_fails_construction() {
        let fx = Fixture::new().await;
        let err = fx
            .allocator(Versioned::new(b"not-a-ledger".to_vec(), Some(0)))
            .unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidAllocationData { .. }));
    }

    #[tokio::test]
    async fn invalid_path_fails_construction() {
        let fx = Fixture::new().await;
        let err = SimpleLedgerAllocator::new(
            "relative/path",
            Versioned::absent(Vec::new()),
            Arc::new(ImmutableQuorumConfigProvider::new(QuorumConfig::new(1, 1, 1))),
            Arc::clone(&fx.coord) as Arc<dyn CoordinationClient>,
            Arc::clone(&fx.ledgers),
            Arc::from(&b""[..]),
        )
        .unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn failed_record_deletes_new_ledger() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        fx.coord.expire();
        let err = allocator.allocate().await.unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Coordination(CoordError::Unavailable(_))
        ));
        assert!(fx.store.ledger_ids().is_empty());
    }

    #[tokio::test]
    async fn failed_handover_keeps_ledger_allocated() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        allocator.allocate().await.unwrap();
        let id = allocator.allocated_ledger().await.unwrap();

        // Someone else touched the record.
        fx.coord.set_data(PATH, &id.to_bytes(), None).await.unwrap();
        let err = allocator.try_obtain().await.unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Coordination(CoordError::BadVersion { .. })
        ));
        assert_eq!(allocator.allocated_ledger().await, Some(id));
    }

    #[tokio::test]
    async fn quorum_is_sampled_per_allocation() {
        let fx = Fixture::new().await;
        let conf = Arc::new(DynamicDistributedLogConfiguration::new(
            DistributedLogConfiguration::default(),
        ));
        let allocator = fx
            .allocator_with(
                Versioned::absent(Vec::new()),
                Arc::new(DynamicQuorumConfigProvider::new(Arc::clone(&conf))),
            )
            .unwrap();

        let first = allocator.try_obtain().await.unwrap();
        assert_eq!(first.metadata().quorum, QuorumConfig::new(3, 3, 2));

        conf.update(DynamicSettings {
            ensemble_size: Some(2),
            write_quorum_size: Some(2),
            ack_quorum_size: Some(1),
            ..DynamicSettings::default()
        })
        .unwrap();
        let second = allocator.try_obtain().await.unwrap();
        assert_eq!(second.metadata().quorum, QuorumConfig::new(2, 2, 1));
    }

    #[tokio::test]
    async fn closed_allocator_refuses_work() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        allocator.close().await.unwrap();
        assert!(allocator.is_closed().await);
        assert!(matches!(
            allocator.try_obtain().await,
            Err(AllocatorError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_ledger_and_record() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        allocator.allocate().await.unwrap();
        allocator.delete().await.unwrap();

        assert!(fx.store.ledger_ids().is_empty());
        assert_eq!(fx.coord.exists(PATH).await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_client_surfaces_as_ledger_error() {
        let fx = Fixture::new().await;
        let allocator = fx.allocator(Versioned::absent(Vec::new())).unwrap();
        fx.ledgers.close();
        let err = allocator.allocate().await.unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Ledger(dlog_ledger::LedgerError::ClientUnavailable(_))
        ));
    }
}
