//! A pool of simple allocators shared by every writer in a process.
//!
//! The pool node holds one sequential child per member allocator. Each
//! member keeps one ledger allocated ahead of demand, so a writer rolling a
//! segment usually gets a ledger without waiting on the ledger store.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dlog_coord::{path, CoordinationClient, CreateMode};
use dlog_ledger::{LedgerClientHandle, LedgerHandle};
use dlog_types::Versioned;
use tracing::{info, warn};

use crate::error::{AllocatorError, AllocatorResult};
use crate::quorum::QuorumConfigProvider;
use crate::simple::SimpleLedgerAllocator;
use crate::traits::LedgerAllocator;

/// Name prefix of member allocator nodes under the pool node.
const MEMBER_PREFIX: &str = "allocator-";

/// A fixed-size pool of [`SimpleLedgerAllocator`]s.
pub struct LedgerAllocatorPool {
    pool_path: String,
    members: Vec<Arc<SimpleLedgerAllocator>>,
    next: AtomicUsize,
    closed: AtomicBool,
    coord: Arc<dyn CoordinationClient>,
}

impl LedgerAllocatorPool {
    /// Open the pool at `pool_path`, creating it if needed.
    ///
    /// Existing member nodes are reused, with any ledgers they recorded
    /// reclaimed on first allocation. Missing members are created until the
    /// pool has `core_size` of them.
    pub async fn initialize(
        pool_path: impl Into<String>,
        core_size: usize,
        quorum: Arc<dyn QuorumConfigProvider>,
        coord: Arc<dyn CoordinationClient>,
        ledgers: Arc<LedgerClientHandle>,
        password: Arc<[u8]>,
    ) -> AllocatorResult<Arc<Self>> {
        let pool_path = pool_path.into();
        path::validate_path(&pool_path).map_err(|e| AllocatorError::InvalidPath {
            path: pool_path.clone(),
            reason: e.to_string(),
        })?;
        if coord.exists(&pool_path).await?.is_none() {
            match coord.create_full_path(&pool_path, &[]).await {
                Ok(_) => {}
                Err(e) if e.is_node_exists() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let member = |member_path: String, data| {
            SimpleLedgerAllocator::new(
                member_path,
                data,
                Arc::clone(&quorum),
                Arc::clone(&coord),
                Arc::clone(&ledgers),
                Arc::clone(&password),
            )
            .map(Arc::new)
        };

        let mut members = Vec::with_capacity(core_size);
        for child in coord.get_children(&pool_path).await? {
            let member_path = path::join(&pool_path, &child);
            let data = coord.get_data(&member_path).await?;
            members.push(member(member_path, data)?);
        }
        let reused = members.len();
        while members.len() < core_size {
            let prefix = path::join(&pool_path, MEMBER_PREFIX);
            let member_path = coord
                .create(&prefix, &[], CreateMode::PersistentSequential)
                .await?;
            members.push(member(member_path, Versioned::new(Vec::new(), Some(0)))?);
        }

        info!(pool = %pool_path, size = members.len(), reused, "ledger allocator pool initialized");
        Ok(Arc::new(Self {
            pool_path,
            members,
            next: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            coord,
        }))
    }

    pub fn pool_path(&self) -> &str {
        &self.pool_path
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Number of members holding an allocated ledger right now.
    pub async fn ready_count(&self) -> usize {
        let mut ready = 0;
        for member in &self.members {
            if member.allocated_ledger().await.is_some() {
                ready += 1;
            }
        }
        ready
    }

    fn check_open(&self) -> AllocatorResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AllocatorError::Closed(self.pool_path.clone()));
        }
        Ok(())
    }

    /// Refill a member in the background after it handed a ledger over.
    fn refill(&self, member: Arc<SimpleLedgerAllocator>) {
        tokio::spawn(async move {
            if let Err(e) = member.allocate().await {
                warn!(path = %member.path(), error = %e, "failed to refill pooled allocator");
            }
        });
    }
}

#[async_trait]
impl LedgerAllocator for LedgerAllocatorPool {
    async fn allocate(&self) -> AllocatorResult<()> {
        self.check_open()?;
        let mut ready = 0;
        let mut last_error = None;
        for member in &self.members {
            match member.allocate().await {
                Ok(()) => ready += 1,
                Err(e) => {
                    warn!(path = %member.path(), error = %e, "pooled allocator failed to allocate");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if ready == 0 => Err(e),
            _ => Ok(()),
        }
    }

    async fn try_obtain(&self) -> AllocatorResult<LedgerHandle> {
        self.check_open()?;
        let size = self.members.len();
        let mut last_error = None;
        for _ in 0..size {
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % size;
            let member = Arc::clone(&self.members[idx]);
            match member.try_obtain().await {
                Ok(handle) => {
                    self.refill(member);
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(path = %member.path(), error = %e, "pooled allocator could not hand over");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AllocatorError::NotReady(self.pool_path.clone())))
    }

    async fn close(&self) -> AllocatorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut first_error = None;
        for member in &self.members {
            if let Err(e) = member.close().await {
                first_error.get_or_insert(e);
            }
        }
        info!(pool = %self.pool_path, "ledger allocator pool closed");
        first_error.map_or(Ok(()), Err)
    }

    async fn delete(&self) -> AllocatorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        for member in &self.members {
            member.delete().await?;
        }
        match self.coord.delete(&self.pool_path, None).await {
            Ok(()) => {}
            Err(e) if e.is_no_node() => {}
            Err(e) => return Err(e.into()),
        }
        info!(pool = %self.pool_path, "ledger allocator pool deleted");
        Ok(())
    }
}

impl fmt::Debug for LedgerAllocatorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerAllocatorPool")
            .field("pool_path", &self.pool_path)
            .field("size", &self.members.len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::ImmutableQuorumConfigProvider;
    use dlog_coord::InMemoryCoordination;
    use dlog_ledger::{InMemoryLedgerStore, LedgerClient, QuorumConfig};
    use std::time::Duration;

    const POOL: &str = "/ns/.allocation_pool/default";

    async fn pool(
        store: &InMemoryLedgerStore,
        coord: &Arc<InMemoryCoordination>,
        core_size: usize,
    ) -> Arc<LedgerAllocatorPool> {
        let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
        LedgerAllocatorPool::initialize(
            POOL,
            core_size,
            Arc::new(ImmutableQuorumConfigProvider::new(QuorumConfig::new(3, 3, 2))),
            Arc::clone(coord) as Arc<dyn CoordinationClient>,
            Arc::new(LedgerClientHandle::new("test", client)),
            Arc::from(&b"pw"[..]),
        )
        .await
        .unwrap()
    }

    async fn wait_until_ready(pool: &LedgerAllocatorPool, expected: usize) {
        for _ in 0..100 {
            if pool.ready_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pool never reached {expected} ready members");
    }

    #[tokio::test]
    async fn initialize_creates_members() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let pool = pool(&store, &coord, 3).await;

        assert_eq!(pool.size(), 3);
        assert_eq!(
            coord.get_children(POOL).await.unwrap(),
            vec![
                "allocator-0000000000".to_string(),
                "allocator-0000000001".to_string(),
                "allocator-0000000002".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn reinitialize_reuses_members_and_reclaims_ledgers() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let first = pool(&store, &coord, 2).await;
        first.allocate().await.unwrap();
        let stale = store.ledger_ids();
        assert_eq!(stale.len(), 2);
        first.close().await.unwrap();

        let second = pool(&store, &coord, 2).await;
        assert_eq!(coord.get_children(POOL).await.unwrap().len(), 2);
        second.allocate().await.unwrap();
        let live = store.ledger_ids();
        assert_eq!(live.len(), 2);
        assert!(stale.iter().all(|id| !live.contains(id)));
    }

    #[tokio::test]
    async fn allocate_fills_every_member() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let pool = pool(&store, &coord, 3).await;
        pool.allocate().await.unwrap();
        assert_eq!(pool.ready_count().await, 3);
    }

    #[tokio::test]
    async fn try_obtain_hands_out_distinct_ledgers_and_refills() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let pool = pool(&store, &coord, 2).await;
        pool.allocate().await.unwrap();

        let a = pool.try_obtain().await.unwrap();
        let b = pool.try_obtain().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.is_writable() && b.is_writable());

        wait_until_ready(&pool, 2).await;
        assert_eq!(store.ledger_ids().len(), 4);
    }

    #[tokio::test]
    async fn closed_pool_refuses_work() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let pool = pool(&store, &coord, 1).await;
        pool.close().await.unwrap();
        assert!(matches!(
            pool.try_obtain().await,
            Err(AllocatorError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_pool_node() {
        let store = InMemoryLedgerStore::new();
        let coord = Arc::new(InMemoryCoordination::new());
        let pool = pool(&store, &coord, 2).await;
        pool.allocate().await.unwrap();
        pool.delete().await.unwrap();

        assert_eq!(coord.exists(POOL).await.unwrap(), None);
        assert!(store.ledger_ids().is_empty());
    }
}
