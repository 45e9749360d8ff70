use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dlog_allocator::{ImmutableQuorumConfigProvider, LedgerAllocator, LedgerAllocatorPool};
use dlog_config::{DistributedLogConfiguration, DynamicDistributedLogConfiguration};
use dlog_coord::{path, CoordinationClient};
use dlog_entrystore::{
    AllocatorStrategy, AsyncFailureInjector, LedgerEntryStore, LogSegmentAllocator,
    LogSegmentEntryStore, OrderedScheduler,
};
use dlog_ledger::{LedgerClientHandle, QuorumConfig};
use dlog_types::{LogMetadataForWriter, Versioned};
use tracing::{debug, info, warn};

use crate::error::{NamespaceError, NamespaceResult};

/// Which side of a log an entry store serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Writer,
    Reader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writer => write!(f, "writer"),
            Self::Reader => write!(f, "reader"),
        }
    }
}

/// Wires entry stores for one namespace.
///
/// Writers and readers get separate stores sharing one scheduler and one
/// ledger client. Only the writer store uses the shared allocator pool.
pub struct NamespaceDriver {
    root_path: String,
    dyn_conf: Arc<DynamicDistributedLogConfiguration>,
    coord: Arc<dyn CoordinationClient>,
    ledgers: Arc<LedgerClientHandle>,
    scheduler: Arc<OrderedScheduler>,
    pool: Option<Arc<LedgerAllocatorPool>>,
    writer_store: LedgerEntryStore,
    reader_store: LedgerEntryStore,
    closed: AtomicBool,
}

impl NamespaceDriver {
    /// Validate `conf`, make sure `root_path` exists, and build the stores.
    ///
    /// With `enable_ledger_allocator_pool` set, the writer pool lives at
    /// `{root_path}/{ledger_allocator_pool_path}/{ledger_allocator_pool_name}`.
    pub async fn initialize(
        conf: DistributedLogConfiguration,
        dyn_conf: Arc<DynamicDistributedLogConfiguration>,
        root_path: impl Into<String>,
        coord: Arc<dyn CoordinationClient>,
        ledgers: Arc<LedgerClientHandle>,
        injector: Arc<dyn AsyncFailureInjector>,
    ) -> NamespaceResult<Self> {
        conf.validate()?;
        let root_path = root_path.into();
        path::validate_path(&root_path)?;
        ensure_path(coord.as_ref(), &root_path).await?;

        let conf = Arc::new(conf);
        let scheduler = Arc::new(OrderedScheduler::new(
            format!("{root_path}-entrystore"),
            conf.num_worker_threads,
        ));

        let pool = if conf.enable_ledger_allocator_pool {
            let pool_path = path::join(
                &path::join(&root_path, &conf.ledger_allocator_pool_path),
                &conf.ledger_allocator_pool_name,
            );
            let quorum = QuorumConfig::new(
                conf.ensemble_size,
                conf.write_quorum_size,
                conf.ack_quorum_size,
            );
            let pool = LedgerAllocatorPool::initialize(
                pool_path,
                conf.ledger_allocator_pool_core_size,
                Arc::new(ImmutableQuorumConfigProvider::new(quorum)),
                Arc::clone(&coord),
                Arc::clone(&ledgers),
                Arc::from(conf.digest_password()),
            )
            .await?;
            // Members allocate on demand too, so a cold pool is not fatal.
            if let Err(e) = pool.allocate().await {
                warn!(pool = %pool.pool_path(), error = %e, "could not pre-allocate pooled ledgers");
            }
            Some(pool)
        } else {
            None
        };

        let store = |strategy| {
            LedgerEntryStore::new(
                Arc::clone(&conf),
                Arc::clone(&coord),
                Arc::clone(&ledgers),
                Arc::clone(&scheduler),
                strategy,
                Arc::clone(&injector),
            )
        };
        let writer_strategy = match &pool {
            Some(pool) => AllocatorStrategy::SharedPool(Arc::clone(pool) as Arc<dyn LedgerAllocator>),
            None => AllocatorStrategy::Direct,
        };
        let writer_store = store(writer_strategy);
        let reader_store = store(AllocatorStrategy::Direct);

        info!(root = %root_path, pooled = pool.is_some(),
            workers = scheduler.num_workers(), "namespace driver initialized");
        Ok(Self {
            root_path,
            dyn_conf,
            coord,
            ledgers,
            scheduler,
            pool,
            writer_store,
            reader_store,
            closed: AtomicBool::new(false),
        })
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn dyn_conf(&self) -> &Arc<DynamicDistributedLogConfiguration> {
        &self.dyn_conf
    }

    pub fn pool(&self) -> Option<&Arc<LedgerAllocatorPool>> {
        self.pool.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> NamespaceResult<()> {
        if self.is_closed() {
            return Err(NamespaceError::Closed(self.root_path.clone()));
        }
        Ok(())
    }

    /// The entry store serving `role`.
    pub fn entry_store(&self, role: Role) -> NamespaceResult<&LedgerEntryStore> {
        self.check_open()?;
        Ok(match role {
            Role::Writer => &self.writer_store,
            Role::Reader => &self.reader_store,
        })
    }

    /// Root path of `log_name` in this namespace.
    pub fn log_root_path(&self, log_name: &str) -> String {
        path::join(&self.root_path, log_name)
    }

    /// Writer metadata for `log_name`, creating the log root if needed.
    ///
    /// Carries the current allocation record, or an absent record when the
    /// log has never allocated.
    pub async fn writer_metadata(&self, log_name: &str) -> NamespaceResult<LogMetadataForWriter> {
        self.check_open()?;
        dlog_types::validate_log_name(log_name)?;
        let log_root = self.log_root_path(log_name);
        ensure_path(self.coord.as_ref(), &log_root).await?;

        let allocation_path = path::join(&log_root, LogMetadataForWriter::ALLOCATION_NODE);
        let allocation_data = match self.coord.get_data(&allocation_path).await {
            Ok(data) => data,
            Err(e) if e.is_no_node() => Versioned::absent(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        debug!(log = log_name, exists = allocation_data.exists(), "loaded writer metadata");
        Ok(LogMetadataForWriter::new(log_name, log_root, allocation_data)?)
    }

    /// Allocator for new segments of `log_name`, shaped by the current
    /// dynamic configuration.
    pub async fn segment_allocator(&self, log_name: &str) -> NamespaceResult<LogSegmentAllocator> {
        let metadata = self.writer_metadata(log_name).await?;
        let store = self.entry_store(Role::Writer)?;
        Ok(store.new_log_segment_allocator(&metadata, Arc::clone(&self.dyn_conf))?)
    }

    /// Close the pool, stop the scheduler and release the ledger client.
    /// Later calls are no-ops.
    pub async fn close(&self) -> NamespaceResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let pool_result = match &self.pool {
            Some(pool) => pool.close().await,
            None => Ok(()),
        };
        self.scheduler.shutdown();
        self.ledgers.close();
        info!(root = %self.root_path, "namespace driver closed");
        Ok(pool_result?)
    }
}

async fn ensure_path(coord: &dyn CoordinationClient, full_path: &str) -> NamespaceResult<()> {
    if coord.exists(full_path).await?.is_some() {
        return Ok(());
    }
    match coord.create_full_path(full_path, &[]).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_node_exists() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl fmt::Debug for NamespaceDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceDriver")
            .field("root_path", &self.root_path)
            .field("pooled", &self.pool.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
