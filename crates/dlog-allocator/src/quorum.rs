//! Sources of the quorum configuration used for new ledgers.

use std::sync::Arc;

use dlog_config::DynamicDistributedLogConfiguration;
use dlog_ledger::QuorumConfig;

/// Supplies the quorum for the next ledger an allocator creates.
///
/// Allocators call this once per allocation and never cache the result.
pub trait QuorumConfigProvider: Send + Sync {
    fn quorum_config(&self) -> QuorumConfig;
}

/// Always returns the same quorum.
#[derive(Debug, Clone, Copy)]
pub struct ImmutableQuorumConfigProvider(QuorumConfig);

impl ImmutableQuorumConfigProvider {
    pub fn new(quorum: QuorumConfig) -> Self {
        Self(quorum)
    }
}

impl QuorumConfigProvider for ImmutableQuorumConfigProvider {
    fn quorum_config(&self) -> QuorumConfig {
        self.0
    }
}

/// Reads the quorum from the dynamic configuration on every call, so
/// reloaded sizes apply to the next allocation.
#[derive(Debug, Clone)]
pub struct DynamicQuorumConfigProvider {
    conf: Arc<DynamicDistributedLogConfiguration>,
}

impl DynamicQuorumConfigProvider {
    pub fn new(conf: Arc<DynamicDistributedLogConfiguration>) -> Self {
        Self { conf }
    }
}

impl QuorumConfigProvider for DynamicQuorumConfigProvider {
    fn quorum_config(&self) -> QuorumConfig {
        QuorumConfig::new(
            self.conf.ensemble_size(),
            self.conf.write_quorum_size(),
            self.conf.ack_quorum_size(),
        )
    }
}
