use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Static configuration, read once at startup.
///
/// Every field has a default so a config file only needs to name what it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedLogConfiguration {
    /// Password protecting ledger digests. Shared by every ledger this
    /// process creates or opens.
    pub bk_digest_pw: String,
    /// Number of replicas a new ledger is striped over.
    pub ensemble_size: usize,
    /// Number of replicas each entry is written to.
    pub write_quorum_size: usize,
    /// Number of acknowledgements required before an entry is confirmed.
    pub ack_quorum_size: usize,
    /// Whether writers share a pool of pre-allocated ledgers.
    pub enable_ledger_allocator_pool: bool,
    /// Path (relative to the namespace root) holding allocator pools.
    pub ledger_allocator_pool_path: String,
    /// Name of this process's pool under `ledger_allocator_pool_path`.
    pub ledger_allocator_pool_name: String,
    /// Number of ledgers the pool keeps allocated ahead of demand.
    pub ledger_allocator_pool_core_size: usize,
    /// Worker tasks in the ordered scheduler.
    pub num_worker_threads: usize,
    /// Entries fetched per read request by sequential readers.
    pub read_ahead_batch_size: usize,
    /// Upper bound on entries a sequential reader returns per call.
    pub read_ahead_max_records: usize,
}

impl Default for DistributedLogConfiguration {
    fn default() -> Self {
        Self {
            bk_digest_pw: String::new(),
            ensemble_size: 3,
            write_quorum_size: 3,
            ack_quorum_size: 2,
            enable_ledger_allocator_pool: false,
            ledger_allocator_pool_path: ".allocation_pool".into(),
            ledger_allocator_pool_name: "default".into(),
            ledger_allocator_pool_core_size: 20,
            num_worker_threads: 4,
            read_ahead_batch_size: 2,
            read_ahead_max_records: 10,
        }
    }
}

impl DistributedLogConfiguration {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let conf: Self = toml::from_str(text)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Read, parse, and validate a TOML config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let conf = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(conf)
    }

    /// Digest password as raw bytes.
    pub fn digest_password(&self) -> Vec<u8> {
        self.bk_digest_pw.as_bytes().to_vec()
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_quorum(
            self.ensemble_size,
            self.write_quorum_size,
            self.ack_quorum_size,
        )?;
        if self.num_worker_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "num_worker_threads",
                reason: "must be at least 1".into(),
            });
        }
        if self.read_ahead_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "read_ahead_batch_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.read_ahead_max_records < self.read_ahead_batch_size {
            return Err(ConfigError::Invalid {
                field: "read_ahead_max_records",
                reason: format!(
                    "{} is smaller than read_ahead_batch_size {}",
                    self.read_ahead_max_records, self.read_ahead_batch_size
                ),
            });
        }
        if self.enable_ledger_allocator_pool {
            if self.ledger_allocator_pool_core_size == 0 {
                return Err(ConfigError::Invalid {
                    field: "ledger_allocator_pool_core_size",
                    reason: "must be at least 1 when the pool is enabled".into(),
                });
            }
            if self.ledger_allocator_pool_path.is_empty()
                || self.ledger_allocator_pool_path.contains('/')
            {
                return Err(ConfigError::Invalid {
                    field: "ledger_allocator_pool_path",
                    reason: "must be a single non-empty path component".into(),
                });
            }
            if self.ledger_allocator_pool_name.is_empty()
                || self.ledger_allocator_pool_name.contains('/')
            {
                return Err(ConfigError::Invalid {
                    field: "ledger_allocator_pool_name",
                    reason: "must be a single non-empty path component".into(),
                });
            }
        }
        Ok(())
    }
}

/// `ensemble >= write quorum >= ack quorum >= 1`.
pub(crate) fn validate_quorum(ensemble: usize, write: usize, ack: usize) -> ConfigResult<()> {
    if ack == 0 {
        return Err(ConfigError::Invalid {
            field: "ack_quorum_size",
            reason: "must be at least 1".into(),
        });
    }
    if write < ack {
        return Err(ConfigError::Invalid {
            field: "write_quorum_size",
            reason: format!("{write} is smaller than ack quorum {ack}"),
        });
    }
    if ensemble < write {
        return Err(ConfigError::Invalid {
            field: "ensemble_size",
            reason: format!("{ensemble} is smaller than write quorum {write}"),
        });
    }
    Ok(())
}
