use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{validate_quorum, DistributedLogConfiguration};
use crate::error::ConfigResult;

/// Overrides that may be applied while the process is running.
///
/// Unset fields fall back to the static configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicSettings {
    pub ensemble_size: Option<usize>,
    pub write_quorum_size: Option<usize>,
    pub ack_quorum_size: Option<usize>,
    pub enable_ledger_allocator_pool: Option<bool>,
}

/// Runtime-reloadable view over a [`DistributedLogConfiguration`].
///
/// Getters read the current overrides on every call. Callers that need a
/// consistent view of several values should take a [`snapshot`].
///
/// [`snapshot`]: DynamicDistributedLogConfiguration::snapshot
#[derive(Debug)]
pub struct DynamicDistributedLogConfiguration {
    base: DistributedLogConfiguration,
    overrides: RwLock<DynamicSettings>,
}

impl DynamicDistributedLogConfiguration {
    pub fn new(base: DistributedLogConfiguration) -> Self {
        Self {
            base,
            overrides: RwLock::new(DynamicSettings::default()),
        }
    }

    /// Replace the current overrides. Rejected overrides leave the previous
    /// ones in place.
    pub fn update(&self, settings: DynamicSettings) -> ConfigResult<()> {
        let merged = self.merge(&settings);
        validate_quorum(
            merged.ensemble_size,
            merged.write_quorum_size,
            merged.ack_quorum_size,
        )?;
        *self.overrides.write().expect("dynamic config lock poisoned") = settings;
        info!(
            ensemble = merged.ensemble_size,
            write_quorum = merged.write_quorum_size,
            ack_quorum = merged.ack_quorum_size,
            pool = merged.enable_ledger_allocator_pool,
            "dynamic configuration updated"
        );
        Ok(())
    }

    /// Parse overrides from TOML and apply them.
    pub fn reload_from_toml_str(&self, text: &str) -> ConfigResult<()> {
        let settings: DynamicSettings = toml::from_str(text)?;
        self.update(settings)
    }

    /// The static configuration this view is layered on.
    pub fn base(&self) -> &DistributedLogConfiguration {
        &self.base
    }

    /// Effective configuration right now.
    pub fn snapshot(&self) -> DistributedLogConfiguration {
        let overrides = self.overrides.read().expect("dynamic config lock poisoned");
        self.merge(&overrides)
    }

    pub fn ensemble_size(&self) -> usize {
        self.read(|o| o.ensemble_size).unwrap_or(self.base.ensemble_size)
    }

    pub fn write_quorum_size(&self) -> usize {
        self.read(|o| o.write_quorum_size)
            .unwrap_or(self.base.write_quorum_size)
    }

    pub fn ack_quorum_size(&self) -> usize {
        self.read(|o| o.ack_quorum_size)
            .unwrap_or(self.base.ack_quorum_size)
    }

    pub fn enable_ledger_allocator_pool(&self) -> bool {
        self.read(|o| o.enable_ledger_allocator_pool)
            .unwrap_or(self.base.enable_ledger_allocator_pool)
    }

    fn read<T>(&self, f: impl FnOnce(&DynamicSettings) -> Option<T>) -> Option<T> {
        f(&self.overrides.read().expect("dynamic config lock poisoned"))
    }

    fn merge(&self, o: &DynamicSettings) -> DistributedLogConfiguration {
        DistributedLogConfiguration {
            ensemble_size: o.ensemble_size.unwrap_or(self.base.ensemble_size),
            write_quorum_size: o.write_quorum_size.unwrap_or(self.base.write_quorum_size),
            ack_quorum_size: o.ack_quorum_size.unwrap_or(self.base.ack_quorum_size),
            enable_ledger_allocator_pool: o
                .enable_ledger_allocator_pool
                .unwrap_or(self.base.enable_ledger_allocator_pool),
            ..self.base.clone()
        }
    }
}

impl Default for DynamicDistributedLogConfiguration {
    fn default() -> Self {
        Self::new(DistributedLogConfiguration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn falls_back_to_base() {
        let dyn_conf = DynamicDistributedLogConfiguration::default();
        assert_eq!(dyn_conf.ensemble_size(), 3);
        assert_eq!(dyn_conf.ack_quorum_size(), 2);
        assert!(!dyn_conf.enable_ledger_allocator_pool());
    }

    #[test]
    fn update_is_visible_to_next_read() {
        let dyn_conf = DynamicDistributedLogConfiguration::default();
        dyn_conf
            .update(DynamicSettings {
                ensemble_size: Some(5),
                write_quorum_size: Some(4),
                enable_ledger_allocator_pool: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(dyn_conf.ensemble_size(), 5);
        assert_eq!(dyn_conf.write_quorum_size(), 4);
        assert_eq!(dyn_conf.ack_quorum_size(), 2);
        assert!(dyn_conf.enable_ledger_allocator_pool());
    }

    #[test]
    fn invalid_update_keeps_previous_overrides() {
        let dyn_conf = DynamicDistributedLogConfiguration::default();
        dyn_conf.reload_from_toml_str("ensemble_size = 4").unwrap();
        let err = dyn_conf
            .reload_from_toml_str("write_quorum_size = 9")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert_eq!(dyn_conf.ensemble_size(), 4);
        assert_eq!(dyn_conf.write_quorum_size(), 3);
    }

    #[test]
    fn snapshot_merges_overrides() {
        let base = DistributedLogConfiguration {
            bk_digest_pw: "pw".into(),
            ..Default::default()
        };
        let dyn_conf = DynamicDistributedLogConfiguration::new(base);
        dyn_conf.reload_from_toml_str("ack_quorum_size = 1").unwrap();
        let snap = dyn_conf.snapshot();
        assert_eq!(snap.ack_quorum_size, 1);
        assert_eq!(snap.bk_digest_pw, "pw");
    }
}
