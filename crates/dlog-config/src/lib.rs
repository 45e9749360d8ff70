//! Configuration for the distributed log.
//!
//! Two layers:
//!
//! - [`DistributedLogConfiguration`] -- static settings loaded once from TOML
//!   (digest password, allocator pool layout, worker counts).
//! - [`DynamicDistributedLogConfiguration`] -- settings that may change while
//!   the process runs (quorum sizing, pool enablement). Readers sample it on
//!   every use; nothing caches a value across operations.

pub mod config;
pub mod dynamic;
pub mod error;

pub use config::DistributedLogConfiguration;
pub use dynamic::{DynamicDistributedLogConfiguration, DynamicSettings};
pub use error::{ConfigError, ConfigResult};
