use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A value read from the coordination service together with the node version
/// it was read at.
///
/// A `None` version means the node did not exist when the value was read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Option<i64>,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: Option<i64>) -> Self {
        Self { value, version }
    }

    /// A value for a node that does not exist yet.
    pub fn absent(value: T) -> Self {
        Self {
            value,
            version: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.version.is_some()
    }
}

/// Per-log metadata a writer needs in order to allocate ledgers.
///
/// The allocation path is the coordination node under which the writer
/// records ledgers it has allocated but not yet handed over. The allocation
/// data is that node's content at the time the metadata was read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogMetadataForWriter {
    log_name: String,
    log_root_path: String,
    allocation_path: String,
    allocation_data: Versioned<Vec<u8>>,
}

impl LogMetadataForWriter {
    /// Child node of the log root holding the allocation record.
    pub const ALLOCATION_NODE: &'static str = "<allocation>";

    pub fn new(
        log_name: impl Into<String>,
        log_root_path: impl Into<String>,
        allocation_data: Versioned<Vec<u8>>,
    ) -> Result<Self, TypeError> {
        let log_name = log_name.into();
        validate_log_name(&log_name)?;
        let log_root_path = log_root_path.into();
        let allocation_path = format!("{log_root_path}/{}", Self::ALLOCATION_NODE);
        Ok(Self {
            log_name,
            log_root_path,
            allocation_path,
            allocation_data,
        })
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn log_root_path(&self) -> &str {
        &self.log_root_path
    }

    pub fn allocation_path(&self) -> &str {
        &self.allocation_path
    }

    pub fn allocation_data(&self) -> &Versioned<Vec<u8>> {
        &self.allocation_data
    }
}

/// Validate a log stream name.
///
/// Names become a single coordination path component, so they must be
/// non-empty, must not contain `/`, must not start with `.`, and must not
/// contain control characters or `<` (reserved for internal nodes).
pub fn validate_log_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidLogName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("name starts with '.'"));
    }
    if name.contains('/') {
        return Err(invalid("name contains '/'"));
    }
    if name.contains('<') || name.contains('>') {
        return Err(invalid("name contains a reserved character"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("name contains a control character"));
    }
    Ok(())
}
