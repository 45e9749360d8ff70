use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Replica counts governing a ledger's durability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuorumConfig {
    pub ensemble_size: usize,
    pub write_quorum_size: usize,
    pub ack_quorum_size: usize,
}

impl QuorumConfig {
    pub fn new(ensemble_size: usize, write_quorum_size: usize, ack_quorum_size: usize) -> Self {
        Self {
            ensemble_size,
            write_quorum_size,
            ack_quorum_size,
        }
    }

    /// Check `ensemble >= write quorum >= ack quorum >= 1`.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.ack_quorum_size == 0
            || self.write_quorum_size < self.ack_quorum_size
            || self.ensemble_size < self.write_quorum_size
        {
            return Err(LedgerError::InvalidQuorum(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for QuorumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ensemble={} write={} ack={}",
            self.ensemble_size, self.write_quorum_size, self.ack_quorum_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_ordering() {
        assert!(QuorumConfig::new(3, 3, 2).validate().is_ok());
        assert!(QuorumConfig::new(1, 1, 1).validate().is_ok());
        assert!(QuorumConfig::new(2, 3, 2).validate().is_err());
        assert!(QuorumConfig::new(3, 2, 3).validate().is_err());
        assert!(QuorumConfig::new(3, 3, 0).validate().is_err());
    }
}
