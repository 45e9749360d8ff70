use std::fmt;

use dlog_types::{EntryId, LedgerId};

/// Digest algorithm protecting ledger entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestType {
    /// CRC32 over ledger id, entry id, and payload.
    Crc32,
    /// BLAKE3 keyed hash, keyed by the ledger password.
    Mac,
}

impl DigestType {
    /// Compute the digest of one entry.
    ///
    /// The ledger and entry ids are mixed in so an entry cannot be replayed
    /// at another position with a valid digest.
    pub fn compute(
        self,
        password: &[u8],
        ledger_id: LedgerId,
        entry_id: EntryId,
        payload: &[u8],
    ) -> u64 {
        match self {
            Self::Crc32 => {
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&ledger_id.get().to_le_bytes());
                hasher.update(&entry_id.to_le_bytes());
                hasher.update(payload);
                u64::from(hasher.finalize())
            }
            Self::Mac => {
                let key = blake3::hash(password);
                let mut hasher = blake3::Hasher::new_keyed(key.as_bytes());
                hasher.update(&ledger_id.get().to_le_bytes());
                hasher.update(&entry_id.to_le_bytes());
                hasher.update(payload);
                let out = hasher.finalize();
                let mut first = [0u8; 8];
                first.copy_from_slice(&out.as_bytes()[..8]);
                u64::from_le_bytes(first)
            }
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => write!(f, "CRC32"),
            Self::Mac => write!(f, "MAC"),
        }
    }
}
