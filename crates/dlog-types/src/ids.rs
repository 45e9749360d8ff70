use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Position of an entry inside a ledger. The first entry of a ledger is `0`.
pub type EntryId = u64;

/// Identity of a ledger in the ledger store.
///
/// Ledger ids are opaque positive integers assigned by the store at creation
/// time. They never change and are never reused while the ledger exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(u64);

impl LedgerId {
    /// Wrap a raw ledger id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Decimal UTF-8 encoding, the form ledger ids take when recorded at an
    /// allocation path.
    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    /// Parse the decimal UTF-8 encoding produced by [`LedgerId::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TypeError::InvalidLedgerId(e.to_string()))?;
        text.parse()
    }
}

impl FromStr for LedgerId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| TypeError::InvalidLedgerId(format!("{s:?}: {e}")))
    }
}

impl fmt::Debug for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerId({})", self.0)
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LedgerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_encoding_is_decimal() {
        let id = LedgerId::new(4096);
        assert_eq!(id.to_bytes(), b"4096".to_vec());
        assert_eq!(LedgerId::from_bytes(b"4096").unwrap(), id);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(LedgerId::from_bytes(b"not-a-ledger").is_err());
        assert!(LedgerId::from_bytes(&[0xff, 0xfe]).is_err());
        assert!(LedgerId::from_bytes(b"-3").is_err());
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(LedgerId::new(42).to_string(), "42");
        assert_eq!(format!("{:?}", LedgerId::new(42)), "LedgerId(42)");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&LedgerId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
