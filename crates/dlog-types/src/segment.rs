use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{EntryId, LedgerId};

/// Lifecycle state of a log segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentState {
    /// A writer may still be appending to the backing ledger.
    InProgress,
    /// The segment is sealed; its backing ledger is immutable.
    Completed,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "inprogress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Metadata describing one segment of a log and the ledger that backs it.
///
/// The entry store treats this as read-only input: it decides how to open
/// the ledger from [`LogSegmentMetadata::is_in_progress`] and uses the
/// ledger id as the target of every store request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSegmentMetadata {
    log_name: String,
    sequence_number: u64,
    ledger_id: LedgerId,
    first_tx_id: i64,
    state: SegmentState,
    last_tx_id: Option<i64>,
    last_entry_id: Option<EntryId>,
    record_count: u64,
    created_at: DateTime<Utc>,
}

impl LogSegmentMetadata {
    /// Describe a freshly rolled, in-progress segment.
    pub fn in_progress(
        log_name: impl Into<String>,
        sequence_number: u64,
        ledger_id: LedgerId,
        first_tx_id: i64,
    ) -> Self {
        Self {
            log_name: log_name.into(),
            sequence_number,
            ledger_id,
            first_tx_id,
            state: SegmentState::InProgress,
            last_tx_id: None,
            last_entry_id: None,
            record_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Seal this segment, recording where its ledger ends.
    pub fn complete(
        &self,
        last_tx_id: i64,
        last_entry_id: Option<EntryId>,
        record_count: u64,
    ) -> Result<Self, TypeError> {
        if !self.is_in_progress() {
            return Err(TypeError::SegmentCompleted(self.to_string()));
        }
        Ok(Self {
            state: SegmentState::Completed,
            last_tx_id: Some(last_tx_id),
            last_entry_id,
            record_count,
            ..self.clone()
        })
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Identity of the ledger backing this segment.
    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn first_tx_id(&self) -> i64 {
        self.first_tx_id
    }

    pub fn last_tx_id(&self) -> Option<i64> {
        self.last_tx_id
    }

    /// Last entry of a completed segment. `None` while in progress or when
    /// the segment was sealed empty.
    pub fn last_entry_id(&self) -> Option<EntryId> {
        self.last_entry_id
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` while a writer may still append to the segment.
    pub fn is_in_progress(&self) -> bool {
        self.state == SegmentState::InProgress
    }
}

impl fmt::Display for LogSegmentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[LogSegment:{}#{} ledger={} state={} firstTx={}]",
            self.log_name, self.sequence_number, self.ledger_id, self.state, self.first_tx_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_segment_is_in_progress() {
        let seg = LogSegmentMetadata::in_progress("orders", 3, LedgerId::new(42), 100);
        assert!(seg.is_in_progress());
        assert_eq!(seg.ledger_id(), LedgerId::new(42));
        assert_eq!(seg.last_entry_id(), None);
        assert_eq!(seg.record_count(), 0);
    }

    #[test]
    fn complete_seals_segment() {
        let seg = LogSegmentMetadata::in_progress("orders", 3, LedgerId::new(42), 100);
        let sealed = seg.complete(150, Some(50), 51).unwrap();
        assert!(!sealed.is_in_progress());
        assert_eq!(sealed.state(), SegmentState::Completed);
        assert_eq!(sealed.last_entry_id(), Some(50));
        assert_eq!(sealed.last_tx_id(), Some(150));
        assert_eq!(sealed.ledger_id(), seg.ledger_id());
        assert_eq!(sealed.created_at(), seg.created_at());
    }

    #[test]
    fn completing_twice_fails() {
        let seg = LogSegmentMetadata::in_progress("orders", 1, LedgerId::new(1), 0);
        let sealed = seg.complete(0, None, 0).unwrap();
        assert!(matches!(
            sealed.complete(1, None, 0),
            Err(TypeError::SegmentCompleted(_))
        ));
    }

    #[test]
    fn display_names_log_and_ledger() {
        let seg = LogSegmentMetadata::in_progress("orders", 3, LedgerId::new(7), 0);
        let text = seg.to_string();
        assert!(text.contains("orders#3"));
        assert!(text.contains("ledger=7"));
        assert!(text.contains("inprogress"));
    }
}
