//! Foundation types for the distributed log.
//!
//! Every other `dlog` crate depends on `dlog-types`. The types here describe
//! log segments and the ledgers that back them; they carry no behaviour that
//! touches the ledger store or the coordination service.
//!
//! # Key Types
//!
//! - [`LedgerId`] -- identity of a ledger in the ledger store
//! - [`EntryId`] -- position of an entry inside a ledger
//! - [`LogSegmentMetadata`] -- a segment of a log and the ledger backing it
//! - [`LogMetadataForWriter`] -- per-log metadata a writer needs to allocate ledgers
//! - [`Versioned`] -- a value paired with its coordination-service version

pub mod error;
pub mod ids;
pub mod log;
pub mod segment;

pub use error::TypeError;
pub use ids::{EntryId, LedgerId};
pub use log::{validate_log_name, LogMetadataForWriter, Versioned};
pub use segment::{LogSegmentMetadata, SegmentState};
