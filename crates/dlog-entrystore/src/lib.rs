//! Log segment entry storage over a replicated ledger store.
//!
//! Every log segment is backed by exactly one ledger. This crate maps the
//! segment lifecycle onto ledger operations: readers open the segment's
//! ledger, retention deletes it, and writers get ledgers for new segments
//! from an allocator.
//!
//! # Modules
//!
//! - [`store`] -- [`LogSegmentEntryStore`] and its ledger-backed implementation
//! - [`reader`] -- Sequential segment readers
//! - [`random_access`] -- Point readers
//! - [`writer`] -- Segment writers over allocated ledgers
//! - [`allocator`] -- [`LogSegmentAllocator`], handing out writers
//! - [`scheduler`] -- [`OrderedScheduler`], per-key ordered execution
//! - [`injector`] -- Failure injection for readers
//! - [`error`] -- [`EntryStoreError`] and the result alias

pub mod allocator;
pub mod error;
pub mod injector;
pub mod random_access;
pub mod reader;
pub mod scheduler;
pub mod store;
pub mod writer;

#[cfg(test)]
mod testing;

pub use allocator::LogSegmentAllocator;
pub use error::{EntryStoreError, EntryStoreResult};
pub use injector::{
    AsyncFailureInjector, FailureInjectionConfig, NoopFailureInjector, RandomFailureInjector,
};
pub use random_access::{LedgerSegmentRandomAccessReader, LogSegmentRandomAccessEntryReader};
pub use reader::{LedgerSegmentEntryReader, LogSegmentEntryReader};
pub use scheduler::OrderedScheduler;
pub use store::{
    random_access_open_mode, reader_open_mode, AllocatorStrategy, LedgerEntryStore,
    LogSegmentEntryStore, DIGEST_TYPE,
};
pub use writer::{LedgerSegmentEntryWriter, LogSegmentEntryWriter};
