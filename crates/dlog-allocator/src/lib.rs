//! Ledger allocation for the distributed log.
//!
//! Writers need a fresh ledger each time they start a log segment. An
//! allocator creates that ledger ahead of time and records it in the
//! coordination service until it is handed over, so no ledger is leaked if
//! the process fails in between.
//!
//! # Modules
//!
//! - [`error`] -- [`AllocatorError`] and the result alias
//! - [`quorum`] -- Where new ledgers get their quorum from
//! - [`traits`] -- The [`LedgerAllocator`] trait
//! - [`simple`] -- [`SimpleLedgerAllocator`], one ledger at a time
//! - [`pool`] -- [`LedgerAllocatorPool`], shared pre-allocation
//! - [`delegator`] -- [`LedgerAllocatorDelegator`], optional ownership

pub mod delegator;
pub mod error;
pub mod pool;
pub mod quorum;
pub mod simple;
pub mod traits;

pub use delegator::LedgerAllocatorDelegator;
pub use error::{AllocatorError, AllocatorResult};
pub use pool::LedgerAllocatorPool;
pub use quorum::{DynamicQuorumConfigProvider, ImmutableQuorumConfigProvider, QuorumConfigProvider};
pub use simple::SimpleLedgerAllocator;
pub use traits::LedgerAllocator;
