//! Ledger store contract for the distributed log.
//!
//! A ledger is an append-only, replicated sequence of entries. Each log
//! segment is backed by exactly one ledger. This crate defines how the rest
//! of the system talks to the store:
//!
//! - [`LedgerClient`] is the callback-style store interface. Every request
//!   completes exactly once with a value or a numeric [`StatusCode`].
//! - [`completion`] bridges those callbacks into awaitable [`Completion`]s.
//! - [`LedgerHandle`] is scoped ownership of an opened or created ledger and
//!   releases itself when dropped unclaimed.
//! - [`InMemoryLedgerStore`] implements the contract in memory, with failure
//!   and delay injection for tests.
//!
//! # Modules
//!
//! - [`status`] -- Store status codes
//! - [`error`] -- [`LedgerError`] and the result alias
//! - [`digest`] -- Entry digests
//! - [`quorum`] -- Replica counts
//! - [`client`] -- The [`LedgerClient`] trait and the closable client holder
//! - [`handle`] -- [`LedgerHandle`]
//! - [`memory`] -- [`InMemoryLedgerStore`]

pub mod client;
pub mod completion;
pub mod digest;
pub mod error;
pub mod handle;
pub mod memory;
pub mod quorum;
pub mod status;

pub use client::{
    LedgerCallback, LedgerClient, LedgerClientHandle, LedgerEntry, LedgerMetadata, OpenMode,
};
pub use completion::{classify, completion, submit, Completer, Completion};
pub use digest::DigestType;
pub use error::{LedgerError, LedgerResult};
pub use handle::{HandleMode, LedgerHandle};
pub use memory::{InMemoryLedgerStore, LedgerOp};
pub use quorum::QuorumConfig;
pub use status::StatusCode;
