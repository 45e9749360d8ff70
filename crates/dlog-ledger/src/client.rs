use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use dlog_types::{EntryId, LedgerId};

use crate::digest::DigestType;
use crate::error::{LedgerError, LedgerResult};
use crate::quorum::QuorumConfig;
use crate::status::StatusCode;

/// Callback receiving the outcome of one store request.
///
/// Invoked exactly once, on a thread or task owned by the client.
pub type LedgerCallback<T> = Box<dyn FnOnce(Result<T, StatusCode>) + Send + 'static>;

/// How an existing ledger is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Fence off any writer and recover the ledger's true end.
    Recovery,
    /// Open read-only without disturbing a live writer.
    NoRecovery,
}

impl OpenMode {
    pub fn is_fencing(self) -> bool {
        self == Self::Recovery
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recovery => write!(f, "recovery"),
            Self::NoRecovery => write!(f, "no-recovery"),
        }
    }
}

/// Store-side description of a ledger at the time it was created or opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerMetadata {
    pub ledger_id: LedgerId,
    pub quorum: QuorumConfig,
    pub digest: DigestType,
    /// `true` once the ledger is sealed (closed by its writer or recovered).
    pub closed: bool,
    /// Last confirmed entry, `None` for an empty ledger.
    pub last_entry_id: Option<EntryId>,
    /// Total payload bytes.
    pub length: u64,
}

/// One entry read back from a ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub ledger_id: LedgerId,
    pub entry_id: EntryId,
    pub payload: Bytes,
}

/// Client of the replicated ledger store.
///
/// Every request completes through its callback exactly once. Requests are
/// not ordered relative to each other unless they target the same ledger.
pub trait LedgerClient: Send + Sync {
    /// Create a new ledger writable by the caller.
    fn async_create_ledger(
        &self,
        quorum: QuorumConfig,
        digest: DigestType,
        password: &[u8],
        cb: LedgerCallback<LedgerMetadata>,
    );

    /// Open an existing ledger for reading.
    fn async_open_ledger(
        &self,
        ledger_id: LedgerId,
        mode: OpenMode,
        digest: DigestType,
        password: &[u8],
        cb: LedgerCallback<LedgerMetadata>,
    );

    /// Delete a ledger and its entries.
    fn async_delete_ledger(&self, ledger_id: LedgerId, cb: LedgerCallback<()>);

    /// Append an entry through a write handle.
    fn async_add_entry(&self, ledger_id: LedgerId, payload: Bytes, cb: LedgerCallback<EntryId>);

    /// Read the inclusive entry range `first..=last`.
    fn async_read_entries(
        &self,
        ledger_id: LedgerId,
        first: EntryId,
        last: EntryId,
        cb: LedgerCallback<Vec<LedgerEntry>>,
    );

    /// Ask for the current last-add-confirmed entry.
    fn async_read_last_confirmed(&self, ledger_id: LedgerId, cb: LedgerCallback<Option<EntryId>>);

    /// Seal a ledger through its write handle, releasing the handle.
    fn async_close_ledger(&self, ledger_id: LedgerId, cb: LedgerCallback<Option<EntryId>>);

    /// Release the local resources of a read-only handle.
    fn release_handle(&self, ledger_id: LedgerId);
}

/// Named, closable holder of the shared [`LedgerClient`].
///
/// Components keep the holder rather than the client so a shutdown makes
/// every later request fail with [`LedgerError::ClientUnavailable`].
pub struct LedgerClientHandle {
    name: String,
    client: RwLock<Option<Arc<dyn LedgerClient>>>,
}

impl LedgerClientHandle {
    pub fn new(name: impl Into<String>, client: Arc<dyn LedgerClient>) -> Self {
        Self {
            name: name.into(),
            client: RwLock::new(Some(client)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live client, or `ClientUnavailable` after [`close`].
    ///
    /// [`close`]: LedgerClientHandle::close
    pub fn get(&self) -> LedgerResult<Arc<dyn LedgerClient>> {
        self.client
            .read()
            .expect("ledger client lock poisoned")
            .clone()
            .ok_or_else(|| LedgerError::ClientUnavailable(self.name.clone()))
    }

    pub fn close(&self) {
        let previous = self
            .client
            .write()
            .expect("ledger client lock poisoned")
            .take();
        if previous.is_some() {
            tracing::info!(client = %self.name, "ledger client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client
            .read()
            .expect("ledger client lock poisoned")
            .is_none()
    }
}

impl fmt::Debug for LedgerClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClientHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
