//! Scoped ownership of ledgers opened or created through a [`LedgerClient`].

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dlog_types::{EntryId, LedgerId};
use tracing::debug;

use crate::client::{LedgerClient, LedgerEntry, LedgerMetadata, OpenMode};
use crate::completion::{classify, submit, Completion};
use crate::error::{LedgerError, LedgerResult};
use crate::status::StatusCode;

/// What a handle may do with its ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleMode {
    /// Returned by ledger creation; may append and seal.
    Write,
    /// Returned by an open; read-only.
    Read(OpenMode),
}

/// Scoped ownership of an opened or created ledger.
///
/// Whoever holds the handle is responsible for it. Dropping a handle that
/// was never [`close`]d releases it against the client: a read handle gives
/// back its local resources and a write handle seals the ledger. An opened
/// ledger that nobody ends up observing is therefore never leaked.
///
/// [`close`]: LedgerHandle::close
pub struct LedgerHandle {
    metadata: LedgerMetadata,
    mode: HandleMode,
    client: Arc<dyn LedgerClient>,
    last_add_confirmed: Arc<Mutex<Option<EntryId>>>,
    released: bool,
}

impl LedgerHandle {
    /// Take ownership of a ledger returned by a create request.
    pub fn created(client: Arc<dyn LedgerClient>, metadata: LedgerMetadata) -> Self {
        Self::with_mode(client, metadata, HandleMode::Write)
    }

    /// Take ownership of a ledger returned by an open request.
    pub fn opened(client: Arc<dyn LedgerClient>, metadata: LedgerMetadata, mode: OpenMode) -> Self {
        Self::with_mode(client, metadata, HandleMode::Read(mode))
    }

    fn with_mode(client: Arc<dyn LedgerClient>, metadata: LedgerMetadata, mode: HandleMode) -> Self {
        let last_add_confirmed = Arc::new(Mutex::new(metadata.last_entry_id));
        Self {
            metadata,
            mode,
            client,
            last_add_confirmed,
            released: false,
        }
    }

    pub fn id(&self) -> LedgerId {
        self.metadata.ledger_id
    }

    pub fn metadata(&self) -> &LedgerMetadata {
        &self.metadata
    }

    pub fn mode(&self) -> HandleMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode == HandleMode::Write
    }

    /// `true` if the ledger was opened with fencing, so its end is final.
    pub fn is_recovered(&self) -> bool {
        self.mode == HandleMode::Read(OpenMode::Recovery)
    }

    /// Last entry known to be confirmed, as of the latest add or refresh.
    pub fn last_add_confirmed(&self) -> Option<EntryId> {
        *self
            .last_add_confirmed
            .lock()
            .expect("last add confirmed lock poisoned")
    }

    /// Append an entry. Only valid on write handles.
    pub fn add_entry(&self, payload: Bytes) -> Completion<EntryId> {
        let ledger_id = self.id();
        if !self.is_writable() {
            return Completion::ready(Err(LedgerError::transmit(
                format!("Cannot add entry to read-only ledger {ledger_id}"),
                StatusCode::ILLEGAL_OP,
            )));
        }
        let lac = Arc::clone(&self.last_add_confirmed);
        submit(|completer| {
            self.client.async_add_entry(
                ledger_id,
                payload,
                Box::new(move |result| {
                    let result = classify(result, || {
                        format!("Failed to add entry to ledger {ledger_id}")
                    });
                    if let Ok(entry_id) = result {
                        let mut lac = lac.lock().expect("last add confirmed lock poisoned");
                        *lac = Some(lac.map_or(entry_id, |prev| prev.max(entry_id)));
                    }
                    completer.complete(result);
                }),
            );
        })
    }

    /// Read the inclusive range `first..=last`.
    pub fn read_entries(&self, first: EntryId, last: EntryId) -> Completion<Vec<LedgerEntry>> {
        read_entries(&self.client, self.id(), first, last)
    }

    /// Refresh the last-add-confirmed from the store.
    pub fn read_last_confirmed(&self) -> Completion<Option<EntryId>> {
        let ledger_id = self.id();
        let lac = Arc::clone(&self.last_add_confirmed);
        submit(|completer| {
            self.client.async_read_last_confirmed(
                ledger_id,
                Box::new(move |result| {
                    let result = classify(result, || {
                        format!("Failed to read last confirmed of ledger {ledger_id}")
                    });
                    if let Ok(confirmed) = result {
                        *lac.lock().expect("last add confirmed lock poisoned") = confirmed;
                    }
                    completer.complete(result);
                }),
            );
        })
    }

    /// Close the handle. Seals the ledger when this is a write handle.
    pub async fn close(mut self) -> LedgerResult<()> {
        self.released = true;
        let ledger_id = self.id();
        match self.mode {
            HandleMode::Read(_) => {
                self.client.release_handle(ledger_id);
                Ok(())
            }
            HandleMode::Write => {
                let closed: Completion<Option<EntryId>> = submit(|completer| {
                    self.client.async_close_ledger(
                        ledger_id,
                        Box::new(move |result| {
                            completer.complete(classify(result, || {
                                format!("Failed to close ledger {ledger_id}")
                            }));
                        }),
                    );
                });
                let last = closed.await?;
                debug!(ledger_id = %ledger_id, last_entry = ?last, "ledger sealed");
                Ok(())
            }
        }
    }
}

/// Read `first..=last` of a ledger without holding its handle.
///
/// Used where a read must outlive a borrow of the handle, such as work
/// dispatched onto another task.
pub fn read_entries(
    client: &Arc<dyn LedgerClient>,
    ledger_id: LedgerId,
    first: EntryId,
    last: EntryId,
) -> Completion<Vec<LedgerEntry>> {
    submit(|completer| {
        client.async_read_entries(
            ledger_id,
            first,
            last,
            Box::new(move |result| {
                completer.complete(classify(result, || {
                    format!("Failed to read entries [{first}, {last}] of ledger {ledger_id}")
                }));
            }),
        );
    })
}

impl Drop for LedgerHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let ledger_id = self.id();
        match self.mode {
            HandleMode::Read(_) => self.client.release_handle(ledger_id),
            HandleMode::Write => self
                .client
                .async_close_ledger(ledger_id, Box::new(|_| {})),
        }
        debug!(ledger_id = %ledger_id, mode = ?self.mode, "released unclaimed ledger handle");
    }
}

impl fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("ledger_id", &self.id())
            .field("mode", &self.mode)
            .field("last_add_confirmed", &self.last_add_confirmed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestType;
    use crate::memory::InMemoryLedgerStore;
    use crate::quorum::QuorumConfig;

    const PW: &[u8] = b"secret";

    async fn create(store: &InMemoryLedgerStore) -> LedgerHandle {
        let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
        let created: Completion<LedgerMetadata> = submit(|completer| {
            client.async_create_ledger(
                QuorumConfig::new(3, 3, 2),
                DigestType::Crc32,
                PW,
                Box::new(move |r| {
                    completer.complete(classify(r, || "create".into()));
                }),
            );
        });
        LedgerHandle::created(client, created.await.unwrap())
    }

    async fn open(store: &InMemoryLedgerStore, ledger_id: LedgerId) -> LedgerHandle {
        let client: Arc<dyn LedgerClient> = Arc::new(store.clone());
        let opened: Completion<LedgerMetadata> = submit(|completer| {
            client.async_open_ledger(
                ledger_id,
                OpenMode::NoRecovery,
                DigestType::Crc32,
                PW,
                Box::new(move |r| {
                    completer.complete(classify(r, || "open".into()));
                }),
            );
        });
        LedgerHandle::opened(client, opened.await.unwrap(), OpenMode::NoRecovery)
    }

    #[tokio::test]
    async fn dropped_write_handle_seals_its_ledger() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await;
        let ledger_id = writer.id();
        writer.add_entry(Bytes::from_static(b"a")).await.unwrap();
        assert!(!store.is_closed(ledger_id));

        drop(writer);
        tokio::task::yield_now().await;
        assert!(store.is_closed(ledger_id));
        assert_eq!(store.entry_count(ledger_id), 1);
    }

    #[tokio::test]
    async fn dropped_read_handle_is_released() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await;
        let reader = open(&store, writer.id()).await;
        assert_eq!(store.open_handle_count(writer.id()), 1);

        drop(reader);
        assert_eq!(store.open_handle_count(writer.id()), 0);
        assert!(!store.is_closed(writer.id()));
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_write_handle_is_not_sealed_twice() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await;
        let ledger_id = writer.id();
        writer.add_entry(Bytes::from_static(b"a")).await.unwrap();
        writer.close().await.unwrap();
        assert!(store.is_closed(ledger_id));
        assert_eq!(store.entry_count(ledger_id), 1);
    }

    #[tokio::test]
    async fn read_handle_rejects_appends() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await;
        let reader = open(&store, writer.id()).await;
        assert!(!reader.is_writable());
        let err = reader
            .add_entry(Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::ILLEGAL_OP));
        assert_eq!(store.entry_count(writer.id()), 0);
    }
}
