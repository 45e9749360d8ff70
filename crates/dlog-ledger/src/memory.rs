//! In-memory ledger store for tests, demos, and embedding.
//!
//! [`InMemoryLedgerStore`] implements the full [`LedgerClient`] contract:
//! recovery opens fence the ledger, passwords and digest types are checked,
//! and every entry carries a digest that is verified on read. Failures and
//! delays can be injected per operation so callers can exercise their
//! error paths.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use dlog_types::{EntryId, LedgerId};

use crate::client::{LedgerCallback, LedgerClient, LedgerEntry, LedgerMetadata, OpenMode};
use crate::digest::DigestType;
use crate::quorum::QuorumConfig;
use crate::status::StatusCode;

/// Store operations that failures and delays can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Create,
    Open,
    Delete,
    Add,
    Read,
    Close,
}

struct StoredEntry {
    payload: Bytes,
    checksum: u64,
}

struct StoredLedger {
    quorum: QuorumConfig,
    digest: DigestType,
    password: Vec<u8>,
    entries: Vec<StoredEntry>,
    closed: bool,
    fenced: bool,
}

impl StoredLedger {
    fn metadata(&self, ledger_id: LedgerId) -> LedgerMetadata {
        LedgerMetadata {
            ledger_id,
            quorum: self.quorum,
            digest: self.digest,
            closed: self.closed,
            last_entry_id: self.last_entry_id(),
            length: self.entries.iter().map(|e| e.payload.len() as u64).sum(),
        }
    }

    fn last_entry_id(&self) -> Option<EntryId> {
        (self.entries.len() as u64).checked_sub(1)
    }
}

#[derive(Default)]
struct StoreState {
    ledgers: HashMap<LedgerId, StoredLedger>,
    failures: HashMap<(LedgerOp, Option<LedgerId>), StatusCode>,
    open_delays: HashMap<LedgerId, Duration>,
    open_log: Vec<(LedgerId, OpenMode)>,
    open_handles: HashMap<LedgerId, usize>,
}

impl StoreState {
    fn failure_for(&self, op: LedgerOp, ledger_id: Option<LedgerId>) -> Option<StatusCode> {
        ledger_id
            .and_then(|id| self.failures.get(&(op, Some(id))))
            .or_else(|| self.failures.get(&(op, None)))
            .copied()
    }

    fn check(&self, op: LedgerOp, ledger_id: Option<LedgerId>) -> Result<(), StatusCode> {
        match self.failure_for(op, ledger_id) {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn ledger_mut(&mut self, ledger_id: LedgerId) -> Result<&mut StoredLedger, StatusCode> {
        self.ledgers
            .get_mut(&ledger_id)
            .ok_or(StatusCode::NO_SUCH_LEDGER_EXISTS)
    }

    fn acquire_handle(&mut self, ledger_id: LedgerId) {
        *self.open_handles.entry(ledger_id).or_default() += 1;
    }

    fn release_handle(&mut self, ledger_id: LedgerId) {
        if let Some(count) = self.open_handles.get_mut(&ledger_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.open_handles.remove(&ledger_id);
            }
        }
    }
}

struct StoreInner {
    bookies: usize,
    next_id: AtomicU64,
    state: Mutex<StoreState>,
}

/// In-memory, `HashMap`-based ledger store.
///
/// Cloning yields another client of the same store. Callbacks run on a
/// spawned tokio task when a runtime is available, inline otherwise.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<StoreInner>,
}

impl InMemoryLedgerStore {
    /// A store backed by three bookies.
    pub fn new() -> Self {
        Self::with_bookies(3)
    }

    /// A store that rejects ensembles larger than `bookies`.
    pub fn with_bookies(bookies: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                bookies,
                next_id: AtomicU64::new(1),
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().expect("ledger store lock poisoned")
    }

    /// Fail every `op` request (optionally only for one ledger) with `code`
    /// until cleared.
    pub fn inject_failure(&self, op: LedgerOp, ledger_id: Option<LedgerId>, code: StatusCode) {
        self.state().failures.insert((op, ledger_id), code);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Hold back open completions for `ledger_id` by `delay`.
    pub fn delay_open(&self, ledger_id: LedgerId, delay: Duration) {
        self.state().open_delays.insert(ledger_id, delay);
    }

    /// Every open request received so far, in arrival order.
    pub fn open_log(&self) -> Vec<(LedgerId, OpenMode)> {
        self.state().open_log.clone()
    }

    /// Handles currently held against `ledger_id`.
    pub fn open_handle_count(&self, ledger_id: LedgerId) -> usize {
        self.state()
            .open_handles
            .get(&ledger_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn contains(&self, ledger_id: LedgerId) -> bool {
        self.state().ledgers.contains_key(&ledger_id)
    }

    /// Ids of all live ledgers, ascending.
    pub fn ledger_ids(&self) -> Vec<LedgerId> {
        let mut ids: Vec<LedgerId> = self.state().ledgers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_fenced(&self, ledger_id: LedgerId) -> bool {
        self.state()
            .ledgers
            .get(&ledger_id)
            .is_some_and(|l| l.fenced)
    }

    pub fn is_closed(&self, ledger_id: LedgerId) -> bool {
        self.state()
            .ledgers
            .get(&ledger_id)
            .is_some_and(|l| l.closed)
    }

    pub fn entry_count(&self, ledger_id: LedgerId) -> usize {
        self.state()
            .ledgers
            .get(&ledger_id)
            .map_or(0, |l| l.entries.len())
    }

    /// Create a ledger holding `payloads` without going through a handle.
    /// The ledger is left open, as if its writer were still alive.
    pub fn create_with_entries(
        &self,
        quorum: QuorumConfig,
        digest: DigestType,
        password: &[u8],
        payloads: impl IntoIterator<Item = Bytes>,
    ) -> LedgerId {
        let ledger_id = LedgerId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.insert_with_entries(ledger_id, quorum, digest, password, payloads);
        ledger_id
    }

    /// Like [`create_with_entries`] but under a caller-chosen id. Later
    /// creates never reuse it. An existing ledger with that id is replaced.
    ///
    /// [`create_with_entries`]: InMemoryLedgerStore::create_with_entries
    pub fn insert_with_entries(
        &self,
        ledger_id: LedgerId,
        quorum: QuorumConfig,
        digest: DigestType,
        password: &[u8],
        payloads: impl IntoIterator<Item = Bytes>,
    ) {
        self.inner
            .next_id
            .fetch_max(ledger_id.get() + 1, Ordering::SeqCst);
        let entries = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| StoredEntry {
                checksum: digest.compute(password, ledger_id, i as EntryId, &payload),
                payload,
            })
            .collect();
        self.state().ledgers.insert(
            ledger_id,
            StoredLedger {
                quorum,
                digest,
                password: password.to_vec(),
                entries,
                closed: false,
                fenced: false,
            },
        );
    }

    /// Overwrite an entry's stored digest so the next read of it fails.
    pub fn corrupt_entry(&self, ledger_id: LedgerId, entry_id: EntryId) {
        let mut state = self.state();
        if let Some(entry) = state
            .ledgers
            .get_mut(&ledger_id)
            .and_then(|l| l.entries.get_mut(entry_id as usize))
        {
            entry.checksum = !entry.checksum;
        }
    }

    fn dispatch<T: Send + 'static>(
        &self,
        delay: Option<Duration>,
        cb: LedgerCallback<T>,
        result: Result<T, StatusCode>,
    ) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    cb(result);
                });
            }
            Err(_) => {
                if let Some(delay) = delay {
                    std::thread::sleep(delay);
                }
                cb(result);
            }
        }
    }

    fn do_create(
        &self,
        quorum: QuorumConfig,
        digest: DigestType,
        password: &[u8],
    ) -> Result<LedgerMetadata, StatusCode> {
        let mut state = self.state();
        state.check(LedgerOp::Create, None)?;
        quorum
            .validate()
            .map_err(|_| StatusCode::INCORRECT_PARAMETER)?;
        if quorum.ensemble_size > self.inner.bookies {
            return Err(StatusCode::NOT_ENOUGH_BOOKIES);
        }
        let ledger_id = LedgerId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let ledger = StoredLedger {
            quorum,
            digest,
            password: password.to_vec(),
            entries: Vec::new(),
            closed: false,
            fenced: false,
        };
        let metadata = ledger.metadata(ledger_id);
        state.ledgers.insert(ledger_id, ledger);
        state.acquire_handle(ledger_id);
        Ok(metadata)
    }

    fn do_open(
        &self,
        ledger_id: LedgerId,
        mode: OpenMode,
        digest: DigestType,
        password: &[u8],
    ) -> Result<LedgerMetadata, StatusCode> {
        let mut state = self.state();
        state.open_log.push((ledger_id, mode));
        state.check(LedgerOp::Open, Some(ledger_id))?;
        let ledger = state.ledger_mut(ledger_id)?;
        if ledger.password != password {
            return Err(StatusCode::UNAUTHORIZED_ACCESS);
        }
        if ledger.digest != digest {
            return Err(StatusCode::DIGEST_MATCH);
        }
        if mode.is_fencing() {
            ledger.fenced = true;
            ledger.closed = true;
        }
        let metadata = ledger.metadata(ledger_id);
        state.acquire_handle(ledger_id);
        Ok(metadata)
    }

    fn do_delete(&self, ledger_id: LedgerId) -> Result<(), StatusCode> {
        let mut state = self.state();
        state.check(LedgerOp::Delete, Some(ledger_id))?;
        state
            .ledgers
            .remove(&ledger_id)
            .ok_or(StatusCode::NO_SUCH_LEDGER_EXISTS)?;
        state.open_handles.remove(&ledger_id);
        Ok(())
    }

    fn do_add(&self, ledger_id: LedgerId, payload: Bytes) -> Result<EntryId, StatusCode> {
        let mut state = self.state();
        state.check(LedgerOp::Add, Some(ledger_id))?;
        let ledger = state.ledger_mut(ledger_id)?;
        if ledger.fenced {
            return Err(StatusCode::LEDGER_FENCED);
        }
        if ledger.closed {
            return Err(StatusCode::LEDGER_CLOSED);
        }
        let entry_id = ledger.entries.len() as EntryId;
        let checksum = ledger
            .digest
            .compute(&ledger.password, ledger_id, entry_id, &payload);
        ledger.entries.push(StoredEntry { payload, checksum });
        Ok(entry_id)
    }

    fn do_read(
        &self,
        ledger_id: LedgerId,
        first: EntryId,
        last: EntryId,
    ) -> Result<Vec<LedgerEntry>, StatusCode> {
        let mut state = self.state();
        state.check(LedgerOp::Read, Some(ledger_id))?;
        let ledger = state.ledger_mut(ledger_id)?;
        if first > last {
            return Err(StatusCode::INCORRECT_PARAMETER);
        }
        if last >= ledger.entries.len() as EntryId {
            return Err(StatusCode::NO_SUCH_ENTRY);
        }
        (first..=last)
            .map(|entry_id| {
                let entry = &ledger.entries[entry_id as usize];
                let expected =
                    ledger
                        .digest
                        .compute(&ledger.password, ledger_id, entry_id, &entry.payload);
                if expected != entry.checksum {
                    return Err(StatusCode::DIGEST_MATCH);
                }
                Ok(LedgerEntry {
                    ledger_id,
                    entry_id,
                    payload: entry.payload.clone(),
                })
            })
            .collect()
    }

    fn do_close(&self, ledger_id: LedgerId) -> Result<Option<EntryId>, StatusCode> {
        let mut state = self.state();
        state.check(LedgerOp::Close, Some(ledger_id))?;
        let ledger = state.ledger_mut(ledger_id)?;
        ledger.closed = true;
        let last = ledger.last_entry_id();
        state.release_handle(ledger_id);
        Ok(last)
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerClient for InMemoryLedgerStore {
    fn async_create_ledger(
        &self,
        quorum: QuorumConfig,
        digest: DigestType,
        password: &[u8],
        cb: LedgerCallback<LedgerMetadata>,
    ) {
        let result = self.do_create(quorum, digest, password);
        self.dispatch(None, cb, result);
    }

    fn async_open_ledger(
        &self,
        ledger_id: LedgerId,
        mode: OpenMode,
        digest: DigestType,
        password: &[u8],
        cb: LedgerCallback<LedgerMetadata>,
    ) {
        let result = self.do_open(ledger_id, mode, digest, password);
        let delay = self.state().open_delays.get(&ledger_id).copied();
        self.dispatch(delay, cb, result);
    }

    fn async_delete_ledger(&self, ledger_id: LedgerId, cb: LedgerCallback<()>) {
        let result = self.do_delete(ledger_id);
        self.dispatch(None, cb, result);
    }

    fn async_add_entry(&self, ledger_id: LedgerId, payload: Bytes, cb: LedgerCallback<EntryId>) {
        let result = self.do_add(ledger_id, payload);
        self.dispatch(None, cb, result);
    }

    fn async_read_entries(
        &self,
        ledger_id: LedgerId,
        first: EntryId,
        last: EntryId,
        cb: LedgerCallback<Vec<LedgerEntry>>,
    ) {
        let result = self.do_read(ledger_id, first, last);
        self.dispatch(None, cb, result);
    }

    fn async_read_last_confirmed(&self, ledger_id: LedgerId, cb: LedgerCallback<Option<EntryId>>) {
        let result = self
            .state()
            .ledgers
            .get(&ledger_id)
            .map(StoredLedger::last_entry_id)
            .ok_or(StatusCode::NO_SUCH_LEDGER_EXISTS);
        self.dispatch(None, cb, result);
    }

    fn async_close_ledger(&self, ledger_id: LedgerId, cb: LedgerCallback<Option<EntryId>>) {
        let result = self.do_close(ledger_id);
        self.dispatch(None, cb, result);
    }

    fn release_handle(&self, ledger_id: LedgerId) {
        self.state().release_handle(ledger_id);
    }
}

impl fmt::Debug for InMemoryLedgerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryLedgerStore")
            .field("bookies", &self.inner.bookies)
            .field("ledger_count", &state.ledgers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{classify, submit, Completion};
    use crate::error::LedgerResult;
    use crate::handle::LedgerHandle;

    const PW: &[u8] = b"secret";

    fn quorum() -> QuorumConfig {
        QuorumConfig::new(3, 3, 2)
    }

    fn client(store: &InMemoryLedgerStore) -> Arc<dyn LedgerClient> {
        Arc::new(store.clone())
    }

    async fn create(store: &InMemoryLedgerStore) -> LedgerResult<LedgerHandle> {
        let client = client(store);
        let completion: Completion<LedgerMetadata> = submit(|completer| {
            client.async_create_ledger(
                quorum(),
                DigestType::Crc32,
                PW,
                Box::new(move |r| {
                    completer.complete(classify(r, || "create".into()));
                }),
            );
        });
        let metadata = completion.await?;
        Ok(LedgerHandle::created(client, metadata))
    }

    async fn open(
        store: &InMemoryLedgerStore,
        ledger_id: LedgerId,
        mode: OpenMode,
        password: &'static [u8],
    ) -> LedgerResult<LedgerHandle> {
        let client = client(store);
        let completion: Completion<LedgerMetadata> = submit(|completer| {
            client.async_open_ledger(
                ledger_id,
                mode,
                DigestType::Crc32,
                password,
                Box::new(move |r| {
                    completer.complete(classify(r, || format!("open {ledger_id}")));
                }),
            );
        });
        let metadata = completion.await?;
        Ok(LedgerHandle::opened(client, metadata, mode))
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_add_and_read_back() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await.unwrap();
        for i in 0..3u8 {
            let id = writer.add_entry(Bytes::from(vec![i])).await.unwrap();
            assert_eq!(id, i as EntryId);
        }
        assert_eq!(writer.last_add_confirmed(), Some(2));

        let entries = writer.read_entries(0, 2).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].payload, Bytes::from(vec![1u8]));
    }

    #[tokio::test]
    async fn create_rejects_oversized_ensemble() {
        let store = InMemoryLedgerStore::with_bookies(2);
        let err = create(&store).await.unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::NOT_ENOUGH_BOOKIES));
    }

    #[tokio::test]
    async fn closing_writer_seals_ledger() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await.unwrap();
        let id = writer.id();
        writer.add_entry(Bytes::from_static(b"a")).await.unwrap();
        writer.close().await.unwrap();
        assert!(store.is_closed(id));
        assert_eq!(store.open_handle_count(id), 0);
    }

    // -----------------------------------------------------------------------
    // Open modes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn recovery_open_fences_writer() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await.unwrap();
        writer.add_entry(Bytes::from_static(b"a")).await.unwrap();

        let reader = open(&store, writer.id(), OpenMode::Recovery, PW).await.unwrap();
        assert!(reader.is_recovered());
        assert!(reader.metadata().closed);

        let err = writer.add_entry(Bytes::from_static(b"b")).await.unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::LEDGER_FENCED));
    }

    #[tokio::test]
    async fn no_recovery_open_leaves_writer_alone() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await.unwrap();
        writer.add_entry(Bytes::from_static(b"a")).await.unwrap();

        let reader = open(&store, writer.id(), OpenMode::NoRecovery, PW).await.unwrap();
        assert!(!reader.is_recovered());
        writer.add_entry(Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(reader.read_last_confirmed().await.unwrap(), Some(1));
        assert_eq!(reader.last_add_confirmed(), Some(1));
        assert_eq!(
            store.open_log(),
            vec![(writer.id(), OpenMode::NoRecovery)]
        );
    }

    #[tokio::test]
    async fn open_checks_password_and_existence() {
        let store = InMemoryLedgerStore::new();
        let writer = create(&store).await.unwrap();

        let err = open(&store, writer.id(), OpenMode::NoRecovery, b"wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::UNAUTHORIZED_ACCESS));

        let err = open(&store, LedgerId::new(999), OpenMode::Recovery, PW)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::NO_SUCH_LEDGER_EXISTS));
    }

    #[tokio::test]
    async fn read_handle_is_released_on_drop() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_with_entries(quorum(), DigestType::Crc32, PW, []);
        let reader = open(&store, id, OpenMode::NoRecovery, PW).await.unwrap();
        assert_eq!(store.open_handle_count(id), 1);
        drop(reader);
        assert_eq!(store.open_handle_count(id), 0);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn injected_failure_targets_one_ledger() {
        let store = InMemoryLedgerStore::new();
        let a = store.create_with_entries(quorum(), DigestType::Crc32, PW, []);
        let b = store.create_with_entries(quorum(), DigestType::Crc32, PW, []);
        store.inject_failure(LedgerOp::Open, Some(a), StatusCode::from_raw(11));

        let err = open(&store, a, OpenMode::Recovery, PW).await.unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::from_raw(11)));
        assert!(open(&store, b, OpenMode::Recovery, PW).await.is_ok());

        store.clear_failures();
        assert!(open(&store, a, OpenMode::Recovery, PW).await.is_ok());
    }

    #[tokio::test]
    async fn corrupted_entry_fails_digest_check() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_with_entries(
            quorum(),
            DigestType::Mac,
            PW,
            [Bytes::from_static(b"a"), Bytes::from_static(b"b")],
        );
        store.corrupt_entry(id, 1);
        let client = client(&store);
        let ok = crate::handle::read_entries(&client, id, 0, 0).await.unwrap();
        assert_eq!(ok.len(), 1);
        let err = crate::handle::read_entries(&client, id, 0, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::DIGEST_MATCH));
    }

    #[tokio::test]
    async fn read_past_end_is_no_such_entry() {
        let store = InMemoryLedgerStore::new();
        let id = store.create_with_entries(
            quorum(),
            DigestType::Crc32,
            PW,
            [Bytes::from_static(b"a")],
        );
        let client = client(&store);
        let err = crate::handle::read_entries(&client, id, 0, 5)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(StatusCode::NO_SUCH_ENTRY));
    }

    #[test]
    fn callbacks_run_inline_without_runtime() {
        let store = InMemoryLedgerStore::new();
        let (tx, rx) = std::sync::mpsc::channel();
        store.async_delete_ledger(
            LedgerId::new(12345),
            Box::new(move |r| {
                tx.send(r).unwrap();
            }),
        );
        assert_eq!(rx.try_recv().unwrap(), Err(StatusCode::NO_SUCH_LEDGER_EXISTS));
    }
}
