//! Keyed, ordered execution of asynchronous work.
//!
//! [`OrderedScheduler`] runs a fixed set of worker tasks. Work is routed to
//! a worker by key, and each worker drives its jobs one at a time, so jobs
//! sharing a key run in submission order while jobs on different keys may
//! run in parallel.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{EntryStoreError, EntryStoreResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A pool of worker tasks preserving per-key order.
pub struct OrderedScheduler {
    name: String,
    size: usize,
    workers: RwLock<Option<Vec<mpsc::UnboundedSender<Job>>>>,
}

impl OrderedScheduler {
    /// Spawn `num_workers` workers (at least one) on the current tokio
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(name: impl Into<String>, num_workers: usize) -> Self {
        let name = name.into();
        let size = num_workers.max(1);
        let workers = (0..size)
            .map(|idx| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
                let worker = format!("{name}-{idx}");
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        job.await;
                    }
                    debug!(worker = %worker, "scheduler worker stopped");
                });
                tx
            })
            .collect();
        Self {
            name,
            size,
            workers: RwLock::new(Some(workers)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_workers(&self) -> usize {
        self.size
    }

    /// Queue `job` behind every earlier job submitted with the same `key`.
    pub fn submit<F>(&self, key: u64, job: F) -> EntryStoreResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let workers = self.workers.read().expect("scheduler lock poisoned");
        let closed = || EntryStoreError::Closed(format!("scheduler {}", self.name));
        let workers = workers.as_ref().ok_or_else(closed)?;
        let idx = (key % self.size as u64) as usize;
        workers[idx].send(Box::pin(job)).map_err(|_| closed())
    }

    /// Stop accepting work. Jobs already queued still run.
    pub fn shutdown(&self) {
        if self
            .workers
            .write()
            .expect("scheduler lock poisoned")
            .take()
            .is_some()
        {
            debug!(scheduler = %self.name, "scheduler shut down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.workers
            .read()
            .expect("scheduler lock poisoned")
            .is_none()
    }
}

impl fmt::Debug for OrderedScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedScheduler")
            .field("name", &self.name)
            .field("num_workers", &self.size)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
