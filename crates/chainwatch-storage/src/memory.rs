//! In-memory address ledger.
//!
//! Subscriptions live in a concurrent map of address → bucket; each bucket is
//! its own `RwLock`, so reads of different addresses never contend and a
//! registration never waits on a bucket. The checkpoint is an atomic integer.
//!
//! Write scopes stage their appends privately. `commit` takes every affected
//! bucket lock up front, applies all batches, then raises the checkpoint.
//! Readers load the checkpoint before reading a bucket and hide entries from
//! blocks above it, so a reader never sees a transaction ahead of the
//! checkpoint nor a checkpoint ahead of its transactions.
//!
//! All data is lost when the process exits.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::Span;

use chainwatch_core::error::WatchError;
use chainwatch_core::ledger::{AddressLedger, WriteScope};
use chainwatch_core::types::{normalize_address, Transaction};

/// A transaction together with the block it was committed under.
#[derive(Debug, Clone)]
struct Recorded {
    block_number: u64,
    tx: Transaction,
}

type Bucket = Arc<RwLock<Vec<Recorded>>>;

struct Inner {
    buckets: DashMap<String, Bucket>,
    checkpoint: AtomicU64,
    writer_open: AtomicBool,
}

impl Inner {
    /// Clone the bucket handle out of the map so the shard lock is released
    /// before the bucket itself is locked.
    fn bucket(&self, key: &str) -> Option<Bucket> {
        self.buckets.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Apply per-address batches all-or-nothing.
    fn apply(&self, batches: BTreeMap<String, Vec<Recorded>>) -> Result<(), WatchError> {
        let mut buckets = Vec::with_capacity(batches.len());
        for address in batches.keys() {
            let bucket = self
                .bucket(address)
                .ok_or_else(|| WatchError::AddressNotFound(address.clone()))?;
            buckets.push(bucket);
        }

        let mut guards = Vec::with_capacity(buckets.len());
        for (bucket, address) in buckets.iter().zip(batches.keys()) {
            guards.push(bucket.write().map_err(|_| poisoned(address))?);
        }
        for (guard, (_, batch)) in guards.iter_mut().zip(batches) {
            guard.extend(batch);
        }
        Ok(())
    }
}

fn poisoned(address: &str) -> WatchError {
    WatchError::Internal(format!("bucket lock poisoned for {address}"))
}

// ─── InMemoryLedger ───────────────────────────────────────────────────────────

/// Volatile ledger shared by the index loop (sole writer) and query readers.
///
/// Cloning is cheap and yields a handle to the same ledger.
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<Inner>,
    span: Span,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_span(tracing::info_span!("ledger"))
    }

    /// Create a ledger that reports through `span`.
    pub fn with_span(span: Span) -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: DashMap::new(),
                checkpoint: AtomicU64::new(0),
                writer_open: AtomicBool::new(false),
            }),
            span,
        }
    }

    /// Register `address` if needed and insert `txs` as always-visible history.
    pub fn seed(&self, address: &str, txs: Vec<Transaction>) -> Result<(), WatchError> {
        let key = normalize_address(address);
        let bucket = Arc::clone(
            self.inner
                .buckets
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                .value(),
        );
        let count = txs.len();
        bucket
            .write()
            .map_err(|_| poisoned(&key))?
            .extend(txs.into_iter().map(|tx| Recorded { block_number: 0, tx }));
        tracing::debug!(parent: &self.span, address = %key, count, "seeded address");
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressLedger for InMemoryLedger {
    async fn register_address(&self, address: &str) -> Result<(), WatchError> {
        let key = normalize_address(address);
        match self.inner.buckets.entry(key) {
            Entry::Occupied(e) => Err(WatchError::AlreadyRegistered(e.key().clone())),
            Entry::Vacant(e) => {
                tracing::info!(parent: &self.span, address = %e.key(), "address registered");
                e.insert(Arc::new(RwLock::new(Vec::new())));
                Ok(())
            }
        }
    }

    async fn list_addresses(&self) -> Result<Vec<String>, WatchError> {
        let mut addresses: Vec<String> =
            self.inner.buckets.iter().map(|e| e.key().clone()).collect();
        addresses.sort_unstable();
        Ok(addresses)
    }

    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, WatchError> {
        let key = normalize_address(address);
        let bucket = self
            .inner
            .bucket(&key)
            .ok_or_else(|| WatchError::AddressNotFound(key.clone()))?;

        // Checkpoint first: anything committed at or below it is already in the bucket.
        let visible = self.inner.checkpoint.load(Ordering::Acquire);
        let entries = bucket.read().map_err(|_| poisoned(&key))?;
        Ok(entries
            .iter()
            .filter(|r| r.block_number <= visible)
            .map(|r| r.tx.clone())
            .collect())
    }

    async fn checkpoint(&self) -> Result<u64, WatchError> {
        Ok(self.inner.checkpoint.load(Ordering::Acquire))
    }

    async fn begin_write(&self) -> Result<Box<dyn WriteScope>, WatchError> {
        if self
            .inner
            .writer_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WatchError::Internal(
                "a write scope is already open on this ledger".into(),
            ));
        }
        Ok(Box::new(MemoryWriteScope {
            inner: Arc::clone(&self.inner),
            staged: Vec::new(),
            pending_checkpoint: None,
            finished: false,
            span: self.span.clone(),
        }))
    }
}

// ─── MemoryWriteScope ─────────────────────────────────────────────────────────

/// Write scope of an [`InMemoryLedger`]. Holds the ledger's single writer slot
/// until it is committed, rolled back or dropped.
pub struct MemoryWriteScope {
    inner: Arc<Inner>,
    staged: Vec<(String, Recorded)>,
    pending_checkpoint: Option<u64>,
    finished: bool,
    span: Span,
}

#[async_trait]
impl WriteScope for MemoryWriteScope {
    fn append(
        &mut self,
        address: &str,
        block_number: u64,
        tx: Transaction,
    ) -> Result<(), WatchError> {
        let key = normalize_address(address);
        if !self.inner.buckets.contains_key(&key) {
            return Err(WatchError::AddressNotFound(key));
        }
        self.staged.push((key, Recorded { block_number, tx }));
        Ok(())
    }

    fn set_checkpoint(&mut self, block_number: u64) {
        self.pending_checkpoint = Some(block_number);
    }

    fn pending_checkpoint(&self) -> Option<u64> {
        self.pending_checkpoint
    }

    fn staged(&self) -> usize {
        self.staged.len()
    }

    async fn commit(mut self: Box<Self>) -> Result<u64, WatchError> {
        self.finished = true;
        let staged = std::mem::take(&mut self.staged);
        let appended = staged.len();

        let mut batches: BTreeMap<String, Vec<Recorded>> = BTreeMap::new();
        for (address, recorded) in staged {
            batches.entry(address).or_default().push(recorded);
        }

        if let Err(e) = self.inner.apply(batches) {
            tracing::error!(
                parent: &self.span,
                error = %e,
                discarded = appended,
                "commit failed, nothing applied"
            );
            return Err(e);
        }

        let checkpoint = match self.pending_checkpoint {
            Some(n) => self.inner.checkpoint.fetch_max(n, Ordering::AcqRel).max(n),
            None => self.inner.checkpoint.load(Ordering::Acquire),
        };
        tracing::debug!(parent: &self.span, appended, checkpoint, "write scope committed");
        Ok(checkpoint)
    }

    async fn rollback(mut self: Box<Self>) {
        self.finished = true;
        tracing::warn!(
            parent: &self.span,
            discarded = self.staged.len(),
            pending_checkpoint = ?self.pending_checkpoint,
            "write scope rolled back"
        );
        self.staged.clear();
    }
}

impl Drop for MemoryWriteScope {
    fn drop(&mut self) {
        if !self.finished && (!self.staged.is_empty() || self.pending_checkpoint.is_some()) {
            tracing::warn!(
                parent: &self.span,
                discarded = self.staged.len(),
                pending_checkpoint = ?self.pending_checkpoint,
                "write scope dropped without commit"
            );
        }
        self.inner.writer_open.store(false, Ordering::Release);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
