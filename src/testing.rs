// Test doubles shared by the unit tests

use crate::error::{ProviderError, StorageError};
use crate::provider::StatsProvider;
use crate::record::{PlayerRecord, RawStatEntry, StoreId, StoredRecord};
use crate::store::{InsertContext, RecordStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory store that counts every insert call and can fail the n-th one
#[derive(Default)]
pub struct CountingStore {
    records: Mutex<Vec<StoredRecord>>,
    inserts: AtomicUsize,
    lookups: AtomicUsize,
    fail_on: Option<usize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th insert call (1-based)
    pub fn failing_on(n: usize) -> Self {
        CountingStore {
            fail_on: Some(n),
            ..Self::default()
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl RecordStore for CountingStore {
    fn insert(&self, record: &PlayerRecord, ctx: &InsertContext) -> Result<StoreId, StorageError> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(StorageError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".to_string()),
            )));
        }

        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        let id = records.len() as StoreId + 1;
        records.push(StoredRecord {
            id,
            record: record.clone(),
            run_id: ctx.run_id,
            ingested_at: ctx.ingested_at,
        });
        Ok(id)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.record.name == name)
            .map(|r| r.record.clone()))
    }

    fn history(&self, name: &str) -> Result<Vec<StoredRecord>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.record.name == name)
            .cloned()
            .collect())
    }

    fn count(&self) -> Result<i64, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records.len() as i64)
    }
}

/// Always fails the fetch
pub struct FailingProvider;

#[async_trait]
impl StatsProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        Err(ProviderError::Other("upstream unavailable".to_string()))
    }
}

/// Sleeps before answering with nothing
pub struct SlowProvider(pub Duration);

#[async_trait]
impl StatsProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

/// Counts fetches and holds each one open until released
pub struct GatedProvider {
    pub calls: AtomicUsize,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
    entries: Vec<RawStatEntry>,
}

impl GatedProvider {
    pub fn new(entries: Vec<RawStatEntry>) -> Self {
        GatedProvider {
            calls: AtomicUsize::new(0),
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            entries,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch(&self) -> Result<Vec<RawStatEntry>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.entries.clone())
    }
}
