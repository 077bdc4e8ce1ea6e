//! In-memory remote store, used as the test double for the sync path.
//!
//! Clones share the same records, so a test can keep a handle after moving
//! the store into a coordinator. Failures can be injected per operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RemoteStore, StoreError};
use crate::merge::merge;
use crate::models::{DayRecord, DeltaRecord};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<(String, String), DayRecord>,
    offline: bool,
    atomic_increment: bool,
    read_failures: VecDeque<StoreError>,
    write_failures: VecDeque<StoreError>,
    day_failures: HashMap<(String, String), StoreError>,
    reads: usize,
    writes: usize,
    connects: usize,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that advertises atomic increments.
    pub fn with_atomic_increment() -> Self {
        let store = Self::new();
        store.lock().atomic_increment = true;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a record directly, bypassing failure injection.
    pub fn insert(&self, record: DayRecord) {
        let key = (record.user_id.clone(), record.date.clone());
        self.lock().records.insert(key, record);
    }

    pub fn get(&self, user_id: &str, date: &str) -> Option<DayRecord> {
        self.lock()
            .records
            .get(&(user_id.to_string(), date.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// While offline every operation fails with a connection-refused error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Makes the next read fail with `err`.
    pub fn fail_next_read(&self, err: StoreError) {
        self.lock().read_failures.push_back(err);
    }

    /// Makes the next write (or increment) fail with `err`.
    pub fn fail_next_write(&self, err: StoreError) {
        self.lock().write_failures.push_back(err);
    }

    /// Makes every operation on one day fail with `err` until cleared.
    pub fn fail_day(&self, user_id: &str, date: &str, err: StoreError) {
        self.lock()
            .day_failures
            .insert((user_id.to_string(), date.to_string()), err);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.read_failures.clear();
        inner.write_failures.clear();
        inner.day_failures.clear();
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

fn offline_error() -> StoreError {
    StoreError::transient("connect ECONNREFUSED (memory store offline)")
}

#[derive(Clone, Copy)]
enum Op {
    Read,
    Write,
}

impl Inner {
    /// Failure to report for an operation on `key`, if any.
    fn failure_for(&mut self, key: &(String, String), op: Op) -> Option<StoreError> {
        if self.offline {
            return Some(offline_error());
        }
        if let Some(err) = self.day_failures.get(key) {
            return Some(err.clone());
        }
        match op {
            Op::Read => self.read_failures.pop_front(),
            Op::Write => self.write_failures.pop_front(),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.connects += 1;
        if inner.offline {
            return Err(offline_error());
        }
        inner.closed = false;
        Ok(())
    }

    async fn read(&self, user_id: &str, date: &str) -> Result<Option<DayRecord>, StoreError> {
        let mut inner = self.lock();
        inner.reads += 1;
        let key = (user_id.to_string(), date.to_string());
        if let Some(err) = inner.failure_for(&key, Op::Read) {
            return Err(err);
        }
        Ok(inner.records.get(&key).cloned())
    }

    async fn write(&self, record: &DayRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.writes += 1;
        let key = (record.user_id.clone(), record.date.clone());
        if let Some(err) = inner.failure_for(&key, Op::Write) {
            return Err(err);
        }
        inner.records.insert(key, record.clone());
        Ok(())
    }

    fn supports_increment(&self) -> bool {
        self.lock().atomic_increment
    }

    async fn increment(&self, user_id: &str, delta: &DeltaRecord) -> Result<DayRecord, StoreError> {
        let mut inner = self.lock();
        if !inner.atomic_increment {
            return Err(StoreError::permanent(
                "atomic increment is not supported by this store",
            ));
        }
        inner.writes += 1;
        let key = (user_id.to_string(), delta.date.clone());
        if let Some(err) = inner.failure_for(&key, Op::Write) {
            return Err(err);
        }
        let merged = merge(user_id, inner.records.remove(&key), delta);
        inner.records.insert(key, merged.clone());
        Ok(merged)
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
