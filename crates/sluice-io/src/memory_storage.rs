//! In-memory storage backend for testing.
//!
//! Provides a HashMap-based storage that implements the Storage trait, with
//! optional write-failure injection so error paths of spilling operators can
//! be exercised without a real disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sluice_mem::error::{Error as MemError, Result as MemResult};
use sluice_mem::Storage;

/// Thread-safe in-memory storage using a HashMap.
#[derive(Clone)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(AtomicUsize::new(0)),
            fail_after: Arc::new(Mutex::new(None)),
        }
    }

    /// Let the first `n` writes succeed and fail every later one.
    pub fn fail_writes_after(&self, n: usize) {
        *lock(&self.fail_after) = Some(n);
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.data).contains_key(path)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.data).is_empty()
    }

    /// Total successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// A panic while holding the map cannot leave it half-updated, so a poisoned
// lock is still safe to use.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Storage for MemoryStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> MemResult<()> {
        if let Some(limit) = *lock(&self.fail_after) {
            if self.writes.load(Ordering::Relaxed) >= limit {
                return Err(MemError::Storage(format!("injected write failure: {path}")));
            }
        }
        lock(&self.data).insert(path.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> MemResult<Vec<u8>> {
        let data = lock(&self.data);
        let bytes = data
            .get(path)
            .ok_or_else(|| MemError::Storage(format!("path not found: {}", path)))?;

        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn delete(&self, path: &str) -> MemResult<()> {
        lock(&self.data).remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> MemResult<Vec<String>> {
        let mut result: Vec<String> = lock(&self.data)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        result.sort();
        Ok(result)
    }

    fn size(&self, path: &str) -> MemResult<u64> {
        lock(&self.data)
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| MemError::Storage(format!("path not found: {}", path)))
    }
}
