use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};
use thiserror::Error as ThisError;

///
/// KvError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum KvError {
    #[error("key-value backend error: {message}")]
    Backend { message: String },
}

///
/// KvStore
///
/// The injected durable key-value store backing everything the engine
/// persists outside the grid: id counters, the schema registry, the
/// migration log, the audit log, and idempotency entries.
///
/// The engine depends only on get/set/atomic-increment semantics, so an
/// implementation may sit on a file, an embedded store, or a service.
/// State must survive process restarts in real deployments.
///

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Increment the counter at `key` and return the new value. Counters
    /// start at zero, so the first call returns 1. Must be atomic with
    /// respect to other callers of the same store.
    fn increment(&self, key: &str) -> Result<u64, KvError>;
}

///
/// MemoryKv
///

#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn increment(&self, key: &str) -> Result<u64, KvError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let current = inner
            .get(key)
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        inner.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

///
/// TESTS
///
