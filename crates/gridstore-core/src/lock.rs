use std::{
    collections::BTreeSet,
    sync::{Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};
use thiserror::Error as ThisError;

/// The single coarse lock every mutating operation takes. Document-wide by
/// design: writers to different tables still serialize, which keeps the
/// uniqueness, foreign-key, and index-rebuild checks trivially race-free.
pub const DOCUMENT_LOCK: &str = "document";

/// Default bound on how long a writer waits for the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

///
/// LockError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum LockError {
    #[error("timed out acquiring lock `{name}` after {waited_ms} ms")]
    Timeout { name: String, waited_ms: u64 },
}

///
/// HeldLock
///
/// A held lock; releasing happens on drop, unconditionally, on every exit
/// path including validation failures.
///

pub trait HeldLock: Send {}

///
/// LockStrategy
///
/// Named mutual exclusion with bounded-timeout acquisition. The engine
/// takes `DOCUMENT_LOCK` for every mutation; an implementation may narrow
/// the scope (per-table, or an external lock service) without the engine
/// changing.
///

pub trait LockStrategy: Send + Sync {
    fn acquire(&self, name: &str, timeout: Duration)
    -> Result<Box<dyn HeldLock + '_>, LockError>;
}

///
/// DocumentLock
///
/// Process-wide named locks over a mutex/condvar pair. Blocks up to the
/// timeout, then fails with `LockError::Timeout` (retryable).
///

#[derive(Debug, Default)]
pub struct DocumentLock {
    held: Mutex<BTreeSet<String>>,
    released: Condvar,
}

impl DocumentLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

struct DocumentLockGuard<'a> {
    lock: &'a DocumentLock,
    name: String,
}

impl HeldLock for DocumentLockGuard<'_> {}

impl Drop for DocumentLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .lock
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.name);
        self.lock.released.notify_all();
    }
}

impl LockStrategy for DocumentLock {
    fn acquire(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Box<dyn HeldLock + '_>, LockError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if !held.contains(name) {
                held.insert(name.to_string());
                return Ok(Box::new(DocumentLockGuard {
                    lock: self,
                    name: name.to_string(),
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{DOCUMENT_LOCK, DocumentLock, LockError, LockStrategy};
    use std::time::Duration;

    #[test]
    fn acquire_succeeds_when_uncontended() {
        let lock = DocumentLock::new();
        let guard = lock.acquire(DOCUMENT_LOCK, Duration::from_millis(50));
        assert!(guard.is_ok());
    }

    #[test]
    fn acquire_times_out_while_held() {
        let lock = DocumentLock::new();
        let _held = lock
            .acquire(DOCUMENT_LOCK, Duration::from_millis(50))
            .expect("first acquire");

        let err = lock
            .acquire(DOCUMENT_LOCK, Duration::from_millis(20))
            .err()
            .expect("second acquire should time out");
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn dropping_the_guard_releases_the_lock() {
        let lock = DocumentLock::new();
        drop(lock.acquire(DOCUMENT_LOCK, Duration::from_millis(50)));
        assert!(lock.acquire(DOCUMENT_LOCK, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn distinct_names_do_not_contend() {
        let lock = DocumentLock::new();
        let _a = lock
            .acquire("a", Duration::from_millis(50))
            .expect("acquire a");
        assert!(lock.acquire("b", Duration::from_millis(50)).is_ok());
    }
}
