use crate::value::Timestamp;
use std::{
    sync::{Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

///
/// Clock
///
/// The engine's only time source, injected so tests can pin it.
///

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

///
/// SystemClock
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as i64);
        Timestamp::from_unix_millis(millis)
    }
}

///
/// ManualClock
///
/// Fixed, advanceable clock for deterministic tests and replays.
///

#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Mutex<i64>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(ts: Timestamp) -> Self {
        Self {
            millis: Mutex::new(ts.as_unix_millis()),
        }
    }

    pub fn advance_millis(&self, delta: i64) {
        let mut millis = self.millis.lock().unwrap_or_else(PoisonError::into_inner);
        *millis += delta;
    }

    pub fn set(&self, ts: Timestamp) {
        let mut millis = self.millis.lock().unwrap_or_else(PoisonError::into_inner);
        *millis = ts.as_unix_millis();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.lock().unwrap_or_else(PoisonError::into_inner);
        Timestamp::from_unix_millis(*millis)
    }
}
