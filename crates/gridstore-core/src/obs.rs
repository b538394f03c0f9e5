//! Observability: ephemeral in-memory operation counters.
//!
//! Engine logic records [`Event`]s; consumers pull a point-in-time
//! [`EventOps`] snapshot via [`report`]. Counters reset on process restart
//! and via [`reset`]; durable history belongs to the audit log, not here.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<EventOps> = RefCell::new(EventOps::default());
}

///
/// Event
///

#[derive(Clone, Copy, Debug)]
pub enum Event {
    Create,
    Update,
    Delete,
    RowsScanned(u64),
    UniqueViolation,
    LockTimeout,
    IndexRebuild,
    RowsArchived(u64),
    Backup,
}

///
/// EventOps
///
/// Counter snapshot for operations since the last reset.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
    pub rows_scanned: u64,
    pub unique_violations: u64,
    pub lock_timeouts: u64,
    pub index_rebuilds: u64,
    pub rows_archived: u64,
    pub backups: u64,
}

pub(crate) fn record(event: Event) {
    STATE.with_borrow_mut(|ops| match event {
        Event::Create => ops.creates += 1,
        Event::Update => ops.updates += 1,
        Event::Delete => ops.deletes += 1,
        Event::RowsScanned(n) => ops.rows_scanned += n,
        Event::UniqueViolation => ops.unique_violations += 1,
        Event::LockTimeout => ops.lock_timeouts += 1,
        Event::IndexRebuild => ops.index_rebuilds += 1,
        Event::RowsArchived(n) => ops.rows_archived += n,
        Event::Backup => ops.backups += 1,
    });
}

/// Point-in-time counter snapshot.
#[must_use]
pub fn report() -> EventOps {
    STATE.with_borrow(Clone::clone)
}

/// Zero all counters.
pub fn reset() {
    STATE.with_borrow_mut(|ops| *ops = EventOps::default());
}

///
/// TESTS
///
