pub mod cursor;
pub mod filter;
mod table;

pub use filter::{Filter, FilterOp};
pub use table::Table;

use crate::{
    clock::{Clock, SystemClock},
    error::Error,
    grid::{Grid, MemoryGrid},
    index::{FullRebuild, IndexMaintainer},
    kv::{KvStore, MemoryKv},
    lock::{DEFAULT_LOCK_TIMEOUT, DOCUMENT_LOCK, DocumentLock, HeldLock, LockStrategy},
    obs::{self, Event},
    registry,
    schema::{TableModel, TableSchema},
    value::{Record, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard page-size ceiling; larger requests are clamped, not rejected.
pub const MAX_LIST_LIMIT: usize = 500;

///
/// CreateOptions
///

#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    /// Attribution string recorded on the audit entry.
    pub actor: Option<String>,
    /// Free-form audit payload.
    pub metadata: Option<serde_json::Value>,
    /// Replay token: a repeated create with the same key returns the first
    /// call's response verbatim instead of re-executing.
    pub idempotency_key: Option<String>,
}

impl CreateOptions {
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

///
/// UpdateOptions
///

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    pub actor: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Optimistic-concurrency token: the update fails with `Conflict` when
    /// the stored `updatedAt` no longer matches.
    pub expected_updated_at: Option<Timestamp>,
    /// Permit mutating a soft-deleted record.
    pub allow_deleted: bool,
}

impl UpdateOptions {
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub const fn expected_updated_at(mut self, ts: Timestamp) -> Self {
        self.expected_updated_at = Some(ts);
        self
    }

    #[must_use]
    pub const fn allow_deleted(mut self) -> Self {
        self.allow_deleted = true;
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

///
/// DeleteOptions
///

#[derive(Clone, Debug, Default)]
pub struct DeleteOptions {
    pub actor: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl DeleteOptions {
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

///
/// GetOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct GetOptions {
    pub include_deleted: bool,
}

impl GetOptions {
    #[must_use]
    pub const fn include_deleted() -> Self {
        Self {
            include_deleted: true,
        }
    }
}

///
/// ListOptions
///

#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub include_deleted: bool,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Opaque continuation token from a previous page's `next_cursor`.
    pub cursor: Option<String>,
}

impl ListOptions {
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    #[must_use]
    pub const fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

///
/// Created / Updated / Deleted / Page
///
/// Operation responses. `Created` round-trips through serde because it is
/// the cached idempotency response.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Created {
    pub record: Record,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Updated {
    pub record: Record,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deleted {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_cursor: Option<String>,
    /// Count of the full filtered set, before cursor/offset/limit.
    pub total: usize,
}

///
/// Database
///
/// The entry point: a handle over the injected backing grid, durable
/// key-value store, lock strategy, index maintainer, and clock. Cloning is
/// cheap; clones share the same backing state.
///

#[derive(Clone)]
pub struct Database {
    grid: Arc<dyn Grid>,
    kv: Arc<dyn KvStore>,
    lock: Arc<dyn LockStrategy>,
    indexer: Arc<dyn IndexMaintainer>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    models: Arc<RwLock<BTreeMap<String, Arc<TableModel>>>>,
}

impl Database {
    #[must_use]
    pub fn new(
        grid: Arc<dyn Grid>,
        kv: Arc<dyn KvStore>,
        lock: Arc<dyn LockStrategy>,
        indexer: Arc<dyn IndexMaintainer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            grid,
            kv,
            lock,
            indexer,
            clock,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            models: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Fully in-memory database: memory grid and kv, the default document
    /// lock, full-rebuild indexing, and the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryGrid::new()),
            Arc::new(MemoryKv::new()),
            Arc::new(DocumentLock::new()),
            Arc::new(FullRebuild),
            Arc::new(SystemClock),
        )
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Define (or re-bind) a table.
    ///
    /// Idempotent: repeated calls with an unchanged schema are no-ops
    /// beyond re-binding. A changed version goes through the migration
    /// path; header drift is additive-only.
    pub fn define_table(&self, schema: &TableSchema) -> Result<Table, Error> {
        let model = Arc::new(schema.normalize()?);

        registry::bind(
            self.grid.as_ref(),
            self.kv.as_ref(),
            self.clock.as_ref(),
            &model,
        )?;
        self.indexer.rebuild(self.grid.as_ref(), &model)?;

        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.name.clone(), Arc::clone(&model));

        Ok(Table::new(self.clone(), model))
    }

    /// A handle to a table defined earlier in this process.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<Table> {
        let model = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        Some(Table::new(self.clone(), model))
    }

    /// Names of every table ever bound to the backing store, including by
    /// other processes.
    pub fn tables(&self) -> Result<Vec<String>, Error> {
        registry::tables(self.kv.as_ref())
    }

    /// The backing grid, exposed so external consumers can read archive
    /// and backup sheets directly.
    #[must_use]
    pub fn grid(&self) -> &Arc<dyn Grid> {
        &self.grid
    }

    /// The durable key-value store (audit log, migration log, counters).
    #[must_use]
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn indexer(&self) -> &dyn IndexMaintainer {
        self.indexer.as_ref()
    }

    pub(crate) fn defined_models(&self) -> Vec<Arc<TableModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Take the document-wide write lock, converting a timeout into the
    /// engine error taxonomy.
    pub(crate) fn acquire_write_lock(&self) -> Result<Box<dyn HeldLock + '_>, Error> {
        self.lock
            .acquire(DOCUMENT_LOCK, self.lock_timeout)
            .map_err(|err| {
                obs::record(Event::LockTimeout);
                err.into()
            })
    }
}
