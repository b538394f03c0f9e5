use crate::{
    audit::{self, AuditAction, AuditEntry, IdempotencyEntry},
    codec, coerce,
    db::{
        CreateOptions, Created, DEFAULT_LIST_LIMIT, Database, DeleteOptions, Deleted, GetOptions,
        ListOptions, MAX_LIST_LIMIT, Page, UpdateOptions, Updated,
        cursor::Watermark,
    },
    error::Error,
    obs::{self, Event},
    registry,
    schema::{CREATED_AT, DELETED_AT, TableModel, UPDATED_AT},
    ident,
    value::{Record, Timestamp, Value},
};
use std::sync::Arc;

///
/// Table
///
/// A handle to one named collection bound to one backing sheet. All
/// mutations run under the document lock and follow the same shape:
/// locate/validate, enforce constraints, write the row, rebuild indexes,
/// append the audit entry. Any failure aborts before the row is touched.
///
/// Reads take no lock; the design accepts read-during-write staleness.
///

#[derive(Clone)]
pub struct Table {
    db: Database,
    model: Arc<TableModel>,
}

/// One deserialized pass over the backing sheet.
struct Snapshot {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub(crate) const fn new(db: Database, model: Arc<TableModel>) -> Self {
        Self { db, model }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.model.name
    }

    #[must_use]
    pub fn model(&self) -> &TableModel {
        &self.model
    }

    pub(crate) const fn database(&self) -> &Database {
        &self.db
    }

    // ======================================================================
    // Mutations
    // ======================================================================

    /// Insert a new record.
    ///
    /// Assigns the primary key when absent, stamps `createdAt`/`updatedAt`,
    /// applies declared defaults, then enforces coercion, uniqueness among
    /// live records, and foreign keys before appending. With an
    /// `idempotency_key`, a replay returns the recorded response without
    /// re-executing anything.
    pub fn create(&self, record: Record, opts: &CreateOptions) -> Result<Created, Error> {
        let _guard = self.db.acquire_write_lock()?;

        // Replay short-circuit before any side effect, including id
        // generation: a retried create must not burn a counter value or
        // re-run constraint checks against its own first write.
        if let Some(key) = &opts.idempotency_key
            && let Some(entry) =
                audit::idempotency_lookup(self.db.kv().as_ref(), &self.model.name, key)?
        {
            return serde_json::from_value(entry.response)
                .map_err(|err| Error::Internal(format!("cached response failed to decode: {err}")));
        }

        obs::record(Event::Create);
        self.reject_unknown_fields(&record)?;

        let now = self.db.clock().now();
        let mut working = record;

        if working.is_blank(&self.model.primary_key) {
            let id = ident::generate_id(
                self.db.kv().as_ref(),
                &self.model.name,
                &self.model.id_prefix,
            )?;
            working.set(self.model.primary_key.clone(), Value::Text(id));
        }
        if working.is_blank(CREATED_AT) {
            working.set(CREATED_AT, Value::Timestamp(now));
        }
        working.set(UPDATED_AT, Value::Timestamp(now));
        // Records are born live.
        working.set(DELETED_AT, Value::Empty);

        for column in &self.model.columns {
            if working.is_blank(&column.name)
                && let Some(default) = &column.default
            {
                working.set(column.name.clone(), default.produce());
            }
        }

        let validated = self.coerce_record(&working)?;
        let snapshot = self.snapshot()?;
        self.check_unique(&validated, &snapshot, None)?;
        self.check_references(&validated)?;

        let row = codec::serialize(&validated, &snapshot.headers);
        self.db.grid().append_row(&self.model.name, &row)?;
        self.db.indexer().rebuild(self.db.grid().as_ref(), &self.model)?;

        let id = validated.value(&self.model.primary_key).cell_text();
        audit::append(
            self.db.kv().as_ref(),
            AuditEntry {
                seq: 0,
                at: now,
                action: AuditAction::Create,
                table: self.model.name.clone(),
                record_id: id.clone(),
                actor: opts.actor.clone(),
                before: None,
                after: Some(validated.clone()),
                metadata: opts.metadata.clone(),
            },
        )?;

        let response = Created { record: validated };

        if let Some(key) = &opts.idempotency_key {
            let encoded = serde_json::to_value(&response)
                .map_err(|err| Error::Internal(format!("response failed to encode: {err}")))?;
            audit::idempotency_record(
                self.db.kv().as_ref(),
                &IdempotencyEntry {
                    key: key.clone(),
                    table: self.model.name.clone(),
                    action: AuditAction::Create,
                    record_id: id,
                    response: encoded,
                    created_at: now,
                },
            )?;
        }

        Ok(response)
    }

    /// Merge `updates` onto the stored record and rewrite its row in place.
    ///
    /// The primary key is immutable. Fails `NotFound` for an unknown id,
    /// `Conflict` when the record is soft-deleted (unless `allow_deleted`)
    /// or when `expected_updated_at` is stale.
    pub fn update(&self, id: &str, updates: Record, opts: &UpdateOptions) -> Result<Updated, Error> {
        let _guard = self.db.acquire_write_lock()?;
        obs::record(Event::Update);

        let snapshot = self.snapshot()?;
        let (position, current) = self.locate(&snapshot, id)?;

        if !current.is_blank(DELETED_AT) && !opts.allow_deleted {
            return Err(Error::conflict(format!(
                "record `{id}` is soft-deleted; pass allow_deleted to mutate it"
            )));
        }

        if let Some(expected) = opts.expected_updated_at {
            let actual = current.value(UPDATED_AT).as_timestamp();
            if actual != Some(expected) {
                return Err(Error::conflict(format!(
                    "stale expected_updated_at for `{id}`: expected {}, stored {}",
                    expected,
                    actual.map_or_else(|| "none".to_string(), |ts| ts.to_string()),
                )));
            }
        }

        let mut merged = current.clone();
        for (field, value) in updates {
            if field == self.model.primary_key {
                if !value.is_empty() && value.cell_text() != id {
                    return Err(Error::validation(&field, "primary key is immutable"));
                }
                continue;
            }
            if !self.model.has_column(&field) {
                return Err(Error::UnknownField {
                    table: self.model.name.clone(),
                    field,
                });
            }
            merged.set(field, value);
        }

        let now = self.db.clock().now();
        merged.set(UPDATED_AT, Value::Timestamp(now));

        let validated = self.coerce_record(&merged)?;
        self.check_unique(&validated, &snapshot, Some(position))?;
        self.check_references(&validated)?;

        let row = codec::serialize(&validated, &snapshot.headers);
        self.db.grid().update_row(&self.model.name, position, &row)?;
        self.db.indexer().rebuild(self.db.grid().as_ref(), &self.model)?;

        audit::append(
            self.db.kv().as_ref(),
            AuditEntry {
                seq: 0,
                at: now,
                action: AuditAction::Update,
                table: self.model.name.clone(),
                record_id: id.to_string(),
                actor: opts.actor.clone(),
                before: Some(current),
                after: Some(validated.clone()),
                metadata: opts.metadata.clone(),
            },
        )?;

        Ok(Updated { record: validated })
    }

    /// Mark the record deleted by stamping `deletedAt`. It stays in the
    /// sheet and remains retrievable via `include_deleted`.
    pub fn soft_delete(&self, id: &str, opts: &DeleteOptions) -> Result<Updated, Error> {
        let now = self.db.clock().now();
        let updates = Record::new().with(DELETED_AT, Value::Timestamp(now));
        self.update(id, updates, &self.lifecycle_update_opts(opts))
    }

    /// Clear `deletedAt`, bringing a soft-deleted record back live.
    pub fn restore(&self, id: &str, opts: &DeleteOptions) -> Result<Updated, Error> {
        let updates = Record::new().with(DELETED_AT, Value::Empty);
        self.update(id, updates, &self.lifecycle_update_opts(opts))
    }

    /// Physically remove the row. Later rows shift up; indexes are rebuilt
    /// against the new positions.
    pub fn hard_delete(&self, id: &str, opts: &DeleteOptions) -> Result<Deleted, Error> {
        let _guard = self.db.acquire_write_lock()?;
        obs::record(Event::Delete);

        let snapshot = self.snapshot()?;
        let (position, current) = self.locate(&snapshot, id)?;

        self.db.grid().delete_row(&self.model.name, position)?;
        self.db.indexer().rebuild(self.db.grid().as_ref(), &self.model)?;

        audit::append(
            self.db.kv().as_ref(),
            AuditEntry {
                seq: 0,
                at: self.db.clock().now(),
                action: AuditAction::Delete,
                table: self.model.name.clone(),
                record_id: id.to_string(),
                actor: opts.actor.clone(),
                before: Some(current),
                after: None,
                metadata: opts.metadata.clone(),
            },
        )?;

        Ok(Deleted { success: true })
    }

    // ======================================================================
    // Reads
    // ======================================================================

    /// Linear scan for the primary key. `None` for unknown ids and, unless
    /// `include_deleted`, for soft-deleted records.
    pub fn get(&self, id: &str, opts: &GetOptions) -> Result<Option<Record>, Error> {
        let snapshot = self.snapshot()?;
        let Ok((_, record)) = self.locate(&snapshot, id) else {
            return Ok(None);
        };
        if !record.is_blank(DELETED_AT) && !opts.include_deleted {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Filtered, ordered, paged listing.
    ///
    /// Results are strictly ordered by `(updatedAt, primaryKey)` ascending.
    /// `total` counts the full filtered set; the cursor resumes strictly
    /// after the watermark, so paging to exhaustion yields exactly the
    /// unpaged set.
    pub fn list(&self, opts: &ListOptions) -> Result<Page, Error> {
        for filter in &opts.filters {
            if !self.model.has_column(&filter.field) {
                return Err(Error::UnknownField {
                    table: self.model.name.clone(),
                    field: filter.field.clone(),
                });
            }
        }

        let snapshot = self.snapshot()?;
        let mut records: Vec<Record> = snapshot
            .records
            .into_iter()
            .filter(|r| opts.include_deleted || r.is_blank(DELETED_AT))
            .filter(|r| opts.filters.iter().all(|f| f.matches(r)))
            .collect();

        records.sort_by(|a, b| self.list_key(a).cmp(&self.list_key(b)));
        let total = records.len();

        if let Some(token) = &opts.cursor {
            let watermark = Watermark::decode(token)?;
            let key = (watermark.updated_at.as_unix_millis(), watermark.id);
            records.retain(|r| self.list_key(r) > key);
        }

        if let Some(offset) = opts.offset
            && offset > 0
        {
            records.drain(..offset.min(records.len()));
        }

        let limit = opts.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let next_cursor = if records.len() > limit {
            records.truncate(limit);
            records.last().map(|last| {
                let (millis, id) = self.list_key(last);
                Watermark {
                    updated_at: Timestamp::from_unix_millis(millis),
                    id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(Page {
            records,
            next_cursor,
            total,
        })
    }

    /// Record count without paging.
    pub fn count(&self, include_deleted: bool) -> Result<usize, Error> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .records
            .iter()
            .filter(|r| include_deleted || r.is_blank(DELETED_AT))
            .count())
    }

    // ======================================================================
    // Internals
    // ======================================================================

    fn lifecycle_update_opts(&self, opts: &DeleteOptions) -> UpdateOptions {
        UpdateOptions {
            actor: opts.actor.clone(),
            metadata: opts.metadata.clone(),
            expected_updated_at: None,
            allow_deleted: true,
        }
    }

    fn snapshot(&self) -> Result<Snapshot, Error> {
        let headers = self.db.grid().headers(&self.model.name)?;
        let raw = self.db.grid().rows(&self.model.name)?;
        obs::record(Event::RowsScanned(raw.len() as u64));

        let records = raw
            .iter()
            .map(|row| codec::deserialize(row, &headers, &self.model))
            .collect();

        Ok(Snapshot { headers, records })
    }

    /// Find a record by primary key, returning its 1-based row position.
    fn locate(&self, snapshot: &Snapshot, id: &str) -> Result<(usize, Record), Error> {
        snapshot
            .records
            .iter()
            .position(|r| r.value(&self.model.primary_key).cell_text() == id)
            .map(|i| (i + 1, snapshot.records[i].clone()))
            .ok_or_else(|| Error::NotFound {
                table: self.model.name.clone(),
                id: id.to_string(),
            })
    }

    fn reject_unknown_fields(&self, record: &Record) -> Result<(), Error> {
        for field in record.keys() {
            if !self.model.has_column(field) {
                return Err(Error::UnknownField {
                    table: self.model.name.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Coerce every schema column; pass through values under physical-only
    /// headers (survivors of additive drift) untouched.
    fn coerce_record(&self, record: &Record) -> Result<Record, Error> {
        let mut out = Record::new();
        for column in &self.model.columns {
            let coerced = coerce::coerce(&record.value(&column.name), column)?;
            out.set(column.name.clone(), coerced);
        }
        for (field, value) in record.iter() {
            if !self.model.has_column(field) {
                out.set(field.clone(), value.clone());
            }
        }
        Ok(out)
    }

    /// Uniqueness among live records, optionally excluding one row position
    /// (the row being updated).
    fn check_unique(
        &self,
        candidate: &Record,
        snapshot: &Snapshot,
        exclude: Option<usize>,
    ) -> Result<(), Error> {
        for field in &self.model.unique {
            let value = candidate.value(field);
            if value.is_empty() {
                continue;
            }
            let text = value.cell_text();

            for (i, existing) in snapshot.records.iter().enumerate() {
                if exclude == Some(i + 1) || !existing.is_blank(DELETED_AT) {
                    continue;
                }
                if existing.value(field).cell_text() == text {
                    obs::record(Event::UniqueViolation);
                    return Err(Error::UniquenessConflict {
                        field: field.clone(),
                        value: text,
                    });
                }
            }
        }
        Ok(())
    }

    /// Every declared foreign key either is empty (when the reference
    /// allows null) or resolves to a live record in the referenced table.
    fn check_references(&self, candidate: &Record) -> Result<(), Error> {
        for (field, reference) in &self.model.references {
            let value = candidate.value(field);
            if value.is_empty() {
                if reference.allow_null {
                    continue;
                }
                return Err(Error::ForeignKeyViolation {
                    field: field.clone(),
                    table: reference.table.clone(),
                    value: String::new(),
                });
            }

            let text = value.cell_text();
            if !self.reference_resolves(&reference.table, &text)? {
                return Err(Error::ForeignKeyViolation {
                    field: field.clone(),
                    table: reference.table.clone(),
                    value: text,
                });
            }
        }
        Ok(())
    }

    /// Resolve a candidate key against the referenced table using its
    /// registry entry; an unbound referenced table never resolves.
    fn reference_resolves(&self, table: &str, key: &str) -> Result<bool, Error> {
        let Some(entry) = registry::load(self.db.kv().as_ref(), table)? else {
            return Ok(false);
        };

        let Some(pk_pos) = entry.headers.iter().position(|h| h == &entry.primary_key) else {
            return Ok(false);
        };
        let deleted_pos = entry.headers.iter().position(|h| h == DELETED_AT);

        let rows = self.db.grid().rows(table)?;
        obs::record(Event::RowsScanned(rows.len() as u64));

        Ok(rows.iter().any(|row| {
            let id_matches = row.get(pk_pos).is_some_and(|cell| cell == key);
            let live = deleted_pos
                .is_none_or(|pos| row.get(pos).is_none_or(|cell| cell.trim().is_empty()));
            id_matches && live
        }))
    }

    /// Total order for listings: `(updatedAt millis, primary key)`.
    /// Unparsable or missing `updatedAt` sorts first.
    fn list_key(&self, record: &Record) -> (i64, String) {
        let millis = record
            .value(UPDATED_AT)
            .as_timestamp()
            .map_or(0, Timestamp::as_unix_millis);
        (millis, record.value(&self.model.primary_key).cell_text())
    }
}
