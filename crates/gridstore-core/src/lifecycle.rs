//! Archival, backup, and retention enforcement.
//!
//! Aged rows relocate into cold per-month archive sheets
//! (`{table}__archive_{yyyy_mm}`); backups snapshot a live sheet into
//! `{table}__backup_{stamp}`. Both stay readable through the `Grid` trait.

use crate::{
    codec,
    db::{Database, Table},
    error::Error,
    obs::{self, Event},
    schema::DELETED_AT,
    value::{Record, Timestamp},
};

///
/// ArchiveOutcome
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArchiveOutcome {
    pub archived: usize,
    /// Archive sheets that received rows.
    pub sheets: Vec<String>,
}

///
/// MaintenanceReport
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MaintenanceReport {
    pub backed_up: Vec<String>,
    pub archived: usize,
}

#[must_use]
pub fn archive_sheet_name(table: &str, basis: Timestamp) -> String {
    format!("{table}__archive_{}", basis.month_key())
}

#[must_use]
pub fn backup_sheet_name(table: &str, at: Timestamp) -> String {
    format!("{table}__backup_{}", at.backup_stamp())
}

impl Table {
    /// Relocate rows older than `cutoff` into per-month archive sheets and
    /// remove them from the live table.
    ///
    /// Age basis is `deletedAt` when set, otherwise `updatedAt`; rows with
    /// neither stamp are left alone. Runs under the document lock and
    /// rebuilds indexes once at the end.
    pub fn archive_older_than(&self, cutoff: Timestamp) -> Result<ArchiveOutcome, Error> {
        self.archive_where(cutoff, false)
    }

    /// Archive soft-deleted rows whose `deletedAt` is older than
    /// `now - days`.
    pub fn purge_soft_deleted(&self, days: u32) -> Result<ArchiveOutcome, Error> {
        let cutoff = self.database().clock().now().minus_days(days);
        self.archive_where(cutoff, true)
    }

    /// Snapshot the live sheet's current contents into a timestamped
    /// backup sheet, returning the sheet name.
    pub fn backup(&self) -> Result<String, Error> {
        let db = self.database();
        let _guard = db.acquire_write_lock()?;

        let headers = db.grid().headers(self.name())?;
        let rows = db.grid().rows(self.name())?;

        let sheet = backup_sheet_name(self.name(), db.clock().now());
        db.grid().ensure_sheet(&sheet, &headers)?;
        db.grid().set_headers(&sheet, &headers)?;
        db.grid().replace_rows(&sheet, &rows)?;

        obs::record(Event::Backup);
        Ok(sheet)
    }

    fn archive_where(&self, cutoff: Timestamp, deleted_only: bool) -> Result<ArchiveOutcome, Error> {
        let db = self.database();
        let _guard = db.acquire_write_lock()?;

        let headers = db.grid().headers(self.name())?;
        let raw = db.grid().rows(self.name())?;

        let mut outcome = ArchiveOutcome::default();
        let mut doomed: Vec<usize> = Vec::new();

        for (i, row) in raw.iter().enumerate() {
            let record = codec::deserialize(row, &headers, self.model());
            let Some(basis) = age_basis(&record, deleted_only) else {
                continue;
            };
            if basis >= cutoff {
                continue;
            }

            let sheet = archive_sheet_name(self.name(), basis);
            db.grid().ensure_sheet(&sheet, &headers)?;
            db.grid().append_row(&sheet, row)?;
            if !outcome.sheets.contains(&sheet) {
                outcome.sheets.push(sheet);
            }
            doomed.push(i + 1);
        }

        // Delete bottom-up so earlier positions stay valid as rows shift.
        for position in doomed.iter().rev() {
            db.grid().delete_row(self.name(), *position)?;
        }

        outcome.archived = doomed.len();
        if outcome.archived > 0 {
            db.indexer().rebuild(db.grid().as_ref(), self.model())?;
            obs::record(Event::RowsArchived(outcome.archived as u64));
        }

        Ok(outcome)
    }
}

/// The timestamp a row ages by: `deletedAt` when stamped, else `updatedAt`.
/// With `deleted_only`, live rows never age out.
fn age_basis(record: &Record, deleted_only: bool) -> Option<Timestamp> {
    let deleted = record.value(DELETED_AT).as_timestamp();
    if deleted_only {
        return deleted;
    }
    deleted.or_else(|| record.value(crate::schema::UPDATED_AT).as_timestamp())
}

impl Database {
    /// Back up the named tables, or every table defined in this process
    /// when `names` is `None`. Not transactional across tables.
    pub fn backup_tables(&self, names: Option<&[String]>) -> Result<Vec<String>, Error> {
        let mut backed_up = Vec::new();
        for model in self.defined_models() {
            if names.is_some_and(|wanted| !wanted.iter().any(|n| n == &model.name)) {
                continue;
            }
            let table = Table::new(self.clone(), model);
            backed_up.push(table.backup()?);
        }
        Ok(backed_up)
    }

    /// Apply each table's declared retention policy: archive rows past
    /// `archive_after_days`, purge soft-deleted rows past `retention_days`.
    pub fn enforce_retention(&self) -> Result<usize, Error> {
        let mut archived = 0;
        for model in self.defined_models() {
            let table = Table::new(self.clone(), model.clone());
            if let Some(days) = model.archive_after_days {
                let cutoff = self.clock().now().minus_days(days);
                archived += table.archive_older_than(cutoff)?.archived;
            }
            if let Some(days) = model.retention_days {
                archived += table.purge_soft_deleted(days)?.archived;
            }
        }
        Ok(archived)
    }

    /// Back up every defined table, then enforce retention.
    pub fn run_maintenance(&self) -> Result<MaintenanceReport, Error> {
        let backed_up = self.backup_tables(None)?;
        let archived = self.enforce_retention()?;
        Ok(MaintenanceReport {
            backed_up,
            archived,
        })
    }
}
