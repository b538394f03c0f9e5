use crate::{
    codec,
    error::Error,
    grid::Grid,
    obs::{self, Event},
    schema::{DELETED_AT, IndexSpec, TableModel},
};
use std::collections::BTreeMap;

/// Header row shared by every auxiliary index sheet.
pub const INDEX_HEADERS: [&str; 2] = ["value", "rows"];

#[must_use]
pub fn index_sheet_name(table: &str, index: &IndexSpec) -> String {
    format!("{table}__idx_{}", index.name)
}

///
/// IndexMaintainer
///
/// Rebuilds per-field value → row-position indexes into auxiliary sheets
/// after each mutation. Index sheets are derived state, never authoritative,
/// and are rewritten wholesale — never partially patched.
///

pub trait IndexMaintainer: Send + Sync {
    fn rebuild(&self, grid: &dyn Grid, model: &TableModel) -> Result<(), Error>;
}

///
/// FullRebuild
///
/// The default maintainer: a full scan of the table per rebuild, bucketing
/// live row positions by field value. O(rows) per mutation — a deliberate
/// correctness-first trade, isolated behind the trait so an incremental
/// maintainer can replace it without touching validation or concurrency.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct FullRebuild;

impl IndexMaintainer for FullRebuild {
    fn rebuild(&self, grid: &dyn Grid, model: &TableModel) -> Result<(), Error> {
        if model.indexes.is_empty() {
            return Ok(());
        }

        let headers = grid.headers(&model.name)?;
        let rows = grid.rows(&model.name)?;
        obs::record(Event::IndexRebuild);

        for index in &model.indexes {
            let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();

            for (i, row) in rows.iter().enumerate() {
                let record = codec::deserialize(row, &headers, model);
                if !record.is_blank(DELETED_AT) {
                    continue;
                }
                let key = record.value(&index.field).cell_text();
                buckets.entry(key).or_default().push(i + 1);
            }

            let sheet = index_sheet_name(&model.name, index);
            let headers: Vec<String> = INDEX_HEADERS.iter().map(ToString::to_string).collect();
            grid.ensure_sheet(&sheet, &headers)?;

            let entries: Vec<Vec<String>> = buckets
                .into_iter()
                .map(|(value, positions)| {
                    let joined = positions
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    vec![value, joined]
                })
                .collect();

            grid.replace_rows(&sheet, &entries)?;
        }

        Ok(())
    }
}

///
/// TESTS
///
