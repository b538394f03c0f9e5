use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};
use thiserror::Error as ThisError;

///
/// GridError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum GridError {
    #[error("sheet `{name}` does not exist")]
    SheetMissing { name: String },

    #[error("row {position} out of range for sheet `{sheet}` ({rows} data rows)")]
    RowOutOfRange {
        sheet: String,
        position: usize,
        rows: usize,
    },

    #[error("grid backend error: {message}")]
    Backend { message: String },
}

///
/// Grid
///
/// The backing grid: named sheets of a header row plus data rows, reachable
/// only through row/column addressing. Data rows are addressed 1-based and
/// shift up on deletion, exactly like the external grid host.
///
/// Implementations must be safe to share across threads; the engine itself
/// serializes writers through the document lock.
///

pub trait Grid: Send + Sync {
    fn sheet_exists(&self, name: &str) -> bool;

    /// Create the sheet with the given header row when absent. Existing
    /// sheets are left untouched (headers are managed via `set_headers`).
    fn ensure_sheet(&self, name: &str, headers: &[String]) -> Result<(), GridError>;

    fn headers(&self, name: &str) -> Result<Vec<String>, GridError>;

    fn set_headers(&self, name: &str, headers: &[String]) -> Result<(), GridError>;

    /// All data rows in physical order (position 1 first).
    fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, GridError>;

    /// Append a data row, returning its 1-based position.
    fn append_row(&self, name: &str, row: &[String]) -> Result<usize, GridError>;

    fn update_row(&self, name: &str, position: usize, row: &[String]) -> Result<(), GridError>;

    /// Remove a data row; later rows shift up by one.
    fn delete_row(&self, name: &str, position: usize) -> Result<(), GridError>;

    /// Replace every data row wholesale, keeping the header row.
    fn replace_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<(), GridError>;

    fn delete_sheet(&self, name: &str) -> Result<(), GridError>;

    fn sheet_names(&self) -> Vec<String>;
}

///
/// MemoryGrid
///
/// In-memory `Grid` used by tests and embedded deployments.
///

#[derive(Debug, Default)]
pub struct MemoryGrid {
    sheets: RwLock<BTreeMap<String, MemorySheet>>,
}

#[derive(Clone, Debug, Default)]
struct MemorySheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sheet<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MemorySheet) -> Result<R, GridError>,
    ) -> Result<R, GridError> {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        let sheet = sheets.get_mut(name).ok_or_else(|| GridError::SheetMissing {
            name: name.to_string(),
        })?;
        f(sheet)
    }
}

impl Grid for MemoryGrid {
    fn sheet_exists(&self, name: &str) -> bool {
        self.sheets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn ensure_sheet(&self, name: &str, headers: &[String]) -> Result<(), GridError> {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        sheets.entry(name.to_string()).or_insert_with(|| MemorySheet {
            headers: headers.to_vec(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn headers(&self, name: &str) -> Result<Vec<String>, GridError> {
        self.with_sheet(name, |sheet| Ok(sheet.headers.clone()))
    }

    fn set_headers(&self, name: &str, headers: &[String]) -> Result<(), GridError> {
        self.with_sheet(name, |sheet| {
            sheet.headers = headers.to_vec();
            Ok(())
        })
    }

    fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, GridError> {
        self.with_sheet(name, |sheet| Ok(sheet.rows.clone()))
    }

    fn append_row(&self, name: &str, row: &[String]) -> Result<usize, GridError> {
        self.with_sheet(name, |sheet| {
            sheet.rows.push(row.to_vec());
            Ok(sheet.rows.len())
        })
    }

    fn update_row(&self, name: &str, position: usize, row: &[String]) -> Result<(), GridError> {
        self.with_sheet(name, |sheet| {
            if position == 0 || position > sheet.rows.len() {
                return Err(GridError::RowOutOfRange {
                    sheet: name.to_string(),
                    position,
                    rows: sheet.rows.len(),
                });
            }
            sheet.rows[position - 1] = row.to_vec();
            Ok(())
        })
    }

    fn delete_row(&self, name: &str, position: usize) -> Result<(), GridError> {
        self.with_sheet(name, |sheet| {
            if position == 0 || position > sheet.rows.len() {
                return Err(GridError::RowOutOfRange {
                    sheet: name.to_string(),
                    position,
                    rows: sheet.rows.len(),
                });
            }
            sheet.rows.remove(position - 1);
            Ok(())
        })
    }

    fn replace_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<(), GridError> {
        self.with_sheet(name, |sheet| {
            sheet.rows = rows.to_vec();
            Ok(())
        })
    }

    fn delete_sheet(&self, name: &str) -> Result<(), GridError> {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        sheets.remove(name);
        Ok(())
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{Grid, GridError, MemoryGrid};

    fn headers() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn row(a: &str, b: &str) -> Vec<String> {
        vec![a.to_string(), b.to_string()]
    }

    #[test]
    fn ensure_sheet_is_idempotent() {
        let grid = MemoryGrid::new();
        grid.ensure_sheet("t", &headers()).expect("create");
        grid.append_row("t", &row("1", "x")).expect("append");
        grid.ensure_sheet("t", &headers()).expect("re-ensure");
        assert_eq!(grid.rows("t").expect("rows").len(), 1);
    }

    #[test]
    fn delete_row_shifts_later_rows_up() {
        let grid = MemoryGrid::new();
        grid.ensure_sheet("t", &headers()).expect("create");
        assert_eq!(grid.append_row("t", &row("1", "x")).expect("append"), 1);
        assert_eq!(grid.append_row("t", &row("2", "y")).expect("append"), 2);
        assert_eq!(grid.append_row("t", &row("3", "z")).expect("append"), 3);

        grid.delete_row("t", 2).expect("delete");
        let rows = grid.rows("t").expect("rows");
        assert_eq!(rows, vec![row("1", "x"), row("3", "z")]);
    }

    #[test]
    fn positions_are_one_based() {
        let grid = MemoryGrid::new();
        grid.ensure_sheet("t", &headers()).expect("create");
        grid.append_row("t", &row("1", "x")).expect("append");

        let err = grid.update_row("t", 0, &row("0", "0")).expect_err("row 0");
        assert!(matches!(err, GridError::RowOutOfRange { position: 0, .. }));
    }

    #[test]
    fn missing_sheet_is_an_error() {
        let grid = MemoryGrid::new();
        let err = grid.rows("nope").expect_err("missing sheet");
        assert_eq!(
            err,
            GridError::SheetMissing {
                name: "nope".to_string()
            }
        );
    }
}
