use crate::{
    schema::{ColumnType, TableModel},
    value::{Record, Timestamp, Value},
};

/// Project a typed record onto the physical header order as cell text.
///
/// `headers` is the sheet's actual header row, which after additive drift
/// may contain columns the schema no longer declares; their values pass
/// through untouched so hand-added data survives rewrites. Missing fields
/// serialize as empty cells.
#[must_use]
pub fn serialize(record: &Record, headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|name| record.value(name).cell_text())
        .collect()
}

/// Re-type a raw grid row into a record per the column types.
///
/// Cells under headers the schema does not declare read as plain text.
/// The read path is lossy-tolerant: the backing grid may be hand-edited,
/// so a cell that fails to parse degrades to raw text instead of failing
/// the whole read.
#[must_use]
pub fn deserialize(row: &[String], headers: &[String], model: &TableModel) -> Record {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cell = row.get(i).map_or("", String::as_str);
            let ty = model.column(name).map_or(ColumnType::Text, |c| c.ty);
            (name.clone(), decode_cell(cell, ty))
        })
        .collect()
}

fn decode_cell(cell: &str, ty: ColumnType) -> Value {
    if cell.is_empty() {
        return Value::Empty;
    }

    match ty {
        ColumnType::Text | ColumnType::Enum => Value::Text(cell.to_string()),
        ColumnType::Number => cell
            .trim()
            .parse::<f64>()
            .map_or_else(|_| Value::Text(cell.to_string()), Value::Number),
        ColumnType::Bool => match cell.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Text(cell.to_string()),
        },
        ColumnType::Timestamp => Timestamp::parse(cell)
            .map_or_else(|| Value::Text(cell.to_string()), Value::Timestamp),
        ColumnType::Json => serde_json::from_str::<serde_json::Value>(cell)
            .map_or_else(|_| Value::Text(cell.to_string()), Value::Json),
    }
}

///
/// TESTS
///
