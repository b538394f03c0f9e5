use crate::{
    clock::Clock,
    error::Error,
    grid::Grid,
    kv::KvStore,
    schema::TableModel,
    value::Timestamp,
};
use serde::{Deserialize, Serialize};

const MIGRATION_SEQ: &str = "migration:seq";
const TABLES_KEY: &str = "tables";

fn registry_key(table: &str) -> String {
    format!("schema:{table}")
}

fn migration_key(seq: u64) -> String {
    format!("migration:{seq}")
}

///
/// RegistryEntry
///
/// Per-table persisted schema state, compared on every binding to detect
/// drift between the declared schema and what was last seen.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub version: u32,
    pub primary_key: String,
    pub headers: Vec<String>,
}

///
/// MigrationEntry
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MigrationEntry {
    pub seq: u64,
    pub table: String,
    pub from_version: Option<u32>,
    pub to_version: u32,
    pub at: Timestamp,
    pub headers: Vec<String>,
}

pub fn load(kv: &dyn KvStore, table: &str) -> Result<Option<RegistryEntry>, Error> {
    let Some(raw) = kv.get(&registry_key(table))? else {
        return Ok(None);
    };
    let entry = serde_json::from_str(&raw)
        .map_err(|err| Error::Internal(format!("registry entry failed to decode: {err}")))?;
    Ok(Some(entry))
}

/// Bind a table to its backing sheet.
///
/// Creates the sheet when absent, applies additive-only header drift (the
/// physical header row gains columns the schema now requires but never
/// loses or reorders existing ones, preserving data already written to
/// unrecognized columns), and persists the registry entry. A version
/// mismatch additionally appends a migration-log entry.
pub fn bind(
    grid: &dyn Grid,
    kv: &dyn KvStore,
    clock: &dyn Clock,
    model: &TableModel,
) -> Result<(), Error> {
    grid.ensure_sheet(&model.name, &model.headers)?;

    let mut physical = grid.headers(&model.name)?;
    let mut drifted = false;
    for header in &model.headers {
        if !physical.contains(header) {
            physical.push(header.clone());
            drifted = true;
        }
    }
    if drifted {
        grid.set_headers(&model.name, &physical)?;
    }

    let previous = load(kv, &model.name)?;
    let from_version = previous.as_ref().map(|e| e.version);

    if from_version != Some(model.version) {
        let seq = kv.increment(MIGRATION_SEQ)?;
        let migration = MigrationEntry {
            seq,
            table: model.name.clone(),
            from_version,
            to_version: model.version,
            at: clock.now(),
            headers: physical.clone(),
        };
        let encoded = serde_json::to_string(&migration)
            .map_err(|err| Error::Internal(format!("migration entry failed to encode: {err}")))?;
        kv.set(&migration_key(seq), &encoded)?;
    }

    let entry = RegistryEntry {
        version: model.version,
        primary_key: model.primary_key.clone(),
        headers: physical,
    };
    if previous.as_ref() != Some(&entry) {
        let encoded = serde_json::to_string(&entry)
            .map_err(|err| Error::Internal(format!("registry entry failed to encode: {err}")))?;
        kv.set(&registry_key(&model.name), &encoded)?;
    }

    register_table(kv, &model.name)?;

    Ok(())
}

/// The whole migration log in sequence order.
pub fn migrations(kv: &dyn KvStore) -> Result<Vec<MigrationEntry>, Error> {
    let last = kv
        .get(MIGRATION_SEQ)?
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let mut out = Vec::new();
    for seq in 1..=last {
        if let Some(raw) = kv.get(&migration_key(seq))?
            && let Ok(entry) = serde_json::from_str::<MigrationEntry>(&raw)
        {
            out.push(entry);
        }
    }
    Ok(out)
}

/// Names of every table ever bound, sorted.
pub fn tables(kv: &dyn KvStore) -> Result<Vec<String>, Error> {
    let Some(raw) = kv.get(TABLES_KEY)? else {
        return Ok(Vec::new());
    };
    let names: Vec<String> = serde_json::from_str(&raw)
        .map_err(|err| Error::Internal(format!("table list failed to decode: {err}")))?;
    Ok(names)
}

fn register_table(kv: &dyn KvStore, name: &str) -> Result<(), Error> {
    let mut names = tables(kv)?;
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
        names.sort();
        let encoded = serde_json::to_string(&names)
            .map_err(|err| Error::Internal(format!("table list failed to encode: {err}")))?;
        kv.set(TABLES_KEY, &encoded)?;
    }
    Ok(())
}

///
/// TESTS
///
