// Not every test binary uses every fixture.
#![allow(dead_code)]

use gridstore_core::{
    clock::ManualClock,
    db::{CreateOptions, Database, Table},
    grid::MemoryGrid,
    index::FullRebuild,
    kv::MemoryKv,
    lock::DocumentLock,
    prelude::*,
};
use std::sync::Arc;

/// 2023-11-14T22:13:20Z, the fixture epoch.
pub const T0: i64 = 1_700_000_000_000;

/// Database over memory backends with a pinned, advanceable clock.
pub fn manual_db() -> (Database, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(T0)));
    let db = Database::new(
        Arc::new(MemoryGrid::new()),
        Arc::new(MemoryKv::new()),
        Arc::new(DocumentLock::new()),
        Arc::new(FullRebuild),
        clock.clone(),
    );
    (db, clock)
}

pub fn teams_schema() -> TableSchema {
    TableSchema::new("Teams", "TEA").column(Column::text("label").required())
}

pub fn agents_schema() -> TableSchema {
    TableSchema::new("Agents", "AGT")
        .column(Column::text("email").required().unique())
        .column(
            Column::text("teamId").references(Reference::to("Teams").allow_null()),
        )
        .column(Column::number("score").min(0.0).max(100.0))
        .index(IndexSpec::on("teamId"))
}

pub fn agent(email: &str) -> Record {
    Record::new().with("email", email)
}

/// Create a team and return its id.
pub fn seed_team(teams: &Table, label: &str) -> String {
    let created = teams
        .create(
            Record::new().with("label", label),
            &CreateOptions::default(),
        )
        .expect("team should create");
    created.record.value("id").cell_text()
}
