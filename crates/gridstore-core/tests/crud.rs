mod common;

use common::{agent, agents_schema, manual_db};
use gridstore_core::{
    Error,
    db::{CreateOptions, DeleteOptions, GetOptions, UpdateOptions},
    prelude::*,
};

#[test]
fn create_then_get_round_trips() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com").with("score", 87.0), &CreateOptions::default())
        .expect("create");

    let id = created.record.value("id").cell_text();
    assert!(id.starts_with("AGT"));

    let fetched = agents
        .get(&id, &GetOptions::default())
        .expect("get")
        .expect("record should exist");

    // Deep-equal except system-stamped fields.
    assert_eq!(fetched.value("email"), Value::Text("alice@example.com".into()));
    assert_eq!(fetched.value("score"), Value::Number(87.0));
    assert_eq!(fetched, created.record);
    assert!(!fetched.is_blank("createdAt"));
    assert!(!fetched.is_blank("updatedAt"));
    assert!(fetched.is_blank("deletedAt"));
}

#[test]
fn generated_ids_are_sequential_per_table() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let a = agents
        .create(agent("a@example.com"), &CreateOptions::default())
        .expect("create");
    let b = agents
        .create(agent("b@example.com"), &CreateOptions::default())
        .expect("create");

    assert_eq!(a.record.value("id").cell_text(), "AGT000001");
    assert_eq!(b.record.value("id").cell_text(), "AGT000002");
}

#[test]
fn update_merges_and_refreshes_updated_at() {
    let (db, clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com").with("score", 50.0), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();
    let first_updated = created.record.value("updatedAt").as_timestamp().expect("ts");

    clock.advance_millis(60_000);
    let updated = agents
        .update(&id, Record::new().with("score", 75.0), &UpdateOptions::default())
        .expect("update");

    assert_eq!(updated.record.value("score"), Value::Number(75.0));
    // Untouched fields survive the merge.
    assert_eq!(updated.record.value("email"), Value::Text("alice@example.com".into()));
    let second_updated = updated.record.value("updatedAt").as_timestamp().expect("ts");
    assert!(second_updated > first_updated);
}

#[test]
fn update_of_unknown_id_is_not_found() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let err = agents
        .update("AGT999999", Record::new().with("score", 1.0), &UpdateOptions::default())
        .expect_err("unknown id");
    assert!(matches!(err, Error::NotFound { id, .. } if id == "AGT999999"));
}

#[test]
fn primary_key_is_immutable() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();

    let err = agents
        .update(&id, Record::new().with("id", "AGT424242"), &UpdateOptions::default())
        .expect_err("pk change");
    assert!(matches!(err, Error::Validation { field, .. } if field == "id"));

    // Re-sending the same id is tolerated.
    assert!(
        agents
            .update(
                &id,
                Record::new().with("id", id.as_str()).with("score", 10.0),
                &UpdateOptions::default(),
            )
            .is_ok()
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let err = agents
        .create(agent("a@example.com").with("nickname", "Al"), &CreateOptions::default())
        .expect_err("unknown field on create");
    assert!(matches!(err, Error::UnknownField { field, .. } if field == "nickname"));

    let created = agents
        .create(agent("b@example.com"), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();

    let err = agents
        .update(&id, Record::new().with("nickname", "Bee"), &UpdateOptions::default())
        .expect_err("unknown field on update");
    assert!(matches!(err, Error::UnknownField { field, .. } if field == "nickname"));
}

#[test]
fn soft_delete_restore_round_trip() {
    let (db, clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();

    clock.advance_millis(1_000);
    agents
        .soft_delete(&id, &DeleteOptions::default())
        .expect("soft delete");

    assert!(agents.get(&id, &GetOptions::default()).expect("get").is_none());

    let deleted = agents
        .get(&id, &GetOptions::include_deleted())
        .expect("get")
        .expect("still retrievable with include_deleted");
    assert!(!deleted.is_blank("deletedAt"));

    clock.advance_millis(1_000);
    agents.restore(&id, &DeleteOptions::default()).expect("restore");

    let live = agents
        .get(&id, &GetOptions::default())
        .expect("get")
        .expect("live again");
    assert!(live.is_blank("deletedAt"));
}

#[test]
fn mutating_a_soft_deleted_record_requires_allow_deleted() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();
    agents
        .soft_delete(&id, &DeleteOptions::default())
        .expect("soft delete");

    let err = agents
        .update(&id, Record::new().with("score", 1.0), &UpdateOptions::default())
        .expect_err("should conflict");
    assert!(matches!(err, Error::Conflict { .. }));
    assert!(err.is_retryable());

    assert!(
        agents
            .update(
                &id,
                Record::new().with("score", 1.0),
                &UpdateOptions::default().allow_deleted(),
            )
            .is_ok()
    );
}

#[test]
fn hard_delete_physically_removes_the_row() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect("create");
    let id = created.record.value("id").cell_text();

    let deleted = agents
        .hard_delete(&id, &DeleteOptions::default())
        .expect("hard delete");
    assert!(deleted.success);

    assert!(
        agents
            .get(&id, &GetOptions::include_deleted())
            .expect("get")
            .is_none()
    );
    assert_eq!(agents.count(true).expect("count"), 0);

    let err = agents
        .hard_delete(&id, &DeleteOptions::default())
        .expect_err("second delete");
    assert!(matches!(err, Error::NotFound { .. }));
}
