mod common;

use common::{agent, agents_schema, manual_db};
use gridstore_core::{
    audit::{self, AuditAction},
    db::{CreateOptions, DeleteOptions, UpdateOptions},
    prelude::*,
};

#[test]
fn replayed_create_returns_the_cached_response() {
    let (db, clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let opts = CreateOptions::default().idempotency_key("req-123");
    let first = agents
        .create(agent("alice@example.com"), &opts)
        .expect("first call");

    // Wall-clock movement must not leak into the replayed response.
    clock.advance_millis(60_000);
    let second = agents
        .create(agent("alice@example.com"), &opts)
        .expect("replay");

    assert_eq!(first, second);
    assert_eq!(agents.count(true).expect("count"), 1);
}

#[test]
fn replay_survives_unique_constraints() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    // email is unique; a replay must not trip over the row the first call
    // wrote.
    let opts = CreateOptions::default().idempotency_key("req-456");
    let first = agents
        .create(agent("alice@example.com"), &opts)
        .expect("first call");
    let second = agents
        .create(agent("alice@example.com"), &opts)
        .expect("replay");
    assert_eq!(first.record.value("id"), second.record.value("id"));
}

#[test]
fn replay_does_not_burn_an_id_or_append_audit() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let opts = CreateOptions::default().idempotency_key("req-789");
    agents
        .create(agent("alice@example.com"), &opts)
        .expect("first call");
    agents
        .create(agent("alice@example.com"), &opts)
        .expect("replay");

    let log = audit::entries(db.kv().as_ref()).expect("audit log");
    assert_eq!(log.len(), 1);

    // The counter did not advance during the replay.
    let next = agents
        .create(agent("bob@example.com"), &CreateOptions::default())
        .expect("create");
    assert_eq!(next.record.value("id").cell_text(), "AGT000002");
}

#[test]
fn distinct_keys_execute_independently() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    agents
        .create(
            agent("alice@example.com"),
            &CreateOptions::default().idempotency_key("req-a"),
        )
        .expect("first");
    let second = agents
        .create(
            agent("bob@example.com"),
            &CreateOptions::default().idempotency_key("req-b"),
        )
        .expect("second");

    assert_eq!(second.record.value("id").cell_text(), "AGT000002");
    assert_eq!(agents.count(true).expect("count"), 2);
}

#[test]
fn audit_entries_capture_before_and_after_states() {
    let (db, clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    let created = agents
        .create(
            agent("alice@example.com").with("score", 10.0),
            &CreateOptions::default()
                .actor("qa-lead")
                .metadata(serde_json::json!({"source": "import"})),
        )
        .expect("create");
    let id = created.record.value("id").cell_text();

    clock.advance_millis(1_000);
    agents
        .update(
            &id,
            Record::new().with("score", 20.0),
            &UpdateOptions::default().actor("qa-lead"),
        )
        .expect("update");

    clock.advance_millis(1_000);
    agents
        .hard_delete(&id, &DeleteOptions::default().actor("admin"))
        .expect("delete");

    let log = audit::entries(db.kv().as_ref()).expect("audit log");
    assert_eq!(log.len(), 3);

    let create = &log[0];
    assert_eq!(create.seq, 1);
    assert_eq!(create.action, AuditAction::Create);
    assert_eq!(create.table, "Agents");
    assert_eq!(create.record_id, id);
    assert_eq!(create.actor.as_deref(), Some("qa-lead"));
    assert!(create.before.is_none());
    assert_eq!(
        create.after.as_ref().map(|r| r.value("score")),
        Some(Value::Number(10.0))
    );
    assert_eq!(
        create.metadata,
        Some(serde_json::json!({"source": "import"}))
    );

    let update = &log[1];
    assert_eq!(update.action, AuditAction::Update);
    assert_eq!(
        update.before.as_ref().map(|r| r.value("score")),
        Some(Value::Number(10.0))
    );
    assert_eq!(
        update.after.as_ref().map(|r| r.value("score")),
        Some(Value::Number(20.0))
    );

    let delete = &log[2];
    assert_eq!(delete.action, AuditAction::Delete);
    assert_eq!(delete.actor.as_deref(), Some("admin"));
    assert!(delete.before.is_some());
    assert!(delete.after.is_none());
}

#[test]
fn failed_mutations_append_nothing_to_the_log() {
    let (db, _clock) = manual_db();
    let agents = db.define_table(&agents_schema()).expect("define");

    agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect("create");
    agents
        .create(agent("alice@example.com"), &CreateOptions::default())
        .expect_err("duplicate email");
    agents
        .create(
            agent("bob@example.com").with("score", 999.0),
            &CreateOptions::default(),
        )
        .expect_err("score above max");

    let log = audit::entries(db.kv().as_ref()).expect("audit log");
    assert_eq!(log.len(), 1);
}

#[test]
fn soft_delete_and_restore_are_logged_as_updates() {
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
    clock.advance_millis(1_000);
    agents.restore(&id, &DeleteOptions::default()).expect("restore");

    let log = audit::entries(db.kv().as_ref()).expect("audit log");
    assert_eq!(log.len(), 3);
    assert!(
        log[1..]
            .iter()
            .all(|entry| entry.action == AuditAction::Update)
    );
    assert!(
        log[1]
            .after
            .as_ref()
            .is_some_and(|r| !r.is_blank("deletedAt"))
    );
    assert!(
        log[2]
            .after
            .as_ref()
            .is_some_and(|r| r.is_blank("deletedAt"))
    );
}
