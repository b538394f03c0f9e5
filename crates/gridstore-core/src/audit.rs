use crate::{
    error::Error,
    kv::KvStore,
    value::{Record, Timestamp},
};
use serde::{Deserialize, Serialize};

const AUDIT_SEQ: &str = "audit:seq";

fn audit_key(seq: u64) -> String {
    format!("audit:{seq}")
}

fn idempotency_key(table: &str, key: &str) -> String {
    format!("idem:{table}:{key}")
}

///
/// AuditAction
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

///
/// AuditEntry
///
/// One immutable row of mutation history. The engine only appends; the log
/// exists for external consumption (reconciliation, coaching disputes,
/// incident forensics) and is never read back on the hot path.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub at: Timestamp,
    pub action: AuditAction,
    pub table: String,
    pub record_id: String,
    pub actor: Option<String>,
    pub before: Option<Record>,
    pub after: Option<Record>,
    pub metadata: Option<serde_json::Value>,
}

/// Append an entry, assigning it the next sequence number.
pub fn append(kv: &dyn KvStore, mut entry: AuditEntry) -> Result<u64, Error> {
    let seq = kv.increment(AUDIT_SEQ)?;
    entry.seq = seq;

    let encoded = serde_json::to_string(&entry)
        .map_err(|err| Error::Internal(format!("audit entry failed to encode: {err}")))?;
    kv.set(&audit_key(seq), &encoded)?;

    Ok(seq)
}

/// Read the whole log in sequence order. Entries that fail to decode are
/// skipped rather than failing the read; the log may outlive schema
/// changes to the entry shape.
pub fn entries(kv: &dyn KvStore) -> Result<Vec<AuditEntry>, Error> {
    let last = kv
        .get(AUDIT_SEQ)?
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    let mut out = Vec::new();
    for seq in 1..=last {
        if let Some(raw) = kv.get(&audit_key(seq))?
            && let Ok(entry) = serde_json::from_str::<AuditEntry>(&raw)
        {
            out.push(entry);
        }
    }
    Ok(out)
}

///
/// IdempotencyEntry
///
/// Written once on first use of a key; a replayed mutation with the same
/// key returns `response` verbatim instead of re-executing.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IdempotencyEntry {
    pub key: String,
    pub table: String,
    pub action: AuditAction,
    pub record_id: String,
    pub response: serde_json::Value,
    pub created_at: Timestamp,
}

pub fn idempotency_lookup(
    kv: &dyn KvStore,
    table: &str,
    key: &str,
) -> Result<Option<IdempotencyEntry>, Error> {
    let Some(raw) = kv.get(&idempotency_key(table, key))? else {
        return Ok(None);
    };
    let entry = serde_json::from_str(&raw)
        .map_err(|err| Error::Internal(format!("idempotency entry failed to decode: {err}")))?;
    Ok(Some(entry))
}

pub fn idempotency_record(kv: &dyn KvStore, entry: &IdempotencyEntry) -> Result<(), Error> {
    let encoded = serde_json::to_string(entry)
        .map_err(|err| Error::Internal(format!("idempotency entry failed to encode: {err}")))?;
    kv.set(&idempotency_key(&entry.table, &entry.key), &encoded)?;
    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kv::MemoryKv, value::Record};

    fn entry(action: AuditAction, id: &str) -> AuditEntry {
        AuditEntry {
            seq: 0,
            at: Timestamp::from_unix_millis(1_700_000_000_000),
            action,
            table: "Calls".to_string(),
            record_id: id.to_string(),
            actor: Some("qa-lead".to_string()),
            before: None,
            after: Some(Record::new().with("id", id)),
            metadata: None,
        }
    }

    #[test]
    fn append_assigns_sequence_numbers() {
        let kv = MemoryKv::new();
        let a = append(&kv, entry(AuditAction::Create, "CAL000001")).expect("append");
        let b = append(&kv, entry(AuditAction::Update, "CAL000001")).expect("append");
        assert_eq!((a, b), (1, 2));

        let log = entries(&kv).expect("read log");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, AuditAction::Create);
        assert_eq!(log[1].seq, 2);
    }

    #[test]
    fn idempotency_round_trips() {
        let kv = MemoryKv::new();
        assert!(
            idempotency_lookup(&kv, "Calls", "k1")
                .expect("lookup")
                .is_none()
        );

        let entry = IdempotencyEntry {
            key: "k1".to_string(),
            table: "Calls".to_string(),
            action: AuditAction::Create,
            record_id: "CAL000001".to_string(),
            response: serde_json::json!({"record": {"id": "CAL000001"}}),
            created_at: Timestamp::from_unix_millis(1),
        };
        idempotency_record(&kv, &entry).expect("record");

        let found = idempotency_lookup(&kv, "Calls", "k1")
            .expect("lookup")
            .expect("entry should exist");
        assert_eq!(found, entry);
    }
}
