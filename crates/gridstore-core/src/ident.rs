use crate::kv::{KvError, KvStore};

/// Zero-pad width for generated identifiers. Counters that outgrow the
/// width simply render wider; ordering by id text is not a contract.
pub const ID_PAD_WIDTH: usize = 6;

#[must_use]
pub fn counter_key(table: &str) -> String {
    format!("id:{table}")
}

/// Produce the next primary key for `table`: the id prefix followed by the
/// zero-padded durable counter.
///
/// Callers must hold the document lock; the counter increment is the only
/// defense against duplicate primary keys on concurrent inserts.
pub fn generate_id(kv: &dyn KvStore, table: &str, prefix: &str) -> Result<String, KvError> {
    let n = kv.increment(&counter_key(table))?;
    Ok(format!("{prefix}{n:0>ID_PAD_WIDTH$}"))
}

///
/// TESTS
///
