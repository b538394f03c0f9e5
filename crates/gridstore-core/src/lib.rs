//! Core runtime for gridstore: the schema-aware record store that turns a
//! primitive row/column grid into something resembling a database — typed
//! columns, constraints, secondary indexes, optimistic concurrency,
//! soft-delete lifecycle, audit logging, and idempotent writes.
#![warn(unreachable_pub)]

pub mod audit;
pub mod clock;
pub mod codec;
pub mod coerce;
pub mod db;
pub mod error;
pub mod grid;
pub mod ident;
pub mod index;
pub mod kv;
pub mod lifecycle;
pub mod lock;
pub mod obs;
pub mod registry;
pub mod schema;
pub mod value;

pub use error::Error;

///
/// Prelude
///
/// Domain vocabulary only. Errors, stores, and maintainer internals are
/// imported from their modules.
///

pub mod prelude {
    pub use crate::{
        db::{Filter, FilterOp},
        schema::{Column, ColumnType, IndexSpec, Reference, TableSchema},
        value::{Record, Timestamp, Value},
    };
}
