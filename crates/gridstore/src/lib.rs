//! gridstore — a schema-aware tabular record store over a grid-structured
//! backing sheet.
//!
//! ## Crate layout
//! - `core`: the engine — schema model, coercion, codec, CRUD, indexes,
//!   audit/idempotency, registry, lifecycle, observability.
//!
//! The `prelude` re-exports the vocabulary most callers need; everything
//! else is reachable through `gridstore::core`.

pub use gridstore_core as core;

pub use gridstore_core::{
    Error,
    db::{
        CreateOptions, Database, DeleteOptions, GetOptions, ListOptions, Page, Table,
        UpdateOptions,
    },
};

/// Workspace version re-export for downstream tooling.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use gridstore_core::{
        db::{
            CreateOptions, Database, DeleteOptions, GetOptions, ListOptions, Table, UpdateOptions,
        },
        prelude::*,
    };
}
