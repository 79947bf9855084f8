//! Document database backends for the remote side of the board manager.

mod memory;
#[cfg(feature = "db-postgres")]
mod postgres;

pub use memory::MemoryDocumentStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgDocumentStore;

use domains::{FieldValue, Fields};
use serde_json::{Map, Value};

/// Splits a write into literal values and the names of fields the store must
/// stamp with its own clock.
pub(crate) fn split_fields(fields: Fields) -> (Map<String, Value>, Vec<String>) {
    let mut literal = Map::new();
    let mut stamped = Vec::new();
    for (name, value) in fields {
        match value {
            FieldValue::Value(v) => {
                literal.insert(name, v);
            }
            FieldValue::ServerTimestamp => stamped.push(name),
        }
    }
    (literal, stamped)
}
