//! rusty-board/crates/storage-adapters/src/lib.rs
//!
//! Concrete implementations of the `KeyValueStore` and `DocumentStore` ports.
//!
//! | adapter               | port            | notes                                   |
//! |-----------------------|-----------------|-----------------------------------------|
//! | `MemoryKeyValueStore` | `KeyValueStore` | process-local, optional byte quota      |
//! | `FileKeyValueStore`   | `KeyValueStore` | one file per key, atomic replace        |
//! | `MemoryDocumentStore` | `DocumentStore` | server clock, idempotent adds, faults   |
//! | `PgDocumentStore`     | `DocumentStore` | feature `db-postgres`, JSONB documents  |

pub mod documents;
pub mod errors;
pub mod kv;

pub use documents::MemoryDocumentStore;
#[cfg(feature = "db-postgres")]
pub use documents::PgDocumentStore;
pub use errors::{CacheError, DocumentStoreError};
pub use kv::{FileKeyValueStore, MemoryKeyValueStore};
