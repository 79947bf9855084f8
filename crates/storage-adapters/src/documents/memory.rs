//! # In-memory document store
//!
//! A process-local stand-in for the hosted document database. It keeps the
//! semantics the board manager relies on: store-assigned ids, a server clock
//! for `ServerTimestamp` fields, and idempotent adds keyed by request id.
//!
//! Fault injection (`fail_next`, `set_offline`) lets tests and demos exercise
//! the retry and fallback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use domains::{Document, DocumentStore, Fields};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::split_fields;
use crate::errors::DocumentStoreError;

#[derive(Debug, Default)]
struct Collection {
    docs: BTreeMap<String, Map<String, Value>>,
    by_request: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
    offline: AtomicBool,
    failures_pending: AtomicU32,
    calls: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls fail with `Unavailable`, whatever the operation.
    pub fn fail_next(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of port calls received, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn check_available(&self, operation: &str) -> Result<(), DocumentStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Unavailable(format!("{operation}: offline")));
        }
        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DocumentStoreError::Unavailable(format!(
                "{operation}: injected failure"
            )));
        }
        Ok(())
    }

    /// Literal fields plus the stamped ones set to the server clock.
    fn resolve(fields: Fields) -> Map<String, Value> {
        let (mut body, stamped) = split_fields(fields);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        for name in stamped {
            body.insert(name, Value::String(now.clone()));
        }
        body
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, collection: &str, fields: Fields, idempotency_key: &str) -> anyhow::Result<String> {
        self.check_available("add")?;
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        if let Some(existing) = coll.by_request.get(idempotency_key) {
            debug!(collection, id = %existing, "duplicate add suppressed");
            return Ok(existing.clone());
        }

        let id = Uuid::new_v4().simple().to_string();
        coll.docs.insert(id.clone(), Self::resolve(fields));
        coll.by_request
            .insert(idempotency_key.to_string(), id.clone());
        Ok(id)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> anyhow::Result<Vec<Document>> {
        self.check_available("query")?;
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .docs
            .iter()
            .filter(|(_, body)| body.get(field) == Some(&value))
            .map(|(id, body)| Document {
                id: id.clone(),
                fields: body.clone(),
            })
            .collect())
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        self.check_available("list")?;
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .docs
            .iter()
            .map(|(id, body)| Document {
                id: id.clone(),
                fields: body.clone(),
            })
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        self.check_available("get")?;
        Ok(self.collections.get(collection).and_then(|coll| {
            coll.docs.get(id).map(|body| Document {
                id: id.to_string(),
                fields: body.clone(),
            })
        }))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()> {
        self.check_available("set")?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .docs
            .insert(id.to_string(), Self::resolve(fields));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()> {
        self.check_available("update")?;
        let not_found = || DocumentStoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let mut coll = self.collections.get_mut(collection).ok_or_else(not_found)?;
        let body = coll.docs.get_mut(id).ok_or_else(not_found)?;
        body.extend(Self::resolve(fields));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        self.check_available("delete")?;
        if let Some(mut coll) = self.collections.get_mut(collection) {
            coll.docs.remove(id);
            coll.by_request.retain(|_, doc_id| doc_id != id);
        }
        Ok(())
    }

    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::FieldValue;

    fn post(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("boardId".into(), "news".into());
        fields.insert("title".into(), title.into());
        fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
        fields
    }

    #[tokio::test]
    async fn add_stamps_server_time() {
        let store = MemoryDocumentStore::new();
        let id = store.add("posts", post("T"), "req-1").await.unwrap();
        let doc = store.get("posts", &id).await.unwrap().unwrap();
        assert!(doc.get_timestamp("createdAt").is_some());
        assert_eq!(doc.get_str("title"), Some("T"));
    }

    #[tokio::test]
    async fn repeated_request_id_is_not_duplicated() {
        let store = MemoryDocumentStore::new();
        let first = store.add("posts", post("T"), "req-1").await.unwrap();
        let second = store.add("posts", post("T"), "req-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len("posts"), 1);
    }

    #[tokio::test]
    async fn query_filters_on_equality() {
        let store = MemoryDocumentStore::new();
        store.add("posts", post("a"), "r1").await.unwrap();
        let mut other = post("b");
        other.insert("boardId".into(), "faq".into());
        store.add("posts", other, "r2").await.unwrap();

        let news = store
            .query_eq("posts", "boardId", Value::from("news"))
            .await
            .unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].get_str("title"), Some("a"));
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryDocumentStore::new();
        let err = store.update("users", "nobody", Fields::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocumentStoreError>(),
            Some(DocumentStoreError::NotFound { .. })
        ));

        store.set("users", "u1", post("x")).await.unwrap();
        let mut patch = Fields::new();
        patch.insert("title".into(), "y".into());
        store.update("users", "u1", patch).await.unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("y"));
        assert_eq!(doc.get_str("boardId"), Some("news"));
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let store = MemoryDocumentStore::new();
        store.fail_next(2);
        assert!(store.list("posts").await.is_err());
        assert!(store.list("posts").await.is_err());
        assert!(store.list("posts").await.is_ok());
        assert_eq!(store.calls(), 3);

        store.set_offline(true);
        assert!(store.get("posts", "x").await.is_err());
        store.set_offline(false);
        store.delete("posts", "x").await.unwrap();
    }
}
