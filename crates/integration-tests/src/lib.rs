//! Shared fixtures for the cross-crate scenario tests.
//!
//! Every harness wires the real services against the in-process adapters, so
//! the tests exercise the same code paths as the binaries minus the network.

use std::sync::Arc;
use std::time::Duration;

use auth_adapters::SimpleAuthProvider;
use chrono::{DateTime, Utc};
use domains::{DocumentStore, FieldValue, Fields, KeyValueStore, Post};
use services::{
    BoardSettings, HybridBoardManager, InitSequencer, LocalCache, ProfileService, RetryPolicy,
};
use storage_adapters::{MemoryDocumentStore, MemoryKeyValueStore};

pub const SNAPSHOT_KEY: &str = "pm-community-posts";
pub const SUPERVISOR_EMAIL: &str = "owner@example.com";

pub struct Harness {
    pub kv: Arc<MemoryKeyValueStore>,
    pub remote: Arc<MemoryDocumentStore>,
    pub auth: Arc<SimpleAuthProvider>,
    pub manager: HybridBoardManager,
    pub profiles: ProfileService,
}

pub struct HarnessBuilder {
    kv: Arc<MemoryKeyValueStore>,
    remote: Option<Arc<MemoryDocumentStore>>,
    auth_ready: bool,
    settings: BoardSettings,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            kv: Arc::new(MemoryKeyValueStore::new()),
            remote: Some(Arc::new(MemoryDocumentStore::new())),
            auth_ready: true,
            settings: BoardSettings::default(),
        }
    }
}

impl HarnessBuilder {
    pub fn local_only(mut self) -> Self {
        self.remote = None;
        self
    }

    pub fn with_kv(mut self, kv: Arc<MemoryKeyValueStore>) -> Self {
        self.kv = kv;
        self
    }

    /// Leaves the auth signal `Pending` so startup has to wait for it.
    pub fn auth_pending(mut self) -> Self {
        self.auth_ready = false;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.settings.ready_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let auth = Arc::new(SimpleAuthProvider::new());
        if self.auth_ready {
            auth.mark_ready();
        }
        // Local-only harnesses still get a store for the profile service; the
        // board manager just never sees it.
        let has_remote = self.remote.is_some();
        let remote = self
            .remote
            .unwrap_or_else(|| Arc::new(MemoryDocumentStore::new()));

        let kv_port: Arc<dyn KeyValueStore> = self.kv.clone();
        let cache = LocalCache::new(kv_port, SNAPSHOT_KEY);
        let sequencer = Arc::new(InitSequencer::new(auth.clone()));
        let mut manager = HybridBoardManager::new(self.settings, RetryPolicy::default(), cache)
            .with_sequencer(sequencer);
        if has_remote {
            manager = manager.with_remote(remote.clone());
        }

        let store: Arc<dyn DocumentStore> = remote.clone();
        let profiles = ProfileService::new(
            store,
            manager.executor(),
            "users",
            Some(SUPERVISOR_EMAIL.to_string()),
        );

        Harness {
            kv: self.kv,
            remote,
            auth,
            manager,
            profiles,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Raw snapshot as persisted in the key-value store.
    pub async fn persisted_snapshot(&self) -> serde_json::Value {
        let raw = self
            .kv
            .get(SNAPSHOT_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "{}".to_string());
        serde_json::from_str(&raw).unwrap_or_default()
    }
}

/// Writes a post document straight into the remote store with a fixed
/// `createdAt`, bypassing the manager.
pub async fn insert_remote_post(
    store: &MemoryDocumentStore,
    id: &str,
    board_id: &str,
    title: &str,
    created_at: DateTime<Utc>,
) {
    let mut fields = Fields::new();
    fields.insert("boardId".into(), board_id.into());
    fields.insert("title".into(), title.into());
    fields.insert("content".into(), "body".into());
    fields.insert("createdAt".into(), created_at.to_rfc3339().into());
    fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    if let Err(err) = store.set("posts", id, fields).await {
        panic!("fixture insert failed: {err}");
    }
}

pub fn titles(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|p| p.title.as_str()).collect()
}
