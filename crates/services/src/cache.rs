//! # Local Cache
//!
//! In-memory snapshot of every cached post, keyed by board, backed by a single
//! key in a [`KeyValueStore`]. The serialized form is read once by [`LocalCache::load`]
//! and rewritten wholesale after every mutation.
//!
//! Two processes sharing the same store are not coordinated: last writer wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use domains::{AppError, KeyValueStore, NewPost, Post, PostId, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Board id → posts, newest first.
pub type Snapshot = BTreeMap<String, Vec<Post>>;

/// Stable newest-first ordering by `created_at`.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    snapshot: Mutex<Snapshot>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            snapshot: Mutex::new(Snapshot::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replaces the in-memory snapshot with the persisted one and returns the
    /// number of posts loaded. Unreadable or corrupt data degrades to an empty
    /// snapshot.
    pub async fn load(&self) -> usize {
        let raw = match self.store.get(&self.key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read local cache, starting empty");
                None
            }
        };

        let snapshot = match raw {
            Some(raw) => match serde_json::from_str::<Snapshot>(&raw) {
                Ok(parsed) => normalize(parsed),
                Err(err) => {
                    warn!(key = %self.key, error = %err, "local cache snapshot is corrupt, starting empty");
                    Snapshot::new()
                }
            },
            None => Snapshot::new(),
        };

        let count = snapshot.values().map(Vec::len).sum();
        *self.snapshot.lock().await = snapshot;
        debug!(key = %self.key, posts = count, "local cache loaded");
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot.lock().await.values().all(Vec::is_empty)
    }

    pub async fn posts(&self, board_id: &str) -> Vec<Post> {
        let snapshot = self.snapshot.lock().await;
        let mut posts = snapshot.get(board_id).cloned().unwrap_or_default();
        sort_newest_first(&mut posts);
        posts
    }

    pub async fn all_posts(&self) -> Vec<Post> {
        let snapshot = self.snapshot.lock().await;
        let mut posts: Vec<Post> = snapshot.values().flatten().cloned().collect();
        sort_newest_first(&mut posts);
        posts
    }

    pub async fn contains(&self, board_id: &str, id: &PostId) -> bool {
        let snapshot = self.snapshot.lock().await;
        snapshot
            .get(board_id)
            .is_some_and(|posts| posts.iter().any(|p| &p.id == id))
    }

    /// Creates a local-only post: client-time id, client-time timestamp,
    /// prepended to its board. If persisting fails the insert is rolled back.
    pub async fn add_local(&self, board_id: &str, new_post: &NewPost) -> Result<Post> {
        let mut snapshot = self.snapshot.lock().await;
        let now = Utc::now();
        let post = Post {
            id: PostId::Local(next_local_id(&snapshot, now.timestamp_millis())),
            board_id: board_id.to_string(),
            title: new_post.title.clone(),
            content: new_post.content.clone(),
            source: new_post.normalized_source(),
            author: new_post.author_or_anonymous(),
            created_at: now,
        };

        snapshot
            .entry(board_id.to_string())
            .or_default()
            .insert(0, post.clone());

        if let Err(err) = self.persist(&snapshot).await {
            if let Some(posts) = snapshot.get_mut(board_id) {
                posts.retain(|p| p.id != post.id);
            }
            return Err(err);
        }
        Ok(post)
    }

    /// Best-effort copy of a remotely stored post. A failed persist is logged
    /// and the in-memory copy is kept for the rest of the session.
    pub async fn mirror(&self, post: Post) {
        let mut snapshot = self.snapshot.lock().await;
        let posts = snapshot.entry(post.board_id.clone()).or_default();
        if posts.iter().any(|p| p.id == post.id) {
            return;
        }
        posts.insert(0, post);
        if let Err(err) = self.persist(&snapshot).await {
            warn!(error = %err, "failed to mirror remote post into local cache");
        }
    }

    /// Removes `id` from `board_id`. Returns whether anything was removed.
    pub async fn remove(&self, board_id: &str, id: &PostId) -> Result<bool> {
        let mut snapshot = self.snapshot.lock().await;
        let Some(posts) = snapshot.get_mut(board_id) else {
            return Ok(false);
        };
        let before = posts.len();
        posts.retain(|p| &p.id != id);
        if posts.len() == before {
            return Ok(false);
        }
        self.persist(&snapshot).await?;
        Ok(true)
    }

    /// Overwrites the whole snapshot (used by seeding).
    pub async fn replace(&self, posts: Vec<Post>) -> Result<usize> {
        let mut fresh = Snapshot::new();
        for post in posts {
            fresh.entry(post.board_id.clone()).or_default().push(post);
        }
        for board in fresh.values_mut() {
            sort_newest_first(board);
        }
        let count = fresh.values().map(Vec::len).sum();
        self.persist(&fresh).await?;
        *self.snapshot.lock().await = fresh;
        Ok(count)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Storage(format!("failed to serialize snapshot: {e}")))?;
        self.store.set(&self.key, &raw).await.map_err(|e| {
            warn!(key = %self.key, bytes = raw.len(), error = %e, "local cache write failed");
            AppError::Storage(e.to_string())
        })
    }
}

/// Client-time milliseconds, bumped past the largest existing local id so ids
/// stay unique and increasing even when the clock has not moved.
fn next_local_id(snapshot: &Snapshot, now_ms: i64) -> i64 {
    let max_existing = snapshot
        .values()
        .flatten()
        .filter_map(|p| match p.id {
            PostId::Local(id) => Some(id),
            PostId::Remote(_) => None,
        })
        .max();
    match max_existing {
        Some(max) if max >= now_ms => max + 1,
        _ => now_ms,
    }
}

/// Fills `board_id` from the map key and drops blank sources; older snapshots
/// carry neither.
fn normalize(mut snapshot: Snapshot) -> Snapshot {
    for (board_id, posts) in snapshot.iter_mut() {
        for post in posts.iter_mut() {
            if post.board_id.is_empty() {
                post.board_id = board_id.clone();
            }
            if post.source.as_deref().is_some_and(|s| s.trim().is_empty()) {
                post.source = None;
            }
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockKeyValueStore;

    fn cache_with(store: MockKeyValueStore) -> LocalCache {
        LocalCache::new(Arc::new(store), "pm-community-posts")
    }

    #[tokio::test]
    async fn corrupt_snapshot_loads_empty() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some("{not json".to_string())));
        let cache = cache_with(store);
        assert_eq!(cache.load().await, 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn legacy_snapshot_gets_board_ids() {
        let legacy = r#"{"news":[{"id":4,"title":"t","content":"c","source":"","date":"2024-12-17T00:00:00.000Z","author":"뉴스팀"}]}"#;
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(move |_| Ok(Some(legacy.to_string())));
        let cache = cache_with(store);
        assert_eq!(cache.load().await, 1);

        let posts = cache.posts("news").await;
        assert_eq!(posts[0].board_id, "news");
        assert_eq!(posts[0].source, None);
    }

    #[tokio::test]
    async fn failed_local_write_rolls_back() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set()
            .returning(|_, _| Err(anyhow::anyhow!("quota exceeded")));
        let cache = cache_with(store);
        cache.load().await;

        let result = cache.add_local("news", &NewPost::new("T", "C")).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(cache.posts("news").await.is_empty());
    }

    #[tokio::test]
    async fn local_ids_are_strictly_increasing() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_set().returning(|_, _| Ok(()));
        let cache = cache_with(store);
        cache.load().await;

        let mut last = i64::MIN;
        for i in 0..5 {
            let post = cache
                .add_local("faq", &NewPost::new(format!("T{i}"), "C"))
                .await
                .unwrap();
            let PostId::Local(id) = post.id else {
                panic!("expected a local id");
            };
            assert!(id > last);
            last = id;
        }
        assert_eq!(cache.posts("faq").await.len(), 5);
    }

    #[test]
    fn next_id_bumps_past_future_ids() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "news".into(),
            vec![Post {
                id: PostId::Local(2_000),
                board_id: "news".into(),
                title: "t".into(),
                content: "c".into(),
                source: None,
                author: "a".into(),
                created_at: Utc::now(),
            }],
        );
        assert_eq!(next_local_id(&snapshot, 1_000), 2_001);
        assert_eq!(next_local_id(&snapshot, 5_000), 5_000);
    }
}
