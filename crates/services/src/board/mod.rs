//! # Hybrid Board Manager
//!
//! Serves post reads and writes from either the remote document store or the
//! local cache, transparently to callers.
//!
//! - Reads degrade silently: any remote failure yields an empty list.
//! - Writes surface: a remote write that exhausts its retries demotes the
//!   manager to local mode for the rest of the session and is redone locally;
//!   only when that also fails does the caller see `WriteFailed`.
//! - Every successful remote write is mirrored into the local cache.

mod documents;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{
    board_name, is_known_board, policy, AppError, Board, DocumentStore, NewPost, Post, PostId, Result,
    Role, BOARDS,
};
use futures_util::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{sort_newest_first, LocalCache};
use crate::init::{InitSequencer, DEFAULT_READY_TIMEOUT};
use crate::mode::{BackendMode, ModeState};
use crate::retry::{RetryExecutor, RetryPolicy};

use documents::{post_fields, post_from_document, BOARD_FIELD, PROBE_DOCUMENT_ID};

pub const DEFAULT_RECENT_LIMIT: usize = 6;

#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub posts_collection: String,
    /// Bound on waiting for the auth subsystem before probing
    pub ready_timeout: Duration,
    /// Bound on the reachability probe itself
    pub probe_timeout: Duration,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            posts_collection: "posts".to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            probe_timeout: Duration::from_millis(5_000),
        }
    }
}

pub struct HybridBoardManager {
    settings: BoardSettings,
    cache: LocalCache,
    remote: Option<Arc<dyn DocumentStore>>,
    sequencer: Option<Arc<InitSequencer>>,
    mode: Arc<ModeState>,
    retry: RetryExecutor,
    initialized: OnceCell<BackendMode>,
}

impl HybridBoardManager {
    /// A manager over the local cache only. Attach a remote store with
    /// [`HybridBoardManager::with_remote`].
    pub fn new(settings: BoardSettings, policy: RetryPolicy, cache: LocalCache) -> Self {
        let mode = Arc::new(ModeState::new());
        Self {
            settings,
            cache,
            remote: None,
            sequencer: None,
            retry: RetryExecutor::new(policy, Arc::clone(&mode)),
            mode,
            initialized: OnceCell::new(),
        }
    }

    pub fn with_remote(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.remote = Some(store);
        self
    }

    /// Makes initialization wait for the auth subsystem before probing.
    pub fn with_sequencer(mut self, sequencer: Arc<InitSequencer>) -> Self {
        self.sequencer = Some(sequencer);
        self
    }

    /// Current backend mode (reflects demotion).
    pub fn mode(&self) -> BackendMode {
        self.mode.get()
    }

    /// Executor sharing this manager's mode, for other remote-backed services.
    pub fn executor(&self) -> RetryExecutor {
        self.retry.clone()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Idempotent: the first caller probes, concurrent callers await the same
    /// outcome, later callers return immediately. Never fails; any problem
    /// ends in local mode.
    pub async fn initialize(&self) -> BackendMode {
        *self
            .initialized
            .get_or_init(|| self.run_initialization())
            .await
    }

    async fn run_initialization(&self) -> BackendMode {
        self.mode.begin_probe();
        let cached = self.cache.load().await;
        let mode = self.select_mode().await;
        self.mode.settle(mode);
        info!(%mode, cached_posts = cached, "board manager initialized");
        mode
    }

    async fn select_mode(&self) -> BackendMode {
        let Some(store) = &self.remote else {
            debug!("no remote backend configured");
            return BackendMode::Local;
        };

        if let Some(sequencer) = &self.sequencer {
            if let Err(err) = sequencer
                .wait_for_external_ready(self.settings.ready_timeout)
                .await
            {
                warn!(error = %err, "continuing without remote backend");
                return BackendMode::Local;
            }
        }

        let probe = store.get(&self.settings.posts_collection, PROBE_DOCUMENT_ID);
        match tokio::time::timeout(self.settings.probe_timeout, probe).await {
            Ok(Ok(_)) => BackendMode::Remote,
            Ok(Err(err)) => {
                warn!(backend = store.backend_tag(), error = %err, "remote probe failed");
                BackendMode::Local
            }
            Err(_) => {
                warn!(
                    backend = store.backend_tag(),
                    timeout_ms = self.settings.probe_timeout.as_millis() as u64,
                    "remote probe timed out"
                );
                BackendMode::Local
            }
        }
    }

    /// Adds a post to `board_id`. Title and content are validated upstream.
    pub async fn add_post(&self, board_id: &str, new_post: NewPost) -> Result<Post> {
        validate_board(board_id)?;
        self.initialize().await;

        if self.mode.is_remote() {
            match self.add_remote(board_id, &new_post).await {
                Ok(post) => {
                    self.cache.mirror(post.clone()).await;
                    return Ok(post);
                }
                Err(err) if err.is_backend_failure() => {
                    self.mode.demote(&err.to_string());
                    warn!(board = board_id, error = %err, "remote add failed, writing locally");
                }
                Err(err) => return Err(err),
            }
        }

        self.cache
            .add_local(board_id, &new_post)
            .await
            .map_err(|err| AppError::WriteFailed(err.to_string()))
    }

    /// [`HybridBoardManager::add_post`] behind the `can_write_post` guard.
    pub async fn add_post_as(&self, actor: Role, board_id: &str, new_post: NewPost) -> Result<Post> {
        if !policy::can_write_post(actor) {
            return Err(AppError::PermissionDenied(format!(
                "role {actor} may not write posts"
            )));
        }
        self.add_post(board_id, new_post).await
    }

    async fn add_remote(&self, board_id: &str, new_post: &NewPost) -> Result<Post> {
        let store = self.remote.as_deref().ok_or_else(|| AppError::BackendUnavailable {
            operation: "posts.add".to_string(),
        })?;
        let collection = self.settings.posts_collection.as_str();
        let request_id = Uuid::new_v4().to_string();
        let key = request_id.as_str();
        let fields = post_fields(board_id, new_post, key);

        let id = self
            .retry
            .mutate("posts.add", move || store.add(collection, fields.clone(), key))
            .await?;
        debug!(board = board_id, id = %id, "post stored remotely");

        Ok(Post {
            id: PostId::Remote(id),
            board_id: board_id.to_string(),
            title: new_post.title.clone(),
            content: new_post.content.clone(),
            source: new_post.normalized_source(),
            author: new_post.author_or_anonymous(),
            created_at: Utc::now(),
        })
    }

    /// Posts of one board, newest first. Never fails.
    pub async fn get_posts(&self, board_id: &str) -> Vec<Post> {
        self.initialize().await;
        let mut posts = if self.mode.is_remote() {
            self.fetch_remote_board(board_id).await
        } else {
            self.cache.posts(board_id).await
        };
        sort_newest_first(&mut posts);
        posts
    }

    /// Newest `limit` posts across every board. Never fails.
    pub async fn get_recent_posts(&self, limit: usize) -> Vec<Post> {
        self.initialize().await;
        let mut posts = if self.mode.is_remote() {
            join_all(BOARDS.iter().map(|b| self.fetch_remote_board(b.id)))
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            self.cache.all_posts().await
        };
        sort_newest_first(&mut posts);
        posts.truncate(limit);
        posts
    }

    async fn fetch_remote_board(&self, board_id: &str) -> Vec<Post> {
        let Some(store) = self.remote.as_deref() else {
            return Vec::new();
        };
        let collection = self.settings.posts_collection.as_str();
        let docs = self
            .retry
            .query("posts.query", move || {
                store.query_eq(collection, BOARD_FIELD, serde_json::Value::from(board_id))
            })
            .await;

        docs.iter()
            .filter_map(|doc| match post_from_document(doc) {
                Ok(post) => Some(post),
                Err(err) => {
                    warn!(error = %err, "skipping malformed post document");
                    None
                }
            })
            .collect()
    }

    /// Deletes a post. The actor must pass `can_delete_post`; otherwise nothing
    /// is touched. Any cached copy is purged regardless of where the post lives;
    /// the remote copy is only removed while the manager is in remote mode.
    pub async fn delete_post(&self, actor: Role, post_id: &PostId, board_id: &str) -> Result<()> {
        if !policy::can_delete_post(actor) {
            warn!(%actor, post = %post_id, "delete rejected by role policy");
            return Err(AppError::PermissionDenied(format!(
                "role {actor} may not delete posts"
            )));
        }
        self.initialize().await;

        let remote_result = match post_id {
            PostId::Remote(id) if self.mode.is_remote() => self.delete_remote(id).await,
            PostId::Remote(_) => {
                debug!(post = %post_id, "local mode, leaving the remote copy in place");
                Ok(())
            }
            PostId::Local(_) => Ok(()),
        };

        let purged = self
            .cache
            .remove(board_id, post_id)
            .await
            .map_err(|err| AppError::DeleteFailed(err.to_string()))?;
        debug!(board = board_id, post = %post_id, purged, "local cache purged");

        remote_result.map_err(|err| AppError::DeleteFailed(err.to_string()))
    }

    async fn delete_remote(&self, id: &str) -> Result<()> {
        let store = self.remote.as_deref().ok_or_else(|| AppError::BackendUnavailable {
            operation: "posts.delete".to_string(),
        })?;
        let collection = self.settings.posts_collection.as_str();
        self.retry
            .mutate("posts.delete", move || store.delete(collection, id))
            .await
    }

    pub fn get_board_name(&self, board_id: &str) -> &'static str {
        board_name(board_id)
    }

    pub fn boards(&self) -> &'static [Board] {
        &BOARDS
    }
}

fn validate_board(board_id: &str) -> Result<()> {
    if board_id.trim().is_empty() {
        return Err(AppError::Validation("board id must not be empty".into()));
    }
    if !is_known_board(board_id) {
        return Err(AppError::Validation(format!("unknown board: {board_id}")));
    }
    Ok(())
}
