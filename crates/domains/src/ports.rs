//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the board manager.
//! Adapter failures travel as `anyhow::Error`; the services layer classifies them.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::models::{AuthState, AuthUser, Document, Fields};

/// Narrow view of a remote document database.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds a document and returns the store-assigned id.
    ///
    /// A repeated `idempotency_key` within the same collection returns the id
    /// of the document created by the first call instead of writing again.
    async fn add(&self, collection: &str, fields: Fields, idempotency_key: &str) -> anyhow::Result<String>;

    /// All documents whose `field` equals `value`, in no particular order.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<Vec<Document>>;

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// Creates or replaces the document at `id`.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()>;

    /// Merges `fields` into an existing document; fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()>;

    /// Short name used in log fields (e.g. "memory", "postgres").
    fn backend_tag(&self) -> &'static str;
}

/// Durable string key-value persistence scoped to one client.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// May fail, e.g. when the store's quota is exceeded.
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Identity and sign-in contract of the external auth subsystem.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Synchronous view of the resolved user, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// "User changed" signal. Starts at [`AuthState::Pending`] until identity
    /// has been established once.
    fn subscribe(&self) -> watch::Receiver<AuthState>;

    /// Interactive sign-in; on success the signal moves to `SignedIn`.
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<AuthUser>;

    async fn sign_out(&self) -> anyhow::Result<()>;
}
