//! Adapter-level failures. They cross the port boundary inside `anyhow::Error`
//! and can be recovered with `downcast_ref` where a caller cares.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The write would push the store past its byte budget.
    #[error("quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DocumentStoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
}
