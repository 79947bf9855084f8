//! rusty-board/crates/services/src/lib.rs
//!
//! Application core of the hybrid data layer: the board manager, the local
//! cache it falls back to, the retry executor and backend mode it shares with
//! the profile service, and the startup sequencing against the auth subsystem.

pub mod board;
pub mod cache;
pub mod init;
pub mod mode;
pub mod profiles;
pub mod retry;
pub mod seed;

pub use board::{BoardSettings, HybridBoardManager, DEFAULT_RECENT_LIMIT};
pub use cache::LocalCache;
pub use init::{InitSequencer, DEFAULT_READY_TIMEOUT};
pub use mode::{BackendMode, ModeState};
pub use profiles::{ProfileService, Session};
pub use retry::{OperationKind, RetryExecutor, RetryPolicy};
