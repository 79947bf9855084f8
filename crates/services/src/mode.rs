//! Backend mode state machine.
//!
//! `Uninitialized → Probing → Remote | Local`, plus the one-way `Remote → Local`
//! demotion. There is no way back to `Remote` within a session.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Uninitialized,
    Probing,
    Remote,
    Local,
}

impl BackendMode {
    fn to_u8(self) -> u8 {
        match self {
            BackendMode::Uninitialized => 0,
            BackendMode::Probing => 1,
            BackendMode::Remote => 2,
            BackendMode::Local => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BackendMode::Probing,
            2 => BackendMode::Remote,
            3 => BackendMode::Local,
            _ => BackendMode::Uninitialized,
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendMode::Uninitialized => "uninitialized",
            BackendMode::Probing => "probing",
            BackendMode::Remote => "remote",
            BackendMode::Local => "local",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free holder of the current [`BackendMode`].
#[derive(Debug)]
pub struct ModeState {
    current: AtomicU8,
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeState {
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(BackendMode::Uninitialized.to_u8()),
        }
    }

    pub fn get(&self) -> BackendMode {
        BackendMode::from_u8(self.current.load(Ordering::Acquire))
    }

    pub fn is_remote(&self) -> bool {
        self.get() == BackendMode::Remote
    }

    /// `Uninitialized → Probing`. Returns false if probing already started.
    pub fn begin_probe(&self) -> bool {
        self.transition(BackendMode::Uninitialized, BackendMode::Probing)
    }

    /// `Probing → Remote | Local`.
    pub fn settle(&self, mode: BackendMode) -> bool {
        debug_assert!(matches!(mode, BackendMode::Remote | BackendMode::Local));
        self.transition(BackendMode::Probing, mode)
    }

    /// `Remote → Local`. Sticky for the rest of the session.
    pub fn demote(&self, reason: &str) -> bool {
        let demoted = self.transition(BackendMode::Remote, BackendMode::Local);
        if demoted {
            warn!(reason, "remote backend demoted to local mode for this session");
        }
        demoted
    }

    fn transition(&self, from: BackendMode, to: BackendMode) -> bool {
        let moved = self
            .current
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            info!(%from, %to, "backend mode transition");
        }
        moved
    }
}
