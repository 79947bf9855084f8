//! # Initialization Sequencer
//!
//! The auth subsystem and the data layer finish starting up independently.
//! [`InitSequencer`] turns the auth "user changed" signal into a single shared
//! readiness completion: the first caller waits (bounded), every later or
//! concurrent caller observes the same outcome without waiting again.

use std::sync::Arc;
use std::time::Duration;

use domains::{AppError, AuthProvider, AuthState, AuthUser, Result};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Default bound on how long startup waits for the auth subsystem.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Result of the one shared wait, with the bound it ran under.
#[derive(Debug, Clone, Copy)]
struct WaitOutcome {
    ready: bool,
    max_wait: Duration,
}

pub struct InitSequencer {
    auth: Arc<dyn AuthProvider>,
    outcome: OnceCell<WaitOutcome>,
}

impl InitSequencer {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            outcome: OnceCell::new(),
        }
    }

    /// Live readiness flag: has the auth subsystem resolved identity yet?
    pub fn is_ready(&self) -> bool {
        self.auth.subscribe().borrow().is_resolved()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user()
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Waits up to `max_wait` for the auth subsystem to resolve identity.
    ///
    /// Only the first call actually waits; its `max_wait` is the one that
    /// counts. `InitTimeout` is non-fatal: callers continue in degraded mode.
    /// A later call succeeds if readiness arrived after the timed-out wait.
    pub async fn wait_for_external_ready(&self, max_wait: Duration) -> Result<()> {
        let outcome = *self
            .outcome
            .get_or_init(|| async {
                let mut signal = self.auth.subscribe();
                let waited =
                    tokio::time::timeout(max_wait, signal.wait_for(AuthState::is_resolved)).await;
                let ready = match waited {
                    Ok(Ok(_)) => {
                        debug!("auth subsystem ready");
                        true
                    }
                    Ok(Err(_)) => {
                        warn!("auth signal closed before identity was resolved");
                        false
                    }
                    Err(_) => {
                        warn!(
                            max_wait_ms = max_wait.as_millis() as u64,
                            "auth subsystem not ready in time"
                        );
                        false
                    }
                };
                WaitOutcome { ready, max_wait }
            })
            .await;

        if outcome.ready || self.is_ready() {
            Ok(())
        } else {
            Err(AppError::InitTimeout {
                waited_ms: outcome.max_wait.as_millis() as u64,
            })
        }
    }
}
