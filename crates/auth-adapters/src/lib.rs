//! # auth-adapters
//!
//! Argon2-based implementation of `AuthProvider`.
//!
//! Accounts live in memory for the lifetime of the process. The "user changed"
//! signal is a `watch` channel that starts `Pending` and resolves either on the
//! first sign-in/sign-out or when the host calls [`SimpleAuthProvider::mark_ready`].

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use dashmap::DashMap;
use domains::{AuthProvider, AuthState, AuthUser};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("an account already exists for {0}")]
    AlreadyRegistered(String),

    /// Covers both an unknown email and a wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

pub struct SimpleAuthProvider {
    /// Keyed by normalized (trimmed, lowercased) email
    accounts: DashMap<String, Account>,
    state: watch::Sender<AuthState>,
}

impl Default for SimpleAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl SimpleAuthProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::Pending);
        Self {
            accounts: DashMap::new(),
            state,
        }
    }

    /// Creates an account and returns its identity. Does not sign in.
    pub fn register(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let key = normalize_email(email);
        if self.accounts.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered(key));
        }

        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            email: key.clone(),
            password_hash,
        };
        let user = AuthUser {
            uid: account.uid.clone(),
            email: account.email.clone(),
        };
        self.accounts.insert(key, account);
        info!(uid = %user.uid, "account registered");
        Ok(user)
    }

    /// Resolves the initial `Pending` state to `SignedOut` when no session is
    /// restored. A no-op once identity is known.
    pub fn mark_ready(&self) {
        self.state.send_if_modified(|state| {
            if state.is_resolved() {
                false
            } else {
                *state = AuthState::SignedOut;
                true
            }
        });
    }

    fn verify(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let account = self
            .accounts
            .get(&normalize_email(email))
            .ok_or(AuthError::InvalidCredentials)?;
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;
        Ok(AuthUser {
            uid: account.uid.clone(),
            email: account.email.clone(),
        })
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<AuthUser> {
        match self.verify(email, password) {
            Ok(user) => {
                self.state.send_replace(AuthState::SignedIn(user.clone()));
                info!(uid = %user.uid, "signed in");
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "sign-in rejected");
                Err(err.into())
            }
        }
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.state.send_replace(AuthState::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_sign_in() {
        let auth = SimpleAuthProvider::new();
        let registered = auth.register("Kim@Example.com", "hunter22").unwrap();
        assert_eq!(registered.email, "kim@example.com");
        assert!(auth.current_user().is_none());

        let user = auth.sign_in("kim@example.com ", "hunter22").await.unwrap();
        assert_eq!(user, registered);
        assert_eq!(auth.current_user(), Some(user));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let auth = SimpleAuthProvider::new();
        auth.register("kim@example.com", "hunter22").unwrap();
        let err = auth.sign_in("kim@example.com", "nope").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::InvalidCredentials)
        ));
        assert!(!auth.subscribe().borrow().is_resolved());
    }

    #[test]
    fn duplicate_registration_fails() {
        let auth = SimpleAuthProvider::new();
        auth.register("kim@example.com", "a").unwrap();
        assert!(matches!(
            auth.register(" KIM@example.com", "b"),
            Err(AuthError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn signal_resolves_once_and_tracks_sign_out() {
        let auth = SimpleAuthProvider::new();
        let mut rx = auth.subscribe();
        assert_eq!(*rx.borrow(), AuthState::Pending);

        auth.mark_ready();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::SignedOut);

        auth.register("kim@example.com", "pw").unwrap();
        auth.sign_in("kim@example.com", "pw").await.unwrap();
        assert!(rx.borrow_and_update().user().is_some());

        // Already resolved: mark_ready must not clobber the session.
        auth.mark_ready();
        assert!(auth.current_user().is_some());

        auth.sign_out().await.unwrap();
        assert_eq!(*auth.subscribe().borrow(), AuthState::SignedOut);
    }
}
