//! # Profile Service
//!
//! User profiles and the role-management path, stored in the remote `users`
//! collection. Profiles exist only with a reachable remote backend; in local
//! mode reads come back empty and writes fail with `BackendUnavailable`.
//!
//! Role changes go through [`ProfileService::change_role`] only. The edit path
//! ([`ProfileService::update_profile`]) never writes `role`.

use std::sync::Arc;

use domains::{
    policy, AppError, AuthUser, Document, DocumentStore, FieldValue, Fields, ProfileSetup,
    ProfileUpdate, Result, Role, UserProfile,
};
use tracing::{info, warn};

use crate::retry::RetryExecutor;

/// Where a signed-in (or not) user stands after the auth signal fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Anonymous,
    /// Authenticated but no profile document yet: run profile setup
    NeedsProfile(AuthUser),
    Ready(UserProfile),
}

pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
    retry: RetryExecutor,
    collection: String,
    supervisor_email: Option<String>,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        retry: RetryExecutor,
        collection: impl Into<String>,
        supervisor_email: Option<String>,
    ) -> Self {
        Self {
            store,
            retry,
            collection: collection.into(),
            supervisor_email: supervisor_email
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty()),
        }
    }

    fn is_supervisor_email(&self, email: &str) -> bool {
        self.supervisor_email
            .as_deref()
            .is_some_and(|s| s == email.trim().to_ascii_lowercase())
    }

    /// Profile lookup with query semantics: absent on any failure.
    pub async fn get_profile(&self, uid: &str) -> Option<UserProfile> {
        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        let doc = self
            .retry
            .query("users.get", move || store.get(collection, uid))
            .await;
        doc.and_then(|doc| profile_from_document(&doc))
    }

    /// Lookup that must not mistake a failure for "no profile", used ahead of writes.
    async fn load_profile_strict(&self, uid: &str) -> Result<Option<UserProfile>> {
        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        let doc = self
            .retry
            .mutate("users.get", move || store.get(collection, uid))
            .await?;
        Ok(doc.and_then(|doc| profile_from_document(&doc)))
    }

    /// Maps the auth signal to a session, backfilling the supervisor role for
    /// the distinguished email when needed.
    pub async fn resolve_session(&self, user: Option<&AuthUser>) -> Session {
        let Some(user) = user else {
            return Session::Anonymous;
        };
        let Some(mut profile) = self.get_profile(&user.uid).await else {
            return Session::NeedsProfile(user.clone());
        };

        if self.is_supervisor_email(&profile.email) && profile.role != Role::Supervisor {
            match self.write_role(&profile.uid, Role::Supervisor).await {
                Ok(()) => {
                    info!(uid = %profile.uid, "supervisor role backfilled");
                    profile.role = Role::Supervisor;
                }
                Err(err) => warn!(uid = %profile.uid, error = %err, "supervisor backfill failed"),
            }
        }
        Session::Ready(profile)
    }

    /// First-login profile creation. Returns the existing profile untouched if
    /// one is already stored.
    pub async fn create_profile(&self, user: &AuthUser, setup: ProfileSetup) -> Result<UserProfile> {
        if let Some(existing) = self.load_profile_strict(&user.uid).await? {
            return Ok(existing);
        }

        let role = if self.is_supervisor_email(&user.email) {
            Role::Supervisor
        } else {
            Role::General
        };
        let profile = UserProfile {
            uid: user.uid.clone(),
            email: user.email.clone(),
            nickname: setup.nickname,
            job: setup.job,
            domain: setup.domain,
            region: setup.region,
            role,
        };

        let mut fields = Fields::new();
        fields.insert("email".into(), profile.email.as_str().into());
        fields.insert("nickname".into(), profile.nickname.as_str().into());
        fields.insert("job".into(), profile.job.as_str().into());
        fields.insert("domain".into(), profile.domain.as_str().into());
        fields.insert("region".into(), profile.region.as_str().into());
        fields.insert("role".into(), profile.role.as_str().into());
        fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
        fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        let uid = profile.uid.as_str();
        self.retry
            .mutate("users.create", move || store.set(collection, uid, fields.clone()))
            .await?;
        info!(uid, %role, "profile created");
        Ok(profile)
    }

    /// Merges the submitted fields into the stored profile. `role` is preserved.
    pub async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> Result<UserProfile> {
        let mut profile = self
            .load_profile_strict(uid)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".into(), uid.to_string()))?;
        if update.is_empty() {
            return Ok(profile);
        }

        let mut fields = Fields::new();
        if let Some(nickname) = update.nickname {
            fields.insert("nickname".into(), nickname.as_str().into());
            profile.nickname = nickname;
        }
        if let Some(job) = update.job {
            fields.insert("job".into(), job.as_str().into());
            profile.job = job;
        }
        if let Some(domain) = update.domain {
            fields.insert("domain".into(), domain.as_str().into());
            profile.domain = domain;
        }
        if let Some(region) = update.region {
            fields.insert("region".into(), region.as_str().into());
            profile.region = region;
        }
        fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        self.retry
            .mutate("users.update", move || store.update(collection, uid, fields.clone()))
            .await?;
        Ok(profile)
    }

    /// Every profile, ordered by email. Requires `can_manage_users`.
    pub async fn list_users(&self, actor: &UserProfile) -> Result<Vec<UserProfile>> {
        if !policy::can_manage_users(actor.role) {
            return Err(AppError::PermissionDenied(format!(
                "role {} may not manage users",
                actor.role
            )));
        }
        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        let docs = self
            .retry
            .query("users.list", move || store.list(collection))
            .await;
        let mut users: Vec<UserProfile> = docs.iter().filter_map(profile_from_document).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    /// Role-management path. Checked against the role policy before any write.
    pub async fn change_role(
        &self,
        actor: &UserProfile,
        target_uid: &str,
        new_role: Role,
    ) -> Result<UserProfile> {
        if !policy::can_manage_users(actor.role) || !policy::can_assign_role(actor.role, new_role) {
            warn!(actor = %actor.uid, %new_role, "role change rejected by policy");
            return Err(AppError::PermissionDenied(format!(
                "role {} may not grant {new_role}",
                actor.role
            )));
        }

        let mut target = self
            .load_profile_strict(target_uid)
            .await?
            .ok_or_else(|| AppError::NotFound("profile".into(), target_uid.to_string()))?;
        if !policy::can_change_role(actor.role, target.role) {
            warn!(actor = %actor.uid, target = target_uid, "role change rejected by policy");
            return Err(AppError::PermissionDenied(format!(
                "role {} may not change a {}",
                actor.role, target.role
            )));
        }
        if target.role == new_role {
            return Ok(target);
        }

        self.write_role(target_uid, new_role).await?;
        info!(actor = %actor.uid, target = target_uid, from = %target.role, to = %new_role, "role changed");
        target.role = new_role;
        Ok(target)
    }

    async fn write_role(&self, uid: &str, role: Role) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("role".into(), role.as_str().into());
        fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        let store = self.store.as_ref();
        let collection = self.collection.as_str();
        self.retry
            .mutate("users.role", move || store.update(collection, uid, fields.clone()))
            .await
    }
}

fn profile_from_document(doc: &Document) -> Option<UserProfile> {
    let mut fields = doc.fields.clone();
    fields.insert("uid".into(), serde_json::Value::String(doc.id.clone()));
    match serde_json::from_value(serde_json::Value::Object(fields)) {
        Ok(profile) => Some(profile),
        Err(err) => {
            warn!(uid = %doc.id, error = %err, "skipping malformed profile document");
            None
        }
    }
}
