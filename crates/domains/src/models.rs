//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Board.
//! Field names serialize in camelCase so the same shape is used for the
//! local cache snapshot and for remote documents.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author recorded when a post is submitted without a name.
pub const ANONYMOUS_AUTHOR: &str = "익명";

/// Identifier of a post.
///
/// Remote posts carry the id assigned by the document store; local posts carry
/// a client-time derived integer. Neither is ever renumbered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Local(i64),
    Remote(String),
}

impl PostId {
    pub fn is_remote(&self) -> bool {
        matches!(self, PostId::Remote(_))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Local(id) => write!(f, "{id}"),
            PostId::Remote(id) => f.write_str(id),
        }
    }
}

/// A single authored item belonging to exactly one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    /// Older snapshots omit this; the cache fills it from the board key on load.
    #[serde(default)]
    pub board_id: String,
    pub title: String,
    /// Rich text; may embed inline images as data URLs or remote URLs
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "anonymous_author")]
    pub author: String,
    #[serde(alias = "date")]
    pub created_at: DateTime<Utc>,
}

fn anonymous_author() -> String {
    ANONYMOUS_AUTHOR.to_string()
}

/// Submission payload for a new post. Title and content are validated upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub author: Option<String>,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Blank or missing authors become [`ANONYMOUS_AUTHOR`].
    pub fn author_or_anonymous(&self) -> String {
        match self.author.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => anonymous_author(),
        }
    }

    /// Blank sources are treated as absent.
    pub fn normalized_source(&self) -> Option<String> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Coarse permission level attached to a user profile.
///
/// Ordered from most to least privileged. Unrecognized strings read as
/// [`Role::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Supervisor,
    Admin,
    Core,
    #[default]
    General,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Supervisor, Role::Admin, Role::Core, Role::General];

    /// Lenient parse: case-insensitive, surrounding whitespace ignored,
    /// anything unknown is `General`.
    pub fn parse(raw: &str) -> Role {
        match raw.trim().to_ascii_lowercase().as_str() {
            "supervisor" => Role::Supervisor,
            "admin" => Role::Admin,
            "core" => Role::Core,
            _ => Role::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
            Role::Core => "core",
            Role::General => "general",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::parse(raw)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// Identity as reported by the external auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

/// What the auth subsystem currently knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Identity has not been established yet
    #[default]
    Pending,
    SignedOut,
    SignedIn(AuthUser),
}

impl AuthState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthState::Pending)
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            AuthState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Profile document stored per authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    /// Derived, never stored: `nickname/job/domain/region`.
    pub fn display_name(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.nickname, self.job, self.domain, self.region
        )
    }
}

/// Fields collected by the first-login profile setup flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSetup {
    pub nickname: String,
    pub job: String,
    pub domain: String,
    pub region: String,
}

/// Profile edit with merge semantics: only `Some` fields overwrite.
/// Roles change only through the role-management path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub job: Option<String>,
    pub domain: Option<String>,
    pub region: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.job.is_none() && self.domain.is_none() && self.region.is_none()
    }
}

/// A field value written to the remote document store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(serde_json::Value),
    /// Replaced by the store's own clock at write time
    ServerTimestamp,
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(serde_json::Value::String(value))
    }
}

/// Field map for document writes.
pub type Fields = BTreeMap<String, FieldValue>;

/// A document as read back from the remote store. Server timestamps come back
/// as RFC 3339 strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    pub fn get_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get_str(field)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}
