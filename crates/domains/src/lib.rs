//! rusty-board/crates/domains/src/lib.rs
//!
//! The domain models, role policy and port definitions for the Rusty-Board
//! data layer. Nothing in here performs I/O.

pub mod boards;
pub mod errors;
pub mod models;
pub mod policy;
pub mod ports;

// Re-exporting for easier access in other crates
pub use boards::*;
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn post_id_serializes_untagged() {
        let local = serde_json::to_value(PostId::Local(1_700_000_000_000)).unwrap();
        let remote = serde_json::to_value(PostId::Remote("abc".into())).unwrap();
        assert_eq!(local, serde_json::json!(1_700_000_000_000_i64));
        assert_eq!(remote, serde_json::json!("abc"));

        let back: PostId = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert_eq!(back, PostId::Local(42));
    }

    #[test]
    fn legacy_snapshot_post_parses() {
        // Shape written by the browser build: numeric id, `date`, empty source.
        let raw = serde_json::json!({
            "id": 1,
            "title": "PM의 핵심 역할과 책임",
            "content": "본문",
            "source": "",
            "date": "2024-12-20T00:00:00.000Z",
            "author": "관리자"
        });
        let post: Post = serde_json::from_value(raw).unwrap();
        assert_eq!(post.id, PostId::Local(1));
        assert_eq!(post.board_id, "");
        assert_eq!(post.created_at, Utc.with_ymd_and_hms(2024, 12, 20, 0, 0, 0).unwrap());
    }

    #[test]
    fn role_reads_leniently() {
        let role: Role = serde_json::from_value(serde_json::json!("ADMIN")).unwrap();
        assert_eq!(role, Role::Admin);
        let role: Role = serde_json::from_value(serde_json::json!("owner")).unwrap();
        assert_eq!(role, Role::General);
        assert_eq!(serde_json::to_value(Role::Core).unwrap(), serde_json::json!("core"));
    }

    #[test]
    fn new_post_normalizes_author_and_source() {
        let post = NewPost::new("T", "C").with_author("  ").with_source(" ");
        assert_eq!(post.author_or_anonymous(), ANONYMOUS_AUTHOR);
        assert_eq!(post.normalized_source(), None);
    }

    #[test]
    fn display_name_is_derived() {
        let profile = UserProfile {
            uid: "u1".into(),
            email: "a@b.c".into(),
            nickname: "kim".into(),
            job: "PM".into(),
            domain: "fintech".into(),
            region: "seoul".into(),
            role: Role::General,
        };
        assert_eq!(profile.display_name(), "kim/PM/fintech/seoul");
    }
}
