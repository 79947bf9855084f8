use std::sync::Arc;

use chrono::{TimeZone, Utc};
use domains::{AppError, NewPost, PostId, Role, BOARDS};
use integration_tests::{insert_remote_post, titles, Harness};
use services::{BackendMode, DEFAULT_RECENT_LIMIT};
use storage_adapters::MemoryKeyValueStore;

#[tokio::test]
async fn empty_board_before_any_post() {
    for harness in [Harness::builder().build(), Harness::builder().local_only().build()] {
        assert!(harness.manager.get_posts("faq").await.is_empty());
    }
}

#[tokio::test]
async fn add_then_retrieve_remote() {
    let h = Harness::builder().build();
    let post = h
        .manager
        .add_post("news", NewPost::new("T", "C"))
        .await
        .unwrap();
    assert!(post.id.is_remote());
    assert_eq!(h.manager.mode(), BackendMode::Remote);

    let posts = h.manager.get_posts("news").await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "T");
    assert_eq!(posts[0].id, post.id);
    assert_eq!(h.remote.len("posts"), 1);
}

#[tokio::test]
async fn add_then_retrieve_local() {
    let h = Harness::builder().local_only().build();
    h.manager
        .add_post("news", NewPost::new("T", "C").with_source("  "))
        .await
        .unwrap();

    let posts = h.manager.get_posts("news").await;
    assert_eq!(titles(&posts), vec!["T"]);
    assert_eq!(posts[0].source, None);
    assert_eq!(h.remote.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn reads_degrade_to_empty_on_every_board() {
    let h = Harness::builder().build();
    h.manager
        .add_post("news", NewPost::new("T", "C"))
        .await
        .unwrap();
    h.remote.set_offline(true);

    for board in BOARDS.iter() {
        assert!(h.manager.get_posts(board.id).await.is_empty());
    }
    assert!(h.manager.get_recent_posts(DEFAULT_RECENT_LIMIT).await.is_empty());
    assert_eq!(h.manager.mode(), BackendMode::Remote);
}

#[tokio::test(start_paused = true)]
async fn write_fails_when_both_sides_fail() {
    let kv = Arc::new(MemoryKeyValueStore::with_quota(8));
    let h = Harness::builder().with_kv(kv).build();
    h.manager.initialize().await;
    h.remote.set_offline(true);

    let result = h.manager.add_post("news", NewPost::new("T", "C")).await;
    assert!(matches!(result, Err(AppError::WriteFailed(_))), "{result:?}");
    assert!(h.manager.get_posts("news").await.is_empty());
}

#[tokio::test]
async fn remote_writes_are_mirrored_into_the_snapshot() {
    let h = Harness::builder().build();
    h.manager
        .add_post("career-prep", NewPost::new("Portfolio", "Body").with_author("mentor"))
        .await
        .unwrap();

    let snapshot = h.persisted_snapshot().await;
    let cached = &snapshot["career-prep"][0];
    assert_eq!(cached["title"], "Portfolio");
    assert_eq!(cached["content"], "Body");
    assert_eq!(cached["boardId"], "career-prep");
    assert_eq!(cached["author"], "mentor");
}

#[tokio::test(start_paused = true)]
async fn demotion_sticks_for_the_session() {
    let h = Harness::builder().build();
    h.manager.initialize().await;
    h.remote.set_offline(true);

    let first = h
        .manager
        .add_post("news", NewPost::new("first", "C"))
        .await
        .unwrap();
    assert!(matches!(first.id, PostId::Local(_)));
    assert_eq!(h.manager.mode(), BackendMode::Local);
    let calls_after_demotion = h.remote.calls();

    // Even with the backend back, nothing goes remote again.
    h.remote.set_offline(false);
    let second = h
        .manager
        .add_post("news", NewPost::new("second", "C"))
        .await
        .unwrap();
    assert!(matches!(second.id, PostId::Local(_)));
    assert_eq!(h.remote.calls(), calls_after_demotion);
    assert_eq!(titles(&h.manager.get_posts("news").await), vec!["second", "first"]);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_without_duplicates() {
    let h = Harness::builder().build();
    h.manager.initialize().await;
    h.remote.fail_next(2);

    let post = h
        .manager
        .add_post("news", NewPost::new("T", "C"))
        .await
        .unwrap();
    assert!(post.id.is_remote());
    assert_eq!(h.remote.len("posts"), 1);
    assert_eq!(h.manager.mode(), BackendMode::Remote);
}

#[tokio::test]
async fn remote_lists_are_newest_first() {
    let h = Harness::builder().build();
    let day = |d| Utc.with_ymd_and_hms(2025, 3, d, 9, 0, 0).unwrap();
    insert_remote_post(&h.remote, "p2", "news", "middle", day(2)).await;
    insert_remote_post(&h.remote, "p3", "news", "newest", day(3)).await;
    insert_remote_post(&h.remote, "p1", "news", "oldest", day(1)).await;
    insert_remote_post(&h.remote, "f1", "faq", "faq-only", day(4)).await;

    assert_eq!(
        titles(&h.manager.get_posts("news").await),
        vec!["newest", "middle", "oldest"]
    );
    assert_eq!(
        titles(&h.manager.get_recent_posts(3).await),
        vec!["faq-only", "newest", "middle"]
    );
}

#[tokio::test]
async fn recent_posts_default_limit_applies_across_boards() {
    let h = Harness::builder().build();
    for (i, board) in BOARDS.iter().cycle().take(8).enumerate() {
        let when = Utc.with_ymd_and_hms(2025, 1, 1 + i as u32, 0, 0, 0).unwrap();
        insert_remote_post(&h.remote, &format!("p{i}"), board.id, &format!("T{i}"), when).await;
    }

    let recent = h.manager.get_recent_posts(DEFAULT_RECENT_LIMIT).await;
    assert_eq!(titles(&recent), vec!["T7", "T6", "T5", "T4", "T3", "T2"]);
}

#[tokio::test]
async fn delete_requires_permission_and_leaves_store_untouched() {
    let h = Harness::builder().build();
    let post = h
        .manager
        .add_post("news", NewPost::new("T", "C"))
        .await
        .unwrap();

    let result = h.manager.delete_post(Role::General, &post.id, "news").await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert_eq!(h.remote.len("posts"), 1);
    assert!(h.manager.cache().contains("news", &post.id).await);
}

#[tokio::test]
async fn admin_delete_removes_both_copies() {
    let h = Harness::builder().build();
    let post = h
        .manager
        .add_post("news", NewPost::new("T", "C"))
        .await
        .unwrap();

    h.manager
        .delete_post(Role::Admin, &post.id, "news")
        .await
        .unwrap();
    assert!(h.remote.is_empty("posts"));
    assert!(h.manager.get_posts("news").await.is_empty());
    assert!(!h.manager.cache().contains("news", &post.id).await);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_remote_post_after_demotion_only_purges_the_cache() {
    let h = Harness::builder().build();
    let post = h
        .manager
        .add_post("news", NewPost::new("before", "C"))
        .await
        .unwrap();

    h.remote.set_offline(true);
    h.manager
        .add_post("news", NewPost::new("after", "C"))
        .await
        .unwrap();
    assert_eq!(h.manager.mode(), BackendMode::Local);
    let calls_after_demotion = h.remote.calls();

    h.manager
        .delete_post(Role::Supervisor, &post.id, "news")
        .await
        .unwrap();
    assert_eq!(titles(&h.manager.get_posts("news").await), vec!["after"]);
    assert_eq!(h.remote.calls(), calls_after_demotion);
}

#[tokio::test]
async fn mirrored_remote_post_deletes_cleanly_in_a_local_session() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let online = Harness::builder().with_kv(kv.clone()).build();
    let post = online
        .manager
        .add_post("news", NewPost::new("mirrored", "C"))
        .await
        .unwrap();
    assert!(post.id.is_remote());

    let offline = Harness::builder().local_only().with_kv(kv).build();
    assert_eq!(titles(&offline.manager.get_posts("news").await), vec!["mirrored"]);

    offline
        .manager
        .delete_post(Role::Admin, &post.id, "news")
        .await
        .unwrap();
    assert!(offline.manager.get_posts("news").await.is_empty());

    // Deleting again is a no-op, not a failure.
    offline
        .manager
        .delete_post(Role::Admin, &post.id, "news")
        .await
        .unwrap();
}

#[tokio::test]
async fn remote_add_succeeds_when_the_mirror_is_over_quota() {
    let kv = Arc::new(MemoryKeyValueStore::with_quota(30));
    let h = Harness::builder().with_kv(kv).build();

    let post = h
        .manager
        .add_post("news", NewPost::new("too big for the cache", "C"))
        .await
        .unwrap();
    assert!(post.id.is_remote());
    assert_eq!(h.manager.mode(), BackendMode::Remote);
    assert_eq!(h.persisted_snapshot().await, serde_json::json!({}));
    assert_eq!(
        titles(&h.manager.get_posts("news").await),
        vec!["too big for the cache"]
    );
}

#[tokio::test]
async fn local_posts_survive_a_restart() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let first = Harness::builder().local_only().with_kv(kv.clone()).build();
    first
        .manager
        .add_post("study", NewPost::new("kept", "C"))
        .await
        .unwrap();

    let second = Harness::builder().local_only().with_kv(kv).build();
    assert_eq!(titles(&second.manager.get_posts("study").await), vec!["kept"]);
}

#[test]
fn board_names() {
    let h = Harness::builder().local_only().build();
    assert_eq!(h.manager.get_board_name("job-info"), "직무");
    assert_eq!(h.manager.get_board_name("policy-library"), "정책도서관");
    assert_eq!(h.manager.get_board_name("nope"), domains::UNKNOWN_BOARD_NAME);
}
