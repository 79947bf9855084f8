//! Mapping between posts and remote documents.

use chrono::Utc;
use domains::{AppError, Document, FieldValue, Fields, NewPost, Post, PostId, Result, ANONYMOUS_AUTHOR};

pub(crate) const BOARD_FIELD: &str = "boardId";
pub(crate) const PROBE_DOCUMENT_ID: &str = "__probe__";

/// Document written for a new remote post. Both timestamps come from the
/// store's clock.
pub(crate) fn post_fields(board_id: &str, new_post: &NewPost, request_id: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(BOARD_FIELD.into(), board_id.into());
    fields.insert("title".into(), new_post.title.as_str().into());
    fields.insert("content".into(), new_post.content.as_str().into());
    if let Some(source) = new_post.normalized_source() {
        fields.insert("source".into(), source.into());
    }
    fields.insert("author".into(), new_post.author_or_anonymous().into());
    fields.insert("requestId".into(), request_id.into());
    fields.insert("createdAt".into(), FieldValue::ServerTimestamp);
    fields.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    fields
}

pub(crate) fn post_from_document(doc: &Document) -> Result<Post> {
    let board_id = doc
        .get_str(BOARD_FIELD)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::Validation(format!("document {} has no boardId", doc.id)))?;
    let title = doc
        .get_str("title")
        .ok_or_else(|| AppError::Validation(format!("document {} has no title", doc.id)))?;

    Ok(Post {
        id: PostId::Remote(doc.id.clone()),
        board_id: board_id.to_string(),
        title: title.to_string(),
        content: doc.get_str("content").unwrap_or_default().to_string(),
        source: doc
            .get_str("source")
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        author: doc
            .get_str("author")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR)
            .to_string(),
        // A write whose server timestamp is still pending is the newest post.
        created_at: doc.get_timestamp("createdAt").unwrap_or_else(Utc::now),
    })
}
