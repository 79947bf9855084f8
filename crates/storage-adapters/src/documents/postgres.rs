//! # Postgres document store
//!
//! Maps the document model onto a single `documents` table with a JSONB body.
//! Server timestamps are stamped by the database clock (`now()`), and the
//! `(collection, request_id)` unique index makes retried adds idempotent.

use std::time::Duration;

use async_trait::async_trait;
use domains::{Document, DocumentStore, Fields};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use super::split_fields;
use crate::errors::DocumentStoreError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    request_id TEXT,
    body       JSONB NOT NULL,
    PRIMARY KEY (collection, id)
)";

const CREATE_REQUEST_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS documents_request_id
    ON documents (collection, request_id)";

/// JSONB object of `{field: <db clock as RFC 3339>}` for every name in the
/// text array bound at `$param`.
fn stamp_expr(param: u8) -> String {
    format!(
        "COALESCE((SELECT jsonb_object_agg(k, to_jsonb(to_char(now() AT TIME ZONE 'UTC', \
         'YYYY-MM-DD\"T\"HH24:MI:SS.US\"Z\"'))) FROM unnest(${param}::text[]) AS k), '{{}}'::jsonb)"
    )
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and makes sure the schema exists.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_REQUEST_INDEX).execute(&self.pool).await?;
        info!("documents schema ready");
        Ok(())
    }
}

fn row_to_document(row: &PgRow) -> anyhow::Result<Document> {
    let id: String = row.try_get("id")?;
    let Json(body): Json<Value> = row.try_get("body")?;
    let fields = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(Document { id, fields })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn add(&self, collection: &str, fields: Fields, idempotency_key: &str) -> anyhow::Result<String> {
        let (body, stamped) = split_fields(fields);
        let sql = format!(
            "INSERT INTO documents (collection, id, request_id, body)
             VALUES ($1, $2, $3, $4 || {})
             ON CONFLICT (collection, request_id) DO NOTHING
             RETURNING id",
            stamp_expr(5)
        );
        let inserted: Option<String> = sqlx::query_scalar(&sql)
            .bind(collection)
            .bind(Uuid::new_v4().simple().to_string())
            .bind(idempotency_key)
            .bind(Json(Value::Object(body)))
            .bind(stamped)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }

        // The key was already used: hand back the document it created.
        let existing: String = sqlx::query_scalar(
            "SELECT id FROM documents WHERE collection = $1 AND request_id = $2",
        )
        .bind(collection)
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(existing)
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = $1 AND body -> $2 = $3")
            .bind(collection)
            .bind(field)
            .bind(Json(value))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query("SELECT id, body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()> {
        let (body, stamped) = split_fields(fields);
        let sql = format!(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3 || {})
             ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body",
            stamp_expr(4)
        );
        sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(body)))
            .bind(stamped)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> anyhow::Result<()> {
        let (body, stamped) = split_fields(fields);
        let sql = format!(
            "UPDATE documents SET body = body || $3 || {} WHERE collection = $1 AND id = $2",
            stamp_expr(4)
        );
        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(body)))
            .bind(stamped)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DocumentStoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}
