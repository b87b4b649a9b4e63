use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            content TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Text pipeline chunks: 768-dim vectors stored as little-endian f32 BLOBs.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            id TEXT PRIMARY KEY,
            resource_id TEXT REFERENCES resources(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Multimodal pipeline chunks: 1024-dim vectors. original_index links a
    // row back to its position in the chunker's section list.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings_multimodal (
            id TEXT PRIMARY KEY,
            resource_id TEXT REFERENCES resources(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            original_index INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_resources (
            id TEXT PRIMARY KEY,
            image_url TEXT NOT NULL,
            embedding_id TEXT REFERENCES embeddings_multimodal(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embeddings_resource_id ON embeddings(resource_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embeddings_multimodal_resource_id \
         ON embeddings_multimodal(resource_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_image_resources_embedding_id \
         ON image_resources(embedding_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
