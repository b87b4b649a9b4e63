//! SQLite-backed [`Store`] implementation.
//!
//! Vectors are stored as little-endian f32 BLOBs and scored with
//! brute-force cosine similarity in Rust. The `insert_*_document`
//! operations wrap all writes for one ingested document in a single
//! transaction; `ON DELETE CASCADE` on the chunk and image tables keeps
//! deletes consistent.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use guidebase_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use guidebase_core::models::{EmbeddedChunk, EmbeddedSection, Resource, SectionChunk};
use guidebase_core::store::{ScoredChunk, ScoredSection, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_resource_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        resource: &Resource,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO resources (id, file_name, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&resource.id)
        .bind(&resource.file_name)
        .bind(&resource.content)
        .bind(resource.created_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_chunk_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        resource_id: &str,
        chunk: &EmbeddedChunk,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO embeddings (id, resource_id, content, embedding) VALUES (?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(resource_id)
        .bind(&chunk.content)
        .bind(vec_to_blob(&chunk.embedding))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_resource(&self, resource: &Resource) -> Result<String> {
        sqlx::query(
            "INSERT INTO resources (id, file_name, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&resource.id)
        .bind(&resource.file_name)
        .bind(&resource.content)
        .bind(resource.created_at)
        .execute(&self.pool)
        .await?;

        Ok(resource.id.clone())
    }

    async fn insert_chunks(&self, resource_id: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO embeddings (id, resource_id, content, embedding) VALUES (?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(resource_id)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn insert_document(
        &self,
        resource: &Resource,
        chunks: &[EmbeddedChunk],
    ) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        Self::insert_resource_tx(&mut tx, resource).await?;
        for chunk in chunks {
            Self::insert_chunk_tx(&mut tx, &resource.id, chunk).await?;
        }

        tx.commit().await?;
        Ok(resource.id.clone())
    }

    async fn insert_multimodal_document(
        &self,
        resource: &Resource,
        chunks: &[EmbeddedSection],
        sections: &[SectionChunk],
    ) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        Self::insert_resource_tx(&mut tx, resource).await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO embeddings_multimodal \
                 (id, resource_id, content, original_index, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&resource.id)
            .bind(&chunk.content)
            .bind(chunk.original_index)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }

        // Attach each inserted chunk's images by looking its source section
        // up via original_index.
        for chunk in chunks {
            let Some(section) = sections.get(chunk.original_index as usize) else {
                continue;
            };
            for url in &section.images {
                sqlx::query(
                    "INSERT INTO image_resources (id, image_url, embedding_id) VALUES (?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(url)
                .bind(&chunk.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(resource.id.clone())
    }

    async fn query_by_similarity(&self, query_vec: &[f32]) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT e.content, e.embedding, r.file_name
            FROM embeddings e
            LEFT JOIN resources r ON r.id = e.resource_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    content: row.get("content"),
                    similarity: cosine_similarity(query_vec, &vec) as f64,
                    file_name: row.get("file_name"),
                }
            })
            .collect())
    }

    async fn query_multimodal_by_similarity(
        &self,
        query_vec: &[f32],
    ) -> Result<Vec<ScoredSection>> {
        let image_rows = sqlx::query(
            "SELECT embedding_id, image_url FROM image_resources ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut images_by_chunk: HashMap<String, Vec<String>> = HashMap::new();
        for row in &image_rows {
            let embedding_id: Option<String> = row.get("embedding_id");
            if let Some(id) = embedding_id {
                images_by_chunk
                    .entry(id)
                    .or_default()
                    .push(row.get("image_url"));
            }
        }

        let rows = sqlx::query("SELECT id, content, embedding FROM embeddings_multimodal")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredSection {
                    content: row.get("content"),
                    similarity: cosine_similarity(query_vec, &vec) as f64,
                    image_urls: images_by_chunk.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
