//! In-memory [`Store`] implementation for unit tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Similarity queries are brute-force cosine over all stored vectors,
//! matching the semantics of the SQLite store without a database.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddedChunk, EmbeddedSection, Resource, SectionChunk};

use super::{ScoredChunk, ScoredSection, Store};

struct StoredChunk {
    chunk: EmbeddedChunk,
    resource_id: String,
}

struct StoredSection {
    section: EmbeddedSection,
    resource_id: String,
}

struct StoredImage {
    embedding_id: String,
    image_url: String,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    resources: RwLock<HashMap<String, Resource>>,
    chunks: RwLock<Vec<StoredChunk>>,
    sections: RwLock<Vec<StoredSection>>,
    images: RwLock<Vec<StoredImage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources.
    pub fn resource_count(&self) -> usize {
        self.resources.read().unwrap().len()
    }

    /// Number of stored text chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().unwrap().len()
    }

    /// Number of stored multimodal chunks.
    pub fn section_count(&self) -> usize {
        self.sections.read().unwrap().len()
    }

    /// Number of stored image rows.
    pub fn image_count(&self) -> usize {
        self.images.read().unwrap().len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_resource(&self, resource: &Resource) -> Result<String> {
        let mut resources = self.resources.write().unwrap();
        resources.insert(resource.id.clone(), resource.clone());
        Ok(resource.id.clone())
    }

    async fn insert_chunks(&self, resource_id: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        for chunk in chunks {
            stored.push(StoredChunk {
                chunk: chunk.clone(),
                resource_id: resource_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_document(
        &self,
        resource: &Resource,
        chunks: &[EmbeddedChunk],
    ) -> Result<String> {
        self.insert_resource(resource).await?;
        self.insert_chunks(&resource.id, chunks).await?;
        Ok(resource.id.clone())
    }

    async fn insert_multimodal_document(
        &self,
        resource: &Resource,
        chunks: &[EmbeddedSection],
        sections: &[SectionChunk],
    ) -> Result<String> {
        self.insert_resource(resource).await?;
        let mut stored = self.sections.write().unwrap();
        let mut images = self.images.write().unwrap();
        for chunk in chunks {
            stored.push(StoredSection {
                section: chunk.clone(),
                resource_id: resource.id.clone(),
            });
            if let Some(section) = sections.get(chunk.original_index as usize) {
                for url in &section.images {
                    images.push(StoredImage {
                        embedding_id: chunk.id.clone(),
                        image_url: url.clone(),
                    });
                }
            }
        }
        Ok(resource.id.clone())
    }

    async fn query_by_similarity(&self, query_vec: &[f32]) -> Result<Vec<ScoredChunk>> {
        let resources = self.resources.read().unwrap();
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .map(|sc| ScoredChunk {
                content: sc.chunk.content.clone(),
                similarity: cosine_similarity(query_vec, &sc.chunk.embedding) as f64,
                file_name: resources.get(&sc.resource_id).map(|r| r.file_name.clone()),
            })
            .collect())
    }

    async fn query_multimodal_by_similarity(
        &self,
        query_vec: &[f32],
    ) -> Result<Vec<ScoredSection>> {
        let sections = self.sections.read().unwrap();
        let images = self.images.read().unwrap();
        Ok(sections
            .iter()
            .map(|ss| ScoredSection {
                content: ss.section.content.clone(),
                similarity: cosine_similarity(query_vec, &ss.section.embedding) as f64,
                image_urls: images
                    .iter()
                    .filter(|img| img.embedding_id == ss.section.id)
                    .map(|img| img.image_url.clone())
                    .collect(),
            })
            .collect())
    }

    async fn delete_resource(&self, id: &str) -> Result<()> {
        self.resources.write().unwrap().remove(id);

        let mut chunks = self.chunks.write().unwrap();
        chunks.retain(|sc| sc.resource_id != id);

        let mut sections = self.sections.write().unwrap();
        let removed_ids: Vec<String> = sections
            .iter()
            .filter(|ss| ss.resource_id == id)
            .map(|ss| ss.section.id.clone())
            .collect();
        sections.retain(|ss| ss.resource_id != id);

        let mut images = self.images.write().unwrap();
        images.retain(|img| !removed_ids.contains(&img.embedding_id));

        Ok(())
    }
}
