//! Storage abstraction for Guidebase.
//!
//! The [`Store`] trait is the narrow repository interface between the
//! retrieval/ingestion logic and whatever vector-capable datastore backs a
//! deployment, so the similarity/ranking logic stays testable without a
//! database driver. Implementations must be `Send + Sync` to work with
//! async runtimes.
//!
//! All writes for one ingested document are all-or-nothing: the
//! `insert_*_document` operations are transactional in every backend.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddedChunk, EmbeddedSection, Resource, SectionChunk};

/// A stored text chunk scored against a query vector.
///
/// `file_name` is the owning resource's file name, `None` when the
/// resource has been deleted out from under the chunk.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub similarity: f64,
    pub file_name: Option<String>,
}

/// A stored multimodal chunk scored against a query vector, with all image
/// URLs belonging to it aggregated (empty when it has none).
#[derive(Debug, Clone)]
pub struct ScoredSection {
    pub content: String,
    pub similarity: f64,
    pub image_urls: Vec<String>,
}

/// Abstract storage backend for Guidebase.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_resource`](Store::insert_resource) | Insert a resource row on its own |
/// | [`insert_chunks`](Store::insert_chunks) | Insert chunk rows for an existing resource |
/// | [`insert_document`](Store::insert_document) | Resource + chunks in one transaction |
/// | [`insert_multimodal_document`](Store::insert_multimodal_document) | Resource + chunks + images in one transaction |
/// | [`query_by_similarity`](Store::query_by_similarity) | Score every stored text chunk |
/// | [`query_multimodal_by_similarity`](Store::query_multimodal_by_similarity) | Score every stored multimodal chunk |
/// | [`delete_resource`](Store::delete_resource) | Delete a resource (cascades to chunks) |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a resource row with no chunks.
    ///
    /// Together with [`insert_chunks`](Store::insert_chunks) this forms the
    /// legacy two-write ingestion path; prefer
    /// [`insert_document`](Store::insert_document).
    async fn insert_resource(&self, resource: &Resource) -> Result<String>;

    /// Insert text chunk rows owned by an existing resource.
    async fn insert_chunks(&self, resource_id: &str, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Insert a resource and its text chunks atomically.
    ///
    /// Returns the resource id. On any failure nothing is persisted.
    async fn insert_document(&self, resource: &Resource, chunks: &[EmbeddedChunk])
        -> Result<String>;

    /// Insert a resource, its multimodal chunk rows, and their image rows
    /// atomically.
    ///
    /// Each chunk row carries an `original_index` into `sections`; the
    /// image URLs of the section at that index are attached to the inserted
    /// chunk. On any failure nothing is persisted.
    async fn insert_multimodal_document(
        &self,
        resource: &Resource,
        chunks: &[EmbeddedSection],
        sections: &[SectionChunk],
    ) -> Result<String>;

    /// Score every stored text chunk against `query_vec` as
    /// `1 - cosine_distance`, joined to its owning resource's file name.
    ///
    /// Filtering, ranking, and limiting are the retriever's job — this
    /// returns all rows.
    async fn query_by_similarity(&self, query_vec: &[f32]) -> Result<Vec<ScoredChunk>>;

    /// Score every stored multimodal chunk against `query_vec`, with its
    /// aggregated image URLs.
    async fn query_multimodal_by_similarity(&self, query_vec: &[f32])
        -> Result<Vec<ScoredSection>>;

    /// Delete a resource; every chunk (and image row) derived from it is
    /// deleted with it.
    async fn delete_resource(&self, id: &str) -> Result<()>;
}
