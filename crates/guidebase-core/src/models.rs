//! Core data models used throughout Guidebase.
//!
//! These types represent the resources, chunks, and retrieval results that
//! flow through the ingestion and retrieval pipeline.

use serde::Serialize;
use uuid::Uuid;

/// One ingested source document. Created on successful ingestion of one
/// uploaded file and immutable thereafter; deleting it cascades to all
/// derived chunks at the storage layer.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub file_name: String,
    pub content: Option<String>,
    pub created_at: i64,
}

impl Resource {
    pub fn new(file_name: impl Into<String>, content: Option<String>, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            content,
            created_at,
        }
    }
}

/// A text chunk paired with its embedding vector, ready for persistence
/// in the 768-dim text pipeline.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding,
        }
    }
}

/// A multimodal chunk row for the 1024-dim pipeline. `original_index` links
/// the row back to its position in the chunker's section list so image
/// references can be attached after the bulk insert.
#[derive(Debug, Clone)]
pub struct EmbeddedSection {
    pub id: String,
    pub content: String,
    pub original_index: i64,
    pub embedding: Vec<f32>,
}

impl EmbeddedSection {
    pub fn new(content: impl Into<String>, original_index: i64, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            original_index,
            embedding,
        }
    }
}

/// Output of the multimodal HTML chunker: the non-empty trimmed text lines
/// of one document section plus the image URLs found within it.
///
/// `text` may be empty only when `images` is not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionChunk {
    pub text: Vec<String>,
    pub images: Vec<String>,
}

impl SectionChunk {
    /// Joined text content as embedded and persisted.
    pub fn content(&self) -> String {
        self.text.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }
}

/// One ranked retrieval hit from the text pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Guide {
    pub text: String,
    pub similarity: f64,
}

/// Result of a text-pipeline retrieval: ranked guides plus the distinct
/// source labels (resource file names with the extension stripped) they
/// came from. Ephemeral — never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub guides: Vec<Guide>,
    pub sources: Vec<String>,
}

/// One ranked retrieval hit from the multimodal pipeline, carrying the
/// image URLs attached to the matching chunk (empty when it has none).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimodalGuide {
    pub text: String,
    pub similarity: f64,
    pub image_urls: Vec<String>,
}
