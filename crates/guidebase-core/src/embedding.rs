//! Embedding traits and vector utilities.
//!
//! Two independent embedding pipelines, each behind its own trait so unit
//! tests can substitute deterministic stub generators:
//!
//! - [`TextEmbedder`] — the 768-dim text pipeline.
//! - [`MultimodalEmbedder`] — the 1024-dim multimodal pipeline. The
//!   underlying models are asymmetric: documents and queries are encoded
//!   differently, so the document/query mode is part of the trait surface
//!   (`embed_documents` vs `embed_query`) rather than auto-detected.
//!
//! Concrete provider implementations (remote HTTP calls) live in the
//! `guidebase` application crate. No retry is performed at this layer;
//! provider failures propagate to the caller unchanged.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::SectionChunk;

/// Text-pipeline embedding provider.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a batch of document chunks, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query.
    ///
    /// Implementations apply [`normalize_query_text`] before the call.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Multimodal-pipeline embedding provider.
#[async_trait]
pub trait MultimodalEmbedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;

    /// Embed document sections (text plus image references) in document
    /// mode, in input order.
    async fn embed_documents(&self, sections: &[SectionChunk]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query in query mode.
    ///
    /// Implementations apply [`normalize_query_text`] before the call.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Replace literal `\n` escape sequences with spaces before embedding a
/// query.
///
/// This targets the two-character sequence backslash-n as it appears in
/// user input, not actual newline characters, which pass through untouched.
pub fn normalize_query_text(text: &str) -> String {
    text.replace("\\n", " ")
}

/// Check that every vector in a provider response has the expected
/// dimensionality.
pub fn ensure_dims(vectors: &[Vec<f32>], dims: usize) -> Result<()> {
    for v in vectors {
        if v.len() != dims {
            bail!("embedding dimension mismatch: expected {dims}, got {}", v.len());
        }
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a BLOB
/// of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values from
/// the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. This is the similarity score used for
/// retrieval: `1 - cosine_distance`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
