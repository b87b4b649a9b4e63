//! Ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: decode bytes → extract text → chunk
//! (variant selected by file type) → embed → persist. Both pipelines reject
//! bad input before any provider call or write, and neither leaves partial
//! state behind on failure: the multimodal path is always one transaction,
//! and the text path is transactional by default (the legacy two-write
//! behavior stays available behind `[ingest] transactional = false`).

use thiserror::Error;

use guidebase_core::chunk::chunk_sentences;
use guidebase_core::embedding::{MultimodalEmbedder, TextEmbedder};
use guidebase_core::html::HtmlChunker;
use guidebase_core::models::{EmbeddedChunk, EmbeddedSection, Resource};
use guidebase_core::store::Store;

use crate::config::Config;
use crate::extract::{extract_text, ExtractError, SourceKind};

/// Failure taxonomy for one ingestion attempt.
///
/// `Input` failures are the caller's fault and happen before any side
/// effect; everything else aborts the pipeline with no partial writes.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing file, unsupported extension, or invalid parameters.
    #[error("{0}")]
    Input(String),

    /// The upload's bytes could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// The embedding provider call failed (timeout, rate limit, malformed
    /// response). Not retried here.
    #[error("embedding provider failed: {0}")]
    Provider(#[source] anyhow::Error),

    /// The datastore rejected the write; the transaction was rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Ingestion knobs derived from the application [`Config`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub max_tokens: usize,
    pub html_container: String,
    pub transactional: bool,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.chunking.max_tokens,
            html_container: config.chunking.html_container.clone(),
            transactional: config.ingest.transactional,
        }
    }
}

/// Ingest one upload through the text pipeline (768-dim chunks).
///
/// Returns the created resource id. A document whose chunker output is
/// empty still creates its resource row but makes no provider call.
pub async fn ingest_text(
    store: &dyn Store,
    embedder: &dyn TextEmbedder,
    opts: &IngestOptions,
    file_name: &str,
    bytes: &[u8],
    created_at: i64,
) -> Result<String, IngestError> {
    let kind = source_kind(file_name)?;
    let text = extract_text(bytes, kind)?;

    let chunks = match kind {
        SourceKind::Pdf => chunk_sentences(&text, opts.max_tokens),
        SourceKind::Html => html_chunker(opts)?.chunk(&text),
    };

    let vectors = if chunks.is_empty() {
        Vec::new()
    } else {
        let vectors = embedder
            .embed_documents(&chunks)
            .await
            .map_err(IngestError::Provider)?;
        if vectors.len() != chunks.len() {
            return Err(IngestError::Provider(anyhow::anyhow!(
                "provider returned {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        vectors
    };

    let rows: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(content, embedding)| EmbeddedChunk::new(content, embedding))
        .collect();

    let resource = Resource::new(file_name, None, created_at);
    tracing::info!(
        file_name,
        chunks = rows.len(),
        resource_id = %resource.id,
        "ingesting document"
    );

    if opts.transactional {
        store
            .insert_document(&resource, &rows)
            .await
            .map_err(IngestError::Persistence)
    } else {
        // Legacy behavior: two separate writes. A failure between them
        // leaves an orphaned resource with no chunks.
        let id = store
            .insert_resource(&resource)
            .await
            .map_err(IngestError::Persistence)?;
        store
            .insert_chunks(&id, &rows)
            .await
            .map_err(IngestError::Persistence)?;
        Ok(id)
    }
}

/// Ingest one upload through the multimodal pipeline (1024-dim chunks plus
/// image references), in a single transaction.
pub async fn ingest_multimodal(
    store: &dyn Store,
    embedder: &dyn MultimodalEmbedder,
    opts: &IngestOptions,
    file_name: &str,
    bytes: &[u8],
    created_at: i64,
) -> Result<String, IngestError> {
    let kind = source_kind(file_name)?;
    let text = extract_text(bytes, kind)?;

    let sections = match kind {
        // PDF text has no DOM to mine for images; its sentences become
        // text-only sections.
        SourceKind::Pdf => chunk_sentences(&text, opts.max_tokens)
            .into_iter()
            .map(|chunk| guidebase_core::models::SectionChunk {
                text: vec![chunk],
                images: Vec::new(),
            })
            .collect(),
        SourceKind::Html => html_chunker(opts)?.chunk_sections(&text),
    };

    let vectors = if sections.is_empty() {
        Vec::new()
    } else {
        let vectors = embedder
            .embed_documents(&sections)
            .await
            .map_err(IngestError::Provider)?;
        if vectors.len() != sections.len() {
            return Err(IngestError::Provider(anyhow::anyhow!(
                "provider returned {} embeddings for {} sections",
                vectors.len(),
                sections.len()
            )));
        }
        vectors
    };

    let rows: Vec<EmbeddedSection> = sections
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (section, embedding))| {
            EmbeddedSection::new(section.content(), index as i64, embedding)
        })
        .collect();

    let resource = Resource::new(file_name, None, created_at);
    tracing::info!(
        file_name,
        sections = rows.len(),
        resource_id = %resource.id,
        "ingesting multimodal document"
    );

    store
        .insert_multimodal_document(&resource, &rows, &sections)
        .await
        .map_err(IngestError::Persistence)
}

fn source_kind(file_name: &str) -> Result<SourceKind, IngestError> {
    SourceKind::from_file_name(file_name)
        .ok_or_else(|| IngestError::Input(format!("Unsupported file type: {file_name}")))
}

fn html_chunker(opts: &IngestOptions) -> Result<HtmlChunker, IngestError> {
    HtmlChunker::new(&opts.html_container, opts.max_tokens)
        .map_err(|e| IngestError::Input(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use guidebase_core::models::SectionChunk;
    use guidebase_core::store::memory::InMemoryStore;

    fn options() -> IngestOptions {
        IngestOptions {
            max_tokens: 1000,
            html_container: "div.page-content".to_string(),
            transactional: true,
        }
    }

    /// Counts calls; embeds each input as a constant unit vector.
    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextEmbedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    /// Always fails, standing in for a provider outage.
    struct FailingMultimodalEmbedder;

    #[async_trait]
    impl MultimodalEmbedder for FailingMultimodalEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_documents(&self, _sections: &[SectionChunk]) -> Result<Vec<Vec<f32>>> {
            bail!("rate limited")
        }
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("rate limited")
        }
    }

    #[tokio::test]
    async fn unsupported_extension_rejected_before_any_work() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::default();

        let err = ingest_text(&store, &embedder, &options(), "notes.txt", b"hello", 0)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Input(_)));
        assert_eq!(embedder.calls(), 0, "provider must not be called");
        assert_eq!(store.resource_count(), 0);
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn html_upload_persists_resource_and_chunks() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::default();
        let html = "<div class=\"page-content\"><h1>Setup</h1><p>Plug it in.</p></div>";

        let id = ingest_text(&store, &embedder, &options(), "setup.html", html.as_bytes(), 0)
            .await
            .unwrap();

        assert!(!id.is_empty());
        assert_eq!(embedder.calls(), 1);
        assert_eq!(store.resource_count(), 1);
        assert_eq!(store.chunk_count(), 1);
    }

    #[tokio::test]
    async fn empty_chunker_output_skips_provider() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::default();
        // No content container, so the chunker yields nothing.
        let html = "<body><p>stray</p></body>";

        let id = ingest_text(&store, &embedder, &options(), "bare.html", html.as_bytes(), 0)
            .await
            .unwrap();

        assert!(!id.is_empty());
        assert_eq!(embedder.calls(), 0);
        assert_eq!(store.resource_count(), 1);
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_multimodal_state() {
        let store = InMemoryStore::new();
        let html = "<div class=\"page-content\"><h1>Guide</h1>\
                    <img src=\"https://cdn.example.com/x.png\"></div>";

        let err = ingest_multimodal(
            &store,
            &FailingMultimodalEmbedder,
            &options(),
            "guide.html",
            html.as_bytes(),
            0,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, IngestError::Provider(_)));
        assert_eq!(store.resource_count(), 0);
        assert_eq!(store.section_count(), 0);
        assert_eq!(store.image_count(), 0);
    }

    #[tokio::test]
    async fn multimodal_html_links_images_through_original_index() {
        struct UnitEmbedder;

        #[async_trait]
        impl MultimodalEmbedder for UnitEmbedder {
            fn model_name(&self) -> &str {
                "unit"
            }
            fn dims(&self) -> usize {
                2
            }
            async fn embed_documents(&self, sections: &[SectionChunk]) -> Result<Vec<Vec<f32>>> {
                Ok(sections.iter().map(|_| vec![1.0, 0.0]).collect())
            }
            async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![1.0, 0.0])
            }
        }

        let store = InMemoryStore::new();
        let html = "<div class=\"page-content\">\
                    <h1>One</h1><img src=\"https://cdn.example.com/1.png\">\
                    <h1>Two</h1><p>no image here</p>\
                    </div>";

        ingest_multimodal(&store, &UnitEmbedder, &options(), "wiring.html", html.as_bytes(), 0)
            .await
            .unwrap();

        assert_eq!(store.resource_count(), 1);
        assert_eq!(store.section_count(), 2);
        assert_eq!(store.image_count(), 1);
    }

    #[tokio::test]
    async fn legacy_two_write_path_still_works() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::default();
        let opts = IngestOptions {
            transactional: false,
            ..options()
        };

        let html = "<div class=\"page-content\"><p>Short manual text.</p></div>";
        let id = ingest_text(&store, &embedder, &opts, "manual.html", html.as_bytes(), 0)
            .await
            .unwrap();

        assert!(!id.is_empty());
        assert_eq!(store.resource_count(), 1);
        assert_eq!(store.chunk_count(), 1);
    }
}
