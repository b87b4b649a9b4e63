//! Similarity-ranked retrieval over the [`Store`] trait.
//!
//! The retriever takes an already-embedded query vector, scores it against
//! every stored chunk (`1 - cosine_distance`), keeps rows strictly above the
//! similarity threshold, orders them descending, and truncates to the result
//! limit. The calling application is responsible for embedding the query
//! with the pipeline that matches the target chunk table.
//!
//! An empty result is a normal outcome, not an error: when nothing clears
//! the threshold the caller decides how to phrase "no information found".

use std::collections::BTreeSet;

use anyhow::Result;

use crate::models::{Guide, MultimodalGuide, RetrievalResult};
use crate::store::Store;

/// Default similarity cut-off: rows must score strictly above this.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;
/// Default maximum number of returned rows.
pub const DEFAULT_RESULT_LIMIT: usize = 4;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    /// Rows with similarity ≤ this are discarded.
    pub similarity_threshold: f64,
    /// Maximum rows to return.
    pub limit: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

/// Run a text-pipeline retrieval against a [`Store`] backend.
///
/// Returns the ranked guides plus the distinct source labels of the
/// resources they came from (file names with the extension stripped,
/// order-insensitive).
pub async fn retrieve_guides<S: Store + ?Sized>(
    store: &S,
    query_vec: &[f32],
    policy: &RetrievalPolicy,
) -> Result<RetrievalResult> {
    let mut scored = store.query_by_similarity(query_vec).await?;
    scored.retain(|c| c.similarity > policy.similarity_threshold);
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(policy.limit);

    let mut sources = BTreeSet::new();
    for chunk in &scored {
        if let Some(file_name) = &chunk.file_name {
            sources.insert(source_label(file_name));
        }
    }

    Ok(RetrievalResult {
        guides: scored
            .into_iter()
            .map(|c| Guide {
                text: c.content,
                similarity: c.similarity,
            })
            .collect(),
        sources: sources.into_iter().collect(),
    })
}

/// Run a multimodal-pipeline retrieval against a [`Store`] backend.
///
/// Each returned row carries the image URLs attached to the matching chunk
/// (empty when it has none).
pub async fn retrieve_multimodal<S: Store + ?Sized>(
    store: &S,
    query_vec: &[f32],
    policy: &RetrievalPolicy,
) -> Result<Vec<MultimodalGuide>> {
    let mut scored = store.query_multimodal_by_similarity(query_vec).await?;
    scored.retain(|c| c.similarity > policy.similarity_threshold);
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(policy.limit);

    Ok(scored
        .into_iter()
        .map(|c| MultimodalGuide {
            text: c.content,
            similarity: c.similarity,
            image_urls: c.image_urls,
        })
        .collect())
}

/// Human-readable source label for a resource file name: the name with its
/// extension stripped.
pub fn source_label(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddedChunk, EmbeddedSection, Resource, SectionChunk};
    use crate::store::memory::InMemoryStore;
    use crate::store::Store;

    /// Unit vector at an angle chosen so its cosine against the x axis is
    /// exactly `similarity`.
    fn vector_with_similarity(similarity: f64) -> Vec<f32> {
        let angle = similarity.clamp(-1.0, 1.0).acos();
        vec![angle.cos() as f32, angle.sin() as f32]
    }

    fn query() -> Vec<f32> {
        vec![1.0, 0.0]
    }

    async fn seed_store(scores: &[f64]) -> InMemoryStore {
        let store = InMemoryStore::new();
        let resource = Resource::new("setup-guide.html", None, 0);
        let chunks: Vec<EmbeddedChunk> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| EmbeddedChunk::new(format!("chunk {i}"), vector_with_similarity(s)))
            .collect();
        store.insert_document(&resource, &chunks).await.unwrap();
        store
    }

    #[tokio::test]
    async fn filters_ranks_and_limits() {
        let store = seed_store(&[0.9, 0.7, 0.6, 0.55, 0.4]).await;
        let result = retrieve_guides(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();

        assert_eq!(result.guides.len(), 4);
        let expected = [0.9, 0.7, 0.6, 0.55];
        for (guide, want) in result.guides.iter().zip(expected) {
            assert!((guide.similarity - want).abs() < 1e-3, "{guide:?}");
        }
    }

    #[tokio::test]
    async fn never_returns_at_or_below_threshold() {
        let store = seed_store(&[0.51, 0.5, 0.2, -0.3]).await;
        let result = retrieve_guides(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();

        assert_eq!(result.guides.len(), 1);
        assert!(result.guides[0].similarity > 0.5);
    }

    #[tokio::test]
    async fn ranking_is_non_increasing() {
        let store = seed_store(&[0.6, 0.95, 0.7, 0.8, 0.65]).await;
        let result = retrieve_guides(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();

        for pair in result.guides.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[tokio::test]
    async fn empty_store_gives_empty_result() {
        let store = InMemoryStore::new();
        let result = retrieve_guides(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();
        assert!(result.guides.is_empty());
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn sources_are_distinct_and_extension_stripped() {
        let store = InMemoryStore::new();
        let first = Resource::new("onboarding.pdf", None, 0);
        let second = Resource::new("faq.html", None, 0);
        store
            .insert_document(
                &first,
                &[
                    EmbeddedChunk::new("a", vector_with_similarity(0.9)),
                    EmbeddedChunk::new("b", vector_with_similarity(0.8)),
                ],
            )
            .await
            .unwrap();
        store
            .insert_document(
                &second,
                &[EmbeddedChunk::new("c", vector_with_similarity(0.7))],
            )
            .await
            .unwrap();

        let result = retrieve_guides(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();
        assert_eq!(result.sources, vec!["faq", "onboarding"]);
    }

    #[tokio::test]
    async fn multimodal_results_carry_image_urls() {
        let store = InMemoryStore::new();
        let resource = Resource::new("wiring.html", None, 0);
        let sections = vec![
            SectionChunk {
                text: vec!["panel layout".into()],
                images: vec!["https://cdn.example.com/panel.png".into()],
            },
            SectionChunk {
                text: vec!["safety notes".into()],
                images: vec![],
            },
        ];
        let chunks = vec![
            EmbeddedSection::new("panel layout", 0, vector_with_similarity(0.9)),
            EmbeddedSection::new("safety notes", 1, vector_with_similarity(0.8)),
        ];
        store
            .insert_multimodal_document(&resource, &chunks, &sections)
            .await
            .unwrap();

        let guides = retrieve_multimodal(&store, &query(), &RetrievalPolicy::default())
            .await
            .unwrap();
        assert_eq!(guides.len(), 2);
        assert_eq!(guides[0].image_urls, vec!["https://cdn.example.com/panel.png"]);
        assert!(guides[1].image_urls.is_empty());
    }

    #[tokio::test]
    async fn custom_policy_is_honored() {
        let store = seed_store(&[0.9, 0.8, 0.7, 0.6]).await;
        let policy = RetrievalPolicy {
            similarity_threshold: 0.75,
            limit: 1,
        };
        let result = retrieve_guides(&store, &query(), &policy).await.unwrap();
        assert_eq!(result.guides.len(), 1);
        assert!((result.guides[0].similarity - 0.9).abs() < 1e-3);
    }

    #[test]
    fn source_label_strips_extension() {
        assert_eq!(source_label("guide.pdf"), "guide");
        assert_eq!(source_label("release.notes.html"), "release.notes");
        assert_eq!(source_label("no-extension"), "no-extension");
    }
}
