//! Remote embedding providers.
//!
//! Concrete implementations of the core embedding traits:
//!
//! - **[`GeminiEmbedder`]** — text pipeline, Google's `text-embedding-004`
//!   via `batchEmbedContents` / `embedContent`.
//! - **[`VoyageEmbedder`]** — multimodal pipeline, `voyage-multimodal-3`,
//!   passing the explicit `input_type` (`document` vs `query`) the
//!   asymmetric model requires.
//! - **[`StubTextEmbedder`]** / **[`StubMultimodalEmbedder`]** — offline
//!   deterministic vectors for tests and local smoke runs.
//!
//! Providers make one HTTP call per request and perform **no retries**:
//! rate limits, timeouts, and malformed responses propagate to the caller,
//! which owns any retry policy. Clients are constructed once at startup and
//! injected where needed.
//!
//! API keys come from the environment: `GEMINI_API_KEY` and
//! `VOYAGE_API_KEY`, checked at construction.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use guidebase_core::embedding::{
    ensure_dims, normalize_query_text, MultimodalEmbedder, TextEmbedder,
};
use guidebase_core::models::SectionChunk;

use crate::config::ProviderConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const VOYAGE_URL: &str = "https://api.voyageai.com/v1/multimodalembeddings";

/// Create the configured text-pipeline embedder.
pub fn create_text_embedder(config: &ProviderConfig) -> Result<Box<dyn TextEmbedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiEmbedder::new(config)?)),
        "stub" => Ok(Box::new(StubTextEmbedder::new(config.dims))),
        other => bail!("Unknown text embedding provider: {other}"),
    }
}

/// Create the configured multimodal-pipeline embedder.
pub fn create_multimodal_embedder(config: &ProviderConfig) -> Result<Box<dyn MultimodalEmbedder>> {
    match config.provider.as_str() {
        "voyage" => Ok(Box::new(VoyageEmbedder::new(config)?)),
        "stub" => Ok(Box::new(StubMultimodalEmbedder::new(config.dims))),
        other => bail!("Unknown multimodal embedding provider: {other}"),
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ Gemini (text pipeline) ============

/// Text embedding provider backed by the Gemini embeddings API.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is not in the environment.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            base_url: config.url.clone().unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key,
            client: build_client(config.timeout_secs)?,
        })
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!(
            "{}/models/{}:{}?key={}",
            self.base_url, self.model, endpoint, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {status}: {body_text}");
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TextEmbedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let json = self
            .post("batchEmbedContents", serde_json::json!({ "requests": requests }))
            .await?;

        let vectors = parse_gemini_batch_response(&json)?;
        ensure_dims(&vectors, self.dims)?;
        if vectors.len() != texts.len() {
            bail!(
                "Gemini returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = normalize_query_text(text);
        let json = self
            .post(
                "embedContent",
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": input }] },
                }),
            )
            .await?;

        let vector = parse_gemini_single_response(&json)?;
        ensure_dims(std::slice::from_ref(&vector), self.dims)?;
        Ok(vector)
    }
}

/// Parse a `batchEmbedContents` response: `embeddings[].values`.
fn parse_gemini_batch_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            item.get("values")
                .and_then(|v| v.as_array())
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect()
                })
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))
        })
        .collect()
}

/// Parse an `embedContent` response: `embedding.values`.
fn parse_gemini_single_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    json.get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect()
        })
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding"))
}

// ============ Voyage (multimodal pipeline) ============

/// Multimodal embedding provider backed by the Voyage AI API.
///
/// Voyage's multimodal models are asymmetric: the wire-level `input_type`
/// must be `"document"` when indexing and `"query"` when searching. Getting
/// this wrong silently degrades retrieval quality, so the two cases are
/// separate trait methods and never inferred.
pub struct VoyageEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl VoyageEmbedder {
    /// # Errors
    ///
    /// Returns an error if `VOYAGE_API_KEY` is not in the environment.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var("VOYAGE_API_KEY")
            .map_err(|_| anyhow!("VOYAGE_API_KEY environment variable not set"))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config.url.clone().unwrap_or_else(|| VOYAGE_URL.to_string()),
            api_key,
            client: build_client(config.timeout_secs)?,
        })
    }

    async fn post(&self, inputs: Vec<serde_json::Value>, input_type: &str) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "inputs": inputs,
            "model": self.model,
            "input_type": input_type,
            "output_dimension": self.dims,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Voyage API error {status}: {body_text}");
        }

        let json: serde_json::Value = response.json().await?;
        let vectors = parse_voyage_response(&json)?;
        ensure_dims(&vectors, self.dims)?;
        Ok(vectors)
    }
}

#[async_trait]
impl MultimodalEmbedder for VoyageEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, sections: &[SectionChunk]) -> Result<Vec<Vec<f32>>> {
        if sections.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<serde_json::Value> = sections.iter().map(section_to_input).collect();
        let vectors = self.post(inputs, "document").await?;
        if vectors.len() != sections.len() {
            bail!(
                "Voyage returned {} embeddings for {} inputs",
                vectors.len(),
                sections.len()
            );
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = normalize_query_text(text);
        let inputs = vec![serde_json::json!({
            "content": [{ "type": "text", "text": input }],
        })];
        let mut vectors = self.post(inputs, "query").await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Build one Voyage multimodal input from a section: its joined text (when
/// any) followed by its image references.
fn section_to_input(section: &SectionChunk) -> serde_json::Value {
    let mut content = Vec::new();
    let text = section.content();
    if !text.is_empty() {
        content.push(serde_json::json!({ "type": "text", "text": text }));
    }
    for url in &section.images {
        content.push(serde_json::json!({ "type": "image_url", "image_url": url }));
    }
    serde_json::json!({ "content": content })
}

/// Parse a Voyage embeddings response: `data[].embedding`.
fn parse_voyage_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid Voyage response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect()
                })
                .ok_or_else(|| anyhow!("Invalid Voyage response: missing embedding"))
        })
        .collect()
}

// ============ Stub providers ============

/// Deterministic offline vectors derived from the input text. The same
/// input always embeds the same way, which is all retrieval tests need.
fn stub_vector(text: &str, dims: usize) -> Vec<f32> {
    // FNV-1a over the text seeds a simple LCG.
    let mut state = text
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        });

    (0..dims)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) as f64 / f64::from(u32::MAX) * 2.0 - 1.0) as f32
        })
        .collect()
}

/// Offline text-pipeline embedder for tests and smoke runs.
pub struct StubTextEmbedder {
    dims: usize,
}

impl StubTextEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl TextEmbedder for StubTextEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| stub_vector(t, self.dims)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(stub_vector(&normalize_query_text(text), self.dims))
    }
}

/// Offline multimodal-pipeline embedder for tests and smoke runs.
pub struct StubMultimodalEmbedder {
    dims: usize,
}

impl StubMultimodalEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl MultimodalEmbedder for StubMultimodalEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, sections: &[SectionChunk]) -> Result<Vec<Vec<f32>>> {
        Ok(sections
            .iter()
            .map(|s| stub_vector(&s.content(), self.dims))
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(stub_vector(&normalize_query_text(text), self.dims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_batch_response_parses() {
        let json = serde_json::json!({
            "embeddings": [
                { "values": [0.1, 0.2] },
                { "values": [0.3, 0.4] },
            ]
        });
        let vectors = parse_gemini_batch_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[test]
    fn gemini_single_response_parses() {
        let json = serde_json::json!({ "embedding": { "values": [1.0, -1.0] } });
        assert_eq!(parse_gemini_single_response(&json).unwrap(), vec![1.0, -1.0]);
    }

    #[test]
    fn malformed_gemini_response_is_an_error() {
        let json = serde_json::json!({ "unexpected": true });
        assert!(parse_gemini_batch_response(&json).is_err());
        assert!(parse_gemini_single_response(&json).is_err());
    }

    #[test]
    fn voyage_response_parses() {
        let json = serde_json::json!({
            "data": [{ "embedding": [0.5, 0.6] }]
        });
        let vectors = parse_voyage_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.6]]);
    }

    #[test]
    fn section_input_orders_text_before_images() {
        let section = SectionChunk {
            text: vec!["line one".into(), "line two".into()],
            images: vec!["https://cdn.example.com/a.png".into()],
        };
        let input = section_to_input(&section);
        let content = input["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "line one\nline two");
        assert_eq!(content[1]["type"], "image_url");
    }

    #[test]
    fn image_only_section_has_no_text_item() {
        let section = SectionChunk {
            text: vec![],
            images: vec!["https://cdn.example.com/a.png".into()],
        };
        let input = section_to_input(&section);
        let content = input["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "image_url");
    }

    #[test]
    fn stub_vectors_are_deterministic() {
        assert_eq!(stub_vector("same input", 8), stub_vector("same input", 8));
        assert_ne!(stub_vector("one", 8), stub_vector("two", 8));
        assert_eq!(stub_vector("anything", 16).len(), 16);
    }

    #[tokio::test]
    async fn stub_query_normalizes_escaped_newlines() {
        let embedder = StubTextEmbedder::new(8);
        let with_escape = embedder.embed_query("a\\nb").await.unwrap();
        let with_space = embedder.embed_query("a b").await.unwrap();
        assert_eq!(with_escape, with_space);
    }
}
