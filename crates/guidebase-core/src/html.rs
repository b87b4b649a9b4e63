//! Structure-aware HTML chunker.
//!
//! Operates only inside a designated content container (default
//! `div.page-content`) and walks its direct child elements in document
//! order. A top-level heading is a hard boundary that always starts a new
//! chunk, even when the current chunk is far under the token bound;
//! non-heading elements contribute their visible text, greedily packed the
//! same way as the sentence chunker.
//!
//! Two variants share the walk:
//!
//! - [`HtmlChunker::chunk`] — plain text chunks, `h1` boundaries.
//! - [`HtmlChunker::chunk_sections`] — multimodal [`SectionChunk`]s with
//!   `h1`/`h2` boundaries and the image URLs found directly or nested
//!   inside non-heading elements.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

use crate::models::SectionChunk;
use crate::token::count_tokens;

/// Default content container selector.
pub const DEFAULT_CONTAINER: &str = "div.page-content";

/// Token-bounded chunker over a parsed HTML document.
pub struct HtmlChunker {
    container: Selector,
    images: Selector,
    max_tokens: usize,
}

impl HtmlChunker {
    /// Build a chunker scoped to `container` (a CSS selector) with the given
    /// per-chunk token bound.
    pub fn new(container: &str, max_tokens: usize) -> Result<Self> {
        let container = Selector::parse(container)
            .map_err(|e| anyhow!("invalid container selector {container:?}: {e}"))?;
        let images =
            Selector::parse("img").map_err(|e| anyhow!("invalid image selector: {e}"))?;
        Ok(Self {
            container,
            images,
            max_tokens,
        })
    }

    /// Chunker with the default `div.page-content` container.
    pub fn with_defaults(max_tokens: usize) -> Self {
        Self::new(DEFAULT_CONTAINER, max_tokens)
            .expect("default container selector parses")
    }

    /// Split an HTML document into text chunks.
    ///
    /// An `h1` always starts a new chunk; other elements are packed until
    /// the token bound would be exceeded. Chunks that are empty after
    /// trimming are dropped. A document without the content container
    /// yields no chunks.
    pub fn chunk(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let mut chunks = Vec::new();

        let Some(container) = doc.select(&self.container).next() else {
            return chunks;
        };

        let mut current = String::new();
        for node in container.children() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if el.value().name() == "h1" {
                push_trimmed(&mut chunks, &current);
                current = format!("{}\n\n", element_text(&el));
            } else {
                let text = element_text(&el);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let potential = format!("{current}{text}\n\n");
                if count_tokens(&potential) > self.max_tokens {
                    push_trimmed(&mut chunks, &current);
                    current = format!("{text}\n\n");
                } else {
                    current = potential;
                }
            }
        }
        push_trimmed(&mut chunks, &current);

        chunks
    }

    /// Split an HTML document into multimodal sections.
    ///
    /// `h1` and `h2` are boundaries. Each section collects the non-empty
    /// trimmed text lines of its elements plus any image URLs found within
    /// them; a section with neither text nor images is dropped.
    pub fn chunk_sections(&self, html: &str) -> Vec<SectionChunk> {
        let doc = Html::parse_document(html);
        let mut chunks = Vec::new();

        let Some(container) = doc.select(&self.container).next() else {
            return chunks;
        };

        let mut current = SectionChunk::default();
        for node in container.children() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let name = el.value().name();
            if name == "h1" || name == "h2" {
                push_section(&mut chunks, std::mem::take(&mut current));
                current.text.extend(text_lines(&el));
            } else {
                let lines = text_lines(&el);
                let images = self.collect_images(&el);
                if lines.is_empty() && images.is_empty() {
                    continue;
                }
                if !lines.is_empty() && !current.text.is_empty() {
                    let potential = format!("{}\n{}", current.text.join("\n"), lines.join("\n"));
                    if count_tokens(&potential) > self.max_tokens {
                        push_section(&mut chunks, std::mem::take(&mut current));
                    }
                }
                current.text.extend(lines);
                current.images.extend(images);
            }
        }
        push_section(&mut chunks, current);

        chunks
    }

    /// Image URLs on `el` itself or any of its descendants.
    fn collect_images(&self, el: &ElementRef) -> Vec<String> {
        let mut urls = Vec::new();
        if el.value().name() == "img" {
            if let Some(src) = el.value().attr("src") {
                urls.push(src.to_string());
            }
        }
        for img in el.select(&self.images) {
            if let Some(src) = img.value().attr("src") {
                urls.push(src.to_string());
            }
        }
        urls
    }
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
}

/// Non-empty trimmed lines of an element's visible text.
fn text_lines(el: &ElementRef) -> Vec<String> {
    element_text(el)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_trimmed(chunks: &mut Vec<String>, current: &str) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn push_section(chunks: &mut Vec<SectionChunk>, section: SectionChunk) {
    if !section.is_empty() {
        chunks.push(section);
    }
}
