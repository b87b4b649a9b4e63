//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into chunks that respect a configurable
//! `max_tokens` limit. Splitting occurs on sentence boundaries — terminal
//! punctuation (`.`, `?`, `!`) followed by whitespace — and sentences are
//! greedily packed into a chunk until adding the next one would exceed the
//! bound.
//!
//! A single sentence that alone exceeds the bound becomes its own chunk;
//! sentences are never split mid-unit.
//!
//! # Example
//!
//! ```rust
//! use guidebase_core::chunk::chunk_sentences;
//!
//! let chunks = chunk_sentences("First point. Second point.", 1000);
//! assert_eq!(chunks, vec!["First point. Second point."]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::token::count_tokens;

/// Default per-chunk token bound.
pub const DEFAULT_MAX_TOKENS: usize = 1000;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.?!]\s+").expect("sentence boundary pattern is valid"));

/// Split text into sentences at terminal punctuation followed by whitespace.
///
/// The punctuation character stays with its sentence; the separating
/// whitespace (including newlines) is consumed. Fully-whitespace units are
/// dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // The matched punctuation is a single ASCII byte, so +1 stays on a
        // char boundary.
        let end = boundary.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Split `text` into sentence-packed chunks of at most `max_tokens` tokens.
///
/// # Guarantees
///
/// - Every chunk is non-empty after trimming.
/// - Every chunk's token count is ≤ `max_tokens`, except a chunk consisting
///   of exactly one oversized sentence.
/// - Sentence order is preserved and no non-empty sentence is dropped.
/// - Pure function of its inputs: the same text always chunks the same way.
pub fn chunk_sentences(text: &str, max_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let potential = format!("{current}{sentence} ");
        if count_tokens(&potential) > max_tokens {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = format!("{sentence} ");
            if count_tokens(&current) > max_tokens {
                // The sentence alone is over the bound: it becomes its own
                // chunk rather than being split mid-sentence.
                chunks.push(sentence.to_string());
                current.clear();
            }
        } else {
            current = potential;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_sentences("Hello, world.", 1000);
        assert_eq!(chunks, vec!["Hello, world."]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(chunk_sentences("", 1000).is_empty());
        assert!(chunk_sentences("   \n\n  ", 1000).is_empty());
    }

    #[test]
    fn sentences_join_under_huge_bound() {
        // Paragraph breaks between sentences collapse to single spaces.
        let chunks = chunk_sentences("A.\n\nB. C.", 100_000);
        assert_eq!(chunks, vec!["A. B. C."]);
    }

    #[test]
    fn splits_when_bound_exceeded() {
        let text = "This is the first sentence about one topic. \
                    This is the second sentence about another topic. \
                    And here is a third sentence to round things out.";
        let chunks = chunk_sentences(text, 12);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn chunk_token_counts_respect_bound() {
        let text = (0..40)
            .map(|i| format!("Sentence number {i} talks about topic {i}."))
            .collect::<Vec<_>>()
            .join(" ");
        let max = 30;
        for chunk in chunk_sentences(&text, max) {
            let sentences = split_sentences(&chunk);
            if sentences.len() > 1 {
                assert!(
                    count_tokens(&chunk) <= max,
                    "multi-sentence chunk over bound: {chunk:?}"
                );
            }
        }
    }

    #[test]
    fn oversized_sentence_becomes_own_chunk() {
        let oversized = format!("{} end.", "word ".repeat(50));
        let text = format!("Short one. {oversized} Short two.");
        let chunks = chunk_sentences(&text, 10);
        assert!(chunks.contains(&"Short one.".to_string()));
        assert!(
            chunks.iter().any(|c| c.contains("word word")),
            "oversized sentence was dropped: {chunks:?}"
        );
        // The oversized sentence stands alone rather than merging with its
        // neighbors.
        let big = chunks.iter().find(|c| c.contains("word word")).unwrap();
        assert!(!big.contains("Short"));
    }

    #[test]
    fn question_and_exclamation_are_boundaries() {
        let sentences = split_sentences("Really? Yes! Good.");
        assert_eq!(sentences, vec!["Really?", "Yes!", "Good."]);
    }

    #[test]
    fn coverage_preserves_all_sentences_in_order() {
        let text = "Alpha one. Beta two. Gamma three. Delta four. Epsilon five.";
        let expected = split_sentences(text)
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        let rejoined = chunk_sentences(text, 8)
            .iter()
            .flat_map(|c| split_sentences(c).into_iter().map(|s| s.to_string()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert_eq!(rejoined, expected);
    }

    #[test]
    fn deterministic() {
        let text = "One sentence here. Another sentence there. A third for good measure.";
        assert_eq!(chunk_sentences(text, 10), chunk_sentences(text, 10));
    }
}
