//! Token counting for chunk-size bounds.
//!
//! Uses the `cl100k_base` BPE from `tiktoken-rs` — the same tokenizer family
//! the upstream embedding models expect as input granularity. This is an
//! approximation of each model's own tokenizer; chunk bounds care about the
//! order of magnitude, not exact token identity.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

static BPE: Lazy<CoreBPE> =
    Lazy::new(|| cl100k_base().expect("cl100k_base vocabulary is bundled with tiktoken-rs"));

/// Count the BPE tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    BPE.encode_with_special_tokens(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn counts_grow_with_text() {
        let short = count_tokens("hello");
        let long = count_tokens("hello world, this is a longer sentence with more words");
        assert!(short >= 1);
        assert!(long > short);
    }

    #[test]
    fn deterministic() {
        let text = "The same input always counts the same.";
        assert_eq!(count_tokens(text), count_tokens(text));
    }
}
