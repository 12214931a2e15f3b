//! Token counting capabilities used for chunk sizing.
//!
//! The chunker only needs a token *count* per sentence, so counting is modeled
//! as a small capability trait. Approximate counters are cheap and
//! dependency-free; [`HuggingFaceTokenCounter`] (feature `tokenizers`) gives
//! exact sub-word counts matching the embedding model.
//!
//! Every implementation must return a non-negative count for any input and
//! `0` for the empty string.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Return the number of tokens in `text`. `count("")` must be `0`.
    fn count(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Approximates tokens as whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Approximates tokens as one token per `chars_per_token` characters, rounded up.
///
/// The common heuristic for English BPE vocabularies is four characters per token.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioTokenCounter {
    chars_per_token: usize,
}

impl CharRatioTokenCounter {
    /// Create a counter; a ratio of `0` is treated as `1`.
    pub fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token: chars_per_token.max(1) }
    }
}

impl Default for CharRatioTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for CharRatioTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

#[cfg(feature = "tokenizers")]
pub use hf::HuggingFaceTokenCounter;

#[cfg(feature = "tokenizers")]
mod hf {
    use std::path::Path;

    use tokenizers::Tokenizer;
    use tracing::warn;

    use super::{TokenCounter, WhitespaceTokenCounter};
    use crate::error::{Result, RetrievalError};

    /// Exact sub-word token counts from a HuggingFace `tokenizer.json`.
    ///
    /// Use the same tokenizer as the embedding model so that chunk sizes
    /// predict the model's input length.
    pub struct HuggingFaceTokenCounter {
        tokenizer: Tokenizer,
    }

    impl HuggingFaceTokenCounter {
        /// Load a tokenizer from a `tokenizer.json` file.
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let tokenizer = Tokenizer::from_file(path).map_err(|e| {
                RetrievalError::provider(
                    "tokenizers",
                    format!("failed to load tokenizer from {}: {e}", path.display()),
                )
            })?;
            Ok(Self { tokenizer })
        }

        pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
            Self { tokenizer }
        }
    }

    impl TokenCounter for HuggingFaceTokenCounter {
        fn count(&self, text: &str) -> usize {
            if text.is_empty() {
                return 0;
            }
            // Special tokens are excluded so counts add up across sentences.
            counted(self.tokenizer.encode(text, false).map(|encoding| encoding.len()), text)
        }
    }

    /// A failed encode falls back to the whitespace count so chunks stay bounded.
    fn counted<E: std::fmt::Display>(encoded: std::result::Result<usize, E>, text: &str) -> usize {
        encoded.unwrap_or_else(|e| {
            warn!(error = %e, "tokenizer failed to encode text, using whitespace count");
            WhitespaceTokenCounter.count(text)
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_counts_zero() {
        assert_eq!(WhitespaceTokenCounter.count(""), 0);
        assert_eq!(CharRatioTokenCounter::default().count(""), 0);
        assert_eq!((|t: &str| t.len()).count(""), 0);
    }

    #[test]
    fn whitespace_counter_ignores_runs_of_whitespace() {
        assert_eq!(WhitespaceTokenCounter.count("  the quick\n\tbrown   fox "), 4);
    }

    #[test]
    fn char_ratio_rounds_up() {
        let counter = CharRatioTokenCounter::new(4);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
        assert_eq!(CharRatioTokenCounter::new(0).count("abc"), 3);
    }
}
