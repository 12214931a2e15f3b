//! Property tests for sentence-aligned chunking.

use adk_retrieval::Document;
use adk_retrieval::chunking::{Chunker, ChunkerConfig, SentenceChunker};
use proptest::prelude::*;

/// Sentences of 1..8 whitespace tokens, each ending in a period.
fn arb_sentences() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(proptest::collection::vec("[a-z]{1,6}", 1..8), 1..30).prop_map(
        |sentences| sentences.into_iter().map(|words| format!("{}.", words.join(" "))).collect(),
    )
}

/// A target size with an overlap strictly below it.
fn arb_config() -> impl Strategy<Value = ChunkerConfig> {
    (2usize..24).prop_flat_map(|target| {
        (0..target).prop_map(move |overlap| ChunkerConfig::new(target, overlap))
    })
}

fn token_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}

/// **Feature: adk-retrieval, Property: Chunk coverage**
/// *For any* text and valid configuration, chunks SHALL cover every sentence
/// in order without gaps, consecutive chunks SHALL share sentences exactly when
/// overlap is configured, and each chunk's token count SHALL equal the sum of
/// its sentences' counts.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_all_sentences_in_order(
            sentences in arb_sentences(),
            config in arb_config(),
        ) {
            let text = sentences.join(" ");
            let chunker = SentenceChunker::new(config).unwrap();
            let chunks = chunker.chunk(&text);

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start_sentence, 0);
            prop_assert_eq!(chunks[chunks.len() - 1].end_sentence, sentences.len());

            for chunk in &chunks {
                prop_assert!(chunk.start_sentence < chunk.end_sentence);
                let covered = &sentences[chunk.start_sentence..chunk.end_sentence];
                prop_assert_eq!(&chunk.text, &covered.join(" "));
                let expected: usize = covered.iter().map(|s| token_count(s)).sum();
                prop_assert_eq!(chunk.token_count, expected);
            }

            for pair in chunks.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                prop_assert!(next.end_sentence > prev.end_sentence);
                prop_assert!(next.start_sentence >= prev.start_sentence);
                if config.overlap == 0 {
                    prop_assert_eq!(next.start_sentence, prev.end_sentence);
                } else {
                    prop_assert!(next.start_sentence < prev.end_sentence);
                }
            }
        }

        #[test]
        fn without_overlap_only_single_sentences_exceed_target(
            sentences in arb_sentences(),
            target in 1usize..24,
        ) {
            let chunker = SentenceChunker::new(ChunkerConfig::new(target, 0)).unwrap();
            for chunk in chunker.chunk(&sentences.join(" ")) {
                prop_assert!(
                    chunk.token_count <= target || chunk.end_sentence - chunk.start_sentence == 1,
                    "chunk {:?} over target {}",
                    chunk,
                    target,
                );
            }
        }
    }
}

/// **Feature: adk-retrieval, Property: Oversized sentences**
/// *For any* configuration, a chunk over the target SHALL hold exactly one
/// sentence that was not inherited from the previous chunk.
mod prop_oversized_sentences {
    use super::*;

    /// Mixes short sentences with ones far above any generated target.
    fn arb_mixed_sentences() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec((1usize..4, prop::bool::weighted(0.25)), 1..30).prop_map(
            |shape| {
                shape
                    .into_iter()
                    .map(|(words, long)| {
                        let words = if long { words * 20 } else { words };
                        format!("{}.", vec!["word"; words].join(" "))
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn oversized_chunks_hold_one_new_sentence(
            sentences in arb_mixed_sentences(),
            config in arb_config(),
        ) {
            let chunker = SentenceChunker::new(config).unwrap();
            let chunks = chunker.chunk(&sentences.join(" "));

            let mut fresh_start = 0;
            for chunk in &chunks {
                if chunk.token_count > config.target_chunk_size {
                    prop_assert_eq!(chunk.end_sentence, fresh_start + 1, "{:?}", chunk);
                }
                fresh_start = chunk.end_sentence;
            }
        }
    }
}

#[test]
fn oversized_sentence_keeps_overlap_seed() {
    let chunker = SentenceChunker::new(ChunkerConfig::new(4, 2)).unwrap();
    let chunks = chunker.chunk("a b. c d. e f g h i j k l m n.");
    let ranges: Vec<(usize, usize)> =
        chunks.iter().map(|c| (c.start_sentence, c.end_sentence)).collect();
    assert_eq!(ranges, vec![(0, 2), (1, 3)]);
    assert_eq!(chunks[1].token_count, 12);

    let chunker = SentenceChunker::new(ChunkerConfig::new(4, 0)).unwrap();
    let ranges: Vec<(usize, usize)> = chunker
        .chunk("a b. c d. e f g h i j k l m n.")
        .iter()
        .map(|c| (c.start_sentence, c.end_sentence))
        .collect();
    assert_eq!(ranges, vec![(0, 2), (2, 3)]);
}

#[test]
fn chunk_document_carries_document_metadata() {
    let chunker = SentenceChunker::new(ChunkerConfig::new(4, 0)).unwrap();
    let mut document = Document::new("doc-7", "a b c. d e f. g h i.");
    document.metadata.insert("lang".to_string(), "en".into());

    let chunks = chunker.chunk_document(&document);
    assert_eq!(chunks.len(), 3);
    for (i, (chunk, metadata)) in chunks.iter().enumerate() {
        assert_eq!(chunk.token_count, 3);
        assert_eq!(metadata["lang"].as_str(), Some("en"));
        assert_eq!(metadata["document_id"].as_str(), Some("doc-7"));
        assert_eq!(metadata["chunk_index"].as_int(), Some(i as i64));
    }
}
