//! Property tests for the BM25 sparse index.

use adk_retrieval::bm25::Bm25Index;
use adk_retrieval::sparse::SparseIndex;
use adk_retrieval::value::Metadata;
use proptest::prelude::*;

const VOCABULARY: [&str; 5] = ["rust", "go", "zig", "fast", "safe"];

fn arb_text(max_words: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(VOCABULARY.to_vec()), 1..max_words)
        .prop_map(|words| words.join(" "))
}

/// Short documents over a small vocabulary so terms are shared across documents.
fn arb_corpus() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_text(10), 2..15)
}

async fn build(corpus: &[String]) -> Bm25Index {
    let index = Bm25Index::new();
    for (i, text) in corpus.iter().enumerate() {
        index.add(i as i64 + 1, text, Metadata::new()).await.unwrap();
    }
    index
}

/// **Feature: adk-retrieval, Property: BM25 add/remove round trip**
/// *For any* corpus, adding a document and then removing it SHALL leave the
/// index statistics and search results identical to never having added it.
mod prop_bm25_add_remove {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn remove_restores_previous_state(corpus in arb_corpus(), query in arb_text(4)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (with_removal, without, before, after) = rt.block_on(async {
                let (kept, last) = corpus.split_at(corpus.len() - 1);
                let full = build(corpus.as_slice()).await;
                full.remove(corpus.len() as i64).await.unwrap();
                let partial = build(kept).await;

                let before = full.stats().await;
                let after = partial.stats().await;
                let with_removal = full.search(&query, 20).await.unwrap();
                let without = partial.search(&query, 20).await.unwrap();
                assert!(!full.contains(corpus.len() as i64).await, "{last:?} still indexed");
                (with_removal, without, before, after)
            });

            prop_assert_eq!(before.total_docs, after.total_docs);
            prop_assert_eq!(before.vocabulary_size, after.vocabulary_size);
            prop_assert!((before.avg_doc_length - after.avg_doc_length).abs() < 1e-9);

            prop_assert_eq!(with_removal.len(), without.len());
            for (a, b) in with_removal.iter().zip(&without) {
                prop_assert_eq!(a.id, b.id);
                prop_assert!((a.score - b.score).abs() < 1e-9);
            }
        }

        #[test]
        fn scores_are_positive_and_sorted(corpus in arb_corpus(), top_k in 1usize..20) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                build(&corpus).await.search("rust safe", top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            for result in &results {
                prop_assert!(result.score > 0.0);
            }
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score > window[1].score
                        || (window[0].score == window[1].score && window[0].id < window[1].id)
                );
            }
        }
    }
}

#[tokio::test]
async fn rarer_terms_weigh_more() {
    let corpus: Vec<String> = vec![
        "rust go".to_string(),
        "rust zig".to_string(),
        "rust fast".to_string(),
        "rust safe".to_string(),
    ];
    let index = build(&corpus).await;

    assert_eq!(index.doc_frequency("rust").await, 4);
    assert_eq!(index.doc_frequency("zig").await, 1);
    assert!(index.idf("zig").await > index.idf("rust").await);
    // idf = ln(1 + (N - df + 0.5) / (df + 0.5)) stays positive even for universal terms.
    assert!(index.idf("rust").await > 0.0);

    let results = index.search("rust zig", 4).await.unwrap();
    assert_eq!(results[0].id, 2);
    assert_eq!(results[0].text(), Some("rust zig"));
}

#[tokio::test]
async fn upsert_replaces_terms() {
    let index = Bm25Index::new();
    index.add(1, "rust language", Metadata::new()).await.unwrap();
    index.upsert(1, "zig language", Metadata::new()).await.unwrap();

    assert_eq!(index.len().await, 1);
    assert!(index.search("rust", 5).await.unwrap().is_empty());
    assert_eq!(index.search("zig", 5).await.unwrap()[0].id, 1);
}
