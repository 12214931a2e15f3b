//! Concurrent writers and readers against the shared indexes.

use std::collections::HashSet;
use std::sync::Arc;

use adk_retrieval::{
    Bm25Index, CollectionSchema, FieldSchema, InMemoryVectorStore, Metadata, Record,
    SearchRequest, SparseIndex, VectorStore,
};

const WRITERS: i64 = 64;
const BATCH: i64 = 10;

/// Document `i` has `i % 5 + 1` words and always contains `shared`.
fn text(i: i64) -> String {
    let mut words = vec!["shared".to_string()];
    words.extend((0..i % 5).map(|j| format!("w{j}")));
    words.join(" ")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bm25_adds_are_neither_lost_nor_duplicated() {
    let index = Arc::new(Bm25Index::new());

    let mut writers = Vec::new();
    for i in 0..WRITERS {
        let index = Arc::clone(&index);
        writers.push(tokio::spawn(async move {
            index.add(i, &text(i), Metadata::new()).await.unwrap();
        }));
    }
    let mut readers = Vec::new();
    for _ in 0..16 {
        let index = Arc::clone(&index);
        readers.push(tokio::spawn(async move {
            let results = index.search("shared", WRITERS as usize).await.unwrap();
            let ids: HashSet<i64> = results.iter().map(|r| r.id).collect();
            assert_eq!(ids.len(), results.len());
            assert!(results.iter().all(|r| r.score > 0.0));
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

            let stats = index.stats().await;
            assert!(stats.total_docs <= WRITERS as usize);
        }));
    }
    for handle in writers.into_iter().chain(readers) {
        handle.await.unwrap();
    }

    let stats = index.stats().await;
    assert_eq!(stats.total_docs, WRITERS as usize);
    let total_length: i64 = (0..WRITERS).map(|i| i % 5 + 1).sum();
    assert!((stats.avg_doc_length - total_length as f64 / WRITERS as f64).abs() < 1e-9);
    assert_eq!(index.doc_frequency("shared").await, WRITERS as usize);
    assert_eq!(index.search("shared", 1000).await.unwrap().len(), WRITERS as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn searches_never_observe_a_partial_insert() {
    let store = Arc::new(InMemoryVectorStore::new());
    let schema = CollectionSchema::new()
        .with_field(FieldSchema::primary_key("id", false))
        .with_field(FieldSchema::vector("v", 2));
    store.create_collection("c", schema).await.unwrap();

    let mut writers = Vec::new();
    for w in 0..WRITERS {
        let store = Arc::clone(&store);
        writers.push(tokio::spawn(async move {
            let records: Vec<Record> = (0..BATCH)
                .map(|j| {
                    let id = w * BATCH + j;
                    Record::new().with("id", id).with("v", vec![id as f32, 0.0])
                })
                .collect();
            let report = store.insert("c", records).await.unwrap();
            assert!(report.is_complete(), "{:?}", report.failed);
        }));
    }
    let mut readers = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            let request = SearchRequest::new(usize::MAX).with_vector("v", vec![0.0, 0.0]);
            let results = store.search("c", &request).await.unwrap();
            // Each insert call appends a whole batch or nothing.
            assert_eq!(results.len() % BATCH as usize, 0);
            let ids: HashSet<i64> = results.iter().map(|r| r.id).collect();
            assert_eq!(ids.len(), results.len());
            assert!(results.windows(2).all(|w| w[0].score <= w[1].score));
        }));
    }
    for handle in writers.into_iter().chain(readers) {
        handle.await.unwrap();
    }

    assert_eq!(store.count("c").await.unwrap(), (WRITERS * BATCH) as usize);
    let request = SearchRequest::new(usize::MAX).with_vector("v", vec![0.0, 0.0]);
    let ids: Vec<i64> = store.search("c", &request).await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, (0..WRITERS * BATCH).collect::<Vec<_>>());
}
