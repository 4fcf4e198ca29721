//! Tests for the per-collection vector index.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use proptest::prelude::*;
use ragdesk_rag::document::{Chunk, SourceType};
use ragdesk_rag::index::VectorIndex;
use ragdesk_rag::inmemory::InMemoryVectorStore;
use ragdesk_rag::vectorstore::VectorStore;

use common::{FailingEmbedder, TableEmbedder, at_similarity, entry, metadata, no_retry};

fn index_with(embedder: TableEmbedder) -> (VectorIndex, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let index = VectorIndex::new(store.clone(), Arc::new(embedder)).with_retry(no_retry());
    (index, store)
}

fn chunk(text: &str, source: &str, page: Option<u32>, chunk_index: usize) -> Chunk {
    let mut metadata = metadata(source, page, SourceType::Document);
    metadata.chunk_index = chunk_index;
    Chunk { text: text.to_string(), metadata }
}

#[tokio::test]
async fn create_or_get_is_idempotent() {
    let (index, store) = index_with(TableEmbedder::new());

    let first = index.create_or_get("documents").await.unwrap();
    let second = index.create_or_get("documents").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.dimensions, common::DIM);
    assert_eq!(store.list_collections().await.unwrap(), vec!["documents"]);
}

#[tokio::test]
async fn add_assigns_ids_and_drops_blank_text() {
    let (index, store) = index_with(TableEmbedder::new());
    let chunks = vec![
        chunk("Deductible is $500.", "plans/gold.pdf", Some(2), 0),
        chunk("   ", "plans/gold.pdf", Some(2), 1),
        chunk("Copay is $20.", "plans/gold.pdf", Some(2), 2),
    ];

    let added = index.add("documents", &chunks).await.unwrap();

    assert_eq!(added, 2);
    assert_eq!(store.count("documents").await.unwrap(), 2);
    let results = index.query("documents", "deductible", 10, 0.0).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.content.trim().is_empty()));
}

#[tokio::test]
async fn add_embeds_in_bounded_batches() {
    let embedder = Arc::new(TableEmbedder::new());
    let store = Arc::new(InMemoryVectorStore::new());
    let index = VectorIndex::new(store, embedder.clone()).with_batch_size(4);
    let chunks: Vec<Chunk> =
        (0..10).map(|i| chunk(&format!("passage {i}"), "notes.txt", None, i)).collect();

    assert_eq!(index.add("documents", &chunks).await.unwrap(), 10);
    assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![4, 4, 2]);
}

#[tokio::test]
async fn colliding_ids_are_suffixed_not_dropped() {
    let (index, store) = index_with(TableEmbedder::new());
    index.add_entries("documents", vec![entry("doc_a", "stored", vec![1.0, 0.0])]).await.unwrap();

    let incoming = vec![
        entry("doc_a", "one", vec![1.0, 0.0]),
        entry("doc_a", "two", vec![1.0, 0.0]),
        entry("doc_b", "three", vec![1.0, 0.0]),
        entry("doc_b", "four", vec![1.0, 0.0]),
    ];
    let added = index.add_entries("documents", incoming).await.unwrap();

    assert_eq!(added, 4);
    assert_eq!(store.count("documents").await.unwrap(), 5);
    let expected = ["doc_a", "doc_a_1", "doc_a_2", "doc_b", "doc_b_1"];
    let found = store.existing_ids("documents", &expected).await.unwrap();
    assert_eq!(found.len(), expected.len());
}

#[tokio::test]
async fn query_converts_distance_and_applies_threshold() {
    let embedder = TableEmbedder::new()
        .with("close", at_similarity(0.95))
        .with("related", at_similarity(0.7))
        .with("distant", at_similarity(0.2));
    let (index, _) = index_with(embedder);
    let entries = vec![
        entry("c", "close", Vec::new()),
        entry("r", "related", Vec::new()),
        entry("d", "distant", Vec::new()),
    ];
    index.add_entries("documents", entries).await.unwrap();

    let results = index.query("documents", "question", 5, 0.6).await.unwrap();

    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["close", "related"]);
    assert!((results[0].similarity - 0.95).abs() < 1e-4);
    assert!((results[1].similarity - 0.7).abs() < 1e-4);
}

#[tokio::test]
async fn high_threshold_yields_nothing() {
    let (index, _) = index_with(TableEmbedder::new().with("related", at_similarity(0.7)));
    index.add_entries("documents", vec![entry("r", "related", Vec::new())]).await.unwrap();

    assert!(index.query("documents", "question", 5, 0.9).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_or_empty_collections_return_no_results() {
    let embedder = Arc::new(TableEmbedder::new());
    let index = VectorIndex::new(Arc::new(InMemoryVectorStore::new()), embedder.clone());

    assert!(index.query("nowhere", "question", 5, 0.0).await.unwrap().is_empty());
    index.create_or_get("empty").await.unwrap();
    assert!(index.query("empty", "question", 5, 0.0).await.unwrap().is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn query_embedding_failure_propagates() {
    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection("documents", common::DIM).await.unwrap();
    store.insert("documents", &[entry("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
    let index = VectorIndex::new(store, Arc::new(FailingEmbedder)).with_retry(no_retry());

    assert!(index.query("documents", "question", 5, 0.0).await.is_err());
    assert!(index.add("documents", &[chunk("text", "a.txt", None, 0)]).await.is_err());
}

#[tokio::test]
async fn reset_empties_only_the_named_collection() {
    let (index, _) = index_with(TableEmbedder::new());
    for name in ["documents", "web_documents"] {
        index.add(name, &[chunk("shared text", "a.txt", None, 0)]).await.unwrap();
    }

    index.reset("documents").await.unwrap();

    assert_eq!(index.info("documents").await.unwrap().count, 0);
    assert_eq!(index.info("web_documents").await.unwrap().count, 1);
    let names: HashSet<String> = index.list_collections().await.unwrap().into_iter().collect();
    assert_eq!(names, HashSet::from(["documents".to_string(), "web_documents".to_string()]));
}

#[tokio::test]
async fn delete_removes_entries_by_id() {
    let (index, _) = index_with(TableEmbedder::new());
    index
        .add_entries(
            "documents",
            vec![entry("a", "alpha", vec![1.0, 0.0]), entry("b", "beta", vec![1.0, 0.0])],
        )
        .await
        .unwrap();

    index.delete("documents", &["a"]).await.unwrap();

    let info = index.info("documents").await.unwrap();
    assert_eq!((info.name.as_str(), info.count), ("documents", 1));
}

/// **Property: query results are threshold-filtered similarities**
/// *For any* stored similarities and threshold, every result lies in
/// `[0, 1]`, meets the threshold and comes back in descending order.
mod prop_query_similarity {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn results_are_bounded_filtered_and_sorted(
            similarities in proptest::collection::vec(-1.0f32..1.0f32, 1..15),
            threshold in 0.0f32..1.0f32,
            top_k in 1usize..20,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let (index, _) = index_with(TableEmbedder::new());
                let entries = similarities
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let angle = s.clamp(-1.0, 1.0).acos();
                        entry(&format!("e{i}"), &format!("passage {i}"), vec![angle.cos(), angle.sin()])
                    })
                    .collect();
                index.add_entries("documents", entries).await.unwrap();
                index.query("documents", "question", top_k, threshold).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            for result in &results {
                prop_assert!((0.0..=1.0).contains(&result.similarity));
                prop_assert!(result.similarity >= threshold);
            }
            for pair in results.windows(2) {
                prop_assert!(pair[0].similarity >= pair[1].similarity);
            }
        }
    }
}

#[tokio::test]
async fn delete_collection_forgets_the_handle() {
    let (index, store) = index_with(TableEmbedder::new());
    index.add("documents", &[chunk("shared text", "a.txt", None, 0)]).await.unwrap();

    index.delete_collection("documents").await.unwrap();

    assert!(!store.has_collection("documents").await.unwrap());
    assert!(index.query("documents", "question", 5, 0.0).await.unwrap().is_empty());
    // The next add recreates the collection instead of trusting a stale handle.
    assert_eq!(index.add("documents", &[chunk("again", "a.txt", None, 0)]).await.unwrap(), 1);
    assert_eq!(index.info("documents").await.unwrap().count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_with_the_same_id_keep_every_entry() {
    let (index, store) = index_with(TableEmbedder::new());
    let index = Arc::new(index);
    index.create_or_get("documents").await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let index = index.clone();
            tokio::spawn(async move {
                index
                    .add_entries("documents", vec![entry("dup", &format!("passage {i}"), vec![1.0, 0.0])])
                    .await
            })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        assert_eq!(result.unwrap().unwrap(), 1);
    }

    assert_eq!(store.count("documents").await.unwrap(), 20);
}
