//! Property and behavior tests for the in-memory vector store.

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use ragdesk_rag::document::IndexEntry;
use ragdesk_rag::inmemory::InMemoryVectorStore;
use ragdesk_rag::vectorstore::VectorStore;

use common::entry;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an entry with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = IndexEntry> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim))
        .prop_map(|(id, text, embedding)| entry(&id, &text, embedding))
}

/// **Property: search ordering**
/// *For any* set of stored entries, searching returns at most `top_k`
/// neighbors ordered by ascending cosine distance, with every distance in
/// `[0, 2]`.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_by_distance_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();

                // Inserting a duplicate id is rejected, so keep the first of each.
                let mut deduped: HashMap<String, IndexEntry> = HashMap::new();
                for e in &entries {
                    deduped.entry(e.id.clone()).or_insert_with(|| e.clone());
                }
                let unique: Vec<IndexEntry> = deduped.into_values().collect();
                let count = unique.len();

                store.insert("test", &unique).await.unwrap();
                (store.search("test", &query, top_k).await.unwrap(), count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= unique_count);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for neighbor in &results {
                prop_assert!((-1e-5..=2.0 + 1e-5).contains(&neighbor.distance));
            }
            for pair in results.windows(2) {
                prop_assert!(
                    pair[0].distance <= pair[1].distance,
                    "not ascending: {} then {}",
                    pair[0].distance,
                    pair[1].distance
                );
            }
        }
    }
}

#[tokio::test]
async fn missing_collection_is_an_error() {
    let store = InMemoryVectorStore::new();
    assert!(store.search("nope", &[1.0, 0.0], 3).await.is_err());
    assert!(store.count("nope").await.is_err());
    assert!(!store.has_collection("nope").await.unwrap());
}

#[tokio::test]
async fn insert_is_all_or_nothing() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2).await.unwrap();
    store.insert("docs", &[entry("a", "alpha", vec![1.0, 0.0])]).await.unwrap();

    let batch = vec![entry("b", "beta", vec![0.0, 1.0]), entry("a", "again", vec![1.0, 0.0])];
    assert!(store.insert("docs", &batch).await.is_err());
    assert_eq!(store.count("docs").await.unwrap(), 1);

    let wrong_dims = vec![entry("c", "gamma", vec![1.0, 0.0, 0.0])];
    assert!(store.insert("docs", &wrong_dims).await.is_err());
    assert_eq!(store.count("docs").await.unwrap(), 1);
}

#[tokio::test]
async fn reset_only_touches_the_named_collection() {
    let store = InMemoryVectorStore::new();
    for name in ["docs", "web"] {
        store.create_collection(name, 2).await.unwrap();
        store.insert(name, &[entry("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
    }

    store.reset_collection("docs", 2).await.unwrap();

    assert_eq!(store.count("docs").await.unwrap(), 0);
    assert_eq!(store.count("web").await.unwrap(), 1);
    assert_eq!(store.list_collections().await.unwrap(), vec!["docs", "web"]);
}

#[tokio::test]
async fn equal_distances_are_ordered_by_id() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2).await.unwrap();
    let entries = vec![
        entry("c", "same", vec![1.0, 0.0]),
        entry("a", "same", vec![1.0, 0.0]),
        entry("b", "same", vec![1.0, 0.0]),
    ];
    store.insert("docs", &entries).await.unwrap();

    let ids: Vec<String> = store
        .search("docs", &[1.0, 0.0], 3)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.entry.id)
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn existing_ids_and_delete() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2).await.unwrap();
    store
        .insert("docs", &[entry("a", "alpha", vec![1.0, 0.0]), entry("b", "beta", vec![0.0, 1.0])])
        .await
        .unwrap();

    let found = store.existing_ids("docs", &["a", "z"]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(found.contains("a"));

    store.delete("docs", &["a"]).await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 1);
    assert!(store.existing_ids("docs", &["a"]).await.unwrap().is_empty());
}
