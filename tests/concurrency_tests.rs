//! Queries, ingestion and rebuilds running at the same time.

use std::sync::Arc;

use lexrag::{EngineConfig, Query, RagEngine, RawDocument, RetrievalConfig};

fn engine() -> Arc<RagEngine> {
    Arc::new(
        RagEngine::new(EngineConfig {
            retrieval: RetrievalConfig {
                min_relevance_score: 0.0,
                ..RetrievalConfig::default()
            },
            ..EngineConfig::default()
        })
        .unwrap(),
    )
}

fn batch(tag: usize, size: usize) -> Vec<RawDocument> {
    (0..size)
        .map(|i| RawDocument::new(format!("batch {tag} document {i} on lease termination notice")))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_keep_ids_unique_and_contiguous() {
    let engine = engine();
    let tasks: Vec<_> = (0..8)
        .map(|tag| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ingest(batch(tag, 25)).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        let summary = task.await.unwrap();
        assert_eq!(summary.accepted, 25);
        // Each batch is appended under one lock, so its ids are consecutive.
        for pair in summary.ids.windows(2) {
            assert_eq!(pair[0].as_u64() + 1, pair[1].as_u64());
        }
        ids.extend(summary.ids);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(engine.store().len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queries_see_a_whole_snapshot_during_rebuilds() {
    let engine = engine();
    engine.ingest(batch(0, 50)).await.unwrap();
    engine.rebuild_index().await.unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for tag in 1..=5 {
                engine.ingest(batch(tag, 10)).await.unwrap();
                engine.rebuild_index().await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..20 {
                    let response = engine
                        .query(Query::new("lease termination notice"))
                        .await
                        .unwrap();
                    let meta = &response.processing_metadata;
                    // Snapshot size always matches one of the published generations.
                    assert_eq!(meta.indexed_vectors as u64, 40 + 10 * meta.index_generation);
                    assert_eq!(response.sources.len(), 5);
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let stats = engine.stats();
    assert_eq!(stats.total_queries, 160);
    assert_eq!(stats.indexed_vectors, 100);
    assert_eq!(stats.index_generation, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_rebuilds_are_serialized() {
    let engine = engine();
    engine.ingest(batch(0, 30)).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.rebuild_index().await.unwrap() })
        })
        .collect();
    let mut generations = Vec::new();
    for task in tasks {
        let stats = task.await.unwrap();
        assert_eq!(stats.len, 30);
        generations.push(stats.generation);
    }
    generations.sort();
    assert_eq!(generations, vec![1, 2, 3, 4]);
}
