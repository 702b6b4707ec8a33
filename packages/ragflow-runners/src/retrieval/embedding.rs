//! Embedding fan-out (§4.7): batches a document list through an
//! `EmbeddingService`, capped at the service's `max_batch_size`, and
//! reassembles results in the caller's original order regardless of which
//! batch finishes first — the reassembly key is the input index, never
//! completion order.
//!
//! Dimension probing (§4.7): the first embed call for a given (provider,
//! model) pair is cached process-wide in a `DashMap`, the one piece of
//! genuinely global mutable state the concurrency model allows (§5).

use dashmap::DashMap;
use futures::future::try_join_all;
use once_cell::sync::Lazy;
use ragflow_core::{FlowError, Result};

use crate::interfaces::EmbeddingService;

/// Process-wide cache of `(provider, model) -> embedding dimension`, probed
/// once per pair and never invalidated for the life of the process.
static DIMENSION_CACHE: Lazy<DashMap<String, usize>> = Lazy::new(DashMap::new);

/// Embed `texts` preserving order (P3): the output vector's `i`-th entry is
/// always the embedding of `texts[i]`, no matter how the underlying batches
/// complete relative to one another.
///
/// # Errors
/// `FlowError::EmptyInput` if `texts` is empty. `FlowError::Other` wrapping
/// a `BatchProcessingError`-shaped message naming the failing batch's index
/// and size if any batch's embed call fails; no partial output is returned.
pub async fn embed_documents_ordered(
    service: &dyn EmbeddingService,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Err(FlowError::EmptyInput("embed_documents".to_string()));
    }

    let batch_size = service.max_batch_size().max(1);
    let batches: Vec<(usize, &[String])> = texts.chunks(batch_size).enumerate().collect();

    let results = try_join_all(batches.into_iter().map(|(batch_index, chunk)| async move {
        service.embed(chunk).await.map_err(|err| {
            FlowError::Other(anyhow::anyhow!(
                "batch processing error: batch {batch_index} ({} documents) failed: {err}",
                chunk.len()
            ))
        })
    }))
    .await?;

    let mut ordered = Vec::with_capacity(texts.len());
    for batch in results {
        ordered.extend(batch);
    }
    Ok(ordered)
}

/// Embed a single query string. Thin wrapper kept distinct from
/// `embed_documents_ordered` because runners call it on the single-item
/// happy path and the batching machinery would be pure overhead.
pub async fn embed_query(service: &dyn EmbeddingService, text: &str) -> Result<Vec<f32>> {
    let mut result = service.embed(std::slice::from_ref(&text.to_string())).await?;
    result
        .pop()
        .ok_or_else(|| FlowError::Other(anyhow::anyhow!("embedding service returned no vector")))
}

/// Probe and cache the output dimension of `(provider_key, model)`, or
/// return the cached value if this pair has already been probed once this
/// process.
pub async fn probe_dimension(
    service: &dyn EmbeddingService,
    provider_key: &str,
    model: &str,
) -> Result<usize> {
    let cache_key = format!("{provider_key}:{model}");
    if let Some(dim) = DIMENSION_CACHE.get(&cache_key) {
        return Ok(*dim);
    }
    let probe = embed_query(service, "dimension probe").await?;
    let dim = probe.len();
    DIMENSION_CACHE.insert(cache_key, dim);
    Ok(dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeEmbedder {
        max_batch: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn max_batch_size(&self) -> usize {
            self.max_batch
        }
    }

    #[tokio::test]
    async fn preserves_order_across_multiple_batches() {
        let embedder = FakeEmbedder {
            max_batch: 2,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let texts: Vec<String> = vec!["a".into(), "bb".into(), "ccc".into(), "dddd".into(), "e".into()];
        let result = embed_documents_ordered(&embedder, &texts).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        let lengths: Vec<f32> = result.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 1.0]);
    }

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let embedder = FakeEmbedder {
            max_batch: 4,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        assert!(matches!(
            embed_documents_ordered(&embedder, &[]).await,
            Err(FlowError::EmptyInput(_))
        ));
    }

    proptest! {
        #[test]
        fn order_is_preserved_for_any_batch_size(
            lengths in proptest::collection::vec(1usize..30, 1..40),
            max_batch in 1usize..7,
        ) {
            let texts: Vec<String> = lengths.iter().map(|n| "x".repeat(*n)).collect();
            let embedder = FakeEmbedder {
                max_batch,
                calls: Arc::new(AtomicUsize::new(0)),
            };
            let result = tokio_test::block_on(embed_documents_ordered(&embedder, &texts)).unwrap();
            let observed: Vec<usize> = result.iter().map(|v| v[0] as usize).collect();
            prop_assert_eq!(observed, lengths);
        }
    }

    #[tokio::test]
    async fn dimension_probe_is_cached() {
        let embedder = FakeEmbedder {
            max_batch: 4,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let dim1 = probe_dimension(&embedder, "test-provider-unique-1", "model-a").await.unwrap();
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);
        let dim2 = probe_dimension(&embedder, "test-provider-unique-1", "model-a").await.unwrap();
        assert_eq!(dim1, dim2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    }
}
