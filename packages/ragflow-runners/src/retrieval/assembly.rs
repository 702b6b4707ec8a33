//! Candidate assembly, rerank, keyword intersection filtering, context
//! packing, and URL deduplication (§4.7). These are the primitives the
//! `rerank`/`llm` node runners and the streaming pipeline's classic-mode
//! retrieval path compose.

use ragflow_core::{DocumentWithScore, FlowError, Result};

use crate::interfaces::{FullTextIndex, RerankService};
use crate::policy::RetrievalPolicy;

/// Rerank `candidates` in their entirety (no pre-truncation) when there is
/// more than one, then keep the top `top_k`. Matches the source's "no need
/// to rerank (candidates <= 1)" short-circuit.
pub async fn assemble_and_rerank(
    service: &dyn RerankService,
    query: &str,
    candidates: Vec<DocumentWithScore>,
    top_k: usize,
    policy: &RetrievalPolicy,
) -> Result<Vec<DocumentWithScore>> {
    if candidates.len() > policy.max_rerank_batch {
        return Err(FlowError::TooManyDocuments(candidates.len(), policy.max_rerank_batch));
    }
    let reranked = if candidates.len() > 1 {
        rerank_all(service, query, candidates).await?
    } else {
        candidates
    };
    Ok(reranked.into_iter().take(top_k).collect())
}

/// Submit every candidate's text to the rerank service and reorder by the
/// returned permutation, dropping any index outside `0..candidates.len()`
/// (the service's response may be malformed; the spec makes no guarantee).
async fn rerank_all(
    service: &dyn RerankService,
    query: &str,
    candidates: Vec<DocumentWithScore>,
) -> Result<Vec<DocumentWithScore>> {
    let texts: Vec<String> = candidates.iter().map(|d| d.text_or_empty().to_string()).collect();
    let order = service.rerank(query, &texts).await?;
    let mut candidates: Vec<Option<DocumentWithScore>> = candidates.into_iter().map(Some).collect();
    let mut reordered = Vec::with_capacity(candidates.len());
    for index in order {
        if let Some(slot) = candidates.get_mut(index) {
            if let Some(doc) = slot.take() {
                reordered.push(doc);
            }
        }
    }
    Ok(reordered)
}

/// Drop any candidate whose `metadata.source` does not appear among the
/// document names the full-text index reports for `keywords`. If the index
/// reports no matching documents at all, the filter is a no-op — the spec
/// forbids ever dropping every candidate unconditionally on an empty
/// keyword match.
pub async fn keyword_intersection_filter(
    index: &dyn FullTextIndex,
    index_name: &str,
    query: &str,
    top_k: usize,
    candidates: Vec<DocumentWithScore>,
    policy: &RetrievalPolicy,
) -> Result<Vec<DocumentWithScore>> {
    if !index.exists(index_name).await? {
        return Ok(candidates);
    }
    let keywords = index.analyze(index_name, query).await?;
    let oversampled_k = top_k * policy.keyword_oversample_factor;
    let hits = index.search(index_name, &keywords, oversampled_k).await?;
    if hits.is_empty() {
        return Ok(candidates);
    }
    let matching_sources: std::collections::HashSet<&str> =
        hits.iter().filter_map(|h| h.source()).collect();
    Ok(candidates
        .into_iter()
        .filter(|c| c.source().is_some_and(|s| matching_sources.contains(s)))
        .collect())
}

/// Pack `candidates` front-to-back into a single string of length at most
/// `budget` characters, joined by `policy.packing_delimiter`, prefixing each
/// entry with a source-URL attribution line when `metadata.url` is present.
/// A candidate whose inclusion would overflow the budget, and every
/// candidate after it, is skipped (matches `get_packed_answer`'s
/// accumulate-then-truncate behaviour for the common case where entries are
/// already individually well under budget).
pub fn pack_context(candidates: &[DocumentWithScore], budget: usize, policy: &RetrievalPolicy) -> String {
    let mut packed = String::new();
    for candidate in candidates {
        let mut entry = String::new();
        if let Some(url) = candidate.url() {
            entry.push_str(&policy.url_attribution_template.replace("{url}", url));
        }
        entry.push_str(candidate.text_or_empty());

        let addition_len = entry.len() + if packed.is_empty() { 0 } else { policy.packing_delimiter.len() };
        if packed.len() + addition_len > budget {
            break;
        }
        if !packed.is_empty() {
            packed.push_str(&policy.packing_delimiter);
        }
        packed.push_str(&entry);
    }
    if packed.len() > budget {
        packed.truncate(budget);
    }
    packed
}

/// Collect each candidate's `metadata.url`, deduplicated and in
/// first-occurrence order.
pub fn dedupe_urls(candidates: &[DocumentWithScore]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for candidate in candidates {
        if let Some(url) = candidate.url() {
            if seen.insert(url.to_string()) {
                urls.push(url.to_string());
            }
        }
    }
    urls
}
