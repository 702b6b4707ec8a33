//! Retrieval policy: the oversampling factors and packing parameters the
//! Design Notes call out as hard-coded magic numbers in the source
//! (`keyword oversampling (3x)`, `rerank oversampling (6x)`), now explicit,
//! overridable fields instead of constants buried in a runner.

/// Tunable knobs for the retrieval primitives in `crate::retrieval`.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    /// Multiplies `top_k` when the keyword/fulltext runners search, to
    /// preserve recall for downstream rerank (spec.md §4.6.2).
    pub keyword_oversample_factor: usize,
    /// Multiplies `top_k` when the classic pipeline queries the vector
    /// store ahead of a full rerank pass (spec.md §4.7, §9).
    pub rerank_oversample_factor: usize,
    /// Character budget subtracted from a bot's `context_window` to leave
    /// room for the prompt template and memory (the source's hard-coded
    /// `500`, `aperag/pipeline/knowledge_pipeline.py`).
    pub prompt_overhead_chars: usize,
    /// Upper bound on how many documents may be submitted to the rerank
    /// service in one call before the runner reports `TooManyDocuments`.
    pub max_rerank_batch: usize,
    /// The attribution line prefixed to a packed candidate that carries a
    /// `metadata.url`, with `{url}` substituted (source:
    /// `aperag/query/query.py::get_packed_answer`).
    pub url_attribution_template: String,
    /// Delimiter joining packed candidate texts.
    pub packing_delimiter: String,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            keyword_oversample_factor: 3,
            rerank_oversample_factor: 6,
            prompt_overhead_chars: 500,
            max_rerank_batch: 256,
            url_attribution_template: "The following information is from: {url}\n".to_string(),
            packing_delimiter: "\n\n".to_string(),
        }
    }
}
