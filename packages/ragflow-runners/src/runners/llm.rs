//! The `llm` completion node (spec §4.6.7): packs retrieved documents into
//! a context block, renders the final prompt, and opens a streaming
//! completion.
//!
//! History persistence (step 5 of the spec's semantics) is owned by the
//! Streaming Pipeline (C9), not this runner — see the Open Question
//! resolution in SPEC_FULL.md. This runner only reads `system.history` to
//! assemble prior turns for the completion call; it never writes to it.
//! Likewise, the reference/URL sentinel framing described in §4.9 is
//! applied by the pipeline after it finishes draining the token stream:
//! this runner's `RunOutcome::Streaming` carries `references`/`urls` as
//! plain output values and a token stream of raw provider text only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::{FlowError, MessageRole, Result};
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::{json, Value};

use crate::interfaces::CompletionService;
use crate::policy::RetrievalPolicy;
use crate::retrieval::{dedupe_urls, pack_context};
use crate::runners::common::parse_docs_field;

/// Resolves a `(provider, model)` pair to a bound completion client.
/// Mirrors `CollectionResolver`: the registry of concrete provider SDKs
/// lives outside this crate.
pub trait CompletionResolver: Send + Sync {
    fn resolve(&self, provider: &str, model: &str) -> Option<Arc<dyn CompletionService>>;
}

pub struct LlmRunner {
    completions: Arc<dyn CompletionResolver>,
    policy: RetrievalPolicy,
    context_window: usize,
}

impl LlmRunner {
    pub fn new(completions: Arc<dyn CompletionResolver>, policy: RetrievalPolicy, context_window: usize) -> Self {
        Self {
            completions,
            policy,
            context_window,
        }
    }
}

#[async_trait]
impl NodeRunner for LlmRunner {
    fn type_key(&self) -> &str {
        "llm"
    }

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome> {
        let provider = inputs.get("model_service_provider").and_then(Value::as_str).unwrap_or_default();
        let model = inputs.get("model_name").and_then(Value::as_str).unwrap_or_default();
        let template = inputs
            .get("prompt_template")
            .and_then(Value::as_str)
            .unwrap_or("{context}\n\n{query}");
        let max_tokens = inputs.get("max_tokens").and_then(Value::as_u64).unwrap_or(1024) as usize;
        let docs = parse_docs_field(&inputs, "docs")?;

        let context_budget = self.context_window.saturating_sub(self.policy.prompt_overhead_chars);
        let context = pack_context(&docs, context_budget, &self.policy);
        let prompt = template.replace("{query}", &system.query).replace("{context}", &context);

        let output_budget = max_tokens as i64 - prompt.len() as i64;
        if output_budget < 0 {
            return Err(FlowError::PromptTooLong);
        }

        let service = self
            .completions
            .resolve(provider, model)
            .ok_or_else(|| FlowError::ProviderNotConfigured(format!("{provider}/{model}")))?;

        let history = match &system.history {
            Some(handle) => {
                let mut turns = Vec::new();
                for message in handle.messages().await? {
                    match message.role {
                        MessageRole::Human => turns.push(("human".to_string(), message.query)),
                        MessageRole::Ai => {
                            if let Some(response) = message.response {
                                turns.push(("ai".to_string(), response));
                            }
                        }
                    }
                }
                turns
            }
            None => Vec::new(),
        };

        let tokens = service.stream(history, prompt, output_budget as usize).await?;

        let values = HashMap::from([
            ("references".to_string(), json!(docs)),
            ("urls".to_string(), json!(dedupe_urls(&docs))),
        ]);

        Ok(RunOutcome::Streaming { values, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use ragflow_core::DocumentWithScore;
    use ragflow_engine::TokenStream;
    use serde_json::json as j;

    struct EchoingCompletion;
    #[async_trait]
    impl CompletionService for EchoingCompletion {
        async fn stream(&self, _history: Vec<(String, String)>, prompt: String, _max_tokens: usize) -> Result<TokenStream> {
            let chunks: Vec<Result<String>> = prompt.split(' ').map(|w| Ok(w.to_string())).collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    struct OneProvider;
    impl CompletionResolver for OneProvider {
        fn resolve(&self, _provider: &str, _model: &str) -> Option<Arc<dyn CompletionService>> {
            Some(Arc::new(EchoingCompletion))
        }
    }

    struct NoProvider;
    impl CompletionResolver for NoProvider {
        fn resolve(&self, _provider: &str, _model: &str) -> Option<Arc<dyn CompletionService>> {
            None
        }
    }

    fn base_inputs() -> HashMap<String, Value> {
        let doc = DocumentWithScore::new("ctx", 1.0).with_metadata("url", j!("https://x.com"));
        HashMap::from([
            ("model_service_provider".to_string(), j!("openai")),
            ("model_name".to_string(), j!("gpt")),
            ("prompt_template".to_string(), j!("Q:{query} C:{context}")),
            ("max_tokens".to_string(), j!(1024)),
            ("docs".to_string(), j!(vec![doc])),
        ])
    }

    #[tokio::test]
    async fn streams_tokens_and_returns_references_and_urls() {
        let runner = LlmRunner::new(Arc::new(OneProvider), RetrievalPolicy::default(), 4000);
        let system = SystemInput::new("u", "m", "hello");
        let outcome = runner.run(base_inputs(), &system).await.unwrap();
        match outcome {
            RunOutcome::Streaming { values, .. } => {
                let urls: Vec<String> = serde_json::from_value(values["urls"].clone()).unwrap();
                assert_eq!(urls, vec!["https://x.com".to_string()]);
                let refs: Vec<DocumentWithScore> = serde_json::from_value(values["references"].clone()).unwrap();
                assert_eq!(refs.len(), 1);
            }
            RunOutcome::Values(_) => panic!("expected a streaming outcome"),
        }
    }

    #[tokio::test]
    async fn negative_output_budget_is_prompt_too_long() {
        let runner = LlmRunner::new(Arc::new(OneProvider), RetrievalPolicy::default(), 4000);
        let mut inputs = base_inputs();
        inputs.insert("max_tokens".to_string(), j!(1));
        let system = SystemInput::new("u", "m", "hello");
        let err = runner.run(inputs, &system).await.unwrap_err();
        assert!(matches!(err, FlowError::PromptTooLong));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_an_error() {
        let runner = LlmRunner::new(Arc::new(NoProvider), RetrievalPolicy::default(), 4000);
        let system = SystemInput::new("u", "m", "hello");
        let err = runner.run(base_inputs(), &system).await.unwrap_err();
        assert!(matches!(err, FlowError::ProviderNotConfigured(_)));
    }
}
