//! The Streaming Query Pipeline (spec.md §4.9): the orchestrator that ties
//! history, retrieval, generation, and sentinel framing into one turn.
//! Grounded in `aperag/pipeline/knowledge_pipeline.py::run` and
//! `base_pipeline.py::BasePipeline.run`, rebuilt around the flow-graph
//! engine rather than a hand-written call sequence: retrieval and
//! generation are each driven through `FlowEngine::execute`, while mode
//! selection, fallback, and history persistence stay ordinary Rust here
//! (the Open Question resolution recorded in SPEC_FULL.md §9 — the pipeline
//! is history's sole writer, never a node runner).

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use ragflow_core::{ConversationMessage, DocumentWithScore, FlowError, Provenance, RecallType, Result};
use ragflow_engine::{FlowEngine, HistoryHandle, NodeRunnerRegistry, SystemInput};
use ragflow_core::NodeDefinitionRegistry;
use ragflow_runners::{retrieval::{dedupe_urls, pack_context}, CollectionResolver, LlmCompletionResolver, RetrievalPolicy};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{BotConfig, RetrieveMode};
use crate::flow_builder::{build_classic_retrieval_flow, build_generation_flow, build_graph_retrieval_flow};
use crate::memory::{load_history, query_with_history, LoadedHistory};
use crate::related_questions::generate_related_questions;

/// One turn's request: who is asking, in which collection, with which
/// history handle and cancellation scope.
pub struct TurnRequest {
    pub user: String,
    pub message_id: String,
    pub query: String,
    pub collection_id: String,
    pub history: Arc<dyn HistoryHandle>,
    pub cancellation: CancellationToken,
}

/// Events emitted while a turn runs, in the order the transport layer
/// should forward them as server frames (spec.md §4.9 step 5, §4.10).
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Token(String),
    References(Vec<DocumentWithScore>),
    Urls(Vec<String>),
    RelatedQuestions(Vec<String>),
}

/// What a completed turn leaves behind, for the transport's `stop` frame.
pub struct TurnSummary {
    pub references: Vec<DocumentWithScore>,
    pub urls: Vec<String>,
    pub memory_count: usize,
}

/// Ties a `FlowEngine`'s registries to the capabilities the pipeline itself
/// needs outside the flow graph: resolving a collection for provenance, and
/// resolving a completion model for related-question generation.
pub struct StreamingPipeline<'a> {
    node_definitions: &'a NodeDefinitionRegistry,
    node_runners: &'a NodeRunnerRegistry,
    collections: Arc<dyn CollectionResolver>,
    completions: Arc<dyn LlmCompletionResolver>,
    policy: RetrievalPolicy,
}

impl<'a> StreamingPipeline<'a> {
    pub fn new(
        node_definitions: &'a NodeDefinitionRegistry,
        node_runners: &'a NodeRunnerRegistry,
        collections: Arc<dyn CollectionResolver>,
        completions: Arc<dyn LlmCompletionResolver>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            node_definitions,
            node_runners,
            collections,
            completions,
            policy,
        }
    }

    fn engine(&self) -> FlowEngine<'_> {
        FlowEngine::new(self.node_definitions, self.node_runners)
    }

    /// Run one turn to completion, pushing `PipelineEvent`s to `events` as
    /// they become available. Returns once the turn's side effects
    /// (history persistence) are either committed or, on cancellation,
    /// deliberately skipped (P7).
    pub async fn run_turn(
        &self,
        bot_config: &BotConfig,
        request: TurnRequest,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<TurnSummary> {
        let history = load_history(request.history.as_ref(), bot_config).await?;
        let search_text = query_with_history(&history, &request.query);

        let (references, generation_docs) = self.retrieve(bot_config, &request, &search_text).await?;

        if references.is_empty() && !bot_config.welcome.oops.is_empty() {
            return self
                .degrade(bot_config, &request, &history, bot_config.welcome.oops.clone(), events)
                .await;
        }

        let docs_value = serde_json::to_value(&generation_docs).map_err(FlowError::from)?;
        let generation_flow = build_generation_flow(bot_config, &request.query, docs_value);
        let system = SystemInput::new(&request.user, &request.message_id, &request.query)
            .with_history(request.history.clone())
            .with_cancellation(request.cancellation.clone());

        let mut result = self.engine().execute(&generation_flow, HashMap::new(), &system).await?;
        let mut tokens = result
            .streams
            .remove("llm")
            .ok_or_else(|| FlowError::Other(anyhow::anyhow!("llm node produced no token stream")))?;

        let mut response = String::new();
        while let Some(chunk) = tokens.next().await {
            if request.cancellation.is_cancelled() {
                return Err(FlowError::Cancelled);
            }
            let chunk = chunk?;
            response.push_str(&chunk);
            let _ = events.send(PipelineEvent::Token(chunk)).await;
        }
        if request.cancellation.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        let urls = dedupe_urls(&references);
        let _ = events.send(PipelineEvent::References(references.clone())).await;
        let _ = events.send(PipelineEvent::Urls(urls.clone())).await;

        let related = self.related_questions(bot_config, &request, &references).await;
        if !related.is_empty() {
            let _ = events.send(PipelineEvent::RelatedQuestions(related)).await;
        }

        self.persist_turn(&request, bot_config, response, references.clone(), urls.clone())
            .await?;

        Ok(TurnSummary {
            references,
            urls,
            memory_count: history.turn_count() + 1,
        })
    }

    /// Retrieve supporting context per `retrieve_mode`, returning both the
    /// citable candidate list (for `references`/`urls`) and the document
    /// list to feed the generation flow's `docs` input. These differ only
    /// in `mix` mode, where the generation docs are two synthetic,
    /// section-labelled blocks rather than the raw candidates.
    async fn retrieve(
        &self,
        cfg: &BotConfig,
        request: &TurnRequest,
        search_text: &str,
    ) -> Result<(Vec<DocumentWithScore>, Vec<DocumentWithScore>)> {
        let system = SystemInput::new(&request.user, &request.message_id, &request.query)
            .with_cancellation(request.cancellation.clone());
        let engine = self.engine();

        match cfg.retrieve_mode {
            RetrieveMode::Classic => {
                let retrieval =
                    build_classic_retrieval_flow(cfg, &request.collection_id, search_text, self.policy.rerank_oversample_factor);
                let result = engine.execute(&retrieval.flow, HashMap::new(), &system).await?;
                let docs = parse_docs(result.context.get_output(retrieval.final_node, "docs"))?;
                Ok((docs.clone(), docs))
            }
            RetrieveMode::Graph => {
                if !cfg.enable_knowledge_graph {
                    return Ok((Vec::new(), Vec::new()));
                }
                let retrieval = build_graph_retrieval_flow(cfg, &request.collection_id, search_text);
                let result = engine.execute(&retrieval.flow, HashMap::new(), &system).await?;
                let docs = parse_docs(result.context.get_output(retrieval.final_node, "docs"))?;
                Ok((docs.clone(), docs))
            }
            RetrieveMode::Mix => {
                let classic =
                    build_classic_retrieval_flow(cfg, &request.collection_id, search_text, self.policy.rerank_oversample_factor);
                let classic_result = engine.execute(&classic.flow, HashMap::new(), &system).await?;
                let classic_docs = parse_docs(classic_result.context.get_output(classic.final_node, "docs"))?;

                let kg_context = self.mix_kg_context(cfg, request, search_text, &system).await;

                match kg_context {
                    None => Ok((classic_docs.clone(), classic_docs)),
                    Some(kg) if classic_docs.is_empty() => {
                        let kg_doc = DocumentWithScore::new(kg, 1.0).tagged(RecallType::Graph);
                        Ok((vec![kg_doc.clone()], vec![kg_doc]))
                    }
                    Some(kg) => {
                        let budget = cfg.context_window.saturating_sub(self.policy.prompt_overhead_chars);
                        let dc_context = pack_context(&classic_docs, budget, &self.policy);
                        let kg_block = DocumentWithScore::new(format!("From Knowledge Graph (KG):\n{kg}"), 1.0);
                        let dc_block = DocumentWithScore::new(format!("From Document Chunks (DC):\n{dc_context}"), 1.0);
                        Ok((classic_docs, vec![kg_block, dc_block]))
                    }
                }
            }
        }
    }

    /// The knowledge-graph half of `mix` retrieval: `None` on a disabled
    /// capability, an execution error, or an empty result — every one of
    /// these falls back to classic-only per spec.md §4.9's mix rule.
    async fn mix_kg_context(
        &self,
        cfg: &BotConfig,
        request: &TurnRequest,
        search_text: &str,
        system: &SystemInput,
    ) -> Option<String> {
        if !cfg.enable_knowledge_graph {
            return None;
        }
        let graph = build_graph_retrieval_flow(cfg, &request.collection_id, search_text);
        let result = self.engine().execute(&graph.flow, HashMap::new(), system).await.ok()?;
        let docs = parse_docs(result.context.get_output("graph_search", "docs")).ok()?;
        docs.into_iter()
            .next()
            .map(|d| d.text_or_empty().to_string())
            .filter(|s| !s.is_empty())
    }

    async fn related_questions(
        &self,
        cfg: &BotConfig,
        request: &TurnRequest,
        references: &[DocumentWithScore],
    ) -> Vec<String> {
        if cfg.use_related_question {
            if let Some(related_cfg) = &cfg.related_completion {
                if let Some(service) = self.completions.resolve(&related_cfg.provider, &related_cfg.model) {
                    let budget = cfg.context_window.saturating_sub(self.policy.prompt_overhead_chars);
                    let context = pack_context(references, budget, &self.policy);
                    if let Ok(questions) =
                        generate_related_questions(service.as_ref(), &related_cfg.prompt_template, &request.query, &context)
                            .await
                    {
                        if !questions.is_empty() {
                            return questions;
                        }
                    }
                }
            }
        }
        faq_questions(cfg)
    }

    /// Degradation path (spec.md §4.9): retrieval found nothing and the bot
    /// defines an `oops` string. Skip completion, surface the welcome FAQ
    /// as related questions, and persist the turn as-is.
    async fn degrade(
        &self,
        cfg: &BotConfig,
        request: &TurnRequest,
        history: &LoadedHistory,
        oops: String,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<TurnSummary> {
        let _ = events.send(PipelineEvent::Token(oops.clone())).await;
        let _ = events.send(PipelineEvent::References(Vec::new())).await;
        let _ = events.send(PipelineEvent::Urls(Vec::new())).await;
        let related = faq_questions(cfg);
        if !related.is_empty() {
            let _ = events.send(PipelineEvent::RelatedQuestions(related)).await;
        }
        self.persist_turn(request, cfg, oops, Vec::new(), Vec::new()).await?;
        Ok(TurnSummary {
            references: Vec::new(),
            urls: Vec::new(),
            memory_count: history.turn_count() + 1,
        })
    }

    /// Persist the human and AI messages for this turn. A cancelled run
    /// skips persistence entirely (P7: cancellation between the human
    /// message being queued and the AI message landing must leave neither
    /// side effect visible).
    async fn persist_turn(
        &self,
        request: &TurnRequest,
        cfg: &BotConfig,
        response: String,
        references: Vec<DocumentWithScore>,
        urls: Vec<String>,
    ) -> Result<()> {
        if request.cancellation.is_cancelled() {
            return Ok(());
        }

        let embedding_dim = match self.collections.resolve(&request.collection_id) {
            Some(collection) => ragflow_runners::retrieval::probe_dimension(
                collection.embedding.as_ref(),
                &cfg.embedding.provider,
                &cfg.embedding.model,
            )
            .await
            .unwrap_or(0),
            None => 0,
        };

        let provenance = Provenance {
            collection_id: request.collection_id.clone(),
            embedding_model: cfg.embedding.model.clone(),
            embedding_dim,
            score_threshold: cfg.score_threshold,
            top_k: cfg.topk,
            completion_model: cfg.completion.model.clone(),
            prompt_template: cfg.completion.prompt_template.clone(),
            context_window: cfg.context_window,
        };

        let human = ConversationMessage::human(Uuid::new_v4().to_string(), request.query.clone());
        request.history.append(human).await?;

        let ai = ConversationMessage::ai(
            Uuid::new_v4().to_string(),
            request.query.clone(),
            response,
            references,
            urls,
            provenance,
        );
        request.history.append(ai).await?;
        Ok(())
    }
}

fn faq_questions(cfg: &BotConfig) -> Vec<String> {
    cfg.welcome.faq.iter().take(3).map(|entry| entry.question.clone()).collect()
}

fn parse_docs(value: Option<&Value>) -> Result<Vec<DocumentWithScore>> {
    match value {
        Some(v) => serde_json::from_value(v.clone()).map_err(FlowError::from),
        None => Ok(Vec::new()),
    }
}
