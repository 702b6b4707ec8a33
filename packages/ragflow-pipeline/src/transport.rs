//! The Chat Transport Adapter (spec.md §4.10): an axum WebSocket handler
//! that decodes client frames, drives one `StreamingPipeline` turn per
//! `message` frame, and re-encodes `PipelineEvent`s as server frames.
//! Grounded in `kubechat/chat/websocket/base_consumer.py`'s frame shapes
//! and quota check, with the axum `State<T>`/`WebSocketUpgrade` handler
//! shape and `tokio::select!`-driven session loop `estuary-flow`'s agent
//! crate uses for its own streaming surface.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use ragflow_core::NodeDefinitionRegistry;
use ragflow_engine::{HistoryHandle, NodeRunnerRegistry};
use ragflow_runners::{CollectionResolver, LlmCompletionResolver, RetrievalPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::BotConfig;
use crate::pipeline::{PipelineEvent, StreamingPipeline, TurnRequest};
use crate::quota::QuotaTracker;

/// A client frame (spec.md §4.10).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Message {
        data: String,
        #[serde(default)]
        file_name: Option<String>,
    },
    Ping,
}

/// A server frame (spec.md §4.10).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Start {
        id: String,
        timestamp: i64,
    },
    Welcome {
        id: String,
        data: WelcomeData,
    },
    Message {
        id: String,
        data: String,
        timestamp: i64,
    },
    Stop {
        id: String,
        data: Vec<ragflow_core::DocumentWithScore>,
        #[serde(rename = "memoryCount")]
        memory_count: usize,
        timestamp: i64,
    },
    Error {
        id: String,
        data: String,
        timestamp: i64,
    },
    Pong {
        timestamp: i64,
    },
}

#[derive(Debug, Serialize)]
struct WelcomeData {
    hello: String,
    faq: Vec<crate::config::FaqEntry>,
}

/// A fixed table of binary-attachment readers keyed by file extension
/// (spec.md §4.10: "decoded by file extension against a fixed reader
/// table"). Each reader turns raw bytes into the text appended to the
/// turn's query; an extension with no entry is rejected with an `error`
/// frame.
fn decode_attachment(file_name: &str, bytes: &[u8]) -> Result<String, String> {
    let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match extension.as_str() {
        "txt" | "md" => String::from_utf8(bytes.to_vec()).map_err(|_| "attachment is not valid UTF-8".to_string()),
        "json" => {
            let value: Value = serde_json::from_slice(bytes).map_err(|_| "attachment is not valid JSON".to_string())?;
            Ok(value.to_string())
        }
        other => Err(format!("unsupported attachment extension: {other}")),
    }
}

/// Resolves a bot's configuration and its per-user conversation history;
/// authentication/tenant isolation beyond this (spec.md Non-goals) is left
/// to whatever sits in front of this handler.
pub trait SessionResolver: Send + Sync {
    fn bot_config(&self, collection_id: &str) -> Option<BotConfig>;
    fn history_for(&self, user: &str, collection_id: &str) -> Arc<dyn HistoryHandle>;
}

/// Everything a running server needs to assemble and drive turns: the
/// flow-graph registries, the pipeline's own capability resolvers, and the
/// per-process quota tracker.
#[derive(Clone)]
pub struct ChatState {
    pub node_definitions: Arc<NodeDefinitionRegistry>,
    pub node_runners: Arc<NodeRunnerRegistry>,
    pub collections: Arc<dyn CollectionResolver>,
    pub completions: Arc<dyn LlmCompletionResolver>,
    pub policy: RetrievalPolicy,
    pub quota: Arc<QuotaTracker>,
    pub sessions: Arc<dyn SessionResolver>,
}

/// Per-connection context: which user/collection/bot this socket serves,
/// and the history handle backing its conversation.
pub struct ChatSession {
    pub user: String,
    pub collection_id: String,
    pub bot_config: BotConfig,
    pub history: Arc<dyn HistoryHandle>,
}

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub user: String,
    pub collection_id: String,
}

/// axum handler: upgrades to a WebSocket and hands off to `run_session`.
pub async fn chat_handler(
    State(state): State<ChatState>,
    Query(params): Query<ChatParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(bot_config) = state.sessions.bot_config(&params.collection_id) else {
        return (StatusCode::NOT_FOUND, "unknown collection").into_response();
    };
    let history = state.sessions.history_for(&params.user, &params.collection_id);
    let session = ChatSession {
        user: params.user,
        collection_id: params.collection_id,
        bot_config,
        history,
    };
    ws.on_upgrade(move |socket| run_session(socket, state, session)).into_response()
}

async fn run_session(mut socket: WebSocket, state: ChatState, session: ChatSession) {
    let pipeline = StreamingPipeline::new(
        &state.node_definitions,
        &state.node_runners,
        state.collections.clone(),
        state.completions.clone(),
        state.policy.clone(),
    );

    let welcome = ServerFrame::Welcome {
        id: Uuid::new_v4().to_string(),
        data: WelcomeData {
            hello: session.bot_config.welcome.hello.clone(),
            faq: session.bot_config.welcome.faq.clone(),
        },
    };
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    // A `message` frame carrying `file_name` names the binary attachment
    // frame that follows it; held here until that attachment arrives (or
    // until a `message` frame with no attachment supersedes it).
    let mut pending_attachment: Option<(String, String)> = None;

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(err) => {
                        let _ = send_frame(
                            &mut socket,
                            &ServerFrame::Error {
                                id: Uuid::new_v4().to_string(),
                                data: format!("malformed frame: {err}"),
                                timestamp: now(),
                            },
                        )
                        .await;
                        continue;
                    }
                };

                match frame {
                    ClientFrame::Ping => {
                        if send_frame(&mut socket, &ServerFrame::Pong { timestamp: now() }).await.is_err() {
                            break;
                        }
                    }
                    ClientFrame::Message { data, file_name: Some(file_name) } => {
                        pending_attachment = Some((data, file_name));
                    }
                    ClientFrame::Message { data, file_name: None } => {
                        pending_attachment = None;
                        if !handle_message(&mut socket, &pipeline, &state, &session, data).await {
                            break;
                        }
                    }
                }
            }
            Message::Binary(bytes) => {
                let Some((data, file_name)) = pending_attachment.take() else {
                    let _ = send_frame(
                        &mut socket,
                        &ServerFrame::Error {
                            id: Uuid::new_v4().to_string(),
                            data: "binary attachment received without a preceding message frame".to_string(),
                            timestamp: now(),
                        },
                    )
                    .await;
                    continue;
                };
                match decode_attachment(&file_name, &bytes) {
                    Ok(decoded) => {
                        let combined = format!("{data}\n{decoded}");
                        if !handle_message(&mut socket, &pipeline, &state, &session, combined).await {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = send_frame(
                            &mut socket,
                            &ServerFrame::Error {
                                id: Uuid::new_v4().to_string(),
                                data: err,
                                timestamp: now(),
                            },
                        )
                        .await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Runs one turn for a `message` client frame. Returns `false` when the
/// socket should be closed (a send failed).
async fn handle_message(
    socket: &mut WebSocket,
    pipeline: &StreamingPipeline<'_>,
    state: &ChatState,
    session: &ChatSession,
    data: String,
) -> bool {
    let turn_id = Uuid::new_v4().to_string();

    if !state.quota.has_remaining(&session.user, session.bot_config.daily_quota) {
        return send_frame(
            socket,
            &ServerFrame::Error {
                id: turn_id,
                data: "daily usage quota exceeded".to_string(),
                timestamp: now(),
            },
        )
        .await
        .is_ok();
    }

    if send_frame(
        socket,
        &ServerFrame::Start {
            id: turn_id.clone(),
            timestamp: now(),
        },
    )
    .await
    .is_err()
    {
        return false;
    }

    let cancellation = CancellationToken::new();
    let request = TurnRequest {
        user: session.user.clone(),
        message_id: turn_id.clone(),
        query: data,
        collection_id: session.collection_id.clone(),
        history: session.history.clone(),
        cancellation,
    };

    let (tx, mut rx) = mpsc::channel(32);
    let turn = pipeline.run_turn(&session.bot_config, request, tx);
    tokio::pin!(turn);

    let mut last_references = Vec::new();
    loop {
        tokio::select! {
            // `rx` is listed first and given priority: `run_turn` buffers
            // its `References`/`Urls`/`RelatedQuestions` sentinels into
            // this channel and returns in the same poll, so whenever both
            // branches are simultaneously ready the buffered sentinels
            // must be drained before the terminal frame is allowed to go
            // out (spec §4.9 step 5 / P4's `c0…cK, R, stop` ordering).
            biased;

            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if !forward_pipeline_event(socket, &turn_id, event, &mut last_references).await {
                            return false;
                        }
                    }
                    None => {}
                }
            }
            result = &mut turn => {
                // `run_turn` has already dropped its sender by the time it
                // resolves, so draining here is a bounded, non-blocking
                // sweep of whatever it buffered right before returning —
                // never a wait on a still-open channel.
                while let Ok(event) = rx.try_recv() {
                    if !forward_pipeline_event(socket, &turn_id, event, &mut last_references).await {
                        return false;
                    }
                }
                match result {
                    Ok(summary) => {
                        state.quota.record_usage(&session.user);
                        return send_frame(socket, &ServerFrame::Stop {
                            id: turn_id,
                            data: if summary.references.is_empty() { last_references } else { summary.references },
                            memory_count: summary.memory_count,
                            timestamp: now(),
                        }).await.is_ok();
                    }
                    Err(err) => {
                        return send_frame(socket, &ServerFrame::Error {
                            id: turn_id,
                            data: err.to_string(),
                            timestamp: now(),
                        }).await.is_ok();
                    }
                }
            }
        }
    }
}

/// Forward one pipeline event as a `message` server frame, tracking the
/// most recent reference list so `Stop` can fall back to it if the turn
/// summary's own list is empty. Returns `false` if the send failed and the
/// socket should be closed.
async fn forward_pipeline_event(
    socket: &mut WebSocket,
    turn_id: &str,
    event: PipelineEvent,
    last_references: &mut Vec<ragflow_core::DocumentWithScore>,
) -> bool {
    let (data, references) = match event {
        PipelineEvent::Token(text) => (text, None),
        PipelineEvent::References(references) => (
            format!("DOC_QA_REFERENCES|{}", serde_json::to_string(&references).unwrap_or_default()),
            Some(references),
        ),
        PipelineEvent::Urls(urls) => (
            format!("DOCUMENT_URLS|{}", serde_json::to_string(&urls).unwrap_or_default()),
            None,
        ),
        PipelineEvent::RelatedQuestions(questions) => (
            format!("RELATED_QUESTIONS|{}", serde_json::to_string(&questions).unwrap_or_default()),
            None,
        ),
    };
    if let Some(references) = references {
        *last_references = references;
    }
    send_frame(socket, &ServerFrame::Message { id: turn_id.to_string(), data, timestamp: now() })
        .await
        .is_ok()
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}

fn now() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_attachment() {
        assert_eq!(decode_attachment("notes.txt", b"hello").unwrap(), "hello");
    }

    #[test]
    fn decodes_json_attachment() {
        let decoded = decode_attachment("data.json", br#"{"a":1}"#).unwrap();
        assert_eq!(decoded, "{\"a\":1}");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(decode_attachment("archive.zip", b"binary").is_err());
    }

    #[test]
    fn server_frames_serialize_with_tagged_type() {
        let frame = ServerFrame::Pong { timestamp: 0 };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"pong\""));
    }
}
