//! Wires the Chat Transport Adapter (C10) into a runnable axum server:
//! resolves bot configs and history handles from fixture configuration
//! (see `fixtures.rs`), and binds `ragflow_pipeline::transport::chat_handler`
//! at `/ws/chat`.

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use ragflow_core::NodeDefinitionRegistry;
use ragflow_engine::{HistoryHandle, NodeRunnerRegistry};
use ragflow_history::{InMemoryHistoryStore, SqliteHistoryStore};
use ragflow_pipeline::config::BotConfig;
use ragflow_pipeline::quota::QuotaTracker;
use ragflow_pipeline::transport::{chat_handler, ChatState, SessionResolver};
use ragflow_runners::{CollectionResolver, LlmCompletionResolver, RetrievalPolicy};
use serde::Deserialize;

enum HistoryBackend {
    Memory(Arc<InMemoryHistoryStore>),
    Sqlite(Arc<SqliteHistoryStore>),
}

impl HistoryBackend {
    fn open(dsn: &str) -> anyhow::Result<Self> {
        if dsn == ":memory:" {
            Ok(Self::Memory(Arc::new(InMemoryHistoryStore::new())))
        } else {
            let store = SqliteHistoryStore::open(Path::new(dsn))
                .map_err(|e| anyhow::anyhow!("opening memory store {dsn}: {e}"))?;
            Ok(Self::Sqlite(Arc::new(store)))
        }
    }

    fn handle(&self, conversation_id: &str) -> Arc<dyn HistoryHandle> {
        match self {
            Self::Memory(store) => Arc::new(store.handle(conversation_id)),
            Self::Sqlite(store) => Arc::new(store.handle(conversation_id)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotsConfig {
    bots: HashMap<String, BotConfig>,
}

struct FixtureSessionResolver {
    bots: HashMap<String, BotConfig>,
    history: HistoryBackend,
}

impl FixtureSessionResolver {
    fn load(bots_config_path: &Path, memory_store_dsn: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(bots_config_path)
            .map_err(|e| anyhow::anyhow!("reading bots config {}: {e}", bots_config_path.display()))?;
        let config: BotsConfig = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing bots config {}: {e}", bots_config_path.display()))?;
        Ok(Self {
            bots: config.bots,
            history: HistoryBackend::open(memory_store_dsn)?,
        })
    }
}

impl SessionResolver for FixtureSessionResolver {
    fn bot_config(&self, collection_id: &str) -> Option<BotConfig> {
        self.bots.get(collection_id).cloned()
    }

    fn history_for(&self, user: &str, collection_id: &str) -> Arc<dyn HistoryHandle> {
        self.history.handle(&format!("{user}:{collection_id}"))
    }
}

/// Assembles a `ChatState` and binds `chat_handler` to `/ws/chat`, then
/// serves until the process is terminated. Returns once the listener
/// itself fails to bind (caller maps that to an exit code).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    bind_addr: SocketAddr,
    bots_config_path: &Path,
    memory_store_dsn: &str,
    node_definitions: Arc<NodeDefinitionRegistry>,
    node_runners: Arc<NodeRunnerRegistry>,
    collections: Arc<dyn CollectionResolver>,
    completions: Arc<dyn LlmCompletionResolver>,
    policy: RetrievalPolicy,
) -> anyhow::Result<()> {
    let sessions: Arc<dyn SessionResolver> = Arc::new(FixtureSessionResolver::load(bots_config_path, memory_store_dsn)?);
    let state = ChatState {
        node_definitions,
        node_runners,
        collections,
        completions,
        policy,
        quota: Arc::new(QuotaTracker::new()),
        sessions,
    };

    let app = Router::new().route("/ws/chat", get(chat_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("binding {bind_addr}: {e}"))?;
    tracing::info!(%bind_addr, "ragflow chat transport listening");
    axum::serve(listener, app).await.map_err(|e| anyhow::anyhow!("serving: {e}"))?;
    Ok(())
}
