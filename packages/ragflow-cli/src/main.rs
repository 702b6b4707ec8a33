//! `ragflow`: the process surface of spec.md §6 — a single entry point per
//! flow (`execute`) plus a long-lived transport for streaming chat
//! (`serve`). Reads its configuration once at startup from CLI flags /
//! environment variables (`Settings`) and exits with the codes §6 defines:
//! `0` success, `1` configuration failure, `2` dependency unreachable at
//! startup.

mod execute;
mod fixtures;
mod registry;
mod serve;
mod settings;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ragflow_runners::RetrievalPolicy;
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "ragflow", version, about = "RAG flow-graph engine and knowledge retrieval pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the long-lived Chat Transport Adapter (C10).
    Serve {
        #[command(flatten)]
        settings: Settings,

        /// Address to bind the WebSocket transport to.
        #[clap(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
        bind_addr: SocketAddr,

        /// Fixture collections config (vector/full-text seed documents).
        #[clap(long, env = "COLLECTIONS_CONFIG")]
        collections_config: PathBuf,

        /// Fixture bot configs, keyed by collection id.
        #[clap(long, env = "BOTS_CONFIG")]
        bots_config: PathBuf,
    },
    /// Validate, schedule, and run a single flow instance to completion.
    Execute {
        #[command(flatten)]
        settings: Settings,

        /// Path to a JSON-serialized `FlowInstance`.
        flow: PathBuf,

        /// Fixture collections config, for flows with search nodes.
        #[clap(long, env = "COLLECTIONS_CONFIG")]
        collections_config: Option<PathBuf>,

        /// Optional JSON object of initial global-variable overrides.
        #[clap(long)]
        globals: Option<PathBuf>,

        /// The user identity surfaced to runners via `SystemInput`.
        #[clap(long, default_value = "cli-user")]
        user: String,

        /// The message id surfaced to runners via `SystemInput`.
        #[clap(long)]
        message_id: Option<String>,

        /// The query surfaced to runners via `SystemInput` and bound to
        /// the `start` node when a flow doesn't bind it statically itself.
        #[clap(long, default_value = "")]
        query: String,
    },
}

/// §6 exit codes, reified as an enum so `main` has exactly one place that
/// maps a failure to its process exit code.
enum Outcome {
    Success,
    ConfigurationFailure(anyhow::Error),
    DependencyUnreachable(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Outcome::Success => ExitCode::from(0),
        Outcome::ConfigurationFailure(err) => {
            tracing::error!(error = %err, "configuration failure");
            ExitCode::from(1)
        }
        Outcome::DependencyUnreachable(err) => {
            tracing::error!(error = %err, "dependency unreachable at startup");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Outcome {
    match cli.command {
        Command::Serve {
            settings,
            bind_addr,
            collections_config,
            bots_config,
        } => run_serve(settings, bind_addr, collections_config, bots_config).await,
        Command::Execute {
            settings,
            flow,
            collections_config,
            globals,
            user,
            message_id,
            query,
        } => run_execute(settings, flow, collections_config, globals, user, message_id, query).await,
    }
}

async fn run_serve(settings: Settings, bind_addr: SocketAddr, collections_config: PathBuf, bots_config: PathBuf) -> Outcome {
    let collections: Arc<dyn ragflow_runners::CollectionResolver> =
        match fixtures::FixtureCollectionResolver::load(&collections_config, settings.fixture_embedding_dimension) {
            Ok(resolver) => Arc::new(resolver),
            Err(err) => return Outcome::ConfigurationFailure(err),
        };
    if !bots_config.exists() {
        return Outcome::ConfigurationFailure(anyhow::anyhow!("bots config not found: {}", bots_config.display()));
    }

    let completions: Arc<dyn ragflow_runners::LlmCompletionResolver> = Arc::new(fixtures::FixtureCompletionResolver);
    let rerank: Arc<dyn ragflow_runners::RerankService> = Arc::new(fixtures::FixtureRerankService);
    let policy = RetrievalPolicy::default();

    let (node_definitions, node_runners) =
        registry::build_registry(collections.clone(), completions.clone(), rerank, policy.clone(), settings.context_window_limit);

    match serve::run(
        bind_addr,
        &bots_config,
        &settings.memory_store_dsn,
        Arc::new(node_definitions),
        Arc::new(node_runners),
        collections,
        completions,
        policy,
    )
    .await
    {
        Ok(()) => Outcome::Success,
        Err(err) => Outcome::DependencyUnreachable(err),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_execute(
    settings: Settings,
    flow: PathBuf,
    collections_config: Option<PathBuf>,
    globals: Option<PathBuf>,
    user: String,
    message_id: Option<String>,
    query: String,
) -> Outcome {
    let collections: Arc<dyn ragflow_runners::CollectionResolver> = match collections_config {
        Some(path) => match fixtures::FixtureCollectionResolver::load(&path, settings.fixture_embedding_dimension) {
            Ok(resolver) => Arc::new(resolver),
            Err(err) => return Outcome::ConfigurationFailure(err),
        },
        None => Arc::new(EmptyCollections),
    };
    let completions: Arc<dyn ragflow_runners::LlmCompletionResolver> = Arc::new(fixtures::FixtureCompletionResolver);
    let rerank: Arc<dyn ragflow_runners::RerankService> = Arc::new(fixtures::FixtureRerankService);
    let policy = RetrievalPolicy::default();

    let (node_definitions, node_runners) =
        registry::build_registry(collections, completions, rerank, policy, settings.context_window_limit);

    let message_id = message_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request = execute::ExecuteRequest {
        flow_path: &flow,
        globals_path: globals.as_deref(),
        user,
        message_id,
        query,
    };

    match execute::execute(request, &node_definitions, &node_runners).await {
        Ok(outputs) => {
            println!("{}", serde_json::to_string_pretty(&outputs).unwrap_or_default());
            Outcome::Success
        }
        Err(err) => Outcome::ConfigurationFailure(err),
    }
}

/// Resolves no collections at all; used by `execute` when the flow under
/// test has no search nodes and so was never given `--collections-config`.
struct EmptyCollections;
impl ragflow_runners::CollectionResolver for EmptyCollections {
    fn resolve(&self, _collection_id: &str) -> Option<ragflow_runners::Collection> {
        None
    }
}
