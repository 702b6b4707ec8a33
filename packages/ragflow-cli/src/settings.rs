//! Process-wide settings, read once at startup from CLI flags / environment
//! variables (spec.md §6: "Environment variables of note (read once at
//! startup): vector store DSN, full-text store host, default embedding
//! model, default completion model, memory store DSN, context window
//! limits, quota defaults").

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// DSN of the vector store backing collection search. The fixture
    /// driver shipped with this binary ignores the connection details and
    /// keeps everything in-process; a real deployment plugs a `VectorStore`
    /// implementation in here instead.
    #[clap(long, env = "VECTOR_STORE_DSN", default_value = "memory://local")]
    pub vector_store_dsn: String,

    /// Host of the full-text index backing keyword/fulltext search.
    #[clap(long, env = "FULLTEXT_STORE_HOST", default_value = "memory://local")]
    pub fulltext_store_host: String,

    /// Model name used when a bot configuration doesn't name one.
    #[clap(long, env = "DEFAULT_EMBEDDING_MODEL", default_value = "local-fixture-embedding")]
    pub default_embedding_model: String,

    /// Model name used when a bot configuration doesn't name one.
    #[clap(long, env = "DEFAULT_COMPLETION_MODEL", default_value = "local-fixture-completion")]
    pub default_completion_model: String,

    /// DSN of the conversation-history store. `:memory:` selects the
    /// in-process SQLite store; anything else is treated as a filesystem
    /// path opened with `SqliteHistoryStore::open`.
    #[clap(long, env = "MEMORY_STORE_DSN", default_value = ":memory:")]
    pub memory_store_dsn: String,

    /// Default `context_window` (characters) applied to bot configs that
    /// don't specify one explicitly.
    #[clap(long, env = "CONTEXT_WINDOW_LIMIT", default_value_t = 4096)]
    pub context_window_limit: usize,

    /// Default per-user daily turn quota; unset disables the check.
    #[clap(long, env = "QUOTA_DAILY_DEFAULT")]
    pub quota_daily_default: Option<u32>,

    /// Embedding dimension used by the fixture embedding service.
    #[clap(long, env = "FIXTURE_EMBEDDING_DIMENSION", default_value_t = 64)]
    pub fixture_embedding_dimension: usize,
}
