//! The `HistoryHandle` capability (engine-side trait lives in
//! `ragflow-engine::runner`): an in-memory implementation for tests and a
//! SQLite-backed implementation for production use, each scoped to one
//! conversation id.

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryHistoryHandle, InMemoryHistoryStore};
pub use sqlite::{SqliteHistoryHandle, SqliteHistoryStore};
