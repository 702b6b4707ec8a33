//! Retrieval Primitives (C7): the building blocks node runners and the
//! streaming pipeline compose — embedding fan-out, candidate assembly plus
//! rerank, keyword intersection filtering, context packing, and URL
//! deduplication.

pub mod assembly;
pub mod embedding;

pub use assembly::{assemble_and_rerank, dedupe_urls, keyword_intersection_filter, pack_context};
pub use embedding::{embed_documents_ordered, embed_query, probe_dimension};
