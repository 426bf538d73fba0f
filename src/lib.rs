//! # smriti-memory
//!
//! Temporal knowledge-graph memory for agents: episodes in, statements with
//! validity intervals out, organized into topical spaces, recalled through
//! four fused retrieval strategies with adaptive quality filtering.
//!
//! The pipeline for one recall:
//!
//! 1. validate the request
//! 2. run keyword (BM25), vector, graph BFS, and episode-vector search
//!    concurrently under a deadline
//! 3. fuse results per episode, preserving per-source provenance
//! 4. apply per-source score floors, gap truncation, and the confidence
//!    decision
//! 5. optionally validate borderline sets and rerank
//! 6. trim to the caller's token budget
//!
//! Embedding generation and fact extraction are collaborator concerns; this
//! crate stores and recalls what it is given.

pub mod config;
pub mod constants;
pub mod errors;
pub mod llm;
pub mod recall;
pub mod similarity;
pub mod spaces;
pub mod store;
pub mod tracing_setup;
pub mod types;
pub mod validation;

pub use config::{QualityThresholds, RecallOptions, SpaceConfig};
pub use errors::{ErrorResponse, MemoryError, Result};
pub use llm::{LanguageModel, NoopLanguageModel};
pub use recall::fusion::{RetrievalSource, SourceHits, SourceScores};
pub use recall::quality::QualityDecision;
pub use recall::rerank::{EmbeddingReranker, NoopReranker, Reranker, RerankerKind};
pub use recall::RecallEngine;
pub use spaces::{SpaceLifecycleController, SpaceStatus};
pub use store::{EmbeddedStore, MemoryStore, SearchFilters};
pub use tracing_setup::init_tracing;
pub use types::{
    Episode, EpisodeId, RecallRequest, RecallResponse, RecallStats, RecalledEpisode, SortBy,
    Space, SpaceId, SpaceType, Statement, StatementId, TimeWindow,
};

// Re-exported for downstream type compatibility
pub use chrono;
pub use uuid;
