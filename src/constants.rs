//! Documented constants for the recall and space pipelines.
//!
//! Every threshold the quality filter, budget trimmer, and clustering
//! trigger rely on lives here as a named constant. Callers override them
//! through `RecallOptions` / `SpaceConfig`; nothing in the pipeline repeats
//! these values as literals.

// =============================================================================
// QUALITY FILTER THRESHOLDS
// =============================================================================

/// Score floor for episodes whose primary source is the graph keyword match
/// or BFS traversal.
///
/// Lexical (BM25) and hop-decayed graph scores are unbounded above and
/// routinely land in the 5-20 range for a real match, so the floor sits much
/// higher than the similarity-based floors.
pub const GRAPH_SOURCE_FLOOR: f32 = 5.0;

/// Score floor for episodes found only by embedding similarity.
///
/// Fused vector contributions combine the statement-level and episode-level
/// similarity signals, so a solid match exceeds 1.0 even though a single
/// cosine tops out at 1.0.
pub const VECTOR_SOURCE_FLOOR: f32 = 1.0;

/// Score floor for episodes found only by keyword rank.
///
/// Keyword-rank scores are 1/rank, so 0.3 keeps roughly the top three ranks
/// of a keyword-only result.
pub const KEYWORD_SOURCE_FLOOR: f32 = 0.3;

/// Overall confidence at or above which the result set is returned without
/// any LLM validation step.
pub const CONFIDENT_THRESHOLD: f32 = 0.7;

/// Overall confidence below which the result set is treated as no-match and
/// returned empty with an explanatory message. Between this and
/// [`CONFIDENT_THRESHOLD`] the set is flagged for optional validation.
pub const UNCERTAIN_THRESHOLD: f32 = 0.3;

/// Minimum ratio between adjacent ranked scores before the list is truncated
/// at the gap.
///
/// With the default 0.5, a drop from 8.5 to 3.0 (ratio 0.35) cuts the list
/// after the 8.5 entry even when later scores still clear their floor.
pub const MIN_SCORE_GAP_RATIO: f32 = 0.5;

// Confidence blend weights. Must sum to 1.0. The gap bonus is only granted
// when a gap cut actually separated the survivors from a weaker tail.
pub const CONFIDENCE_SCORE_WEIGHT: f32 = 0.6;
pub const CONFIDENCE_COUNT_WEIGHT: f32 = 0.25;
pub const CONFIDENCE_GAP_BONUS: f32 = 0.15;

/// Survivor count at which the count component of confidence saturates.
pub const CONFIDENCE_COUNT_SATURATION: usize = 3;

/// Fractional headroom above the per-source floor at which the score
/// component of confidence saturates. An episode exactly at its floor
/// contributes nothing; one 50% above the floor contributes the full
/// score weight.
pub const CONFIDENCE_SCORE_HEADROOM: f32 = 0.5;

// =============================================================================
// RECALL DEFAULTS
// =============================================================================

/// Default number of results each strategy runner asks the store for.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Default maximum hop distance for the graph BFS runner.
pub const DEFAULT_MAX_BFS_DEPTH: usize = 2;

/// Per-request wall-clock deadline. Runners that have not returned when it
/// expires contribute empty result sets.
pub const DEFAULT_RECALL_DEADLINE_MS: u64 = 5_000;

/// Hop-distance decay applied to graph BFS scores: each hop multiplies the
/// seed match relevance by this factor.
pub const BFS_HOP_DECAY: f32 = 0.5;

/// Base relevance assigned to a direct (hop-0) entity match in the graph,
/// before hop decay. Keeps graph scores in the same wide range as BM25.
pub const GRAPH_SEED_MATCH_SCORE: f32 = 10.0;

// =============================================================================
// BUDGET TRIMMER
// =============================================================================

/// Default serialized-output budget for a recall response, in tokens.
pub const DEFAULT_TOKEN_BUDGET: usize = 10_000;

/// Approximate characters per token used when estimating serialized cost.
pub const APPROX_CHARS_PER_TOKEN: usize = 4;

// =============================================================================
// RECENCY SORT WEIGHTS
// Age buckets applied when the caller asks for recency-weighted ordering.
// =============================================================================

pub const RECENCY_FULL_DAYS: i64 = 7;
pub const RECENCY_HIGH_DAYS: i64 = 30;
pub const RECENCY_MEDIUM_DAYS: i64 = 90;
pub const RECENCY_HIGH_WEIGHT: f32 = 0.7;
pub const RECENCY_MEDIUM_WEIGHT: f32 = 0.4;
pub const RECENCY_LOW_WEIGHT: f32 = 0.1;

// =============================================================================
// SPACE LIFECYCLE
// =============================================================================

/// Unclustered-episode count per owner that triggers a clustering run.
pub const CLUSTER_TRIGGER_THRESHOLD: usize = 20;

/// Minimum cosine similarity between a statement embedding and the nearest
/// space centroid for the statement to be assigned. Statements below this
/// stay unassigned (cluster noise).
pub const CLUSTER_ASSIGN_MIN_SIMILARITY: f32 = 0.35;

/// How long a per-owner clustering lease stays valid before it is considered
/// abandoned and may be re-acquired.
pub const CLUSTER_LEASE_TTL_SECS: i64 = 300;

/// Number of topic keywords generated per space.
pub const SPACE_KEYWORD_COUNT: usize = 10;

/// Shortest token the rule-based keyword generator will consider.
pub const KEYWORD_MIN_TOKEN_LEN: usize = 3;

// =============================================================================
// VALIDATION LIMITS
// =============================================================================

/// Maximum recall query length in characters.
pub const MAX_QUERY_LENGTH: usize = 4_096;

/// Maximum owner id length in characters.
pub const MAX_OWNER_ID_LENGTH: usize = 128;

/// Maximum number of results a caller may request in one recall.
pub const MAX_RESULT_LIMIT: usize = 200;

/// Maximum BFS depth a caller may request.
pub const MAX_BFS_DEPTH_LIMIT: usize = 5;
