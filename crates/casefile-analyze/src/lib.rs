//! Casefile Analyze — Tier 1 document analysis.
//!
//! A document is split into page-aligned chunks, each chunk is sent to the
//! chat backend with a strict-JSON extraction prompt, and the parsed chunk
//! results are merged into a single `AnalysisResult`.

pub mod analyzer;
pub mod chunking;
pub mod merge;
pub mod parse;
pub mod prompt;

pub use analyzer::{
    estimate_cost_cents, AnalysisFailure, AnalyzerConfig, RequestPacer, Tier1Analyzer,
};
pub use chunking::{PageChunker, TextChunk, DEFAULT_MAX_CHUNK_CHARS};
pub use merge::merge_results;
pub use parse::{is_excluded_name, parse_chunk_response};
