//! Casefile LLM — the chat-completion seam used by Tier 1 analysis.
//!
//! One non-streaming request per call: system prompt plus user content in,
//! text plus token usage out. Any OpenAI-compatible endpoint works.

pub mod config;
pub mod error;
pub mod mock;
pub mod providers;
pub mod types;

pub use config::LlmConfig;
pub use error::ChatError;
pub use mock::ScriptedBackend;
pub use providers::{ChatBackend, OpenAiCompatBackend};
pub use types::*;
