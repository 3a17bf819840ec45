//! Tier 1 analyzer: one extraction request per chunk, bounded retries,
//! merged result with summed token usage and cost.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use casefile_core::{AnalysisResult, AnalysisTier, CostModel, PipelineConfig};
use casefile_llm::{ChatBackend, ChatError, Completion, CompletionRequest};

use crate::chunking::{PageChunker, TextChunk};
use crate::merge::merge_results;
use crate::parse::parse_chunk_response;
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};

/// Rough characters-per-token ratio used for cost estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Framing added to every chunk's user message.
const USER_FRAMING_TOKENS: usize = 20;

/// Enforces a minimum gap between consecutive provider calls.
#[derive(Debug)]
pub struct RequestPacer {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    /// Sleep until `min_interval` has passed since the previous call, then
    /// stamp the current call.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub max_chunk_chars: usize,
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub max_chunk_attempts: u32,
    pub rate_limit_backoff: Duration,
}

impl From<&PipelineConfig> for AnalyzerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_chunk_chars: config.max_chunk_chars,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            max_chunk_attempts: config.max_chunk_attempts.max(1),
            rate_limit_backoff: config.rate_limit_backoff(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// A provider error that cannot be retried aborted the document. Tokens
/// already consumed by earlier chunks are still reported so they can be
/// recorded as spend.
#[derive(Error, Debug)]
#[error("Tier 1 analysis aborted: {error}")]
pub struct AnalysisFailure {
    #[source]
    pub error: ChatError,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_cents: f64,
}

pub struct Tier1Analyzer {
    backend: Arc<dyn ChatBackend>,
    cost_model: CostModel,
    config: AnalyzerConfig,
    chunker: PageChunker,
}

impl Tier1Analyzer {
    pub fn new(backend: Arc<dyn ChatBackend>, cost_model: CostModel, config: AnalyzerConfig) -> Self {
        let chunker = PageChunker::new(config.max_chunk_chars);
        Self {
            backend,
            cost_model,
            config,
            chunker,
        }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Estimated worst-case cost of analyzing `text_chars` characters.
    pub fn estimate_cost_cents(&self, text_chars: usize) -> f64 {
        estimate_cost_cents(
            &self.cost_model,
            text_chars,
            self.config.max_chunk_chars,
            self.config.max_output_tokens,
        )
    }

    /// Analyze one document. Unparseable or exhausted chunks are skipped;
    /// if none succeed the result is the "unable to analyze" placeholder.
    pub async fn analyze(
        &self,
        text: &str,
        pacer: &mut RequestPacer,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        let chunks = self.chunker.chunk(text);
        debug!("Analyzing {} chars in {} chunks", text.chars().count(), chunks.len());

        let mut partials = Vec::with_capacity(chunks.len());
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;
        let mut chunks_failed = 0u32;

        for chunk in &chunks {
            match self.complete_chunk(chunk, pacer).await {
                Ok(Some(completion)) => {
                    input_tokens += completion.input_tokens;
                    output_tokens += completion.output_tokens;
                    match parse_chunk_response(&completion.content) {
                        Some(partial) => partials.push(partial),
                        None => {
                            warn!(
                                "Chunk {}/{} returned unparseable output, skipping",
                                chunk.chunk_index + 1,
                                chunk.total_chunks
                            );
                            chunks_failed += 1;
                        }
                    }
                }
                Ok(None) => chunks_failed += 1,
                Err(error) => {
                    return Err(AnalysisFailure {
                        error,
                        input_tokens,
                        output_tokens,
                        cost_cents: self.cost_model.cost_cents(input_tokens, output_tokens),
                    });
                }
            }
        }

        let chunks_analyzed = partials.len() as u32;
        let mut result = if partials.is_empty() {
            warn!("No chunk of {} could be analyzed", chunks.len());
            AnalysisResult::unable_to_analyze()
        } else {
            merge_results(partials)
        };
        result.tier = AnalysisTier::Ai;
        result.model = Some(self.backend.model().to_string());
        result.input_tokens = input_tokens;
        result.output_tokens = output_tokens;
        result.cost_cents = self.cost_model.cost_cents(input_tokens, output_tokens);
        result.chunks_analyzed = chunks_analyzed;
        result.chunks_failed = chunks_failed;

        info!(
            "Tier 1 analysis: {}/{} chunks, {} in / {} out tokens, {:.2}¢",
            chunks_analyzed,
            chunks.len(),
            input_tokens,
            output_tokens,
            result.cost_cents
        );
        Ok(result)
    }

    /// `Ok(None)` means the chunk was dropped after exhausting its attempts.
    async fn complete_chunk(
        &self,
        chunk: &TextChunk,
        pacer: &mut RequestPacer,
    ) -> Result<Option<Completion>, ChatError> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_user_prompt(chunk),
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        };
        let attempts = self.config.max_chunk_attempts.max(1);

        for attempt in 1..=attempts {
            pacer.wait().await;
            match self.backend.complete(&request).await {
                Ok(completion) => return Ok(Some(completion)),
                Err(e) if e.is_rate_limit() => {
                    warn!(
                        "Rate limited on chunk {}/{} (attempt {}/{}): {}",
                        chunk.chunk_index + 1,
                        chunk.total_chunks,
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.rate_limit_backoff).await;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Transient error on chunk {}/{} (attempt {}/{}): {}",
                        chunk.chunk_index + 1,
                        chunk.total_chunks,
                        attempt,
                        attempts,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            "Dropping chunk {}/{} after {} attempts",
            chunk.chunk_index + 1,
            chunk.total_chunks,
            attempts
        );
        Ok(None)
    }
}

/// Estimated cost of analyzing `text_chars` characters: text tokens plus
/// the prompt overhead and the full output allowance for every chunk.
pub fn estimate_cost_cents(
    cost_model: &CostModel,
    text_chars: usize,
    max_chunk_chars: usize,
    max_output_tokens: u32,
) -> f64 {
    if text_chars == 0 {
        return 0.0;
    }
    let chunks = text_chars.div_ceil(max_chunk_chars.max(1));
    let overhead = SYSTEM_PROMPT.chars().count().div_ceil(CHARS_PER_TOKEN) + USER_FRAMING_TOKENS;
    let input = text_chars.div_ceil(CHARS_PER_TOKEN) + chunks * overhead;
    let output = chunks as u64 * max_output_tokens as u64;
    cost_model.cost_cents(input as u64, output)
}
