//! Tier selection.

use casefile_analyze::estimate_cost_cents;
use casefile_core::{AnalysisTier, CostModel, PipelineConfig};

/// Below this many characters a document is treated as having no text.
pub const MIN_USABLE_TEXT_CHARS: usize = 100;

/// Decides between the free rule-based pass and the paid AI pass.
#[derive(Debug, Clone)]
pub struct TierSelector {
    cost_model: CostModel,
    min_call_reserve_cents: f64,
    max_chunk_chars: usize,
    max_output_tokens: u32,
}

impl TierSelector {
    pub fn new(config: &PipelineConfig, cost_model: CostModel) -> Self {
        Self {
            cost_model,
            min_call_reserve_cents: config.min_call_reserve_cents,
            max_chunk_chars: config.max_chunk_chars,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// Worst-case Tier 1 cost for a text of `text_length` characters.
    pub fn estimate_cost_cents(&self, text_length: usize) -> f64 {
        estimate_cost_cents(
            &self.cost_model,
            text_length,
            self.max_chunk_chars,
            self.max_output_tokens,
        )
    }

    /// A forced tier always wins. Otherwise Tier 0 unless there is usable
    /// text and the budget can cover this document.
    pub fn choose_tier(
        &self,
        has_text: bool,
        text_length: usize,
        budget_remaining_cents: f64,
        forced: Option<AnalysisTier>,
    ) -> AnalysisTier {
        if let Some(tier) = forced {
            return tier;
        }
        if !has_text || text_length < MIN_USABLE_TEXT_CHARS {
            return AnalysisTier::Rules;
        }
        if self.budget_exhausted(text_length, budget_remaining_cents) {
            return AnalysisTier::Rules;
        }
        AnalysisTier::Ai
    }

    fn budget_exhausted(&self, text_length: usize, remaining: f64) -> bool {
        remaining <= 0.0
            || remaining < self.min_call_reserve_cents
            || self.estimate_cost_cents(text_length) > remaining
    }
}
