//! Token → cents cost model.

use serde::{Deserialize, Serialize};

/// Per-million-token rates, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub input_cents_per_mtok: f64,
    pub output_cents_per_mtok: f64,
}

impl CostModel {
    pub const fn new(input_cents_per_mtok: f64, output_cents_per_mtok: f64) -> Self {
        Self {
            input_cents_per_mtok,
            output_cents_per_mtok,
        }
    }

    /// Cost of a call in cents, rounded up to the nearest 0.01¢.
    pub fn cost_cents(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let raw = input_tokens as f64 / 1e6 * self.input_cents_per_mtok
            + output_tokens as f64 / 1e6 * self.output_cents_per_mtok;
        round_up_hundredths(raw)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        // gpt-4o-mini list price: $0.15 / $0.60 per million tokens
        Self::new(15.0, 60.0)
    }
}

fn round_up_hundredths(cents: f64) -> f64 {
    if cents <= 0.0 {
        return 0.0;
    }
    // Snap to 1e-9 first so 0.07 stored as 0.0700000001 does not become 0.08.
    let scaled = (cents * 100.0 * 1e9).round() / 1e9;
    scaled.ceil() / 100.0
}
