//! Runtime types.

use serde::Serialize;

use casefile_core::AnalysisTier;
use casefile_store::{QueueStats, SpendSummary};

/// Why a scheduler run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No pending jobs left.
    QueueEmpty,
    /// The per-run document limit was reached.
    LimitReached,
    /// The monthly budget is spent.
    BudgetExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::QueueEmpty => "queue empty",
            Self::LimitReached => "limit reached",
            Self::BudgetExhausted => "budget exhausted",
        })
    }
}

/// Per-run knobs, typically from CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_size: usize,
    /// Maximum jobs processed in this run.
    pub limit: Option<usize>,
    pub forced_tier: Option<AnalysisTier>,
    pub data_sets: Option<Vec<String>>,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            limit: None,
            forced_tier: None,
            data_sets: None,
            dry_run: false,
        }
    }
}

impl RunOptions {
    pub(crate) fn data_sets(&self) -> Option<&[String]> {
        self.data_sets.as_deref().filter(|s| !s.is_empty())
    }
}

/// A job a dry run would process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedJob {
    /// `None` for documents whose job does not exist yet.
    pub job_id: Option<i64>,
    pub document_id: i64,
    pub document_key: String,
    pub data_set_id: Option<String>,
    pub priority: i32,
    pub tier: AnalysisTier,
    pub estimated_cost_cents: f64,
}

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub dry_run: bool,
    pub jobs_created: usize,
    /// Jobs completed in this run.
    pub processed: usize,
    pub tier0: usize,
    pub tier1: usize,
    /// Completed from an existing artifact without re-analysis.
    pub cached: usize,
    /// Jobs that failed and went back to pending.
    pub retried: usize,
    /// Jobs that failed terminally.
    pub failed: usize,
    pub cost_cents: f64,
    pub remaining_budget_cents: f64,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedJob>,
}

impl RunReport {
    pub(crate) fn new(run_id: String, dry_run: bool, remaining_budget_cents: f64) -> Self {
        Self {
            run_id,
            dry_run,
            jobs_created: 0,
            processed: 0,
            tier0: 0,
            tier1: 0,
            cached: 0,
            retried: 0,
            failed: 0,
            cost_cents: 0.0,
            remaining_budget_cents,
            stop_reason: StopReason::QueueEmpty,
            planned: Vec::new(),
        }
    }

    /// Jobs taken off the queue, whatever their outcome.
    pub fn attempted(&self) -> usize {
        self.processed + self.retried + self.failed
    }
}

/// Queue and spend snapshot for `--status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub queue: QueueStats,
    pub spend: SpendSummary,
    pub monthly_cap_cents: f64,
    pub remaining_budget_cents: f64,
}
