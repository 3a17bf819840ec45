//! Row types for documents, analysis jobs, the budget ledger, and the
//! person graph.

use serde::{Deserialize, Serialize};

/// Job type for per-document analysis jobs.
pub const ANALYSIS_JOB_TYPE: &str = "document_analysis";

/// Default job attempt limit.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Pending and processing jobs block creation of another job.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document's `aiAnalysisStatus`. Shares the job vocabulary.
pub type DocumentStatus = JobStatus;

/// A document as seen by the pipeline (text fetched separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    /// Stable identifier used to name the analysis artifact.
    pub document_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_set_id: Option<String>,
    pub has_text: bool,
    pub text_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub ai_analysis_status: DocumentStatus,
    pub ai_cost_cents: f64,
    pub created_at: i64,
}

/// Input for inserting a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub document_key: String,
    pub data_set_id: Option<String>,
    pub extracted_text: Option<String>,
    pub content_hash: Option<String>,
}

/// Fields the pipeline writes back to a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub ai_analysis_status: Option<DocumentStatus>,
    pub ai_cost_cents: Option<f64>,
}

/// Denormalized hints carried on each job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_id: Option<String>,
    #[serde(default)]
    pub has_text: bool,
    #[serde(default)]
    pub text_length: usize,
}

/// One analysis job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: i64,
    pub document_id: i64,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: JobMetadata,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl AnalysisJob {
    pub fn data_set_id(&self) -> Option<&str> {
        self.metadata.data_set_id.as_deref()
    }
}

/// Input for inserting a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub document_id: i64,
    pub job_type: String,
    pub priority: i32,
    pub max_attempts: u32,
    pub metadata: JobMetadata,
}

impl NewJob {
    pub fn analysis(document_id: i64, priority: i32, metadata: JobMetadata) -> Self {
        Self {
            document_id,
            job_type: ANALYSIS_JOB_TYPE.to_string(),
            priority,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            metadata,
        }
    }
}

/// A terminally failed job, for the status report.
#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub job_id: i64,
    pub document_id: i64,
    pub attempts: u32,
    pub error_message: Option<String>,
}

/// Queue snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub failed_jobs: Vec<FailedJob>,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Input for a ledger entry; one per Tier-1 invocation.
#[derive(Debug, Clone)]
pub struct NewSpend {
    pub document_id: i64,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_cents: f64,
}

/// An immutable ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetRecord {
    pub id: i64,
    pub document_id: i64,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_cents: f64,
    /// Milliseconds since the Unix epoch (UTC).
    pub created_at: i64,
}

/// Month-to-date ledger aggregate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpendSummary {
    /// `YYYY-MM`.
    pub month: String,
    pub spent_cents: f64,
    pub records: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A person row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub aliases: Vec<String>,
    pub category: String,
    pub role: String,
    pub description: String,
    pub document_count: i64,
    pub connection_count: i64,
}

impl Person {
    /// Score used to pick the canonical member of a duplicate group.
    pub fn weight(&self) -> i64 {
        self.document_count + self.connection_count
    }
}

/// A connection row between two person ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonConnection {
    pub id: i64,
    pub person_id1: i64,
    pub person_id2: i64,
    pub connection_type: String,
    pub description: String,
    pub strength: u8,
}

impl PersonConnection {
    /// The unordered person pair, smaller id first.
    pub fn pair(&self) -> (i64, i64) {
        if self.person_id1 <= self.person_id2 {
            (self.person_id1, self.person_id2)
        } else {
            (self.person_id2, self.person_id1)
        }
    }
}

/// What a graph upsert changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphUpsertReport {
    pub persons_created: usize,
    pub person_links: usize,
    pub connections_created: usize,
    pub connections_updated: usize,
    pub events_created: usize,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `[start, end)` of the calendar month containing `now`, in epoch millis.
pub(crate) fn month_bounds(now: chrono::DateTime<chrono::Utc>) -> (i64, i64) {
    use chrono::{Datelike, TimeZone, Utc};
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let (ny, nm) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(ny, nm, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (start.timestamp_millis(), end.timestamp_millis())
}

pub(crate) fn month_label(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y-%m").to_string()
}
