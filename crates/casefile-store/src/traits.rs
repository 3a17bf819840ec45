//! Storage seams. The scheduler and the deduplicator only see these traits,
//! so both run unchanged against [`SqliteStore`](crate::SqliteStore) and
//! [`MemoryStore`](crate::MemoryStore).

use casefile_core::{AnalysisResult, Result};
use chrono::{DateTime, Utc};

use crate::types::*;

/// The external document store.
pub trait DocumentStore: Send + Sync {
    /// Insert a document. Fails with `Error::DuplicateContent` when the
    /// content hash exists, else `Error::DuplicateKey` when the key is taken.
    fn add_document(&self, doc: &NewDocument) -> Result<i64>;

    fn get_document(&self, id: i64) -> Result<Option<Document>>;

    /// Documents whose analysis status is `pending`, optionally restricted
    /// to a set of data-set ids. Ordered by id.
    fn pending_documents(&self, data_sets: Option<&[String]>) -> Result<Vec<Document>>;

    /// Extracted text, or `None` when extraction produced nothing.
    fn extracted_text(&self, id: i64) -> Result<Option<String>>;

    fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<()>;
}

/// The persistent analysis job queue.
pub trait JobStore: Send + Sync {
    /// Whether a pending/processing job of `job_type` exists for the document.
    fn has_active_job(&self, document_id: i64, job_type: &str) -> Result<bool>;

    /// Insert a job. Returns `None` if an active job already exists for the
    /// document and job type.
    fn create_job(&self, job: &NewJob) -> Result<Option<i64>>;

    fn get_job(&self, id: i64) -> Result<Option<AnalysisJob>>;

    /// Top `limit` pending jobs by priority desc, then id asc.
    fn next_batch(&self, limit: usize, data_sets: Option<&[String]>) -> Result<Vec<AnalysisJob>>;

    /// pending → processing.
    fn mark_processing(&self, id: i64) -> Result<()>;

    /// processing → completed.
    fn mark_completed(&self, id: i64) -> Result<()>;

    /// Record a failed attempt. Returns the new status: `pending` for a
    /// retry, `failed` once `attempts + 1 >= max_attempts`.
    fn mark_failed(&self, id: i64, error: &str) -> Result<JobStatus>;

    fn queue_stats(&self) -> Result<QueueStats>;
}

/// Append-only spend ledger.
pub trait BudgetLedger: Send + Sync {
    /// Append a record and add its cost to the document's `ai_cost_cents`.
    fn record_spend(&self, spend: &NewSpend, at: DateTime<Utc>) -> Result<i64>;

    /// Sum of `cost_cents` for the calendar month containing `now`.
    fn monthly_spend(&self, now: DateTime<Utc>) -> Result<f64>;

    fn spend_summary(&self, now: DateTime<Utc>) -> Result<SpendSummary>;
}

/// Person/connection/event upsert from analysis output.
pub trait GraphStore: Send + Sync {
    /// Upsert the persons, connections, and events of one document's
    /// result. Re-applying the same result is a no-op.
    fn apply_analysis(&self, document_id: i64, result: &AnalysisResult)
        -> Result<GraphUpsertReport>;
}

/// Person table access for identity resolution.
pub trait PersonStore: Send + Sync {
    fn list_persons(&self) -> Result<Vec<Person>>;

    fn list_connections(&self) -> Result<Vec<PersonConnection>>;

    /// Fold `duplicate_ids` into `canonical_id` in one transaction: repoint
    /// person-document links and connections, add the duplicates' names and
    /// aliases to the canonical aliases, delete the duplicates, drop
    /// self-loops and repeated pairs touching the canonical person, and
    /// recompute counts.
    fn merge_persons(&self, canonical_id: i64, duplicate_ids: &[i64]) -> Result<()>;

    /// Delete connections where `person_id1 == person_id2`.
    fn purge_self_connections(&self) -> Result<usize>;

    /// Keep one row per unordered person pair (max strength survives).
    fn collapse_duplicate_connections(&self) -> Result<usize>;
}
