//! End-to-end scheduler runs against the in-memory store and a scripted
//! chat backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use casefile_analyze::{AnalyzerConfig, Tier1Analyzer};
use casefile_core::{AnalysisResult, AnalysisTier, CostModel, Error, PipelineConfig, Result};
use casefile_llm::{ChatError, ScriptedBackend};
use casefile_runtime::{PriorityTable, RunOptions, Scheduler, StopReason};
use casefile_store::{
    AnalysisJob, ArtifactStore, BudgetLedger, Document, DocumentStore, DocumentUpdate,
    GraphStore, GraphUpsertReport, JobStatus, JobStore, MemoryStore, NewDocument, NewJob,
    NewSpend, PersonStore, QueueStats, SpendSummary,
};
use tempfile::TempDir;

const REPLY: &str = r#"{"documentType": "correspondence", "summary": "Letter.", "persons": [{"name": "Ghislaine Maxwell", "role": "sender", "mentionCount": 2}, {"name": "Sarah Kellen", "mentionCount": 1}], "connections": [{"person1": "Ghislaine Maxwell", "person2": "Sarah Kellen", "relationshipType": "associate", "strength": 3}]}"#;

fn letter(n: usize) -> String {
    format!(
        "Letter {n}. Ghislaine Maxwell wrote to Sarah Kellen about the schedule for the \
         coming week in New York. The letter is dated March 3, 2005 and was produced in discovery."
    )
}

fn config() -> PipelineConfig {
    PipelineConfig {
        request_delay_ms: 0,
        rate_limit_backoff_ms: 0,
        ..Default::default()
    }
}

fn tier1(backend: Arc<ScriptedBackend>, config: &PipelineConfig) -> Tier1Analyzer {
    let mut analyzer_config = AnalyzerConfig::from(config);
    analyzer_config.rate_limit_backoff = Duration::ZERO;
    Tier1Analyzer::new(backend, CostModel::new(15.0, 60.0), analyzer_config)
}

struct Fixture {
    store: Arc<MemoryStore>,
    artifacts: ArtifactStore,
    _dir: TempDir,
}

fn fixture(docs: &[(&str, Option<&str>, Option<String>)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    for (key, data_set, text) in docs {
        store
            .add_document(&NewDocument {
                document_key: key.to_string(),
                data_set_id: data_set.map(str::to_string),
                extracted_text: text.clone(),
                content_hash: None,
            })
            .unwrap();
    }
    let artifacts = ArtifactStore::new(dir.path().join("artifacts")).unwrap();
    Fixture {
        store,
        artifacts,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_next_batch_follows_data_set_priority() {
    let f = fixture(&[
        ("doc-1", Some("set-a"), Some(letter(1))),
        ("doc-2", Some("set-b"), Some(letter(2))),
        ("doc-3", Some("set-c"), Some(letter(3))),
    ]);
    let priorities = PriorityTable::new(
        vec![("set-a".into(), 80), ("set-b".into(), 100), ("set-c".into(), 40)],
        50,
    );
    let scheduler = Scheduler::new(f.store.clone(), f.artifacts.clone(), config(), None)
        .with_priorities(priorities);

    assert_eq!(scheduler.ensure_jobs(None).unwrap(), 3);
    assert_eq!(scheduler.ensure_jobs(None).unwrap(), 0);

    let batch = f.store.next_batch(2, None).unwrap();
    let docs: Vec<i64> = batch.iter().map(|j| j.document_id).collect();
    let doc2 = f.store.get_document(2).unwrap().unwrap();
    assert_eq!(doc2.document_key, "doc-2");
    assert_eq!(docs, vec![2, 1]);
    assert_eq!(batch[0].priority, 100);
}

#[tokio::test]
async fn test_tier0_run_without_provider() {
    let f = fixture(&[
        ("doc-1", None, Some(letter(1))),
        ("doc-2", None, None),
        ("doc-3", None, Some("short".into())),
    ]);
    let scheduler = Scheduler::new(f.store.clone(), f.artifacts.clone(), config(), None);

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.jobs_created, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.tier0, 3);
    assert_eq!(report.tier1, 0);
    assert_eq!(report.cost_cents, 0.0);
    assert_eq!(report.stop_reason, StopReason::QueueEmpty);

    let stats = f.store.queue_stats().unwrap();
    assert_eq!(stats.completed, 3);
    for id in 1..=3 {
        let doc = f.store.get_document(id).unwrap().unwrap();
        assert_eq!(doc.ai_analysis_status, JobStatus::Completed);
        assert!(f.artifacts.exists(&doc.document_key));
    }
    let persons = f.store.list_persons().unwrap();
    assert!(persons.iter().any(|p| p.name == "Ghislaine Maxwell"));
}

#[tokio::test]
async fn test_tier1_run_records_spend() {
    let f = fixture(&[
        ("doc-1", None, Some(letter(1))),
        ("doc-2", None, Some(letter(2))),
    ]);
    let config = config();
    let backend = Arc::new(
        ScriptedBackend::new("gpt-4o-mini")
            .reply(REPLY, 2_000, 300)
            .reply(REPLY, 1_000, 200),
    );
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(backend.call_count(), 2);
    assert_eq!(report.tier1, 2);
    assert_eq!(report.processed, 2);

    let model = CostModel::new(15.0, 60.0);
    let expected = model.cost_cents(2_000, 300) + model.cost_cents(1_000, 200);
    assert!((report.cost_cents - expected).abs() < 1e-9);
    assert!((report.remaining_budget_cents - (2000.0 - expected)).abs() < 1e-9);

    let records = f.store.spend_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].model, "gpt-4o-mini");
    let doc = f.store.get_document(1).unwrap().unwrap();
    assert!((doc.ai_cost_cents - model.cost_cents(2_000, 300)).abs() < 1e-9);

    let artifact = f.artifacts.load("doc-1").unwrap().unwrap();
    assert_eq!(artifact.tier, AnalysisTier::Ai);
    assert_eq!(artifact.document_type, "correspondence");
    assert!(artifact.analyzed_at.is_some());

    let status = scheduler.status().unwrap();
    assert_eq!(status.spend.records, 2);
    assert_eq!(status.queue.completed, 2);
}

#[tokio::test]
async fn test_exhausted_budget_stops_run() {
    let f = fixture(&[("doc-1", None, Some(letter(1)))]);
    let config = PipelineConfig {
        monthly_cap_cents: 0.0,
        ..config()
    };
    let backend = Arc::new(ScriptedBackend::new("m"));
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(report.processed, 0);
    assert_eq!(f.store.queue_stats().unwrap().pending, 1);

    // Tier 0 is free, so a forced tier 0 run is not stopped by the budget.
    let options = RunOptions {
        forced_tier: Some(AnalysisTier::Rules),
        ..Default::default()
    };
    let report = scheduler.run(&options).await.unwrap();
    assert_eq!(report.tier0, 1);
    assert_eq!(report.stop_reason, StopReason::QueueEmpty);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_cached_artifact_skips_analysis() {
    let f = fixture(&[("doc-1", None, Some(letter(1)))]);
    let cached = AnalysisResult {
        tier: AnalysisTier::Ai,
        summary: "From a previous run.".into(),
        persons: vec![casefile_core::PersonMention {
            name: "Jean-Luc Brunel".into(),
            mention_count: 1,
            ..Default::default()
        }],
        ..Default::default()
    };
    f.artifacts.save("doc-1", &cached).unwrap();

    let config = config();
    let backend = Arc::new(ScriptedBackend::new("m"));
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.cached, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.cost_cents, 0.0);
    assert_eq!(backend.call_count(), 0);
    assert!(f.store.spend_records().is_empty());
    let persons = f.store.list_persons().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].name, "Jean-Luc Brunel");
}

#[tokio::test]
async fn test_provider_rejection_fails_job_after_attempts() {
    let f = fixture(&[("doc-1", None, Some(letter(1)))]);
    let config = config();
    let rejected = || ChatError::Api {
        status: 401,
        body: "invalid api key".into(),
    };
    let backend = Arc::new(
        ScriptedBackend::new("m")
            .fail(rejected())
            .fail(rejected())
            .fail(rejected()),
    );
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(backend.call_count(), 3);
    assert_eq!(report.retried, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 0);

    let stats = f.store.queue_stats().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.failed_jobs[0].attempts, 3);
    assert!(stats.failed_jobs[0]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("401")));
    let doc = f.store.get_document(1).unwrap().unwrap();
    assert_eq!(doc.ai_analysis_status, JobStatus::Failed);
    assert!(!f.artifacts.exists("doc-1"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let f = fixture(&[
        ("doc-1", Some("correspondence"), Some(letter(1))),
        ("doc-2", Some("photos"), None),
    ]);
    let config = config();
    let backend = Arc::new(ScriptedBackend::new("m"));
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );

    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = scheduler.run(&options).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.planned.len(), 2);
    assert_eq!(report.planned[0].document_key, "doc-1");
    assert_eq!(report.planned[0].tier, AnalysisTier::Ai);
    assert!(report.planned[0].estimated_cost_cents > 0.0);
    assert_eq!(report.planned[1].tier, AnalysisTier::Rules);
    assert_eq!(report.planned[1].estimated_cost_cents, 0.0);

    assert_eq!(f.store.queue_stats().unwrap().total(), 0);
    assert_eq!(backend.call_count(), 0);
    assert!(!f.artifacts.exists("doc-1"));
}

#[tokio::test]
async fn test_run_limit() {
    let f = fixture(&[
        ("doc-1", None, Some(letter(1))),
        ("doc-2", None, Some(letter(2))),
        ("doc-3", None, Some(letter(3))),
    ]);
    let scheduler = Scheduler::new(f.store.clone(), f.artifacts.clone(), config(), None);
    let options = RunOptions {
        batch_size: 2,
        limit: Some(1),
        ..Default::default()
    };

    let report = scheduler.run(&options).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.stop_reason, StopReason::LimitReached);
    assert_eq!(f.store.queue_stats().unwrap().pending, 2);
}

#[tokio::test]
async fn test_forced_tier1_without_text_falls_back_to_rules() {
    let f = fixture(&[("scan-1", Some("photos"), None)]);
    let config = config();
    let backend = Arc::new(ScriptedBackend::new("m"));
    let scheduler = Scheduler::new(
        f.store.clone(),
        f.artifacts.clone(),
        config.clone(),
        Some(tier1(backend.clone(), &config)),
    );
    let forced = RunOptions {
        forced_tier: Some(AnalysisTier::Ai),
        ..Default::default()
    };

    let plan = scheduler
        .run(&RunOptions {
            dry_run: true,
            ..forced.clone()
        })
        .await
        .unwrap();
    assert_eq!(plan.planned[0].tier, AnalysisTier::Rules);
    assert_eq!(plan.planned[0].estimated_cost_cents, 0.0);

    let report = scheduler.run(&forced).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.tier0, 1);
    assert_eq!(report.tier1, 0);
    assert_eq!(report.cost_cents, 0.0);
    assert_eq!(backend.call_count(), 0);
    assert!(f.store.spend_records().is_empty());

    let artifact = f.artifacts.load("scan-1").unwrap().unwrap();
    assert_eq!(artifact.tier, AnalysisTier::Rules);
    assert_eq!(artifact.document_key.as_deref(), Some("scan-1"));
}

#[tokio::test]
async fn test_similar_keys_do_not_share_artifacts() {
    let f = fixture(&[
        ("memo a", None, Some(letter(1))),
        (
            "memo_a",
            None,
            Some(
                "Memo. Lesley Groff scheduled a call with Alan Dershowitz for the following \
                 Tuesday regarding the Palm Beach matter and the pending correspondence."
                    .into(),
            ),
        ),
    ]);
    let scheduler = Scheduler::new(f.store.clone(), f.artifacts.clone(), config(), None);

    let report = scheduler.run(&RunOptions::default()).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.cached, 0);
    assert_eq!(report.tier0, 2);

    let names: Vec<String> = f
        .store
        .list_persons()
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert!(names.iter().any(|n| n == "Ghislaine Maxwell"));
    assert!(names.iter().any(|n| n == "Lesley Groff"));
    assert!(names.iter().any(|n| n == "Alan Dershowitz"));
    assert_ne!(f.artifacts.path_for("memo a"), f.artifacts.path_for("memo_a"));
}

/// Delegates to a [`MemoryStore`] but refuses to claim jobs.
struct UnclaimableStore(MemoryStore);

impl DocumentStore for UnclaimableStore {
    fn add_document(&self, doc: &NewDocument) -> Result<i64> {
        self.0.add_document(doc)
    }
    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        self.0.get_document(id)
    }
    fn pending_documents(&self, data_sets: Option<&[String]>) -> Result<Vec<Document>> {
        self.0.pending_documents(data_sets)
    }
    fn extracted_text(&self, id: i64) -> Result<Option<String>> {
        self.0.extracted_text(id)
    }
    fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<()> {
        self.0.update_document(id, update)
    }
}

impl JobStore for UnclaimableStore {
    fn has_active_job(&self, document_id: i64, job_type: &str) -> Result<bool> {
        self.0.has_active_job(document_id, job_type)
    }
    fn create_job(&self, job: &NewJob) -> Result<Option<i64>> {
        self.0.create_job(job)
    }
    fn get_job(&self, id: i64) -> Result<Option<AnalysisJob>> {
        self.0.get_job(id)
    }
    fn next_batch(&self, limit: usize, data_sets: Option<&[String]>) -> Result<Vec<AnalysisJob>> {
        self.0.next_batch(limit, data_sets)
    }
    fn mark_processing(&self, id: i64) -> Result<()> {
        Err(Error::Database(format!("database is locked (job {})", id)))
    }
    fn mark_completed(&self, id: i64) -> Result<()> {
        self.0.mark_completed(id)
    }
    fn mark_failed(&self, id: i64, error: &str) -> Result<JobStatus> {
        self.0.mark_failed(id, error)
    }
    fn queue_stats(&self) -> Result<QueueStats> {
        self.0.queue_stats()
    }
}

impl BudgetLedger for UnclaimableStore {
    fn record_spend(&self, spend: &NewSpend, at: DateTime<Utc>) -> Result<i64> {
        self.0.record_spend(spend, at)
    }
    fn monthly_spend(&self, now: DateTime<Utc>) -> Result<f64> {
        self.0.monthly_spend(now)
    }
    fn spend_summary(&self, now: DateTime<Utc>) -> Result<SpendSummary> {
        self.0.spend_summary(now)
    }
}

impl GraphStore for UnclaimableStore {
    fn apply_analysis(&self, document_id: i64, result: &AnalysisResult) -> Result<GraphUpsertReport> {
        self.0.apply_analysis(document_id, result)
    }
}

#[tokio::test]
async fn test_unclaimable_job_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(UnclaimableStore(MemoryStore::new()));
    store
        .add_document(&NewDocument {
            document_key: "doc-1".into(),
            extracted_text: Some(letter(1)),
            ..Default::default()
        })
        .unwrap();
    let artifacts = ArtifactStore::new(dir.path().join("artifacts")).unwrap();
    let scheduler = Scheduler::new(store.clone(), artifacts.clone(), config(), None);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(&RunOptions::default()),
    )
    .await
    .expect("run kept polling a job it could not claim");
    assert!(matches!(outcome, Err(Error::Database(_))));
    assert_eq!(store.queue_stats().unwrap().pending, 1);
    assert!(!artifacts.exists("doc-1"));
}
