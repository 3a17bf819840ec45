//! Scheduler: drives the job queue through Tier 0 / Tier 1 analysis under
//! the monthly budget.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use casefile_analyze::{RequestPacer, Tier1Analyzer};
use casefile_core::{AnalysisResult, AnalysisTier, CostModel, Error, PipelineConfig, Result};
use casefile_store::{
    AnalysisJob, ArtifactStore, BudgetLedger, Document, DocumentStatus, DocumentStore,
    DocumentUpdate, GraphStore, JobMetadata, JobStatus, JobStore, NewJob, NewSpend,
    ANALYSIS_JOB_TYPE,
};

use crate::priority::PriorityTable;
use crate::selector::TierSelector;
use crate::types::*;

/// Everything the scheduler needs from storage.
pub trait PipelineStore: DocumentStore + JobStore + BudgetLedger + GraphStore {}

impl<T: DocumentStore + JobStore + BudgetLedger + GraphStore> PipelineStore for T {}

/// Mutable state of one run, threaded through every job.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    /// `cap - monthly spend` at start, decremented after each Tier 1 call.
    pub budget_remaining_cents: f64,
    pub pacer: RequestPacer,
}

impl RunContext {
    pub fn new(budget_remaining_cents: f64, pacer: RequestPacer) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            budget_remaining_cents,
            pacer,
        }
    }
}

/// Per-job failure. `Abort` stops the whole run.
enum JobError {
    Failed(String),
    Abort(Error),
}

impl From<Error> for JobError {
    fn from(e: Error) -> Self {
        JobError::Failed(e.to_string())
    }
}

pub struct Scheduler<S: PipelineStore> {
    store: Arc<S>,
    artifacts: ArtifactStore,
    analyzer: Option<Tier1Analyzer>,
    selector: TierSelector,
    priorities: PriorityTable,
    config: PipelineConfig,
}

impl<S: PipelineStore> Scheduler<S> {
    /// Without an analyzer every document is classified with Tier 0.
    pub fn new(
        store: Arc<S>,
        artifacts: ArtifactStore,
        config: PipelineConfig,
        analyzer: Option<Tier1Analyzer>,
    ) -> Self {
        let cost_model = analyzer
            .as_ref()
            .map(|a| *a.cost_model())
            .unwrap_or_else(CostModel::default);
        Self {
            selector: TierSelector::new(&config, cost_model),
            priorities: PriorityTable::builtin(config.default_priority),
            store,
            artifacts,
            analyzer,
            config,
        }
    }

    pub fn with_priorities(mut self, priorities: PriorityTable) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Create a job for every pending document that has no active job.
    pub fn ensure_jobs(&self, data_sets: Option<&[String]>) -> Result<usize> {
        let mut created = 0;
        for doc in self.store.pending_documents(data_sets)? {
            if self.store.has_active_job(doc.id, ANALYSIS_JOB_TYPE)? {
                continue;
            }
            let mut job = NewJob::analysis(
                doc.id,
                self.priorities.priority_for(doc.data_set_id.as_deref()),
                JobMetadata {
                    data_set_id: doc.data_set_id.clone(),
                    has_text: doc.has_text,
                    text_length: doc.text_length,
                },
            );
            job.max_attempts = self.config.max_job_attempts;
            match self.store.create_job(&job) {
                Ok(Some(_)) => created += 1,
                Ok(None) => debug!("Document {} already has an active job", doc.id),
                Err(e) if e.is_conflict() => debug!("Job for document {} raced: {}", doc.id, e),
                Err(e) => return Err(e),
            }
        }
        if created > 0 {
            info!("Enqueued {} analysis jobs", created);
        }
        Ok(created)
    }

    /// Remaining monthly budget right now.
    pub fn remaining_budget(&self) -> Result<f64> {
        let spent = self.store.monthly_spend(Utc::now())?;
        Ok(self.config.monthly_cap_cents - spent)
    }

    /// Queue and spend snapshot.
    pub fn status(&self) -> Result<PipelineStatus> {
        let spend = self.store.spend_summary(Utc::now())?;
        Ok(PipelineStatus {
            queue: self.store.queue_stats()?,
            remaining_budget_cents: self.config.monthly_cap_cents - spend.spent_cents,
            monthly_cap_cents: self.config.monthly_cap_cents,
            spend,
        })
    }

    /// Process jobs until the queue is empty, the run limit is reached, or
    /// the budget is spent. A job that cannot be claimed, an unwritable
    /// artifact, or an unwritable ledger aborts the run; every other failure
    /// is recorded on its job.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        if options.dry_run {
            return self.plan(options);
        }

        let jobs_created = self.ensure_jobs(options.data_sets())?;
        let mut ctx = RunContext::new(
            self.remaining_budget()?,
            RequestPacer::new(self.config.request_delay()),
        );
        let mut report = RunReport::new(ctx.run_id.clone(), false, ctx.budget_remaining_cents);
        report.jobs_created = jobs_created;
        let free_run = options.forced_tier == Some(AnalysisTier::Rules);

        info!(
            "Scheduler run {} starting: {:.2}¢ of {:.2}¢ remaining",
            ctx.run_id, ctx.budget_remaining_cents, self.config.monthly_cap_cents
        );

        'outer: loop {
            let batch_size = match options.limit {
                Some(limit) => options.batch_size.min(limit.saturating_sub(report.attempted())),
                None => options.batch_size,
            };
            if batch_size == 0 {
                report.stop_reason = StopReason::LimitReached;
                break;
            }
            if !free_run && ctx.budget_remaining_cents <= 0.0 {
                report.stop_reason = StopReason::BudgetExhausted;
                break;
            }

            let batch = self.store.next_batch(batch_size, options.data_sets())?;
            if batch.is_empty() {
                report.stop_reason = StopReason::QueueEmpty;
                break;
            }
            debug!("Pulled batch of {} jobs", batch.len());

            for job in &batch {
                if !free_run && ctx.budget_remaining_cents <= 0.0 {
                    report.stop_reason = StopReason::BudgetExhausted;
                    break 'outer;
                }
                self.process_job(&mut ctx, job, options.forced_tier, &mut report)
                    .await?;
            }
        }

        report.remaining_budget_cents = ctx.budget_remaining_cents;
        info!(
            "Scheduler run {} complete: {} processed ({} tier 0, {} tier 1, {} cached), {} retried, {} failed, {:.2}¢ spent, stopped: {}",
            report.run_id,
            report.processed,
            report.tier0,
            report.tier1,
            report.cached,
            report.retried,
            report.failed,
            report.cost_cents,
            report.stop_reason
        );
        Ok(report)
    }

    async fn process_job(
        &self,
        ctx: &mut RunContext,
        job: &AnalysisJob,
        forced: Option<AnalysisTier>,
        report: &mut RunReport,
    ) -> Result<()> {
        self.store.mark_processing(job.id)?;
        self.set_document_status(job.document_id, JobStatus::Processing);

        match self.process_document(ctx, job, forced, report).await {
            Ok(()) => {
                self.store.mark_completed(job.id)?;
                self.set_document_status(job.document_id, JobStatus::Completed);
                report.processed += 1;
            }
            Err(JobError::Failed(message)) => {
                let status = self.store.mark_failed(job.id, &message)?;
                self.set_document_status(job.document_id, status);
                if status == JobStatus::Failed {
                    error!(
                        "Job {} for document {} failed permanently: {}",
                        job.id, job.document_id, message
                    );
                    report.failed += 1;
                } else {
                    warn!("Job {} for document {} will retry: {}", job.id, job.document_id, message);
                    report.retried += 1;
                }
            }
            Err(JobError::Abort(e)) => {
                if let Ok(status) = self.store.mark_failed(job.id, &e.to_string()) {
                    self.set_document_status(job.document_id, status);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn process_document(
        &self,
        ctx: &mut RunContext,
        job: &AnalysisJob,
        forced: Option<AnalysisTier>,
        report: &mut RunReport,
    ) -> std::result::Result<(), JobError> {
        let doc = self
            .store
            .get_document(job.document_id)?
            .ok_or_else(|| JobError::Failed(format!("document {} not found", job.document_id)))?;

        if let Some(cached) = self.load_cached(&doc) {
            debug!("Using cached artifact for {}", doc.document_key);
            self.store.apply_analysis(doc.id, &cached)?;
            report.cached += 1;
            return Ok(());
        }

        let text = self.store.extracted_text(doc.id)?;
        let has_text = text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let text_length = text.as_deref().map(|t| t.chars().count()).unwrap_or(0);
        let tier = self.resolve_tier(
            &doc.document_key,
            has_text,
            text_length,
            ctx.budget_remaining_cents,
            forced,
        );

        let mut result = match (tier, &self.analyzer) {
            (AnalysisTier::Ai, Some(analyzer)) => {
                self.run_tier1(ctx, analyzer, &doc, text.as_deref().unwrap_or(""), report)
                    .await?
            }
            _ => {
                report.tier0 += 1;
                casefile_classify::classify(text.as_deref().unwrap_or(""))
            }
        };
        result.analyzed_at = Some(Utc::now().to_rfc3339());

        self.artifacts
            .save(&doc.document_key, &result)
            .map_err(JobError::Abort)?;
        let upsert = self.store.apply_analysis(doc.id, &result)?;
        debug!(
            "Document {} analyzed ({}): {} persons created, {} connections created",
            doc.document_key, result.tier, upsert.persons_created, upsert.connections_created
        );
        Ok(())
    }

    async fn run_tier1(
        &self,
        ctx: &mut RunContext,
        analyzer: &Tier1Analyzer,
        doc: &Document,
        text: &str,
        report: &mut RunReport,
    ) -> std::result::Result<AnalysisResult, JobError> {
        match analyzer.analyze(text, &mut ctx.pacer).await {
            Ok(result) => {
                self.charge(
                    ctx,
                    doc.id,
                    analyzer.model(),
                    result.input_tokens,
                    result.output_tokens,
                    result.cost_cents,
                    report,
                )?;
                report.tier1 += 1;
                Ok(result)
            }
            Err(failure) => {
                self.charge(
                    ctx,
                    doc.id,
                    analyzer.model(),
                    failure.input_tokens,
                    failure.output_tokens,
                    failure.cost_cents,
                    report,
                )?;
                Err(JobError::Failed(failure.to_string()))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn charge(
        &self,
        ctx: &mut RunContext,
        document_id: i64,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost_cents: f64,
        report: &mut RunReport,
    ) -> std::result::Result<(), JobError> {
        if input_tokens == 0 && output_tokens == 0 {
            return Ok(());
        }
        self.store
            .record_spend(
                &NewSpend {
                    document_id,
                    model: model.to_string(),
                    input_tokens,
                    output_tokens,
                    cost_cents,
                },
                Utc::now(),
            )
            .map_err(JobError::Abort)?;
        ctx.budget_remaining_cents -= cost_cents;
        report.cost_cents += cost_cents;
        Ok(())
    }

    /// The selector's choice, downgraded to Tier 0 when there is no text to
    /// send or no provider to send it to. Applies to forced runs too.
    fn resolve_tier(
        &self,
        document_key: &str,
        has_text: bool,
        text_length: usize,
        remaining_cents: f64,
        forced: Option<AnalysisTier>,
    ) -> AnalysisTier {
        let tier = self
            .selector
            .choose_tier(has_text, text_length, remaining_cents, forced);
        if tier != AnalysisTier::Ai {
            return tier;
        }
        if !has_text {
            debug!("No extracted text for {}, using tier 0", document_key);
            return AnalysisTier::Rules;
        }
        if self.analyzer.is_none() {
            debug!("No AI provider configured, using tier 0 for {}", document_key);
            return AnalysisTier::Rules;
        }
        tier
    }

    fn load_cached(&self, doc: &Document) -> Option<AnalysisResult> {
        match self.artifacts.load(&doc.document_key) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Ignoring unreadable artifact for {}: {}", doc.document_key, e);
                None
            }
        }
    }

    fn set_document_status(&self, document_id: i64, status: DocumentStatus) {
        let update = DocumentUpdate {
            ai_analysis_status: Some(status),
            ai_cost_cents: None,
        };
        if let Err(e) = self.store.update_document(document_id, &update) {
            warn!("Failed to update document {}: {}", document_id, e);
        }
    }

    /// The jobs a run would process, with tiers and cost estimates, without
    /// writing anything.
    pub fn plan(&self, options: &RunOptions) -> Result<RunReport> {
        let data_sets = options.data_sets();
        let mut remaining = self.remaining_budget()?;
        let mut report = RunReport::new(uuid::Uuid::new_v4().to_string(), true, remaining);
        let free_run = options.forced_tier == Some(AnalysisTier::Rules);

        // (queue job id, priority, document)
        let mut candidates: Vec<(Option<i64>, i32, Document)> = Vec::new();
        for job in self.store.next_batch(i64::MAX as usize, data_sets)? {
            if let Some(doc) = self.store.get_document(job.document_id)? {
                candidates.push((Some(job.id), job.priority, doc));
            }
        }
        for doc in self.store.pending_documents(data_sets)? {
            if self.store.has_active_job(doc.id, ANALYSIS_JOB_TYPE)? {
                continue;
            }
            let priority = self.priorities.priority_for(doc.data_set_id.as_deref());
            candidates.push((None, priority, doc));
        }
        report.jobs_created = candidates.iter().filter(|(id, _, _)| id.is_none()).count();
        // Existing jobs keep queue order; new jobs would get higher ids.
        candidates.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.0.is_none().cmp(&b.0.is_none()))
                .then(a.0.cmp(&b.0))
                .then(a.2.id.cmp(&b.2.id))
        });

        for (job_id, priority, doc) in candidates {
            if options.limit.is_some_and(|limit| report.planned.len() >= limit) {
                report.stop_reason = StopReason::LimitReached;
                break;
            }
            if !free_run && remaining <= 0.0 {
                report.stop_reason = StopReason::BudgetExhausted;
                break;
            }
            let tier = self.resolve_tier(
                &doc.document_key,
                doc.has_text,
                doc.text_length,
                remaining,
                options.forced_tier,
            );
            let estimated_cost_cents = match tier {
                AnalysisTier::Ai => {
                    report.tier1 += 1;
                    self.selector.estimate_cost_cents(doc.text_length)
                }
                AnalysisTier::Rules => {
                    report.tier0 += 1;
                    0.0
                }
            };
            remaining -= estimated_cost_cents;
            report.cost_cents += estimated_cost_cents;
            report.planned.push(PlannedJob {
                job_id,
                document_id: doc.id,
                document_key: doc.document_key,
                data_set_id: doc.data_set_id,
                priority,
                tier,
                estimated_cost_cents,
            });
        }

        report.remaining_budget_cents = remaining;
        info!(
            "Dry run {}: {} jobs planned ({} tier 0, {} tier 1), est. {:.2}¢",
            report.run_id,
            report.planned.len(),
            report.tier0,
            report.tier1,
            report.cost_cents
        );
        Ok(report)
    }
}
