//! In-memory store with the same semantics as [`SqliteStore`](crate::SqliteStore).
//! Used by tests and by dry runs that must not touch the database.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::sqlite::absorb_identity;
use crate::traits::*;
use crate::types::*;
use casefile_core::{AnalysisResult, Error, Result};

#[derive(Debug, Clone)]
struct DocumentRow {
    doc: Document,
    text: Option<String>,
}

#[derive(Debug, Clone)]
struct EventRow {
    date: String,
    title: String,
}

#[derive(Default)]
struct State {
    next_id: i64,
    documents: BTreeMap<i64, DocumentRow>,
    jobs: BTreeMap<i64, AnalysisJob>,
    spend: Vec<BudgetRecord>,
    persons: BTreeMap<i64, Person>,
    /// (person_id, document_id) -> mention count
    person_documents: BTreeMap<(i64, i64), u32>,
    connections: BTreeMap<i64, PersonConnection>,
    events: Vec<EventRow>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_or_create_person(&mut self, name: &str, role: &str, category: &str) -> (i64, bool) {
        if let Some(person) = self.persons.values_mut().find(|p| p.name == name) {
            if person.role.is_empty() {
                person.role = role.to_string();
            }
            if person.category.is_empty() {
                person.category = category.to_string();
            }
            return (person.id, false);
        }
        let id = self.next_id();
        self.persons.insert(
            id,
            Person {
                id,
                name: name.to_string(),
                aliases: Vec::new(),
                category: category.to_string(),
                role: role.to_string(),
                description: String::new(),
                document_count: 0,
                connection_count: 0,
            },
        );
        (id, true)
    }

    fn recompute_counts(&mut self, person_id: i64) {
        let documents = self
            .person_documents
            .keys()
            .filter(|(p, _)| *p == person_id)
            .count() as i64;
        let connections = self
            .connections
            .values()
            .filter(|c| {
                c.person_id1 != c.person_id2
                    && (c.person_id1 == person_id || c.person_id2 == person_id)
            })
            .count() as i64;
        if let Some(person) = self.persons.get_mut(&person_id) {
            person.document_count = documents;
            person.connection_count = connections;
        }
    }

    fn recompute_all(&mut self) {
        let ids: Vec<i64> = self.persons.keys().copied().collect();
        for id in ids {
            self.recompute_counts(id);
        }
    }

    /// Keep the lowest id per unordered pair, carrying the max strength.
    /// Only pairs touching `scope` are considered when given.
    fn collapse_pairs(&mut self, scope: Option<i64>) -> usize {
        let mut best: HashMap<(i64, i64), (i64, u8)> = HashMap::new();
        for c in self.connections.values() {
            if let Some(p) = scope {
                if c.person_id1 != p && c.person_id2 != p {
                    continue;
                }
            }
            let entry = best.entry(c.pair()).or_insert((c.id, c.strength));
            entry.0 = entry.0.min(c.id);
            entry.1 = entry.1.max(c.strength);
        }
        let keep: HashMap<i64, u8> = best.into_values().collect();
        let before = self.connections.len();
        self.connections.retain(|id, c| {
            let in_scope = scope.map_or(true, |p| c.person_id1 == p || c.person_id2 == p);
            !in_scope || keep.contains_key(id)
        });
        for (id, strength) in keep {
            if let Some(c) = self.connections.get_mut(&id) {
                c.strength = strength;
            }
        }
        before - self.connections.len()
    }
}

/// Mutex-guarded in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger rows in insertion order.
    pub fn spend_records(&self) -> Vec<BudgetRecord> {
        self.state.lock().spend.clone()
    }
}

impl DocumentStore for MemoryStore {
    fn add_document(&self, doc: &NewDocument) -> Result<i64> {
        let mut state = self.state.lock();
        if doc.content_hash.is_some()
            && state
                .documents
                .values()
                .any(|row| row.doc.content_hash == doc.content_hash)
        {
            return Err(Error::DuplicateContent(doc.content_hash.clone().unwrap_or_default()));
        }
        if state
            .documents
            .values()
            .any(|row| row.doc.document_key == doc.document_key)
        {
            return Err(Error::DuplicateKey(doc.document_key.clone()));
        }
        let id = state.next_id();
        let text = doc.extracted_text.clone();
        state.documents.insert(
            id,
            DocumentRow {
                doc: Document {
                    id,
                    document_key: doc.document_key.clone(),
                    data_set_id: doc.data_set_id.clone(),
                    has_text: text.as_deref().is_some_and(|t| !t.trim().is_empty()),
                    text_length: text.as_deref().map_or(0, |t| t.chars().count()),
                    content_hash: doc.content_hash.clone(),
                    ai_analysis_status: JobStatus::Pending,
                    ai_cost_cents: 0.0,
                    created_at: now_millis(),
                },
                text,
            },
        );
        Ok(id)
    }

    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        Ok(self.state.lock().documents.get(&id).map(|r| r.doc.clone()))
    }

    fn pending_documents(&self, data_sets: Option<&[String]>) -> Result<Vec<Document>> {
        let sets = data_sets.filter(|s| !s.is_empty());
        Ok(self
            .state
            .lock()
            .documents
            .values()
            .filter(|r| r.doc.ai_analysis_status == JobStatus::Pending)
            .filter(|r| match (sets, &r.doc.data_set_id) {
                (None, _) => true,
                (Some(sets), Some(ds)) => sets.contains(ds),
                (Some(_), None) => false,
            })
            .map(|r| r.doc.clone())
            .collect())
    }

    fn extracted_text(&self, id: i64) -> Result<Option<String>> {
        let state = self.state.lock();
        let row = state
            .documents
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        Ok(row.text.clone().filter(|t| !t.trim().is_empty()))
    }

    fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<()> {
        let mut state = self.state.lock();
        let row = state
            .documents
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
        if let Some(status) = update.ai_analysis_status {
            row.doc.ai_analysis_status = status;
        }
        if let Some(cost) = update.ai_cost_cents {
            row.doc.ai_cost_cents = cost;
        }
        Ok(())
    }
}

impl JobStore for MemoryStore {
    fn has_active_job(&self, document_id: i64, job_type: &str) -> Result<bool> {
        Ok(self.state.lock().jobs.values().any(|j| {
            j.document_id == document_id && j.job_type == job_type && j.status.is_active()
        }))
    }

    fn create_job(&self, job: &NewJob) -> Result<Option<i64>> {
        if self.has_active_job(job.document_id, &job.job_type)? {
            return Ok(None);
        }
        let mut state = self.state.lock();
        let id = state.next_id();
        let now = now_millis();
        state.jobs.insert(
            id,
            AnalysisJob {
                id,
                document_id: job.document_id,
                job_type: job.job_type.clone(),
                status: JobStatus::Pending,
                priority: job.priority,
                attempts: 0,
                max_attempts: job.max_attempts,
                error_message: None,
                metadata: job.metadata.clone(),
                created_at: now,
                updated_at: now,
                started_at: None,
                completed_at: None,
            },
        );
        Ok(Some(id))
    }

    fn get_job(&self, id: i64) -> Result<Option<AnalysisJob>> {
        Ok(self.state.lock().jobs.get(&id).cloned())
    }

    fn next_batch(&self, limit: usize, data_sets: Option<&[String]>) -> Result<Vec<AnalysisJob>> {
        let sets = data_sets.filter(|s| !s.is_empty());
        let state = self.state.lock();
        let mut jobs: Vec<AnalysisJob> = state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| match (sets, j.data_set_id()) {
                (None, _) => true,
                (Some(sets), Some(ds)) => sets.iter().any(|s| s == ds),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    fn mark_processing(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        if job.status != JobStatus::Pending {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}, cannot move to processing",
                id, job.status
            )));
        }
        let now = now_millis();
        job.status = JobStatus::Processing;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    fn mark_completed(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        if job.status != JobStatus::Processing {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}, cannot move to completed",
                id, job.status
            )));
        }
        let now = now_millis();
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.updated_at = now;
        job.error_message = None;
        Ok(())
    }

    fn mark_failed(&self, id: i64, error: &str) -> Result<JobStatus> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        if !job.status.is_active() {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}, cannot fail",
                id, job.status
            )));
        }
        let now = now_millis();
        job.attempts += 1;
        job.error_message = Some(error.to_string());
        job.updated_at = now;
        if job.attempts >= job.max_attempts {
            job.status = JobStatus::Failed;
            job.completed_at = Some(now);
        } else {
            job.status = JobStatus::Pending;
        }
        Ok(job.status)
    }

    fn queue_stats(&self) -> Result<QueueStats> {
        let state = self.state.lock();
        let mut stats = QueueStats::default();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        let mut failed: Vec<&AnalysisJob> = state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Failed)
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        stats.failed_jobs = failed
            .into_iter()
            .take(20)
            .map(|j| FailedJob {
                job_id: j.id,
                document_id: j.document_id,
                attempts: j.attempts,
                error_message: j.error_message.clone(),
            })
            .collect();
        Ok(stats)
    }
}

impl BudgetLedger for MemoryStore {
    fn record_spend(&self, spend: &NewSpend, at: DateTime<Utc>) -> Result<i64> {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.spend.push(BudgetRecord {
            id,
            document_id: spend.document_id,
            model: spend.model.clone(),
            input_tokens: spend.input_tokens,
            output_tokens: spend.output_tokens,
            cost_cents: spend.cost_cents,
            created_at: at.timestamp_millis(),
        });
        if let Some(row) = state.documents.get_mut(&spend.document_id) {
            row.doc.ai_cost_cents += spend.cost_cents;
        }
        Ok(id)
    }

    fn monthly_spend(&self, now: DateTime<Utc>) -> Result<f64> {
        Ok(self.spend_summary(now)?.spent_cents)
    }

    fn spend_summary(&self, now: DateTime<Utc>) -> Result<SpendSummary> {
        let (start, end) = month_bounds(now);
        let state = self.state.lock();
        let mut summary = SpendSummary {
            month: month_label(now),
            ..Default::default()
        };
        for r in state
            .spend
            .iter()
            .filter(|r| r.created_at >= start && r.created_at < end)
        {
            summary.spent_cents += r.cost_cents;
            summary.records += 1;
            summary.input_tokens += r.input_tokens;
            summary.output_tokens += r.output_tokens;
        }
        Ok(summary)
    }
}

impl GraphStore for MemoryStore {
    fn apply_analysis(
        &self,
        document_id: i64,
        result: &AnalysisResult,
    ) -> Result<GraphUpsertReport> {
        let mut state = self.state.lock();
        let mut report = GraphUpsertReport::default();
        let mut ids: HashMap<String, i64> = HashMap::new();
        let mut touched: HashSet<i64> = HashSet::new();

        for mention in &result.persons {
            let name = mention.name.trim();
            if name.is_empty() {
                continue;
            }
            let (id, created) = state.find_or_create_person(name, &mention.role, &mention.category);
            if created {
                report.persons_created += 1;
            }
            if let std::collections::btree_map::Entry::Vacant(e) =
                state.person_documents.entry((id, document_id))
            {
                e.insert(mention.mention_count.max(1));
                report.person_links += 1;
            }
            ids.insert(name.to_string(), id);
            touched.insert(id);
        }

        for mention in &result.connections {
            let mut pair = [None, None];
            for (slot, name) in pair.iter_mut().zip([&mention.person1, &mention.person2]) {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let id = match ids.get(name) {
                    Some(id) => *id,
                    None => {
                        let (id, created) = state.find_or_create_person(name, "", "");
                        if created {
                            report.persons_created += 1;
                        }
                        ids.insert(name.to_string(), id);
                        id
                    }
                };
                *slot = Some(id);
            }
            let [Some(a), Some(b)] = pair else {
                continue;
            };
            if a == b {
                continue;
            }
            touched.insert(a);
            touched.insert(b);

            let key = if a <= b { (a, b) } else { (b, a) };
            let existing = state
                .connections
                .values()
                .find(|c| c.pair() == key)
                .map(|c| (c.id, c.strength));
            match existing {
                Some((id, strength)) if mention.strength > strength => {
                    if let Some(c) = state.connections.get_mut(&id) {
                        c.strength = mention.strength;
                    }
                    report.connections_updated += 1;
                }
                Some(_) => {}
                None => {
                    let id = state.next_id();
                    state.connections.insert(
                        id,
                        PersonConnection {
                            id,
                            person_id1: a,
                            person_id2: b,
                            connection_type: mention.relationship_type.clone(),
                            description: mention.description.clone(),
                            strength: mention.strength.max(1),
                        },
                    );
                    report.connections_created += 1;
                }
            }
        }

        for event in &result.events {
            let title = event.title.trim();
            if title.is_empty() {
                continue;
            }
            let date = event.date.trim();
            let exists = state
                .events
                .iter()
                .any(|e| e.date == date && e.title.to_lowercase() == title.to_lowercase());
            if !exists {
                state.events.push(EventRow {
                    date: date.to_string(),
                    title: title.to_string(),
                });
                report.events_created += 1;
            }
        }

        for id in touched {
            state.recompute_counts(id);
        }
        Ok(report)
    }
}

impl PersonStore for MemoryStore {
    fn list_persons(&self) -> Result<Vec<Person>> {
        Ok(self.state.lock().persons.values().cloned().collect())
    }

    fn list_connections(&self) -> Result<Vec<PersonConnection>> {
        Ok(self.state.lock().connections.values().cloned().collect())
    }

    fn merge_persons(&self, canonical_id: i64, duplicate_ids: &[i64]) -> Result<()> {
        let mut state = self.state.lock();
        let mut canonical = state
            .persons
            .get(&canonical_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("person {}", canonical_id)))?;

        for &dup_id in duplicate_ids {
            if dup_id == canonical_id {
                continue;
            }
            let Some(dup) = state.persons.remove(&dup_id) else {
                continue;
            };
            absorb_identity(&mut canonical, &dup);

            let moved: Vec<((i64, i64), u32)> = state
                .person_documents
                .iter()
                .filter(|((p, _), _)| *p == dup_id)
                .map(|(k, v)| (*k, *v))
                .collect();
            for ((_, doc), count) in moved {
                state.person_documents.remove(&(dup_id, doc));
                *state.person_documents.entry((canonical_id, doc)).or_insert(0) += count;
            }
            for c in state.connections.values_mut() {
                if c.person_id1 == dup_id {
                    c.person_id1 = canonical_id;
                }
                if c.person_id2 == dup_id {
                    c.person_id2 = canonical_id;
                }
            }
        }

        state
            .connections
            .retain(|_, c| !(c.person_id1 == canonical_id && c.person_id2 == canonical_id));
        state.collapse_pairs(Some(canonical_id));
        state.persons.insert(canonical_id, canonical);

        let neighbors: Vec<i64> = state
            .connections
            .values()
            .filter_map(|c| {
                if c.person_id1 == canonical_id {
                    Some(c.person_id2)
                } else if c.person_id2 == canonical_id {
                    Some(c.person_id1)
                } else {
                    None
                }
            })
            .collect();
        state.recompute_counts(canonical_id);
        for id in neighbors {
            state.recompute_counts(id);
        }
        Ok(())
    }

    fn purge_self_connections(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let before = state.connections.len();
        state.connections.retain(|_, c| c.person_id1 != c.person_id2);
        let removed = before - state.connections.len();
        if removed > 0 {
            state.recompute_all();
        }
        Ok(removed)
    }

    fn collapse_duplicate_connections(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let removed = state.collapse_pairs(None);
        if removed > 0 {
            state.recompute_all();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_core::{ConnectionMention, PersonMention};

    fn mention(name: &str) -> PersonMention {
        PersonMention {
            name: name.into(),
            mention_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_key_and_content_conflicts_are_distinct() {
        let store = MemoryStore::new();
        let doc = |key: &str, hash: &str| NewDocument {
            document_key: key.into(),
            content_hash: Some(hash.into()),
            ..Default::default()
        };
        store.add_document(&doc("emails/page-001", "h1")).unwrap();
        assert!(matches!(
            store.add_document(&doc("emails/page-001", "h2")),
            Err(Error::DuplicateKey(_))
        ));
        assert!(matches!(
            store.add_document(&doc("depositions/page-001", "h1")),
            Err(Error::DuplicateContent(_))
        ));
        assert!(matches!(
            store.add_document(&doc("emails/page-001", "h1")),
            Err(Error::DuplicateContent(_))
        ));
        store.add_document(&doc("depositions/page-001", "h2")).unwrap();
    }

    #[test]
    fn test_jobs_follow_priority_then_id() {
        let store = MemoryStore::new();
        let mut docs = Vec::new();
        for key in ["a", "b", "c"] {
            docs.push(
                store
                    .add_document(&NewDocument {
                        document_key: key.into(),
                        ..Default::default()
                    })
                    .unwrap(),
            );
        }
        store.create_job(&NewJob::analysis(docs[0], 10, JobMetadata::default())).unwrap();
        store.create_job(&NewJob::analysis(docs[1], 90, JobMetadata::default())).unwrap();
        store.create_job(&NewJob::analysis(docs[2], 90, JobMetadata::default())).unwrap();
        let order: Vec<i64> = store
            .next_batch(10, None)
            .unwrap()
            .iter()
            .map(|j| j.document_id)
            .collect();
        assert_eq!(order, vec![docs[1], docs[2], docs[0]]);
        assert!(store
            .create_job(&NewJob::analysis(docs[0], 10, JobMetadata::default()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_merge_sums_mentions_and_drops_self_loop() {
        let store = MemoryStore::new();
        let doc = store
            .add_document(&NewDocument {
                document_key: "d".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .apply_analysis(
                doc,
                &AnalysisResult {
                    persons: vec![mention("Ghislaine Maxwell"), mention("G. Maxwell")],
                    connections: vec![ConnectionMention {
                        person1: "Ghislaine Maxwell".into(),
                        person2: "G. Maxwell".into(),
                        strength: 4,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            )
            .unwrap();
        let persons = store.list_persons().unwrap();
        let (keep, dup) = (persons[0].id, persons[1].id);
        store.merge_persons(keep, &[dup]).unwrap();

        let persons = store.list_persons().unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].aliases, vec!["G. Maxwell".to_string()]);
        assert_eq!(persons[0].document_count, 1);
        assert_eq!(persons[0].connection_count, 0);
        assert!(store.list_connections().unwrap().is_empty());
        assert_eq!(store.state.lock().person_documents[&(keep, doc)], 4);

        // merging again is a no-op
        store.merge_persons(keep, &[dup]).unwrap();
        assert_eq!(store.list_persons().unwrap().len(), 1);
    }
}
