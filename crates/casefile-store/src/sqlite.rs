//! SQLite-backed store for documents, the job queue, the spend ledger,
//! and the person graph.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::schema::{GRAPH_SCHEMA_SQL, PIPELINE_SCHEMA_SQL};
use crate::traits::*;
use crate::types::*;
use casefile_core::{AnalysisResult, Error, Result};

/// SQLite store. One connection behind a mutex; the pipeline is a single
/// sequential worker.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

fn db(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    e.to_string().contains("UNIQUE constraint")
}

/// Map a failed document insert onto the collision. Known content wins
/// over a taken key so re-imports stay duplicates.
fn document_conflict(conn: &Connection, e: rusqlite::Error, doc: &NewDocument) -> Error {
    if !is_unique_violation(&e) {
        return db(e);
    }
    let known_content = match &doc.content_hash {
        Some(hash) => conn
            .query_row(
                "SELECT 1 FROM documents WHERE content_hash = ?1",
                params![hash],
                |_| Ok(()),
            )
            .optional()
            .map_err(db),
        None => Ok(None),
    };
    match known_content {
        Ok(Some(())) => Error::DuplicateContent(doc.content_hash.clone().unwrap_or_default()),
        Ok(None) => Error::DuplicateKey(doc.document_key.clone()),
        Err(e) => e,
    }
}

impl SqliteStore {
    /// Open or create the store. The file will be `db_dir/casefile.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("casefile.db");

        let conn = Connection::open(&db_path).map_err(db)?;
        Self::configure(&conn)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} documents, {} persons, path={}",
            stats.documents,
            stats.persons,
            store.db_path.display()
        );
        Ok(store)
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db)?;
        Self::configure(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db)?;
        let full_schema = format!("{}\n{}", PIPELINE_SCHEMA_SQL, GRAPH_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Row counts for the status report.
    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<i64> { conn.query_row(sql, [], |row| row.get(0)).map_err(db) };
        Ok(StoreStats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            documents_pending: count(
                "SELECT COUNT(*) FROM documents WHERE ai_analysis_status = 'pending'",
            )?,
            documents_completed: count(
                "SELECT COUNT(*) FROM documents WHERE ai_analysis_status = 'completed'",
            )?,
            persons: count("SELECT COUNT(*) FROM persons")?,
            connections: count("SELECT COUNT(*) FROM connections")?,
            events: count("SELECT COUNT(*) FROM events")?,
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let status: String = row.get("ai_analysis_status")?;
        let text_length: i64 = row.get("text_length")?;
        Ok(Document {
            id: row.get("id")?,
            document_key: row.get("document_key")?,
            data_set_id: row.get("data_set_id")?,
            has_text: row.get::<_, i64>("has_text")? != 0,
            text_length: text_length.max(0) as usize,
            content_hash: row.get("content_hash")?,
            ai_analysis_status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
            ai_cost_cents: row.get("ai_cost_cents")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisJob> {
        let status: String = row.get("status")?;
        let metadata: JobMetadata = row
            .get::<_, Option<String>>("metadata_json")?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Ok(AnalysisJob {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            job_type: row.get("job_type")?,
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
            priority: row.get("priority")?,
            attempts: row.get("attempts")?,
            max_attempts: row.get("max_attempts")?,
            error_message: row.get("error_message")?,
            metadata,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
        let aliases: Vec<String> = row
            .get::<_, String>("aliases_json")
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Ok(Person {
            id: row.get("id")?,
            name: row.get("name")?,
            aliases,
            category: row.get("category")?,
            role: row.get("role")?,
            description: row.get("description")?,
            document_count: row.get("document_count")?,
            connection_count: row.get("connection_count")?,
        })
    }

    fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersonConnection> {
        let strength: i64 = row.get("strength")?;
        Ok(PersonConnection {
            id: row.get("id")?,
            person_id1: row.get("person_id1")?,
            person_id2: row.get("person_id2")?,
            connection_type: row.get("connection_type")?,
            description: row.get("description")?,
            strength: strength.clamp(1, 5) as u8,
        })
    }

    // ---------------------------------------------------------------
    // Graph Helpers (run inside a transaction)
    // ---------------------------------------------------------------

    fn load_person(tx: &Transaction<'_>, id: i64) -> Result<Option<Person>> {
        tx.prepare_cached("SELECT * FROM persons WHERE id = ?1")
            .map_err(db)?
            .query_row(params![id], Self::row_to_person)
            .optional()
            .map_err(db)
    }

    /// Returns `(person_id, created)`.
    fn find_or_create_person(
        tx: &Transaction<'_>,
        name: &str,
        role: &str,
        category: &str,
        now: i64,
    ) -> Result<(i64, bool)> {
        let existing: Option<i64> = tx
            .prepare_cached("SELECT id FROM persons WHERE name = ?1 ORDER BY id LIMIT 1")
            .map_err(db)?
            .query_row(params![name], |row| row.get(0))
            .optional()
            .map_err(db)?;

        if let Some(id) = existing {
            tx.execute(
                "UPDATE persons SET \
                 role = CASE WHEN role = '' THEN ?2 ELSE role END, \
                 category = CASE WHEN category = '' THEN ?3 ELSE category END, \
                 updated_at = ?4 \
                 WHERE id = ?1",
                params![id, role, category, now],
            )
            .map_err(db)?;
            return Ok((id, false));
        }

        tx.execute(
            "INSERT INTO persons (name, role, category, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, role, category, now],
        )
        .map_err(db)?;
        Ok((tx.last_insert_rowid(), true))
    }

    fn recompute_counts(tx: &Transaction<'_>, person_id: i64, now: i64) -> Result<()> {
        tx.execute(
            "UPDATE persons SET \
             document_count = (SELECT COUNT(*) FROM person_documents WHERE person_id = ?1), \
             connection_count = (SELECT COUNT(*) FROM connections \
                 WHERE (person_id1 = ?1 OR person_id2 = ?1) AND person_id1 != person_id2), \
             updated_at = ?2 \
             WHERE id = ?1",
            params![person_id, now],
        )
        .map_err(db)?;
        Ok(())
    }

    fn recompute_all_connection_counts(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE persons SET connection_count = (SELECT COUNT(*) FROM connections c \
             WHERE (c.person_id1 = persons.id OR c.person_id2 = persons.id) \
             AND c.person_id1 != c.person_id2)",
            [],
        )
        .map_err(db)?;
        Ok(())
    }

    fn in_list(len: usize, first_param: usize) -> String {
        (0..len)
            .map(|i| format!("?{}", first_param + i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Row counts for the status report.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub documents: i64,
    pub documents_pending: i64,
    pub documents_completed: i64,
    pub persons: i64,
    pub connections: i64,
    pub events: i64,
}

// ---------------------------------------------------------------
// Documents
// ---------------------------------------------------------------

const DOCUMENT_COLUMNS: &str = "id, document_key, data_set_id, content_hash, ai_analysis_status, \
     ai_cost_cents, created_at, \
     (extracted_text IS NOT NULL AND length(trim(extracted_text, ' ' || char(9) || char(10) || char(12) || char(13))) > 0) AS has_text, \
     COALESCE(length(extracted_text), 0) AS text_length";

impl DocumentStore for SqliteStore {
    fn add_document(&self, doc: &NewDocument) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO documents (document_key, data_set_id, extracted_text, content_hash, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db)?
            .insert(params![
                doc.document_key,
                doc.data_set_id,
                doc.extracted_text,
                doc.content_hash,
                now_millis()
            ])
            .map_err(|e| document_conflict(&conn, e, doc))?;
        Ok(id)
    }

    fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let doc = conn
            .prepare_cached(&sql)
            .map_err(db)?
            .query_row(params![id], Self::row_to_document)
            .optional()
            .map_err(db)?;
        Ok(doc)
    }

    fn pending_documents(&self, data_sets: Option<&[String]>) -> Result<Vec<Document>> {
        let mut sql = format!(
            "SELECT {} FROM documents WHERE ai_analysis_status = 'pending'",
            DOCUMENT_COLUMNS
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(sets) = data_sets.filter(|s| !s.is_empty()) {
            sql.push_str(&format!(" AND data_set_id IN ({})", Self::in_list(sets.len(), 1)));
            values.extend(sets.iter().map(|s| Value::Text(s.clone())));
        }
        sql.push_str(" ORDER BY id ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_document)
            .map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    fn extracted_text(&self, id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let text: Option<Option<String>> = conn
            .prepare_cached("SELECT extracted_text FROM documents WHERE id = ?1")
            .map_err(db)?
            .query_row(params![id], |row| row.get(0))
            .optional()
            .map_err(db)?;
        match text {
            None => Err(Error::NotFound(format!("document {}", id))),
            Some(t) => Ok(t.filter(|t| !t.trim().is_empty())),
        }
    }

    fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE documents SET \
                 ai_analysis_status = COALESCE(?2, ai_analysis_status), \
                 ai_cost_cents = COALESCE(?3, ai_cost_cents), \
                 updated_at = ?4 \
                 WHERE id = ?1",
                params![
                    id,
                    update.ai_analysis_status.map(|s| s.as_str()),
                    update.ai_cost_cents,
                    now_millis()
                ],
            )
            .map_err(db)?;
        if count == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------
// Job Queue
// ---------------------------------------------------------------

impl JobStore for SqliteStore {
    fn has_active_job(&self, document_id: i64, job_type: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .prepare_cached(
                "SELECT COUNT(*) FROM analysis_jobs WHERE document_id = ?1 AND job_type = ?2 \
                 AND status IN ('pending', 'processing')",
            )
            .map_err(db)?
            .query_row(params![document_id, job_type], |row| row.get(0))
            .map_err(db)?;
        Ok(count > 0)
    }

    fn create_job(&self, job: &NewJob) -> Result<Option<i64>> {
        let metadata = serde_json::to_string(&job.metadata)?;
        let now = now_millis();
        let conn = self.conn.lock();
        let inserted = conn
            .prepare_cached(
                "INSERT INTO analysis_jobs \
                 (document_id, job_type, status, priority, max_attempts, metadata_json, created_at, updated_at) \
                 VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?6)",
            )
            .map_err(db)?
            .insert(params![
                job.document_id,
                job.job_type,
                job.priority,
                job.max_attempts,
                metadata,
                now
            ]);
        match inserted {
            Ok(id) => Ok(Some(id)),
            // the partial unique index rejects a second active job
            Err(e) if is_unique_violation(&e) => {
                debug!("Active job already exists for document {}", job.document_id);
                Ok(None)
            }
            Err(e) => Err(db(e)),
        }
    }

    fn get_job(&self, id: i64) -> Result<Option<AnalysisJob>> {
        let conn = self.conn.lock();
        let job = conn
            .prepare_cached("SELECT * FROM analysis_jobs WHERE id = ?1")
            .map_err(db)?
            .query_row(params![id], Self::row_to_job)
            .optional()
            .map_err(db)?;
        Ok(job)
    }

    fn next_batch(&self, limit: usize, data_sets: Option<&[String]>) -> Result<Vec<AnalysisJob>> {
        let mut sql = String::from("SELECT * FROM analysis_jobs WHERE status = 'pending'");
        let mut values: Vec<Value> = Vec::new();
        if let Some(sets) = data_sets.filter(|s| !s.is_empty()) {
            sql.push_str(&format!(
                " AND json_extract(metadata_json, '$.data_set_id') IN ({})",
                Self::in_list(sets.len(), 1)
            ));
            values.extend(sets.iter().map(|s| Value::Text(s.clone())));
        }
        sql.push_str(&format!(
            " ORDER BY priority DESC, id ASC LIMIT ?{}",
            values.len() + 1
        ));
        values.push(Value::Integer(limit as i64));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_job)
            .map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    fn mark_processing(&self, id: i64) -> Result<()> {
        let now = now_millis();
        let count = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE analysis_jobs SET status = 'processing', started_at = ?2, updated_at = ?2 \
                 WHERE id = ?1 AND status = 'pending'",
                params![id, now],
            )
            .map_err(db)?
        };
        if count == 0 {
            return Err(self.transition_error(id, "processing")?);
        }
        Ok(())
    }

    fn mark_completed(&self, id: i64) -> Result<()> {
        let now = now_millis();
        let count = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE analysis_jobs SET status = 'completed', completed_at = ?2, updated_at = ?2, \
                 error_message = NULL WHERE id = ?1 AND status = 'processing'",
                params![id, now],
            )
            .map_err(db)?
        };
        if count == 0 {
            return Err(self.transition_error(id, "completed")?);
        }
        Ok(())
    }

    fn mark_failed(&self, id: i64, error: &str) -> Result<JobStatus> {
        let job = self
            .get_job(id)?
            .ok_or_else(|| Error::NotFound(format!("job {}", id)))?;
        if !job.status.is_active() {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}, cannot fail",
                id, job.status
            )));
        }

        let attempts = job.attempts + 1;
        let status = if attempts >= job.max_attempts {
            JobStatus::Failed
        } else {
            JobStatus::Pending
        };
        let now = now_millis();
        let completed_at = (status == JobStatus::Failed).then_some(now);

        let conn = self.conn.lock();
        conn.execute(
            "UPDATE analysis_jobs SET status = ?2, attempts = ?3, error_message = ?4, \
             updated_at = ?5, completed_at = ?6 WHERE id = ?1",
            params![id, status.as_str(), attempts, error, now, completed_at],
        )
        .map_err(db)?;
        Ok(status)
    }

    fn queue_stats(&self) -> Result<QueueStats> {
        let conn = self.conn.lock();
        let mut stats = QueueStats::default();
        {
            let mut stmt = conn
                .prepare_cached("SELECT status, COUNT(*) FROM analysis_jobs GROUP BY status")
                .map_err(db)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(db)?;
            for row in rows {
                let (status, count) = row.map_err(db)?;
                let count = count.max(0) as u64;
                match JobStatus::parse(&status) {
                    Some(JobStatus::Pending) => stats.pending = count,
                    Some(JobStatus::Processing) => stats.processing = count,
                    Some(JobStatus::Completed) => stats.completed = count,
                    Some(JobStatus::Failed) => stats.failed = count,
                    None => {}
                }
            }
        }

        let mut stmt = conn
            .prepare_cached(
                "SELECT id, document_id, attempts, error_message FROM analysis_jobs \
                 WHERE status = 'failed' ORDER BY updated_at DESC, id DESC LIMIT 20",
            )
            .map_err(db)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FailedJob {
                    job_id: row.get(0)?,
                    document_id: row.get(1)?,
                    attempts: row.get(2)?,
                    error_message: row.get(3)?,
                })
            })
            .map_err(db)?;
        stats.failed_jobs = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)?;
        Ok(stats)
    }
}

impl SqliteStore {
    fn transition_error(&self, id: i64, target: &str) -> Result<Error> {
        Ok(match self.get_job(id)? {
            None => Error::NotFound(format!("job {}", id)),
            Some(job) => Error::InvalidTransition(format!(
                "job {} is {}, cannot move to {}",
                id, job.status, target
            )),
        })
    }
}

// ---------------------------------------------------------------
// Budget Ledger
// ---------------------------------------------------------------

impl BudgetLedger for SqliteStore {
    fn record_spend(&self, spend: &NewSpend, at: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db)?;
        tx.execute(
            "INSERT INTO budget_records \
             (document_id, model, input_tokens, output_tokens, cost_cents, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                spend.document_id,
                spend.model,
                spend.input_tokens as i64,
                spend.output_tokens as i64,
                spend.cost_cents,
                at.timestamp_millis()
            ],
        )
        .map_err(db)?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE documents SET ai_cost_cents = ai_cost_cents + ?2 WHERE id = ?1",
            params![spend.document_id, spend.cost_cents],
        )
        .map_err(db)?;
        tx.commit().map_err(db)?;
        Ok(id)
    }

    fn monthly_spend(&self, now: DateTime<Utc>) -> Result<f64> {
        Ok(self.spend_summary(now)?.spent_cents)
    }

    fn spend_summary(&self, now: DateTime<Utc>) -> Result<SpendSummary> {
        let (start, end) = month_bounds(now);
        let conn = self.conn.lock();
        let (spent, records, input, output): (f64, i64, i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(cost_cents), 0.0), COUNT(*), \
                 COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0) \
                 FROM budget_records WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(db)?;
        Ok(SpendSummary {
            month: month_label(now),
            spent_cents: spent,
            records: records.max(0) as u64,
            input_tokens: input.max(0) as u64,
            output_tokens: output.max(0) as u64,
        })
    }
}

// ---------------------------------------------------------------
// Graph Upsert
// ---------------------------------------------------------------

impl GraphStore for SqliteStore {
    fn apply_analysis(
        &self,
        document_id: i64,
        result: &AnalysisResult,
    ) -> Result<GraphUpsertReport> {
        let now = now_millis();
        let mut report = GraphUpsertReport::default();
        let mut ids: HashMap<String, i64> = HashMap::new();
        let mut touched: HashSet<i64> = HashSet::new();

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db)?;

        for mention in &result.persons {
            let name = mention.name.trim();
            if name.is_empty() {
                continue;
            }
            let (id, created) =
                Self::find_or_create_person(&tx, name, &mention.role, &mention.category, now)?;
            if created {
                report.persons_created += 1;
            }
            report.person_links += tx
                .execute(
                    "INSERT OR IGNORE INTO person_documents \
                     (person_id, document_id, mention_count, context) VALUES (?1, ?2, ?3, ?4)",
                    params![id, document_id, mention.mention_count.max(1), mention.context],
                )
                .map_err(db)?;
            ids.insert(name.to_string(), id);
            touched.insert(id);
        }

        for mention in &result.connections {
            let mut resolve = |name: &str| -> Result<Option<i64>> {
                let name = name.trim();
                if name.is_empty() {
                    return Ok(None);
                }
                if let Some(id) = ids.get(name) {
                    return Ok(Some(*id));
                }
                let (id, created) = Self::find_or_create_person(&tx, name, "", "", now)?;
                if created {
                    report.persons_created += 1;
                }
                ids.insert(name.to_string(), id);
                Ok(Some(id))
            };
            let (Some(a), Some(b)) = (resolve(&mention.person1)?, resolve(&mention.person2)?) else {
                continue;
            };
            if a == b {
                continue;
            }
            touched.insert(a);
            touched.insert(b);

            let existing: Option<(i64, i64)> = tx
                .prepare_cached(
                    "SELECT id, strength FROM connections WHERE \
                     (person_id1 = ?1 AND person_id2 = ?2) OR (person_id1 = ?2 AND person_id2 = ?1) \
                     ORDER BY id LIMIT 1",
                )
                .map_err(db)?
                .query_row(params![a, b], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()
                .map_err(db)?;

            match existing {
                Some((id, strength)) if i64::from(mention.strength) > strength => {
                    tx.execute(
                        "UPDATE connections SET strength = ?2 WHERE id = ?1",
                        params![id, mention.strength],
                    )
                    .map_err(db)?;
                    report.connections_updated += 1;
                }
                Some(_) => {}
                None => {
                    tx.execute(
                        "INSERT INTO connections \
                         (person_id1, person_id2, connection_type, description, strength, document_id, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            a,
                            b,
                            mention.relationship_type,
                            mention.description,
                            mention.strength.max(1),
                            document_id,
                            now
                        ],
                    )
                    .map_err(db)?;
                    report.connections_created += 1;
                }
            }
        }

        for event in &result.events {
            let title = event.title.trim();
            if title.is_empty() {
                continue;
            }
            let persons = serde_json::to_string(&event.persons_involved)?;
            report.events_created += tx
                .execute(
                    "INSERT OR IGNORE INTO events \
                     (document_id, date, title, title_key, description, category, significance, persons_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        document_id,
                        event.date.trim(),
                        title,
                        title.to_lowercase(),
                        event.description,
                        event.category,
                        event.significance.max(1),
                        persons,
                        now
                    ],
                )
                .map_err(db)?;
        }

        for id in &touched {
            Self::recompute_counts(&tx, *id, now)?;
        }
        tx.commit().map_err(db)?;

        debug!(
            "Graph upsert for document {}: {} new persons, {} new connections, {} new events",
            document_id, report.persons_created, report.connections_created, report.events_created
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------
// Identity Resolution
// ---------------------------------------------------------------

impl PersonStore for SqliteStore {
    fn list_persons(&self) -> Result<Vec<Person>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM persons ORDER BY id ASC")
            .map_err(db)?;
        let rows = stmt.query_map([], Self::row_to_person).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    fn list_connections(&self) -> Result<Vec<PersonConnection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM connections ORDER BY id ASC")
            .map_err(db)?;
        let rows = stmt.query_map([], Self::row_to_connection).map_err(db)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }

    fn merge_persons(&self, canonical_id: i64, duplicate_ids: &[i64]) -> Result<()> {
        let now = now_millis();
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db)?;

        let mut canonical = Self::load_person(&tx, canonical_id)?
            .ok_or_else(|| Error::NotFound(format!("person {}", canonical_id)))?;

        for &dup_id in duplicate_ids {
            if dup_id == canonical_id {
                continue;
            }
            // already absorbed by an interrupted earlier run
            let Some(dup) = Self::load_person(&tx, dup_id)? else {
                continue;
            };
            absorb_identity(&mut canonical, &dup);

            tx.execute(
                "INSERT INTO person_documents (person_id, document_id, mention_count, context) \
                 SELECT ?1, document_id, mention_count, context FROM person_documents \
                 WHERE person_id = ?2 \
                 ON CONFLICT(person_id, document_id) DO UPDATE SET \
                 mention_count = mention_count + excluded.mention_count",
                params![canonical_id, dup_id],
            )
            .map_err(db)?;
            tx.execute(
                "DELETE FROM person_documents WHERE person_id = ?1",
                params![dup_id],
            )
            .map_err(db)?;
            tx.execute(
                "UPDATE connections SET person_id1 = ?1 WHERE person_id1 = ?2",
                params![canonical_id, dup_id],
            )
            .map_err(db)?;
            tx.execute(
                "UPDATE connections SET person_id2 = ?1 WHERE person_id2 = ?2",
                params![canonical_id, dup_id],
            )
            .map_err(db)?;
            tx.execute("DELETE FROM persons WHERE id = ?1", params![dup_id])
                .map_err(db)?;
        }

        tx.execute(
            "DELETE FROM connections WHERE person_id1 = ?1 AND person_id2 = ?1",
            params![canonical_id],
        )
        .map_err(db)?;
        tx.execute(
            "UPDATE connections SET strength = (SELECT MAX(c2.strength) FROM connections c2 \
             WHERE MIN(c2.person_id1, c2.person_id2) = MIN(connections.person_id1, connections.person_id2) \
             AND MAX(c2.person_id1, c2.person_id2) = MAX(connections.person_id1, connections.person_id2)) \
             WHERE person_id1 = ?1 OR person_id2 = ?1",
            params![canonical_id],
        )
        .map_err(db)?;
        tx.execute(
            "DELETE FROM connections WHERE (person_id1 = ?1 OR person_id2 = ?1) AND id NOT IN ( \
             SELECT MIN(id) FROM connections WHERE person_id1 = ?1 OR person_id2 = ?1 \
             GROUP BY MIN(person_id1, person_id2), MAX(person_id1, person_id2))",
            params![canonical_id],
        )
        .map_err(db)?;

        let aliases = serde_json::to_string(&canonical.aliases)?;
        tx.execute(
            "UPDATE persons SET aliases_json = ?2, role = ?3, category = ?4, description = ?5 \
             WHERE id = ?1",
            params![
                canonical_id,
                aliases,
                canonical.role,
                canonical.category,
                canonical.description
            ],
        )
        .map_err(db)?;

        let neighbors: Vec<i64> = {
            let mut stmt = tx
                .prepare(
                    "SELECT CASE WHEN person_id1 = ?1 THEN person_id2 ELSE person_id1 END \
                     FROM connections WHERE person_id1 = ?1 OR person_id2 = ?1",
                )
                .map_err(db)?;
            let rows = stmt
                .query_map(params![canonical_id], |row| row.get(0))
                .map_err(db)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)?
        };
        Self::recompute_counts(&tx, canonical_id, now)?;
        for id in neighbors {
            Self::recompute_counts(&tx, id, now)?;
        }

        tx.commit().map_err(db)?;
        Ok(())
    }

    fn purge_self_connections(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM connections WHERE person_id1 = person_id2", [])
            .map_err(db)?;
        if count > 0 {
            Self::recompute_all_connection_counts(&conn)?;
        }
        Ok(count)
    }

    fn collapse_duplicate_connections(&self) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE connections SET strength = (SELECT MAX(c2.strength) FROM connections c2 \
             WHERE MIN(c2.person_id1, c2.person_id2) = MIN(connections.person_id1, connections.person_id2) \
             AND MAX(c2.person_id1, c2.person_id2) = MAX(connections.person_id1, connections.person_id2))",
            [],
        )
        .map_err(db)?;
        let count = conn
            .execute(
                "DELETE FROM connections WHERE id NOT IN ( \
                 SELECT MIN(id) FROM connections \
                 GROUP BY MIN(person_id1, person_id2), MAX(person_id1, person_id2))",
                [],
            )
            .map_err(db)?;
        if count > 0 {
            Self::recompute_all_connection_counts(&conn)?;
        }
        Ok(count)
    }
}

/// Fold a duplicate's name, aliases, and empty descriptive fields into the
/// canonical record.
pub(crate) fn absorb_identity(canonical: &mut Person, dup: &Person) {
    let mut push_alias = |alias: &str| {
        let alias = alias.trim();
        if alias.is_empty() || alias == canonical.name {
            return;
        }
        if !canonical.aliases.iter().any(|a| a == alias) {
            canonical.aliases.push(alias.to_string());
        }
    };
    push_alias(&dup.name);
    for alias in &dup.aliases {
        push_alias(alias);
    }
    if canonical.role.is_empty() {
        canonical.role = dup.role.clone();
    }
    if canonical.category.is_empty() {
        canonical.category = dup.category.clone();
    }
    if canonical.description.is_empty() {
        canonical.description = dup.description.clone();
    }
}
