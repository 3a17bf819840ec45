//! Database schema SQL.

/// Documents, analysis jobs, and the spend ledger.
pub const PIPELINE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_key TEXT NOT NULL UNIQUE,
    data_set_id TEXT,
    extracted_text TEXT,
    content_hash TEXT UNIQUE,
    ai_analysis_status TEXT NOT NULL DEFAULT 'pending',
    ai_cost_cents REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(ai_analysis_status);

CREATE TABLE IF NOT EXISTS analysis_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    job_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 3,
    error_message TEXT,
    metadata_json TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_one_active
    ON analysis_jobs(document_id, job_type)
    WHERE status IN ('pending', 'processing');
CREATE INDEX IF NOT EXISTS idx_jobs_queue ON analysis_jobs(status, priority DESC, id);

CREATE TABLE IF NOT EXISTS budget_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    model TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    cost_cents REAL NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_budget_created ON budget_records(created_at);
"#;

/// Persons, their document links, connections, and events.
pub const GRAPH_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    aliases_json TEXT NOT NULL DEFAULT '[]',
    category TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    document_count INTEGER NOT NULL DEFAULT 0,
    connection_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_persons_name ON persons(name);

CREATE TABLE IF NOT EXISTS person_documents (
    person_id INTEGER NOT NULL REFERENCES persons(id),
    document_id INTEGER NOT NULL,
    mention_count INTEGER NOT NULL DEFAULT 1,
    context TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (person_id, document_id)
);

CREATE TABLE IF NOT EXISTS connections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id1 INTEGER NOT NULL REFERENCES persons(id),
    person_id2 INTEGER NOT NULL REFERENCES persons(id),
    connection_type TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    strength INTEGER NOT NULL DEFAULT 1,
    document_id INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_connections_p1 ON connections(person_id1);
CREATE INDEX IF NOT EXISTS idx_connections_p2 ON connections(person_id2);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    date TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL,
    title_key TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    significance INTEGER NOT NULL DEFAULT 1,
    persons_json TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    UNIQUE (date, title_key)
);
"#;
