//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    crawled INTEGER NOT NULL DEFAULT 0,
    queued INTEGER NOT NULL DEFAULT 0,
    warnings INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0
);

-- Crawl frontier: one row per canonical URL, ever
CREATE TABLE IF NOT EXISTS frontier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    priority INTEGER NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_frontier_claim ON frontier(status, priority, created_at, id);

-- One measurement per article URL
CREATE TABLE IF NOT EXISTS content_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    occurrence_count INTEGER NOT NULL,
    sentences_without_links INTEGER NOT NULL,
    sentences_with_links INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Links found in sentences mentioning the search term
CREATE TABLE IF NOT EXISTS link_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_record_id INTEGER NOT NULL REFERENCES content_records(id) ON DELETE CASCADE,
    anchor_text TEXT NOT NULL,
    destination_url TEXT NOT NULL,
    UNIQUE(source_record_id, anchor_text, destination_url)
);

CREATE INDEX IF NOT EXISTS idx_link_edges_source ON link_edges(source_record_id);

-- Query strings stripped from discovered URLs
CREATE TABLE IF NOT EXISTS url_parameters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    raw_parameters TEXT NOT NULL,
    key_count INTEGER NOT NULL,
    more_than_three INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    UNIQUE(url, raw_parameters)
);
"#;

/// Creates any missing tables and indexes
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
