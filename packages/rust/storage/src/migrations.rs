//! SQL migration definitions for the Newsloom database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as a batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: articles + incomplete-selection index",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested articles and their derived enrichment fields.
-- `embedding` holds a JSON array of 768 floats once enrichment runs.
CREATE TABLE IF NOT EXISTS articles (
    id              TEXT PRIMARY KEY,
    source          TEXT NOT NULL,
    url             TEXT NOT NULL UNIQUE,
    title           TEXT,
    content_text    TEXT NOT NULL,
    summary         TEXT,
    sentiment_score REAL,
    category        TEXT,
    embedding       TEXT,
    created_at      TEXT NOT NULL
);

-- Partial index covering the scheduler's selection predicate.
CREATE INDEX IF NOT EXISTS idx_articles_incomplete
    ON articles(created_at)
    WHERE summary IS NULL OR summary = '(Summary Failed)' OR embedding IS NULL;

CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
