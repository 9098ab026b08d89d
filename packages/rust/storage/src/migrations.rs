//! SQL migration definitions for the lessonctx database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

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
        description: "Initial schema: curricula, textbooks, textbook_pages",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Scheme-of-work documents, keyed in curriculum form ("Grade 2")
CREATE TABLE IF NOT EXISTS curricula (
    subject       TEXT NOT NULL,
    grade         TEXT NOT NULL,
    shape         TEXT NOT NULL,
    document_json TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    ingested_at   TEXT NOT NULL,
    PRIMARY KEY (subject, grade)
);

-- Textbooks, keyed in textbook form ("2", "learners")
CREATE TABLE IF NOT EXISTS textbooks (
    id           TEXT PRIMARY KEY,
    subject      TEXT NOT NULL,
    grade        TEXT NOT NULL,
    book_type    TEXT NOT NULL,
    title        TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ingested_at  TEXT NOT NULL,
    UNIQUE(subject, grade, book_type)
);

-- Extracted page text in scan order
CREATE TABLE IF NOT EXISTS textbook_pages (
    textbook_id  TEXT NOT NULL REFERENCES textbooks(id) ON DELETE CASCADE,
    seq          INTEGER NOT NULL,
    pdf_page_no  INTEGER NOT NULL,
    book_page_no INTEGER,
    content      TEXT NOT NULL,
    PRIMARY KEY (textbook_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_textbook_pages_book ON textbook_pages(textbook_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
