//! libSQL storage layer for curricula and textbooks.
//!
//! The [`Storage`] struct wraps a libSQL database holding scheme-of-work
//! documents and extracted textbook pages. Both are write-once per ingestion:
//! re-ingesting a key replaces the record atomically, and an identical
//! document is detected by content hash and left untouched.
//!
//! **Access rules:**
//! - CLI ingestion: read-write via [`Storage::open`]
//! - Context resolution: read-only via [`Storage::open_readonly`]
//!
//! [`MemoryStore`] implements the same read interfaces in memory.

mod memory;
mod migrations;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use lessonctx_shared::{
    BookType, CurriculumKey, CurriculumStore, CurriculumTree, Grade, LessonCtxError, PageContent,
    Result, Subject, Textbook, TextbookKey, TextbookStore, TreeShape,
};
use libsql::{Connection, Database, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use memory::MemoryStore;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// What an ingestion call did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Inserted,
    Replaced,
    /// Same content hash as the stored record; nothing written.
    Unchanged,
}

/// Listing row for a stored curriculum.
#[derive(Debug, Clone, Serialize)]
pub struct CurriculumSummary {
    pub subject: String,
    pub grade: String,
    pub shape: String,
    pub ingested_at: String,
}

/// Listing row for a stored textbook.
#[derive(Debug, Clone, Serialize)]
pub struct TextbookSummary {
    pub subject: String,
    pub grade: String,
    pub book_type: String,
    pub title: String,
    pub page_count: u32,
    pub ingested_at: String,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LessonCtxError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LessonCtxError::Storage(format!(
                "database {} does not exist; ingest a curriculum first",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LessonCtxError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LessonCtxError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Curriculum operations
    // -----------------------------------------------------------------------

    /// Store a curriculum tree, replacing any previous one for the key.
    pub async fn put_curriculum(
        &self,
        key: &CurriculumKey,
        tree: &CurriculumTree,
    ) -> Result<IngestOutcome> {
        self.check_writable()?;
        tree.validate()?;

        let document = serde_json::to_string(&tree.to_document())
            .map_err(|e| LessonCtxError::validation(format!("JSON serialization failed: {e}")))?;
        let hash = content_hash(&document);
        let grade = key.grade_key();

        let existing = self
            .query_one_string(
                "SELECT content_hash FROM curricula WHERE subject = ?1 AND grade = ?2",
                key.subject.as_str(),
                &grade,
            )
            .await?;
        if existing.as_deref() == Some(hash.as_str()) {
            debug!(%key, "curriculum unchanged, skipping write");
            return Ok(IngestOutcome::Unchanged);
        }

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO curricula (subject, grade, shape, document_json, content_hash, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(subject, grade) DO UPDATE SET
                   shape = excluded.shape,
                   document_json = excluded.document_json,
                   content_hash = excluded.content_hash,
                   ingested_at = excluded.ingested_at",
                params![
                    key.subject.as_str(),
                    grade.as_str(),
                    tree.shape().to_string(),
                    document,
                    hash.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let outcome = if existing.is_some() {
            IngestOutcome::Replaced
        } else {
            IngestOutcome::Inserted
        };
        info!(%key, shape = %tree.shape(), nodes = tree.node_count(), ?outcome, "stored curriculum");
        Ok(outcome)
    }

    /// Fetch the curriculum tree for a subject/grade.
    pub async fn get_curriculum(&self, key: &CurriculumKey) -> Result<Option<CurriculumTree>> {
        let document = self
            .query_one_string(
                "SELECT document_json FROM curricula WHERE subject = ?1 AND grade = ?2",
                key.subject.as_str(),
                &key.grade_key(),
            )
            .await?;

        document
            .map(|json| CurriculumTree::from_document_json(&json))
            .transpose()
    }

    /// List all stored curricula, ordered by subject then grade.
    pub async fn list_curricula(&self) -> Result<Vec<CurriculumSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT subject, grade, shape, ingested_at FROM curricula ORDER BY subject, grade",
                params![],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?
        {
            results.push(CurriculumSummary {
                subject: get_string(&row, 0)?,
                grade: get_string(&row, 1)?,
                shape: get_string(&row, 2)?,
                ingested_at: get_string(&row, 3)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Textbook operations
    // -----------------------------------------------------------------------

    /// Store a textbook and its pages, replacing any previous one for the key.
    pub async fn put_textbook(&self, key: &TextbookKey, book: &Textbook) -> Result<IngestOutcome> {
        self.check_writable()?;

        let serialized = serde_json::to_string(book)
            .map_err(|e| LessonCtxError::validation(format!("JSON serialization failed: {e}")))?;
        let hash = content_hash(&serialized);
        let grade = key.grade_key();

        let existing = self.textbook_row(key).await?;
        if let Some((_, existing_hash)) = &existing {
            if *existing_hash == hash {
                debug!(%key, "textbook unchanged, skipping write");
                return Ok(IngestOutcome::Unchanged);
            }
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        if let Some((old_id, _)) = &existing {
            tx.execute(
                "DELETE FROM textbook_pages WHERE textbook_id = ?1",
                params![old_id.as_str()],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;
            tx.execute("DELETE FROM textbooks WHERE id = ?1", params![old_id.as_str()])
                .await
                .map_err(|e| LessonCtxError::Storage(e.to_string()))?;
        }

        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO textbooks (id, subject, grade, book_type, title, content_hash, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.as_str(),
                key.subject.as_str(),
                grade.as_str(),
                key.book_tag(),
                book.title.as_str(),
                hash.as_str(),
                now.as_str()
            ],
        )
        .await
        .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        for (seq, page) in book.pages.iter().enumerate() {
            tx.execute(
                "INSERT INTO textbook_pages (textbook_id, seq, pdf_page_no, book_page_no, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    seq as i64,
                    i64::from(page.pdf_page_no),
                    page.book_page_no.map(i64::from),
                    page.content.as_str()
                ],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let outcome = if existing.is_some() {
            IngestOutcome::Replaced
        } else {
            IngestOutcome::Inserted
        };
        info!(%key, pages = book.pages.len(), ?outcome, "stored textbook");
        Ok(outcome)
    }

    /// Fetch a textbook with its pages in scan order.
    pub async fn get_textbook(&self, key: &TextbookKey) -> Result<Option<Textbook>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title FROM textbooks WHERE subject = ?1 AND grade = ?2 AND book_type = ?3",
                params![key.subject.as_str(), key.grade_key(), key.book_tag()],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let (id, title) = match rows.next().await {
            Ok(Some(row)) => (get_string(&row, 0)?, get_string(&row, 1)?),
            Ok(None) => return Ok(None),
            Err(e) => return Err(LessonCtxError::Storage(e.to_string())),
        };

        let mut rows = self
            .conn
            .query(
                "SELECT pdf_page_no, book_page_no, content FROM textbook_pages
                 WHERE textbook_id = ?1 ORDER BY seq",
                params![id.as_str()],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let mut pages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?
        {
            pages.push(row_to_page(&row)?);
        }

        Ok(Some(Textbook::new(title, pages)))
    }

    /// List all stored textbooks with their page counts.
    pub async fn list_textbooks(&self) -> Result<Vec<TextbookSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT t.subject, t.grade, t.book_type, t.title, t.ingested_at, COUNT(p.seq)
                 FROM textbooks t
                 LEFT JOIN textbook_pages p ON p.textbook_id = t.id
                 GROUP BY t.id
                 ORDER BY t.subject, t.grade, t.book_type",
                params![],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?
        {
            results.push(TextbookSummary {
                subject: get_string(&row, 0)?,
                grade: get_string(&row, 1)?,
                book_type: get_string(&row, 2)?,
                title: get_string(&row, 3)?,
                ingested_at: get_string(&row, 4)?,
                page_count: row
                    .get::<u32>(5)
                    .map_err(|e| LessonCtxError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Look up `(id, content_hash)` for a stored textbook.
    async fn textbook_row(&self, key: &TextbookKey) -> Result<Option<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content_hash FROM textbooks
                 WHERE subject = ?1 AND grade = ?2 AND book_type = ?3",
                params![key.subject.as_str(), key.grade_key(), key.book_tag()],
            )
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some((get_string(&row, 0)?, get_string(&row, 1)?))),
            Ok(None) => Ok(None),
            Err(e) => Err(LessonCtxError::Storage(e.to_string())),
        }
    }

    /// Run a two-parameter query returning at most one string column.
    async fn query_one_string(&self, sql: &str, a: &str, b: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(sql, params![a, b])
            .await
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(get_string(&row, 0)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(LessonCtxError::Storage(e.to_string())),
        }
    }
}

impl CurriculumStore for Storage {
    #[instrument(skip_all, fields(key = %key))]
    async fn curriculum(&self, key: &CurriculumKey) -> Result<Option<Arc<CurriculumTree>>> {
        Ok(self.get_curriculum(key).await?.map(Arc::new))
    }
}

impl TextbookStore for Storage {
    #[instrument(skip_all, fields(key = %key))]
    async fn textbook(&self, key: &TextbookKey) -> Result<Option<Arc<Textbook>>> {
        Ok(self.get_textbook(key).await?.map(Arc::new))
    }
}

/// Parse a stored key triple back into typed keys (used by listings).
pub fn textbook_key_from_summary(summary: &TextbookSummary) -> Result<TextbookKey> {
    Ok(TextbookKey::new(
        summary.subject.parse::<Subject>()?,
        Grade::parse(&summary.grade)?,
        summary.book_type.parse::<BookType>()?,
    ))
}

/// Parse a stored shape column.
pub fn shape_from_summary(summary: &CurriculumSummary) -> Option<TreeShape> {
    match summary.shape.as_str() {
        "hierarchical" => Some(TreeShape::Hierarchical),
        "flat" => Some(TreeShape::Flat),
        _ => None,
    }
}

/// SHA-256 hex digest of a serialized document.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| LessonCtxError::Storage(e.to_string()))
}

/// Convert a `textbook_pages` row to a [`PageContent`].
fn row_to_page(row: &libsql::Row) -> Result<PageContent> {
    Ok(PageContent {
        pdf_page_no: row
            .get::<u32>(0)
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?,
        book_page_no: row
            .get::<Option<u32>>(1)
            .map_err(|e| LessonCtxError::Storage(e.to_string()))?,
        content: get_string(row, 2)?,
    })
}
