//! End-to-end context resolution: request → locate → resolve → classify →
//! assemble.

use std::time::Instant;

use tracing::{info, instrument};

use lessonctx_shared::{CurriculumStore, Grade, Result, Subject, TextbookStore};

use crate::assembler::{Context, assemble};
use crate::classifier::classify;
use crate::lesson_types::default_books_for;
use crate::locator::{Location, locate};
use crate::resolver::{BookTypeFilter, ResolvedBooks, resolve};

/// A context request as received from a caller. Values are raw and
/// normalized by the pipeline.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub subject: String,
    /// Grade in either store form (`"Grade 2"` or `"2"`).
    pub grade: String,
    /// Lesson number (hierarchical curricula) or unit number (flat ones).
    pub lesson: u32,
    pub lesson_type: String,
    /// Book-type codes to resolve; `None` resolves every referenced book.
    pub books: Option<Vec<String>>,
}

impl ContextRequest {
    pub fn new(
        subject: impl Into<String>,
        grade: impl Into<String>,
        lesson: u32,
        lesson_type: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            grade: grade.into(),
            lesson,
            lesson_type: lesson_type.into(),
            books: None,
        }
    }

    pub fn with_books<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.books = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Narrow an unfiltered request to the books its lesson type usually
    /// draws on. Requests that already carry a filter, or whose subject or
    /// type has no catalog entry, are left as they are.
    pub fn with_type_default_books(mut self) -> Self {
        if self.books.is_some() {
            return self;
        }
        let Ok(subject) = self.subject.parse::<Subject>() else {
            return self;
        };
        let defaults = default_books_for(subject, &self.lesson_type);
        if !defaults.is_empty() {
            self.books = Some(defaults.iter().map(|b| b.code().to_string()).collect());
        }
        self
    }
}

/// Resolves requests against a curriculum store and a textbook store.
///
/// The two stores may be the same value (e.g. one `Arc<Storage>`).
pub struct ContextResolver<C, T> {
    curricula: C,
    textbooks: T,
}

impl<C: CurriculumStore, T: TextbookStore> ContextResolver<C, T> {
    pub fn new(curricula: C, textbooks: T) -> Self {
        Self {
            curricula,
            textbooks,
        }
    }

    pub fn curricula(&self) -> &C {
        &self.curricula
    }

    pub fn textbooks(&self) -> &T {
        &self.textbooks
    }

    /// Resolve one request.
    ///
    /// Malformed input (unknown subject, unparseable grade, empty or unknown
    /// book filter) fails before any store is touched. A missing curriculum,
    /// lesson, or type yields a context with `found = false`.
    #[instrument(skip_all, fields(subject = %request.subject, grade = %request.grade, lesson = request.lesson, lesson_type = %request.lesson_type))]
    pub async fn resolve(&self, request: &ContextRequest) -> Result<Context> {
        let started = Instant::now();

        let filter = request
            .books
            .as_ref()
            .map(BookTypeFilter::parse)
            .transpose()?;
        let subject: Subject = request.subject.parse()?;
        let grade = Grade::parse(&request.grade)?;

        let location = locate(
            &self.curricula,
            subject,
            &request.grade,
            request.lesson,
            &request.lesson_type,
        )
        .await?;

        let node = match location {
            Location::Found(node) => node,
            miss @ Location::NotFound(_) => {
                info!("no curriculum node for request");
                return Ok(assemble(miss, ResolvedBooks::default(), Vec::new()));
            }
        };

        let books = resolve(
            &self.textbooks,
            subject,
            grade,
            &node.entry.book_references,
            filter.as_ref(),
        )
        .await?;
        let resources = classify(&node.entry.external_resources, subject, grade);

        let context = assemble(Location::Found(node), books, resources);
        let coverage = context.coverage();
        info!(
            matched_type = context.node.as_ref().map(|n| n.matched_type.as_str()).unwrap_or_default(),
            pages = coverage.pages_resolved,
            pages_requested = coverage.pages_requested,
            skips = context.log.skips.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "context resolved"
        );
        Ok(context)
    }
}

/// One-shot resolution without constructing a [`ContextResolver`].
pub async fn resolve_context<C, T>(
    curricula: &C,
    textbooks: &T,
    request: &ContextRequest,
) -> Result<Context>
where
    C: CurriculumStore,
    T: TextbookStore,
{
    ContextResolver::new(curricula, textbooks)
        .resolve(request)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Resolution;
    use crate::resolver::SkipKind;
    use lessonctx_shared::{BookType, CurriculumKey, CurriculumTree, LessonCtxError, Textbook, TextbookKey};
    use lessonctx_storage::MemoryStore;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/json/{name}.json"))
            .expect("read fixture")
    }

    fn english_store(with_activity: bool) -> MemoryStore {
        let grade = Grade::new(2);
        let store = MemoryStore::new()
            .with_curriculum(
                CurriculumKey::new(Subject::English, grade),
                CurriculumTree::from_document_json(&fixture("curriculum_english_grade2")).unwrap(),
            )
            .with_textbook(
                TextbookKey::new(Subject::English, grade, BookType::Learners),
                Textbook::from_pages_json("LB", &fixture("textbook_english_grade2_learners"))
                    .unwrap(),
            );
        if with_activity {
            store.insert_textbook(
                TextbookKey::new(Subject::English, grade, BookType::Activity),
                Textbook::from_pages_json("AB", &fixture("textbook_english_grade2_activity"))
                    .unwrap(),
            );
        }
        store
    }

    #[tokio::test]
    async fn full_resolution_has_empty_skip_log() {
        let store = english_store(true);
        let request = ContextRequest::new("English", "Grade 2", 1, "vocabulary_word_meaning")
            .with_books(["LB", "AB"]);
        let ctx = resolve_context(&store, &store, &request).await.unwrap();

        assert!(ctx.found);
        assert!(ctx.log.skips.is_empty());
        assert_eq!(ctx.books[&BookType::Learners].len(), 2);
        assert_eq!(ctx.books[&BookType::Activity].len(), 2);
        assert!(ctx.coverage().is_complete());
        assert_eq!(ctx.skills, vec!["Listening", "Speaking", "Reading"]);

        assert_eq!(ctx.resources.len(), 2);
        assert_eq!(
            ctx.resources[0].resolution,
            Resolution::Audio {
                track: 70,
                locator: "Grade_2_English_Tracks/GE2_Track_70".into()
            }
        );
        assert!(matches!(
            &ctx.resources[1].resolution,
            Resolution::Video { embed_url, .. } if embed_url == "https://www.youtube.com/embed/dQw4w9WgXcQ"
        ));
    }

    #[tokio::test]
    async fn missing_activity_book_is_logged() {
        let store = english_store(false);
        let request = ContextRequest::new("English", "2", 1, "vocabulary_word_meaning");
        let ctx = resolve_context(&store, &store, &request).await.unwrap();

        assert!(ctx.found);
        assert!(ctx.is_partial());
        assert_eq!(ctx.books[&BookType::Learners].len(), 2);
        assert!(!ctx.books.contains_key(&BookType::Activity));
        assert_eq!(ctx.log.skips.len(), 1);
        assert_eq!(ctx.log.skips[0].kind, SkipKind::BookMissing);
        assert_eq!(ctx.log.skips[0].book_type, BookType::Activity);
    }

    #[tokio::test]
    async fn filter_excludes_without_reporting_missing() {
        let store = english_store(false);
        let request = ContextRequest::new("English", "Grade 2", 1, "vocabulary_word_meaning")
            .with_books(["LB"]);
        let ctx = resolve_context(&store, &store, &request).await.unwrap();

        assert_eq!(ctx.log.skips.len(), 1);
        assert_eq!(ctx.log.skips[0].kind, SkipKind::FilteredOut);
        assert!(!ctx.is_partial());
    }

    #[tokio::test]
    async fn alias_and_full_tag_give_same_context() {
        let store = english_store(true);
        let by_alias = resolve_context(
            &store,
            &store,
            &ContextRequest::new("English", "Grade 2", 1, "listening"),
        )
        .await
        .unwrap();
        let by_tag = resolve_context(
            &store,
            &store,
            &ContextRequest::new("English", "Grade 2", 1, "listening_audio_video"),
        )
        .await
        .unwrap();

        assert_eq!(by_alias.node.as_ref().unwrap().matched_type, "listening_audio_video");
        assert_eq!(by_alias.content, by_tag.content);
        assert_eq!(by_alias.books, by_tag.books);
        assert_eq!(by_alias.page_texts(BookType::Learners).len(), 1);
    }

    #[tokio::test]
    async fn flat_curriculum_resolves_by_unit() {
        let grade = Grade::new(2);
        let store = MemoryStore::new().with_curriculum(
            CurriculumKey::new(Subject::Mathematics, grade),
            CurriculumTree::from_document_json(&fixture("curriculum_maths_grade2")).unwrap(),
        );
        let ctx = resolve_context(
            &store,
            &store,
            &ContextRequest::new("Maths", "Grade 2", 13, "concept"),
        )
        .await
        .unwrap();

        assert!(ctx.found);
        assert_eq!(ctx.node.as_ref().unwrap().unit_title, "Position and Movement");
        // no Course Book ingested
        assert_eq!(ctx.log.skips[0].kind, SkipKind::BookMissing);
        assert_eq!(ctx.log.skips[0].book_type, BookType::CourseBook);
        assert_eq!(ctx.coverage().ratio(), 0.0);
    }

    #[tokio::test]
    async fn type_default_books_narrow_unfiltered_requests() {
        let store = english_store(true);
        let request =
            ContextRequest::new("English", "Grade 2", 2, "comprehension").with_type_default_books();
        assert_eq!(request.books, Some(vec!["LB".to_string(), "AB".to_string()]));

        let ctx = resolve_context(&store, &store, &request).await.unwrap();
        assert!(ctx.found);
        assert!(ctx.books.is_empty());
        assert!(
            ctx.log
                .skips
                .iter()
                .all(|s| s.kind == SkipKind::FilteredOut && s.book_type == BookType::Reading)
        );
        assert!(!ctx.log.skips.is_empty());

        let explicit = ContextRequest::new("English", "Grade 2", 2, "comprehension")
            .with_books(["ORT"])
            .with_type_default_books();
        assert_eq!(explicit.books, Some(vec!["ORT".to_string()]));

        let unknown = ContextRequest::new("Science", "Grade 2", 1, "concept").with_type_default_books();
        assert_eq!(unknown.books, None);
    }

    #[tokio::test]
    async fn empty_filter_rejected_before_store_access() {
        let store = english_store(true);
        let empty: [&str; 0] = [];
        let request = ContextRequest::new("English", "Grade 2", 1, "vocabulary").with_books(empty);
        let err = resolve_context(&store, &store, &request).await.unwrap_err();

        assert!(matches!(err, LessonCtxError::InvalidBookTypeFilter { .. }));
        assert_eq!(store.lookup_count(), 0);
    }

    #[tokio::test]
    async fn malformed_grade_and_subject_are_fatal() {
        let store = english_store(true);
        let err = resolve_context(
            &store,
            &store,
            &ContextRequest::new("English", "second", 1, "vocabulary"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LessonCtxError::Normalization { .. }));

        let err = resolve_context(
            &store,
            &store,
            &ContextRequest::new("Science", "2", 1, "vocabulary"),
        )
        .await
        .unwrap_err();
        assert!(err.is_request_error());
        assert_eq!(store.lookup_count(), 0);
    }

    #[tokio::test]
    async fn misses_are_contexts_not_errors() {
        let store = english_store(true);
        let ctx = resolve_context(
            &store,
            &store,
            &ContextRequest::new("English", "Grade 2", 42, "vocabulary"),
        )
        .await
        .unwrap();
        assert!(!ctx.found);
        assert!(matches!(
            ctx.require_found().unwrap_err(),
            LessonCtxError::LessonNotPresent { lesson: 42, .. }
        ));

        let ctx = resolve_context(
            &store,
            &store,
            &ContextRequest::new("English", "Grade 9", 1, "vocabulary"),
        )
        .await
        .unwrap();
        assert!(matches!(
            ctx.require_found().unwrap_err(),
            LessonCtxError::NotFoundCurriculum { .. }
        ));
    }

    #[tokio::test]
    async fn resolver_works_through_cache() {
        use crate::cache::CachedStore;
        use std::sync::Arc;

        let store = Arc::new(CachedStore::new(english_store(true)));
        let resolver = ContextResolver::new(store.clone(), store.clone());
        let request = ContextRequest::new("English", "Grade 2", 1, "vocabulary_word_meaning");
        resolver.resolve(&request).await.unwrap();
        resolver.resolve(&request).await.unwrap();

        // curriculum + LB + AB, each fetched once
        assert_eq!(store.inner().lookup_count(), 3);
        assert_eq!(store.stats().hits, 3);
    }
}
