//! Reference resolver: turn book references into page text.
//!
//! Each reference names a book type and a list of page numbers. The book is
//! fetched once per request; each requested number is matched against the
//! printed page number first and the scan-order number second. Everything
//! that cannot be resolved is recorded as a [`Skip`] and never fails the
//! request.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use lessonctx_shared::{
    BookReference, BookType, Grade, LessonCtxError, PageContent, Result, Subject, Textbook,
    TextbookKey, TextbookStore,
};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Caller-supplied restriction on which book types to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookTypeFilter(BTreeSet<BookType>);

impl BookTypeFilter {
    /// Parse a list of book-type codes (`LB`, `AB`, ...) or store tags.
    ///
    /// An empty list or an unknown code is rejected; callers who want every
    /// book type pass no filter at all.
    pub fn parse<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut types = BTreeSet::new();
        for code in codes {
            let code = code.as_ref();
            let book_type: BookType = code.parse().map_err(|_| {
                LessonCtxError::invalid_filter(format!("unknown book type code {code:?}"))
            })?;
            types.insert(book_type);
        }
        if types.is_empty() {
            return Err(LessonCtxError::invalid_filter(
                "filter lists no book types; omit it to resolve every book",
            ));
        }
        Ok(Self(types))
    }

    pub fn allows(&self, book_type: BookType) -> bool {
        self.0.contains(&book_type)
    }

    pub fn book_types(&self) -> impl Iterator<Item = BookType> + '_ {
        self.0.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Which page number a request matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMatch {
    /// The number printed on the page.
    Printed,
    /// The sequential scan-order number.
    Scan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPage {
    pub requested: u32,
    pub matched_on: PageMatch,
    pub pdf_page_no: u32,
    pub book_page_no: Option<u32>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipKind {
    /// Excluded by the caller's book-type filter.
    FilteredOut,
    /// No textbook stored for the book type.
    BookMissing,
    /// The book exists but no page carries the requested number.
    PageMissing,
}

/// A reference (or one page of it) that produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    #[serde(rename = "type")]
    pub kind: SkipKind,
    pub book_type: BookType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub reason: String,
}

/// Everything the resolver produced for one node's references.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedBooks {
    /// Page text per book type. A type appears only if at least one page
    /// resolved.
    pub pages: BTreeMap<BookType, Vec<ResolvedPage>>,
    pub skips: Vec<Skip>,
    /// Book types requested and not filtered out.
    pub books_requested: BTreeSet<BookType>,
    /// Book types whose textbook was found.
    pub books_found: BTreeSet<BookType>,
    /// Distinct `(book, page)` pairs requested and not filtered out.
    pub pages_requested: usize,
}

impl ResolvedBooks {
    pub fn pages_resolved(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn skips_of(&self, kind: SkipKind) -> impl Iterator<Item = &Skip> {
        self.skips.iter().filter(move |s| s.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Find the page for a requested number: printed number first, then scan
/// order. Pages without a printed number can only match on scan order.
pub fn find_page(book: &Textbook, requested: u32) -> Option<(&PageContent, PageMatch)> {
    book.pages
        .iter()
        .find(|p| p.book_page_no == Some(requested))
        .map(|p| (p, PageMatch::Printed))
        .or_else(|| {
            book.pages
                .iter()
                .find(|p| p.pdf_page_no == requested)
                .map(|p| (p, PageMatch::Scan))
        })
}

/// Resolve every reference of a node against the textbook store.
///
/// `filter: None` resolves all book types. Store errors propagate; absence
/// never does.
#[instrument(skip_all, fields(subject = %subject, grade = %grade, references = references.len()))]
pub async fn resolve<S: TextbookStore>(
    store: &S,
    subject: Subject,
    grade: Grade,
    references: &[BookReference],
    filter: Option<&BookTypeFilter>,
) -> Result<ResolvedBooks> {
    let mut out = ResolvedBooks::default();
    let mut books: HashMap<BookType, Option<Arc<Textbook>>> = HashMap::new();
    let mut seen: HashSet<(BookType, u32)> = HashSet::new();

    for reference in references {
        let book_type = reference.book_type;

        if filter.is_some_and(|f| !f.allows(book_type)) {
            out.skips.push(Skip {
                kind: SkipKind::FilteredOut,
                book_type,
                page: None,
                reason: format!("{book_type} excluded by book type filter"),
            });
            continue;
        }

        out.books_requested.insert(book_type);
        let pages: Vec<u32> = reference
            .pages
            .iter()
            .copied()
            .filter(|&n| seen.insert((book_type, n)))
            .collect();
        out.pages_requested += pages.len();

        let book = match books.get(&book_type) {
            Some(cached) => cached.clone(),
            None => {
                let key = TextbookKey::new(subject, grade, book_type);
                let fetched = store.textbook(&key).await?;
                debug!(%key, found = fetched.is_some(), "textbook lookup");
                books.insert(book_type, fetched.clone());
                fetched
            }
        };

        let Some(book) = book else {
            debug!(%book_type, "book missing, skipping reference");
            let name = if reference.book_name.is_empty() {
                book_type.display_name()
            } else {
                reference.book_name.as_str()
            };
            out.skips.push(Skip {
                kind: SkipKind::BookMissing,
                book_type,
                page: None,
                reason: format!(
                    "no {} textbook stored for {subject} grade {} ({name})",
                    book_type.store_tag(),
                    grade.number()
                ),
            });
            continue;
        };
        out.books_found.insert(book_type);

        for requested in pages {
            match find_page(&book, requested) {
                Some((page, matched_on)) => {
                    out.pages.entry(book_type).or_default().push(ResolvedPage {
                        requested,
                        matched_on,
                        pdf_page_no: page.pdf_page_no,
                        book_page_no: page.book_page_no,
                        content: page.content.clone(),
                    });
                }
                None => {
                    debug!(%book_type, page = requested, "page missing");
                    out.skips.push(Skip {
                        kind: SkipKind::PageMissing,
                        book_type,
                        page: Some(requested),
                        reason: format!("page {requested} not found in {book_type}"),
                    });
                }
            }
        }
    }

    debug!(
        resolved = out.pages_resolved(),
        requested = out.pages_requested,
        skips = out.skips.len(),
        "references resolved"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonctx_storage::MemoryStore;

    fn fixture_book(name: &str) -> Textbook {
        let json = std::fs::read_to_string(format!("../../../fixtures/json/{name}.json"))
            .expect("read fixture");
        Textbook::from_pages_json(name, &json).expect("parse fixture")
    }

    fn key(book_type: BookType) -> TextbookKey {
        TextbookKey::new(Subject::English, Grade::new(2), book_type)
    }

    fn reference(book_type: BookType, pages: &[u32]) -> BookReference {
        BookReference {
            book_type,
            book_name: String::new(),
            pages: pages.to_vec(),
        }
    }

    fn both_books() -> MemoryStore {
        MemoryStore::new()
            .with_textbook(
                key(BookType::Learners),
                fixture_book("textbook_english_grade2_learners"),
            )
            .with_textbook(
                key(BookType::Activity),
                fixture_book("textbook_english_grade2_activity"),
            )
    }

    #[test]
    fn filter_rejects_empty_and_unknown() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            BookTypeFilter::parse(empty).unwrap_err(),
            LessonCtxError::InvalidBookTypeFilter { .. }
        ));
        let err = BookTypeFilter::parse(["LB", "XX"]).unwrap_err();
        assert!(err.to_string().contains("XX"));

        let filter = BookTypeFilter::parse(["lb", "activity"]).unwrap();
        assert!(filter.allows(BookType::Learners));
        assert!(filter.allows(BookType::Activity));
        assert!(!filter.allows(BookType::Reading));
    }

    #[test]
    fn printed_number_wins_over_scan_order() {
        let book = Textbook::new(
            "t",
            vec![
                PageContent {
                    content: "scan 5".into(),
                    pdf_page_no: 5,
                    book_page_no: Some(3),
                },
                PageContent {
                    content: "printed 5".into(),
                    pdf_page_no: 7,
                    book_page_no: Some(5),
                },
                PageContent {
                    content: "unnumbered".into(),
                    pdf_page_no: 9,
                    book_page_no: None,
                },
            ],
        );
        let (page, how) = find_page(&book, 5).unwrap();
        assert_eq!(page.content, "printed 5");
        assert_eq!(how, PageMatch::Printed);

        let (page, how) = find_page(&book, 9).unwrap();
        assert_eq!(page.content, "unnumbered");
        assert_eq!(how, PageMatch::Scan);

        assert!(find_page(&book, 42).is_none());
    }

    #[tokio::test]
    async fn all_pages_resolve_with_empty_skip_log() {
        let store = both_books();
        let refs = [
            reference(BookType::Learners, &[110, 111]),
            reference(BookType::Activity, &[88, 89]),
        ];
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, None)
            .await
            .unwrap();

        assert!(out.skips.is_empty());
        assert_eq!(out.pages.len(), 2);
        let lb = &out.pages[&BookType::Learners];
        assert_eq!(lb.len(), 2);
        assert_eq!(lb[0].requested, 110);
        assert_eq!(lb[0].pdf_page_no, 112);
        assert_eq!(lb[0].matched_on, PageMatch::Printed);
        assert!(lb[0].content.contains("sunny"));
        assert_eq!(out.pages_resolved(), 4);
        assert_eq!(out.pages_requested, 4);
    }

    #[tokio::test]
    async fn missing_book_is_skipped_not_fatal() {
        let store = MemoryStore::new().with_textbook(
            key(BookType::Learners),
            fixture_book("textbook_english_grade2_learners"),
        );
        let refs = [
            reference(BookType::Learners, &[110, 111]),
            reference(BookType::Activity, &[88, 89]),
        ];
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, None)
            .await
            .unwrap();

        assert_eq!(out.pages[&BookType::Learners].len(), 2);
        assert!(!out.pages.contains_key(&BookType::Activity));
        let missing: Vec<_> = out.skips_of(SkipKind::BookMissing).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].book_type, BookType::Activity);
        assert!(missing[0].reason.contains("activity"));

        let json = serde_json::to_value(missing[0]).unwrap();
        assert_eq!(json["type"], "BookMissing");
        assert_eq!(json["book_type"], "AB");
        assert!(json.get("page").is_none());
    }

    #[tokio::test]
    async fn filtered_out_is_distinct_from_missing() {
        let store = both_books();
        let refs = [
            reference(BookType::Learners, &[110]),
            reference(BookType::Activity, &[88]),
        ];
        let filter = BookTypeFilter::parse(["LB"]).unwrap();
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, Some(&filter))
            .await
            .unwrap();

        assert_eq!(out.skips.len(), 1);
        assert_eq!(out.skips[0].kind, SkipKind::FilteredOut);
        assert_eq!(out.skips[0].book_type, BookType::Activity);
        assert_eq!(out.skips_of(SkipKind::BookMissing).count(), 0);
        assert_eq!(out.books_requested.len(), 1);
        // only the Learner's Book was fetched
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn unmatched_page_is_skipped_and_others_survive() {
        let store = both_books();
        let refs = [reference(BookType::Learners, &[110, 500, 111])];
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, None)
            .await
            .unwrap();

        let got: Vec<u32> = out.pages[&BookType::Learners]
            .iter()
            .map(|p| p.requested)
            .collect();
        assert_eq!(got, vec![110, 111]);
        let missing: Vec<_> = out.skips_of(SkipKind::PageMissing).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].page, Some(500));
    }

    #[tokio::test]
    async fn printed_page_resolves_when_scan_numbering_differs() {
        // 112 exists both as printed page (scan 114) and as scan page
        // (printed 110); the printed page must win.
        let store = both_books();
        let refs = [reference(BookType::Learners, &[112])];
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, None)
            .await
            .unwrap();
        let page = &out.pages[&BookType::Learners][0];
        assert_eq!(page.pdf_page_no, 114);
        assert_eq!(page.book_page_no, Some(112));
        assert_eq!(page.matched_on, PageMatch::Printed);
    }

    #[tokio::test]
    async fn repeated_books_and_pages_are_fetched_once() {
        let store = both_books();
        let refs = [
            reference(BookType::Learners, &[110, 110]),
            reference(BookType::Learners, &[110, 111]),
        ];
        let out = resolve(&store, Subject::English, Grade::new(2), &refs, None)
            .await
            .unwrap();
        assert_eq!(out.pages[&BookType::Learners].len(), 2);
        assert_eq!(out.pages_requested, 2);
        assert_eq!(store.lookup_count(), 1);
    }
}
