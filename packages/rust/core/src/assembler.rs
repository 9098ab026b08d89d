//! Context assembly: merge a located node, its resolved books, and its
//! classified resources into the structure handed to downstream generators.
//!
//! Assembly is pure. A [`Location::NotFound`] still produces a [`Context`]
//! (with `found = false` and the reason attached) so callers can report
//! misses without treating them as failures.

use std::collections::BTreeMap;

use serde::Serialize;

use lessonctx_shared::{BookReference, BookType, Grade, LessonCtxError, Result, Subject};

use crate::classifier::ResolvedResource;
use crate::lesson_types::TypeMatch;
use crate::locator::{Location, NotFound};
use crate::resolver::{ResolvedBooks, ResolvedPage, Skip, SkipKind};

/// What was asked for, echoed back in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEcho {
    pub subject: Subject,
    pub grade: Grade,
    pub lesson: u32,
    pub lesson_type: String,
}

/// Where in the curriculum the request landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub unit_number: u32,
    pub unit_title: String,
    pub title: String,
    pub matched_type: String,
    pub type_match: TypeMatch,
}

/// Fraction of requested material that resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub books_requested: usize,
    pub books_resolved: usize,
    pub pages_requested: usize,
    pub pages_resolved: usize,
    pub resources_total: usize,
    pub resources_resolved: usize,
}

impl Coverage {
    /// Resolved pages over requested pages; `1.0` when nothing was requested.
    pub fn ratio(&self) -> f64 {
        if self.pages_requested == 0 {
            1.0
        } else {
            self.pages_resolved as f64 / self.pages_requested as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.books_resolved == self.books_requested && self.pages_resolved == self.pages_requested
    }
}

/// Audit trail of the request: what the node asked for and what was skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionLog {
    pub requested: Vec<BookReference>,
    pub skips: Vec<Skip>,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub found: bool,
    pub request: RequestEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss: Option<NotFound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeInfo>,
    pub content: String,
    pub student_learning_outcomes: Vec<String>,
    pub skills: Vec<String>,
    pub learning_strategies: Vec<String>,
    pub books: BTreeMap<BookType, Vec<ResolvedPage>>,
    pub resources: Vec<ResolvedResource>,
    pub log: ResolutionLog,
}

impl Context {
    /// Return the context only if the node was found; otherwise the
    /// corresponding fatal error.
    pub fn require_found(self) -> Result<Self> {
        match self.miss {
            Some(miss) => Err(miss.into_error()),
            None => Ok(self),
        }
    }

    /// Found, but some requested book or page did not resolve.
    pub fn is_partial(&self) -> bool {
        self.found
            && self
                .log
                .skips
                .iter()
                .any(|s| s.kind != SkipKind::FilteredOut)
    }

    pub fn coverage(&self) -> Coverage {
        self.log.coverage
    }

    /// Page texts of one book, in requested order.
    pub fn page_texts(&self, book_type: BookType) -> Vec<&str> {
        self.books
            .get(&book_type)
            .map(|pages| pages.iter().map(|p| p.content.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Merge the three resolution outputs into a [`Context`].
pub fn assemble(
    location: Location,
    books: ResolvedBooks,
    resources: Vec<ResolvedResource>,
) -> Context {
    match location {
        Location::NotFound(miss) => Context {
            found: false,
            request: RequestEcho {
                subject: miss.subject,
                grade: miss.grade,
                lesson: miss.lesson,
                lesson_type: miss.requested_type.clone(),
            },
            miss: Some(miss),
            node: None,
            content: String::new(),
            student_learning_outcomes: Vec::new(),
            skills: Vec::new(),
            learning_strategies: Vec::new(),
            books: BTreeMap::new(),
            resources: Vec::new(),
            log: ResolutionLog::default(),
        },
        Location::Found(node) => {
            let coverage = Coverage {
                books_requested: books.books_requested.len(),
                books_resolved: books.books_found.len(),
                pages_requested: books.pages_requested,
                pages_resolved: books.pages_resolved(),
                resources_total: resources.len(),
                resources_resolved: resources.iter().filter(|r| r.is_resolved()).count(),
            };
            let entry = node.entry;
            Context {
                found: true,
                request: RequestEcho {
                    subject: node.subject,
                    grade: node.grade,
                    lesson: node.lesson,
                    lesson_type: node.requested_type,
                },
                miss: None,
                node: Some(NodeInfo {
                    unit_number: node.unit_number,
                    unit_title: node.unit_title,
                    title: node.node_title,
                    matched_type: entry.type_tag,
                    type_match: node.type_match,
                }),
                content: entry.content,
                student_learning_outcomes: entry.student_learning_outcomes,
                skills: entry.skills,
                learning_strategies: entry.learning_strategies,
                books: books.pages,
                resources,
                log: ResolutionLog {
                    requested: entry.book_references,
                    skips: books.skips,
                    coverage,
                },
            }
        }
    }
}

/// Shorthand for the fatal error of a miss, for callers that only hold the
/// [`NotFound`].
pub fn miss_error(miss: &NotFound) -> LessonCtxError {
    miss.clone().into_error()
}
