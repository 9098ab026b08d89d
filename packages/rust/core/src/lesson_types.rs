//! Lesson-type vocabulary: the alias table and the per-subject catalog.
//!
//! Requesters ask for coarse lesson types ("listening") while curriculum
//! documents store finer tags ("listening_audio_video"). The mapping is an
//! explicit table; tags are never matched by substring.

use lessonctx_shared::{BookType, Subject};
use serde::Serialize;

/// Bumped whenever [`LESSON_TYPE_ALIASES`] changes.
pub const LESSON_TYPE_ALIASES_VERSION: u32 = 1;

/// Requested type → stored tags it may resolve to.
pub const LESSON_TYPE_ALIASES: &[(&str, &[&str])] = &[
    ("recall", &["recall_review"]),
    ("vocabulary", &["vocabulary_word_meaning"]),
    ("listening", &["listening_audio_video"]),
    ("comprehension", &["reading_comprehension"]),
];

/// Canonical spelling of a type tag: trimmed, lowercase, `_`-separated.
pub fn normalize_type_tag(tag: &str) -> String {
    tag.trim()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Stored tags approved as aliases of `requested` (excluding itself).
pub fn aliases_of(requested: &str) -> &'static [&'static str] {
    let requested = normalize_type_tag(requested);
    LESSON_TYPE_ALIASES
        .iter()
        .find(|(name, _)| *name == requested)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// How a stored tag satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeMatch {
    Exact,
    Alias,
}

/// Match a stored tag against a requested type.
pub fn match_type(requested: &str, stored: &str) -> Option<TypeMatch> {
    let stored = normalize_type_tag(stored);
    if normalize_type_tag(requested) == stored {
        Some(TypeMatch::Exact)
    } else if aliases_of(requested).contains(&stored.as_str()) {
        Some(TypeMatch::Alias)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A requestable lesson type, for listing in user interfaces.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LessonTypeInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Books this type usually draws on. Only consulted when a caller opts
    /// into per-type defaults and supplies no filter of its own.
    pub default_books: &'static [BookType],
}

const ENGLISH_TYPES: &[LessonTypeInfo] = &[
    LessonTypeInfo {
        name: "recall",
        description: "Recall and review previous learning",
        default_books: &[BookType::Learners],
    },
    LessonTypeInfo {
        name: "vocabulary",
        description: "Vocabulary building and word study",
        default_books: &[BookType::Learners, BookType::Activity],
    },
    LessonTypeInfo {
        name: "listening",
        description: "Listening comprehension activities",
        default_books: &[BookType::Learners],
    },
    LessonTypeInfo {
        name: "reading",
        description: "Reading fluency and expression",
        default_books: &[BookType::Reading],
    },
    LessonTypeInfo {
        name: "reading_comprehension",
        description: "Reading comprehension and analysis",
        default_books: &[BookType::Learners, BookType::Activity],
    },
    LessonTypeInfo {
        name: "grammar",
        description: "Grammar rules and practice",
        default_books: &[BookType::Learners, BookType::Activity],
    },
    LessonTypeInfo {
        name: "oral_speaking",
        description: "Oral communication and speaking practice",
        default_books: &[BookType::Learners],
    },
    LessonTypeInfo {
        name: "creative_writing",
        description: "Creative writing and composition",
        default_books: &[BookType::Learners, BookType::Activity],
    },
];

const MATHEMATICS_TYPES: &[LessonTypeInfo] = &[
    LessonTypeInfo {
        name: "concept",
        description: "Mathematical concept introduction",
        default_books: &[BookType::CourseBook],
    },
    LessonTypeInfo {
        name: "practice",
        description: "Mathematical practice and problem solving",
        default_books: &[BookType::CourseBook, BookType::Workbook],
    },
];

/// Requestable lesson types for a subject, in display order.
pub fn lesson_types_for(subject: Subject) -> &'static [LessonTypeInfo] {
    match subject {
        Subject::English => ENGLISH_TYPES,
        Subject::Mathematics => MATHEMATICS_TYPES,
    }
}

/// Per-type default books for a requested or stored type tag.
///
/// Tags reach their catalog entry through the alias table in either
/// direction, so `"comprehension"` gets the defaults of
/// `"reading_comprehension"` and `"listening_audio_video"` those of
/// `"listening"`. Unknown types have no defaults.
pub fn default_books_for(subject: Subject, lesson_type: &str) -> &'static [BookType] {
    let tag = normalize_type_tag(lesson_type);
    let targets = aliases_of(&tag);
    lesson_types_for(subject)
        .iter()
        .find(|info| {
            info.name == tag
                || targets.contains(&info.name)
                || aliases_of(info.name).contains(&tag.as_str())
        })
        .map(|info| info.default_books)
        .unwrap_or(&[])
}
