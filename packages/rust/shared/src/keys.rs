//! Key normalization across the two backing stores.
//!
//! The curriculum store keys grades as `"Grade N"` and book types by their
//! short code (`LB`), while the textbook store keys grades as `"N"` and book
//! types by a long tag (`learners`). Store lookups only accept
//! [`CurriculumKey`] / [`TextbookKey`], which can only be built from
//! normalized values.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LessonCtxError, Result};

// ---------------------------------------------------------------------------
// Grade
// ---------------------------------------------------------------------------

/// Matches an optional case-insensitive `grade` prefix followed by the number.
static GRADE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:grade)?\s*[:#_\-]?\s*(\d+)\s*$").expect("grade regex")
});

/// Fallback for free-form labels such as `"2nd grade"` or `"Grade 2 English"`.
static FIRST_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number regex"));

/// Which store's representation a grade should be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeForm {
    /// `"Grade {n}"`, used by the curriculum store.
    Curriculum,
    /// `"{n}"`, used by the textbook store.
    Textbook,
}

/// A grade level recovered from either store representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grade(u32);

impl Grade {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    /// Parse `"Grade 2"`, `"grade2"`, `" 2 "`, `"Grade: 02"` and similar.
    ///
    /// Anything else falls back to the first run of digits, so `"2nd grade"`
    /// and `"Class 2"` both give grade 2. Fails when there is no digit run or
    /// the number does not fit a `u32`.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits = GRADE_RE
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .or_else(|| FIRST_NUMBER_RE.find(raw))
            .ok_or_else(|| LessonCtxError::Normalization { input: raw.into() })?;
        let n = digits
            .as_str()
            .parse::<u32>()
            .map_err(|_| LessonCtxError::Normalization { input: raw.into() })?;
        Ok(Self(n))
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Render the grade in the given store's form.
    pub fn render(self, form: GradeForm) -> String {
        match form {
            GradeForm::Curriculum => format!("Grade {}", self.0),
            GradeForm::Textbook => self.0.to_string(),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade {}", self.0)
    }
}

impl FromStr for Grade {
    type Err = LessonCtxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Canonicalize a raw grade string for the target store.
pub fn normalize_grade(raw: &str, target: GradeForm) -> Result<String> {
    Ok(Grade::parse(raw)?.render(target))
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// Shape a subject's curriculum document is expected to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeShape {
    /// Units containing numbered lessons.
    Hierarchical,
    /// Numbered units with no lesson level.
    Flat,
}

impl fmt::Display for TreeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hierarchical => "hierarchical",
            Self::Flat => "flat",
        })
    }
}

/// Subjects with ingested curricula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    English,
    Mathematics,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::English, Subject::Mathematics];

    /// Canonical name as stored in both backing stores.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Mathematics => "Mathematics",
        }
    }

    /// Initials used in audio track file names (`GE2_Track_05`).
    pub fn track_initials(self) -> &'static str {
        match self {
            Self::English => "GE",
            Self::Mathematics => "GM",
        }
    }

    pub fn expected_shape(self) -> TreeShape {
        match self {
            Self::English => TreeShape::Hierarchical,
            Self::Mathematics => TreeShape::Flat,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = LessonCtxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "eng" => Ok(Self::English),
            "mathematics" | "maths" | "math" => Ok(Self::Mathematics),
            other => Err(LessonCtxError::validation(format!(
                "unknown subject {other:?} (expected English or Mathematics)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// BookType
// ---------------------------------------------------------------------------

/// Textbook category referenced by curriculum nodes.
///
/// Serializes as the short code used by the curriculum store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BookType {
    Learners,
    Activity,
    Reading,
    TeachersResource,
    CourseBook,
    Workbook,
}

impl BookType {
    pub const ALL: [BookType; 6] = [
        BookType::Learners,
        BookType::Activity,
        BookType::Reading,
        BookType::TeachersResource,
        BookType::CourseBook,
        BookType::Workbook,
    ];

    /// Short code used by curriculum documents.
    pub fn code(self) -> &'static str {
        match self {
            Self::Learners => "LB",
            Self::Activity => "AB",
            Self::Reading => "ORT",
            Self::TeachersResource => "TR",
            Self::CourseBook => "CB",
            Self::Workbook => "WB",
        }
    }

    /// Long tag used by the textbook store.
    pub fn store_tag(self) -> &'static str {
        match self {
            Self::Learners => "learners",
            Self::Activity => "activity",
            Self::Reading => "reading",
            Self::TeachersResource => "teachers_resource",
            Self::CourseBook => "course_book",
            Self::Workbook => "workbook",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Learners => "Learner's Book",
            Self::Activity => "Activity Book",
            Self::Reading => "Oxford Reading Tree",
            Self::TeachersResource => "Teacher's Resource",
            Self::CourseBook => "Course Book",
            Self::Workbook => "Workbook",
        }
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BookType {
    type Err = LessonCtxError;

    /// Accepts either the short code or the store tag, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|bt| {
                bt.code().eq_ignore_ascii_case(needle) || bt.store_tag().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| LessonCtxError::validation(format!("unknown book type {needle:?}")))
    }
}

impl TryFrom<String> for BookType {
    type Error = LessonCtxError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BookType> for String {
    fn from(value: BookType) -> Self {
        value.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// Store keys
// ---------------------------------------------------------------------------

/// Lookup key for the curriculum store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurriculumKey {
    pub subject: Subject,
    pub grade: Grade,
}

impl CurriculumKey {
    pub fn new(subject: Subject, grade: Grade) -> Self {
        Self { subject, grade }
    }

    /// Grade in curriculum-store form (`"Grade 2"`).
    pub fn grade_key(&self) -> String {
        self.grade.render(GradeForm::Curriculum)
    }
}

impl fmt::Display for CurriculumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.grade_key())
    }
}

/// Lookup key for the textbook store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextbookKey {
    pub subject: Subject,
    pub grade: Grade,
    pub book_type: BookType,
}

impl TextbookKey {
    pub fn new(subject: Subject, grade: Grade, book_type: BookType) -> Self {
        Self {
            subject,
            grade,
            book_type,
        }
    }

    /// Grade in textbook-store form (`"2"`).
    pub fn grade_key(&self) -> String {
        self.grade.render(GradeForm::Textbook)
    }

    /// Book type in textbook-store form (`"learners"`).
    pub fn book_tag(&self) -> &'static str {
        self.book_type.store_tag()
    }
}

impl fmt::Display for TextbookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subject,
            self.grade_key(),
            self.book_tag()
        )
    }
}
