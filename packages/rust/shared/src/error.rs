//! Error types for lessonctx.
//!
//! Library crates use [`LessonCtxError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only request-fatal outcomes live here. Recoverable resolution gaps
//! (missing books, missing pages, filtered-out references) are recorded in the
//! resolution log instead and never surface as an error.

use std::path::PathBuf;

/// Top-level error type for all lessonctx operations.
#[derive(Debug, thiserror::Error)]
pub enum LessonCtxError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Persisted document could not be parsed into the data model.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (unknown subject, duplicate lesson, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Grade string with no recoverable integer.
    #[error("cannot normalize grade {input:?}: no grade number in range")]
    Normalization { input: String },

    /// Caller supplied an empty or unrecognized book-type filter.
    #[error("invalid book type filter: {message}")]
    InvalidBookTypeFilter { message: String },

    /// No curriculum tree exists for the subject/grade pair.
    #[error("no curriculum for {subject} {grade}")]
    NotFoundCurriculum { subject: String, grade: String },

    /// The curriculum exists but has no lesson with the requested identifier.
    #[error("lesson {lesson} not present in {subject} {grade} curriculum")]
    LessonNotPresent {
        subject: String,
        grade: String,
        lesson: u32,
    },

    /// The lesson exists but carries no entry for the requested type.
    #[error("type {lesson_type:?} not present for lesson {lesson}")]
    TypeNotPresent { lesson: u32, lesson_type: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LessonCtxError>;

impl LessonCtxError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an invalid-filter error from any displayable message.
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidBookTypeFilter {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by the caller's input rather than by
    /// missing data or infrastructure.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Normalization { .. } | Self::InvalidBookTypeFilter { .. } | Self::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LessonCtxError::config("missing db path");
        assert_eq!(err.to_string(), "config error: missing db path");

        let err = LessonCtxError::NotFoundCurriculum {
            subject: "English".into(),
            grade: "Grade 7".into(),
        };
        assert_eq!(err.to_string(), "no curriculum for English Grade 7");

        let err = LessonCtxError::TypeNotPresent {
            lesson: 3,
            lesson_type: "grammar".into(),
        };
        assert!(err.to_string().contains("\"grammar\""));
    }

    #[test]
    fn request_errors_are_classified() {
        assert!(LessonCtxError::invalid_filter("empty").is_request_error());
        assert!(
            LessonCtxError::Normalization {
                input: "abc".into()
            }
            .is_request_error()
        );
        assert!(!LessonCtxError::Storage("down".into()).is_request_error());
    }
}
