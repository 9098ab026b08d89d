//! Shared types, error model, key normalization, and configuration for lessonctx.
//!
//! This crate is the foundation depended on by all other lessonctx crates.
//! It provides:
//! - [`LessonCtxError`], the unified error type
//! - Key normalization ([`Grade`], [`Subject`], [`BookType`], store keys)
//! - The curriculum/textbook data model ([`CurriculumTree`], [`Textbook`])
//! - Store interfaces ([`CurriculumStore`], [`TextbookStore`])
//! - Configuration ([`AppConfig`], [`MediaConfig`], config loading)

pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, MediaConfig, MediaMode, MediaSettings, ResolutionConfig, StorageConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{LessonCtxError, Result};
pub use keys::{
    BookType, CurriculumKey, Grade, GradeForm, Subject, TextbookKey, TreeShape, normalize_grade,
};
pub use store::{CurriculumStore, TextbookStore};
pub use types::{
    BookReference, CurriculumTree, ExternalResource, FlatUnit, HierarchicalUnit, Lesson,
    LessonPlanTypeEntry, PageContent, Textbook,
};
