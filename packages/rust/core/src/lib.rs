//! Curriculum context resolution for lessonctx.
//!
//! Given `(subject, grade, lesson, lesson type)` this crate locates the
//! matching curriculum entry, resolves its textbook page references,
//! classifies its audio/video resources, and assembles a single [`Context`].
//! Stores are passed in explicitly; see [`ContextResolver`].

pub mod assembler;
pub mod cache;
pub mod classifier;
pub mod lesson_types;
pub mod locator;
pub mod media;
pub mod pipeline;
pub mod resolver;

pub use assembler::{Context, Coverage, NodeInfo, RequestEcho, ResolutionLog, assemble};
pub use cache::{CacheStats, CachedStore};
pub use classifier::{Resolution, ResolvedResource, ResourceKind, classify};
pub use lesson_types::{
    LESSON_TYPE_ALIASES, LESSON_TYPE_ALIASES_VERSION, default_books_for, lesson_types_for,
};
pub use locator::{LocatedNode, Location, NotFound, NotFoundReason, locate};
pub use media::{ConfiguredMedia, LocalMediaSource, MediaHandle, MediaSource, RedirectMediaSource};
pub use pipeline::{ContextRequest, ContextResolver, resolve_context};
pub use resolver::{BookTypeFilter, PageMatch, ResolvedBooks, ResolvedPage, Skip, SkipKind, resolve};
