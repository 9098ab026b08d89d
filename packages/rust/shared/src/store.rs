//! Read interfaces of the two backing stores.
//!
//! The resolution engine receives store clients as explicit parameters so it
//! can run against the libSQL store, the in-memory fake, or a caching wrapper.
//! Absence is `Ok(None)`; `Err` is reserved for infrastructure failures.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::keys::{CurriculumKey, TextbookKey};
use crate::types::{CurriculumTree, Textbook};

/// Keyed lookup `(subject, grade) -> CurriculumTree`.
pub trait CurriculumStore: Send + Sync {
    fn curriculum(
        &self,
        key: &CurriculumKey,
    ) -> impl Future<Output = Result<Option<Arc<CurriculumTree>>>> + Send;
}

/// Keyed lookup `(subject, grade, book_type) -> Textbook`.
pub trait TextbookStore: Send + Sync {
    fn textbook(
        &self,
        key: &TextbookKey,
    ) -> impl Future<Output = Result<Option<Arc<Textbook>>>> + Send;
}

impl<S: CurriculumStore> CurriculumStore for &S {
    fn curriculum(
        &self,
        key: &CurriculumKey,
    ) -> impl Future<Output = Result<Option<Arc<CurriculumTree>>>> + Send {
        (**self).curriculum(key)
    }
}

impl<S: TextbookStore> TextbookStore for &S {
    fn textbook(
        &self,
        key: &TextbookKey,
    ) -> impl Future<Output = Result<Option<Arc<Textbook>>>> + Send {
        (**self).textbook(key)
    }
}

impl<S: CurriculumStore> CurriculumStore for Arc<S> {
    fn curriculum(
        &self,
        key: &CurriculumKey,
    ) -> impl Future<Output = Result<Option<Arc<CurriculumTree>>>> + Send {
        (**self).curriculum(key)
    }
}

impl<S: TextbookStore> TextbookStore for Arc<S> {
    fn textbook(
        &self,
        key: &TextbookKey,
    ) -> impl Future<Output = Result<Option<Arc<Textbook>>>> + Send {
        (**self).textbook(key)
    }
}
