//! In-memory curriculum/textbook store.
//!
//! Used as a fake in tests and for embedding callers that load documents
//! themselves. Every lookup is counted so tests can assert that a request was
//! rejected before touching the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use lessonctx_shared::{
    CurriculumKey, CurriculumStore, CurriculumTree, LessonCtxError, Result, Textbook, TextbookKey,
    TextbookStore,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    curricula: RwLock<HashMap<CurriculumKey, Arc<CurriculumTree>>>,
    textbooks: RwLock<HashMap<TextbookKey, Arc<Textbook>>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a curriculum.
    pub fn with_curriculum(self, key: CurriculumKey, tree: CurriculumTree) -> Self {
        self.insert_curriculum(key, tree);
        self
    }

    /// Builder-style insert of a textbook.
    pub fn with_textbook(self, key: TextbookKey, book: Textbook) -> Self {
        self.insert_textbook(key, book);
        self
    }

    pub fn insert_curriculum(&self, key: CurriculumKey, tree: CurriculumTree) {
        let mut map = self
            .curricula
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(key, Arc::new(tree));
    }

    pub fn insert_textbook(&self, key: TextbookKey, book: Textbook) {
        let mut map = self
            .textbooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(key, Arc::new(book));
    }

    pub fn remove_textbook(&self, key: &TextbookKey) -> bool {
        let mut map = self
            .textbooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.remove(key).is_some()
    }

    /// Total curriculum + textbook lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl CurriculumStore for MemoryStore {
    async fn curriculum(&self, key: &CurriculumKey) -> Result<Option<Arc<CurriculumTree>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let map = self
            .curricula
            .read()
            .map_err(|_| LessonCtxError::Storage("curriculum map lock poisoned".into()))?;
        Ok(map.get(key).cloned())
    }
}

impl TextbookStore for MemoryStore {
    async fn textbook(&self, key: &TextbookKey) -> Result<Option<Arc<Textbook>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let map = self
            .textbooks
            .read()
            .map_err(|_| LessonCtxError::Storage("textbook map lock poisoned".into()))?;
        Ok(map.get(key).cloned())
    }
}
