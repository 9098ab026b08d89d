//! Read-through cache over the curriculum and textbook stores.
//!
//! Both record kinds are immutable between ingestions, so a looked-up value
//! (including absence) stays valid until the key is re-ingested. Ingestion
//! paths call the `invalidate_*` methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::trace;

use lessonctx_shared::{
    CurriculumKey, CurriculumStore, CurriculumTree, Grade, Result, Subject, Textbook, TextbookKey,
    TextbookStore,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Each map carries a generation that invalidation bumps under the map's
/// write lock. A miss only fills the map if the generation it saw before
/// awaiting the inner store is still current, so a lookup that straddles a
/// re-ingestion never writes the stale value back.
pub struct CachedStore<S> {
    inner: S,
    curricula: RwLock<HashMap<CurriculumKey, Option<Arc<CurriculumTree>>>>,
    textbooks: RwLock<HashMap<TextbookKey, Option<Arc<Textbook>>>>,
    curricula_gen: AtomicU64,
    textbooks_gen: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            curricula: RwLock::new(HashMap::new()),
            textbooks: RwLock::new(HashMap::new()),
            curricula_gen: AtomicU64::new(0),
            textbooks_gen: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub async fn invalidate_curriculum(&self, key: &CurriculumKey) {
        let mut map = self.curricula.write().await;
        self.curricula_gen.fetch_add(1, Ordering::AcqRel);
        map.remove(key);
    }

    /// Drop every cached textbook of a `(subject, grade)` pair.
    pub async fn invalidate_textbooks(&self, subject: Subject, grade: Grade) {
        let mut map = self.textbooks.write().await;
        self.textbooks_gen.fetch_add(1, Ordering::AcqRel);
        map.retain(|k, _| !(k.subject == subject && k.grade == grade));
    }

    pub async fn clear(&self) {
        {
            let mut map = self.curricula.write().await;
            self.curricula_gen.fetch_add(1, Ordering::AcqRel);
            map.clear();
        }
        let mut map = self.textbooks.write().await;
        self.textbooks_gen.fetch_add(1, Ordering::AcqRel);
        map.clear();
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl<S: CurriculumStore> CurriculumStore for CachedStore<S> {
    async fn curriculum(&self, key: &CurriculumKey) -> Result<Option<Arc<CurriculumTree>>> {
        let seen = {
            let map = self.curricula.read().await;
            if let Some(cached) = map.get(key) {
                self.hit();
                trace!(%key, "curriculum cache hit");
                return Ok(cached.clone());
            }
            self.curricula_gen.load(Ordering::Acquire)
        };
        self.miss();
        let value = self.inner.curriculum(key).await?;
        let mut map = self.curricula.write().await;
        if self.curricula_gen.load(Ordering::Acquire) == seen {
            map.insert(*key, value.clone());
        } else {
            trace!(%key, "curriculum invalidated during lookup, not caching");
        }
        Ok(value)
    }
}

impl<S: TextbookStore> TextbookStore for CachedStore<S> {
    async fn textbook(&self, key: &TextbookKey) -> Result<Option<Arc<Textbook>>> {
        let seen = {
            let map = self.textbooks.read().await;
            if let Some(cached) = map.get(key) {
                self.hit();
                trace!(%key, "textbook cache hit");
                return Ok(cached.clone());
            }
            self.textbooks_gen.load(Ordering::Acquire)
        };
        self.miss();
        let value = self.inner.textbook(key).await?;
        let mut map = self.textbooks.write().await;
        if self.textbooks_gen.load(Ordering::Acquire) == seen {
            map.insert(*key, value.clone());
        } else {
            trace!(%key, "textbooks invalidated during lookup, not caching");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lessonctx_shared::BookType;
    use lessonctx_storage::MemoryStore;

    /// Reads the inner store immediately but answers late, so the answer can
    /// be overtaken by a re-ingestion.
    struct SlowStore(MemoryStore);

    impl CurriculumStore for SlowStore {
        async fn curriculum(&self, key: &CurriculumKey) -> Result<Option<Arc<CurriculumTree>>> {
            let value = self.0.curriculum(key).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            value
        }
    }

    impl TextbookStore for SlowStore {
        async fn textbook(&self, key: &TextbookKey) -> Result<Option<Arc<Textbook>>> {
            let value = self.0.textbook(key).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            value
        }
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let key = TextbookKey::new(Subject::English, Grade::new(2), BookType::Learners);
        let store = CachedStore::new(MemoryStore::new().with_textbook(key, Textbook::default()));

        for _ in 0..3 {
            assert!(store.textbook(&key).await.unwrap().is_some());
        }
        assert_eq!(store.inner().lookup_count(), 1);
        assert_eq!(store.stats(), CacheStats { hits: 2, misses: 1 });
    }

    #[tokio::test]
    async fn absence_is_cached_until_invalidated() {
        let key = CurriculumKey::new(Subject::English, Grade::new(2));
        let store = CachedStore::new(MemoryStore::new());

        assert!(store.curriculum(&key).await.unwrap().is_none());
        store
            .inner()
            .insert_curriculum(key, CurriculumTree::Flat(Vec::new()));
        assert!(store.curriculum(&key).await.unwrap().is_none());

        store.invalidate_curriculum(&key).await;
        assert!(store.curriculum(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn textbook_invalidation_is_scoped_to_grade() {
        let g2 = TextbookKey::new(Subject::English, Grade::new(2), BookType::Learners);
        let g3 = TextbookKey::new(Subject::English, Grade::new(3), BookType::Learners);
        let store = CachedStore::new(
            MemoryStore::new()
                .with_textbook(g2, Textbook::default())
                .with_textbook(g3, Textbook::default()),
        );
        store.textbook(&g2).await.unwrap();
        store.textbook(&g3).await.unwrap();

        store.invalidate_textbooks(Subject::English, Grade::new(2)).await;
        store.textbook(&g2).await.unwrap();
        store.textbook(&g3).await.unwrap();
        assert_eq!(store.inner().lookup_count(), 3);

        store.clear().await;
        store.textbook(&g3).await.unwrap();
        assert_eq!(store.inner().lookup_count(), 4);
    }

    #[tokio::test]
    async fn lookup_in_flight_during_reingest_does_not_cache_stale_absence() {
        let key = CurriculumKey::new(Subject::English, Grade::new(2));
        let store = CachedStore::new(SlowStore(MemoryStore::new()));

        let reingest = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store
                .inner()
                .0
                .insert_curriculum(key, CurriculumTree::Flat(Vec::new()));
            store.invalidate_curriculum(&key).await;
        };
        let (in_flight, ()) = tokio::join!(store.curriculum(&key), reingest);
        assert!(in_flight.unwrap().is_none());

        assert!(store.curriculum(&key).await.unwrap().is_some());
        assert_eq!(store.stats(), CacheStats { hits: 0, misses: 2 });
    }

    #[tokio::test]
    async fn textbook_lookup_in_flight_during_reingest_does_not_cache_stale_absence() {
        let key = TextbookKey::new(Subject::English, Grade::new(2), BookType::Activity);
        let store = CachedStore::new(SlowStore(MemoryStore::new()));

        let reingest = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.inner().0.insert_textbook(key, Textbook::default());
            store.invalidate_textbooks(Subject::English, Grade::new(2)).await;
        };
        let (in_flight, ()) = tokio::join!(store.textbook(&key), reingest);
        assert!(in_flight.unwrap().is_none());

        assert!(store.textbook(&key).await.unwrap().is_some());
        assert!(store.textbook(&key).await.unwrap().is_some());
        assert_eq!(store.stats(), CacheStats { hits: 1, misses: 2 });
    }
}
