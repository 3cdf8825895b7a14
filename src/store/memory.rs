use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{check_batch, check_profile, check_query, select_top, Collection, VectorStore};
use crate::embedding::cosine_similarity;
use crate::error::StoreError;
use crate::models::{Document, EmbeddingProfile, ScoredDocument};

struct Entry {
    id: String,
    document: Document,
    vector: Vec<f32>,
}

struct Stored {
    profile: EmbeddingProfile,
    entries: Vec<Entry>,
}

/// In-process store. Contents are lost when the value is dropped.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Stored>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn open_or_create(
        &self,
        name: &str,
        profile: &EmbeddingProfile,
    ) -> Result<Collection, StoreError> {
        let mut guard = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = guard.entry(name.to_string()).or_insert_with(|| Stored {
            profile: profile.clone(),
            entries: Vec::new(),
        });
        check_profile(
            Collection {
                name: name.to_string(),
                profile: stored.profile.clone(),
            },
            profile,
        )
    }

    async fn open_collection(&self, name: &str) -> Result<Option<Collection>, StoreError> {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(name).map(|s| Collection {
            name: name.to_string(),
            profile: s.profile.clone(),
        }))
    }

    async fn put(
        &self,
        collection: &Collection,
        documents: &[Document],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError> {
        check_batch(collection, documents, vectors)?;
        let mut guard = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = guard
            .get_mut(&collection.name)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.name.clone()))?;

        let mut ids = Vec::with_capacity(documents.len());
        for (document, vector) in documents.iter().zip(vectors) {
            let id = Uuid::new_v4().to_string();
            stored.entries.push(Entry {
                id: id.clone(),
                document: document.clone(),
                vector: vector.clone(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn nearest(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        check_query(collection, query)?;
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let stored = guard
            .get(&collection.name)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.name.clone()))?;

        let candidates = stored
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                (
                    pos as i64,
                    ScoredDocument {
                        id: e.id.clone(),
                        score: cosine_similarity(query, &e.vector),
                        document: e.document.clone(),
                    },
                )
            })
            .collect();
        Ok(select_top(candidates, k))
    }

    async fn count(&self, collection: &Collection) -> Result<usize, StoreError> {
        let guard = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(&collection.name)
            .map(|s| s.entries.len())
            .unwrap_or(0))
    }

    async fn clear(&self, name: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nearest_returns_k_best() {
        let store = MemoryVectorStore::new();
        let c = store
            .open_or_create("c", &EmbeddingProfile::new("m", 2))
            .await
            .unwrap();
        store
            .put(
                &c,
                &[Document::new("x"), Document::new("y"), Document::new("xy")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .await
            .unwrap();

        let hits = store.nearest(&c, &[1.0, 0.1], 2).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.document.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "xy"]);
        assert!(store.nearest(&c, &[1.0, 0.0], 0).await.unwrap().is_empty());
        assert_eq!(store.count(&c).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn wrong_query_dims_is_rejected() {
        let store = MemoryVectorStore::new();
        let c = store
            .open_or_create("c", &EmbeddingProfile::new("m", 3))
            .await
            .unwrap();
        assert!(matches!(
            store.nearest(&c, &[1.0], 1).await,
            Err(StoreError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }
}
