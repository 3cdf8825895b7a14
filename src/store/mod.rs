//! Persistent vector store: named collections of (id, text, metadata, vector).
//!
//! A collection records the [`EmbeddingProfile`] it was created with. Every
//! vector written to it must have `profile.dims` components, and similarity
//! search returns entries by descending cosine similarity, ties broken by
//! insertion order.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Document, EmbeddingProfile, ScoredDocument};

/// Handle to an existing collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub name: String,
    pub profile: EmbeddingProfile,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns the named collection, creating it with `profile` if absent.
    /// Fails with [`StoreError::ProfileMismatch`] if it exists with another profile.
    async fn open_or_create(
        &self,
        name: &str,
        profile: &EmbeddingProfile,
    ) -> Result<Collection, StoreError>;

    async fn open_collection(&self, name: &str) -> Result<Option<Collection>, StoreError>;

    /// Appends one entry per document, atomically. Returns the new entry ids.
    async fn put(
        &self,
        collection: &Collection,
        documents: &[Document],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError>;

    /// Up to `k` entries most similar to `query`.
    async fn nearest(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError>;

    async fn count(&self, collection: &Collection) -> Result<usize, StoreError>;

    /// Drops the collection and all of its entries. No-op when absent.
    async fn clear(&self, name: &str) -> Result<(), StoreError>;
}

/// Checks a batch before it is written.
pub(crate) fn check_batch(
    collection: &Collection,
    documents: &[Document],
    vectors: &[Vec<f32>],
) -> Result<(), StoreError> {
    if documents.len() != vectors.len() {
        return Err(StoreError::VectorCount {
            expected: documents.len(),
            actual: vectors.len(),
        });
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != collection.profile.dims) {
        return Err(StoreError::DimensionMismatch {
            expected: collection.profile.dims,
            actual: v.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_query(collection: &Collection, query: &[f32]) -> Result<(), StoreError> {
    if query.len() != collection.profile.dims {
        return Err(StoreError::DimensionMismatch {
            expected: collection.profile.dims,
            actual: query.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_profile(
    existing: Collection,
    requested: &EmbeddingProfile,
) -> Result<Collection, StoreError> {
    if &existing.profile != requested {
        return Err(StoreError::ProfileMismatch {
            collection: existing.name,
            stored: existing.profile,
            active: requested.clone(),
        });
    }
    Ok(existing)
}

/// Keeps the `k` best `(position, scored)` candidates: highest score first,
/// then lowest position.
pub(crate) fn select_top(
    mut candidates: Vec<(i64, ScoredDocument)>,
    k: usize,
) -> Vec<ScoredDocument> {
    candidates.sort_by(|(pa, a), (pb, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(pa.cmp(pb))
    });
    candidates.truncate(k);
    candidates.into_iter().map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            id: id.to_string(),
            score,
            document: Document::new(id),
        }
    }

    #[test]
    fn select_top_orders_by_score_then_position() {
        let picked = select_top(
            vec![
                (0, scored("a", 0.5)),
                (1, scored("b", 0.9)),
                (2, scored("c", 0.5)),
                (3, scored("d", 0.1)),
            ],
            3,
        );
        let ids: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn batch_checks_count_and_dims() {
        let c = Collection {
            name: "t".to_string(),
            profile: EmbeddingProfile::new("m", 2),
        };
        let docs = vec![Document::new("x")];
        assert!(matches!(
            check_batch(&c, &docs, &[]),
            Err(StoreError::VectorCount { expected: 1, actual: 0 })
        ));
        assert!(matches!(
            check_batch(&c, &docs, &[vec![1.0, 2.0, 3.0]]),
            Err(StoreError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(check_batch(&c, &docs, &[vec![1.0, 2.0]]).is_ok());
    }
}
