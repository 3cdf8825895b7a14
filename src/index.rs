//! Index builder: embeds documents and persists them into a collection.
//!
//! Building is additive. Documents are appended to whatever the collection
//! already holds; nothing is deduplicated. Batches are written one at a
//! time, so a failure mid-build leaves the earlier batches in place.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::StoreError;
use crate::models::Document;
use crate::store::{Collection, VectorStore};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Result of a build.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    pub collection: Collection,
    /// Entries written by this build.
    pub written: usize,
    /// Entries in the collection after this build.
    pub total: usize,
}

pub struct IndexBuilder {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embeds and stores `documents` in the named collection, creating it
    /// with the embedder's profile when absent. Nothing is created for an
    /// embedder without dimensions.
    pub async fn build(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> Result<IndexHandle, StoreError> {
        if let Some(position) = documents.iter().position(Document::is_blank) {
            return Err(StoreError::EmptyText { position });
        }

        let profile = self.embedder.profile();
        if !profile.is_usable() {
            return Err(StoreError::UnusableProfile(profile.clone()));
        }
        let collection = self.store.open_or_create(collection, profile).await?;

        let mut written = 0;
        for batch in documents.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            self.store.put(&collection, batch, &vectors).await?;
            written += batch.len();
            tracing::debug!(
                collection = %collection.name,
                written,
                total = documents.len(),
                "embedded batch"
            );
        }

        let total = self.store.count(&collection).await?;
        tracing::info!(collection = %collection.name, written, total, "index build complete");

        Ok(IndexHandle {
            collection,
            written,
            total,
        })
    }
}
