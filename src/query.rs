//! Retrieval query engine: embed, retrieve top-K, synthesize.

use std::sync::Arc;

use crate::completion::{create_completer, Completer};
use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::error::{QueryError, StoreError};
use crate::models::{Answer, Document};
use crate::store::{Collection, SqliteVectorStore, VectorStore};

pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    collection: Collection,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    top_k: usize,
}

impl QueryEngine {
    /// Binds to an existing collection. The embedder must match the profile
    /// the collection was built with.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        top_k: usize,
    ) -> Result<Self, QueryError> {
        let collection = store
            .open_collection(collection)
            .await?
            .ok_or_else(|| QueryError::CollectionNotFound(collection.to_string()))?;

        if &collection.profile != embedder.profile() {
            return Err(QueryError::ProfileMismatch {
                collection: collection.name,
                stored: collection.profile,
                active: embedder.profile().clone(),
            });
        }

        Ok(Self {
            store,
            collection,
            embedder,
            completer,
            top_k: top_k.max(1),
        })
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn query(&self, text: &str) -> Result<Answer, QueryError> {
        self.query_with_top_k(text, self.top_k).await
    }

    pub async fn query_with_top_k(&self, text: &str, top_k: usize) -> Result<Answer, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if self.store.count(&self.collection).await? == 0 {
            return Err(QueryError::EmptyIndex(self.collection.name.clone()));
        }

        let vector = embed_query(self.embedder.as_ref(), text)
            .await
            .map_err(|e| QueryError::Upstream {
                capability: "embedding",
                message: e.to_string(),
            })?;

        let sources = self
            .store
            .nearest(&self.collection, &vector, top_k.max(1))
            .await?;
        tracing::debug!(
            collection = %self.collection.name,
            retrieved = sources.len(),
            "retrieved context"
        );

        let context: Vec<Document> = sources.iter().map(|s| s.document.clone()).collect();
        let answer = self
            .completer
            .complete(text, &context)
            .await
            .map_err(|e| QueryError::Upstream {
                capability: "completion",
                message: e.to_string(),
            })?;

        Ok(Answer {
            text: answer,
            sources,
        })
    }
}

/// Opens the configured collection read-only, wiring providers from `config`.
///
/// With `create_if_missing`, an absent collection is first created through a
/// writable connection, unless embeddings are disabled.
pub async fn open_engine(config: &Config, create_if_missing: bool) -> anyhow::Result<QueryEngine> {
    let embedder = create_embedder(&config.embedding)?;
    let completer = create_completer(&config.completion)?;

    if create_if_missing && config.embedding.is_enabled() {
        let writer = SqliteVectorStore::open(&config.db.path).await?;
        writer
            .open_or_create(&config.index.collection, embedder.profile())
            .await?;
        writer.close().await;
    }

    let store: Arc<dyn VectorStore> = Arc::new(
        SqliteVectorStore::open_read_only(&config.db.path)
            .await
            .map_err(|e| match e {
                StoreError::Database(_) => anyhow::anyhow!(
                    "cannot open {} ({}); run `docq ingest` first",
                    config.db.path.display(),
                    e
                ),
                other => other.into(),
            })?,
    );

    Ok(QueryEngine::open(
        store,
        &config.index.collection,
        embedder,
        completer,
        config.retrieval.top_k,
    )
    .await?)
}

/// `docq query`: prints the answer and the documents it drew on.
pub async fn run_query(config: &Config, text: &str, top_k: Option<usize>) -> anyhow::Result<()> {
    let engine = open_engine(config, false).await?;
    let answer = engine
        .query_with_top_k(text, top_k.unwrap_or(engine.top_k()))
        .await?;

    println!("{}", answer.text);
    println!();
    println!("sources ({}):", answer.sources.len());
    for (i, s) in answer.sources.iter().enumerate() {
        let origin = s
            .document
            .metadata
            .get("filename")
            .or_else(|| s.document.metadata.get("source"))
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| "-".to_string());
        println!("  {}. [{:.3}] {}", i + 1, s.score, origin);
    }
    Ok(())
}
