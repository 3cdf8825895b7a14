//! Ingestion orchestration: descriptors → readers → documents → index.
//!
//! Every descriptor is resolved to a reader before any source is read, so an
//! unknown `type` or a missing field aborts the run without I/O. Readers then
//! run in configuration order and the first failing source aborts the run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::IngestError;
use crate::index::IndexBuilder;
use crate::models::Document;
use crate::reader::{reader_for, DocumentReader};
use crate::sources::{load_sources_file, SourceDescriptor};
use crate::store::{SqliteVectorStore, VectorStore};

/// Reads every source, concatenating documents in configuration order.
pub async fn ingest(sources: &[SourceDescriptor]) -> Result<Vec<Document>, IngestError> {
    let readers = resolve_readers(sources)?;
    run_readers(&readers).await
}

/// Resolves all readers up front. No source is touched.
pub fn resolve_readers(
    sources: &[SourceDescriptor],
) -> Result<Vec<Box<dyn DocumentReader>>, IngestError> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| reader_for(i, s).map_err(IngestError::from))
        .collect()
}

pub async fn run_readers(
    readers: &[Box<dyn DocumentReader>],
) -> Result<Vec<Document>, IngestError> {
    let mut documents = Vec::new();
    for (index, reader) in readers.iter().enumerate() {
        let docs = reader.load().await.map_err(|source| IngestError::Read {
            index,
            kind: reader.kind(),
            source,
        })?;
        tracing::debug!(
            index,
            kind = %reader.kind(),
            origin = %reader.origin(),
            documents = docs.len(),
            "source loaded"
        );
        documents.extend(docs);
    }
    Ok(documents)
}

#[derive(Debug, Default, Clone)]
pub struct IngestOptions {
    /// Read sources from this JSON file instead of the configured ones.
    pub sources_file: Option<PathBuf>,
    pub collection: Option<String>,
    /// Drop the collection before building.
    pub reset: bool,
    /// Read and count documents without embedding or writing.
    pub dry_run: bool,
}

/// `docq ingest`: reads all sources and appends them to the collection.
pub async fn run_ingest(config: &Config, opts: &IngestOptions) -> anyhow::Result<()> {
    let sources = match opts.sources_file {
        Some(ref file) => load_sources_file(file)?,
        None => config.all_sources()?,
    };
    if sources.is_empty() {
        anyhow::bail!("no sources configured; add [[sources]] or set sources_file");
    }
    let collection = opts
        .collection
        .clone()
        .unwrap_or_else(|| config.index.collection.clone());

    let readers = resolve_readers(&sources)?;
    let documents = run_readers(&readers).await?;

    if opts.dry_run {
        println!("ingest {} (dry-run)", collection);
        println!("  sources: {}", sources.len());
        println!("  documents: {}", documents.len());
        println!(
            "  blank documents: {}",
            documents.iter().filter(|d| d.is_blank()).count()
        );
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(
        SqliteVectorStore::open(&config.db.path)
            .await
            .with_context(|| format!("opening {}", config.db.path.display()))?,
    );
    if opts.reset {
        store.clear(&collection).await?;
        tracing::info!(collection = %collection, "collection reset");
    }

    let handle = IndexBuilder::new(store.clone(), embedder)
        .with_batch_size(config.embedding.batch_size)
        .build(documents, &collection)
        .await?;

    println!("ingest {}", collection);
    println!("  sources: {}", sources.len());
    println!("  documents written: {}", handle.written);
    println!("  collection entries: {}", handle.total);
    println!("  embedding: {}", handle.collection.profile);
    println!("ok");

    store.close().await;
    Ok(())
}
