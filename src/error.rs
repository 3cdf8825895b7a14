//! Error taxonomy for the ingestion-to-retrieval pipeline.
//!
//! Each pipeline stage owns one error type so callers can tell a bad
//! configuration apart from a failed read, a failed index build, or a
//! failed query:
//!
//! | Type | Raised by | Effect |
//! |------|-----------|--------|
//! | [`ConfigError`] | config loading, reader resolution | fatal, before any I/O |
//! | [`ReadError`] | [`DocumentReader::load`](crate::reader::DocumentReader::load) | aborts the ingestion run |
//! | [`IngestError`] | [`ingest`](crate::ingest::ingest) | wraps the two above |
//! | [`StoreError`] | vector store, [`IndexBuilder`](crate::index::IndexBuilder) | aborts the build |
//! | [`QueryError`] | [`QueryEngine`](crate::query::QueryEngine) | returned to the caller |
//! | [`IntakeError`] | [`admit`](crate::upload::admit) | only for unusable folders |

use std::path::PathBuf;

use thiserror::Error;

use crate::embedding::EmbedError;
use crate::extract::ExtractError;
use crate::models::EmbeddingProfile;
use crate::sources::SourceKind;

/// Configuration defects. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(
        "unsupported data source type: '{0}'. Must be one of: json, csv, pdf, docx, txt, database, webscraper"
    )]
    UnsupportedKind(String),

    #[error("source #{index} ({kind}) is missing required field '{field}'")]
    MissingField {
        index: usize,
        kind: SourceKind,
        field: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure while turning one source into documents.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("column '{column}' not found in {origin}")]
    MissingColumn { column: String, origin: String },

    #[error("fetching {url} failed with HTTP {status}")]
    FetchFailed { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("invalid connection parameters: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("text extraction failed for {path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Failure of an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("source #{index} ({kind}) failed: {source}")]
    Read {
        index: usize,
        kind: SourceKind,
        #[source]
        source: ReadError,
    },
}

/// Embedding or persistence failure while building or reading the index.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("store is opened read-only")]
    ReadOnly,

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error(
        "collection '{collection}' was built with {stored} but the active embedder is {active}"
    )]
    ProfileMismatch {
        collection: String,
        stored: EmbeddingProfile,
        active: EmbeddingProfile,
    },

    #[error("expected {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedder returned {actual} vectors for {expected} texts")]
    VectorCount { expected: usize, actual: usize },

    #[error("document #{position} has empty text")]
    EmptyText { position: usize },

    #[error("embedder {0} cannot build an index; configure an embedding provider")]
    UnusableProfile(EmbeddingProfile),
}

/// Failure while answering a query. Never a panic; the HTTP boundary
/// renders every variant as an `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("collection '{0}' has no entries; run an ingestion first")]
    EmptyIndex(String),

    #[error("collection '{0}' does not exist; run an ingestion first")]
    CollectionNotFound(String),

    #[error(
        "collection '{collection}' was built with {stored} but the query embedder is {active}"
    )]
    ProfileMismatch {
        collection: String,
        stored: EmbeddingProfile,
        active: EmbeddingProfile,
    },

    #[error("{capability} capability failed: {message}")]
    Upstream {
        capability: &'static str,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The upload intake could not run at all. Per-artifact failures are
/// reported through [`IntakeReport`](crate::upload::IntakeReport) instead.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("cannot list upload folder {path}: {source}")]
    UploadFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot prepare data folder {path}: {source}")]
    DataFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
