//! Document readers: one per [`SourceKind`], resolved from a descriptor.
//!
//! # Resolution
//!
//! [`reader_for`] maps a [`SourceDescriptor`] to a boxed [`DocumentReader`],
//! checking that the kind is known and that every field the kind needs is
//! present. Resolution does no I/O, so an ingestion run can reject a bad
//! configuration before touching any source.
//!
//! | `type` | Reader | Required fields |
//! |--------|--------|-----------------|
//! | `json` | [`RecordFileReader`] | `path` |
//! | `csv` | [`TabularFileReader`] | `path`, `text_column` |
//! | `pdf` | [`PageDocumentReader`] | `path` |
//! | `docx` | [`OfficeDocumentReader`] | `path` |
//! | `txt` | [`PlainTextReader`] | `path` |
//! | `database` | [`RelationalQueryReader`] | `connection_params`, `query`, `text_column` |
//! | `webscraper` | [`WebPageReader`] | `url`, `text_selector` |

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConfigError, ReadError};
use crate::extract::{extract_text, DocumentFormat};
use crate::models::{infer_scalar, Document};
use crate::sources::{SourceDescriptor, SourceKind};

pub use crate::reader_csv::TabularFileReader;
pub use crate::reader_db::RelationalQueryReader;
pub use crate::reader_docx::OfficeDocumentReader;
pub use crate::reader_json::RecordFileReader;
pub use crate::reader_pdf::PageDocumentReader;
pub use crate::reader_text::PlainTextReader;
pub use crate::reader_web::WebPageReader;

/// Produces the documents of one source.
///
/// `load` either returns every document of the source or fails; partial
/// results are never returned.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Path, URL, or redacted connection target, for logs and errors.
    fn origin(&self) -> String;

    async fn load(&self) -> Result<Vec<Document>, ReadError>;
}

/// Resolves the reader for the descriptor at position `index`.
pub fn reader_for(
    index: usize,
    source: &SourceDescriptor,
) -> Result<Box<dyn DocumentReader>, ConfigError> {
    let kind = SourceKind::parse(&source.kind)?;
    let missing = |field: &'static str| ConfigError::MissingField { index, kind, field };

    let reader: Box<dyn DocumentReader> = match kind {
        SourceKind::RecordFile => Box::new(RecordFileReader::new(
            source.path.clone().ok_or_else(|| missing("path"))?,
        )),
        SourceKind::TabularFile => {
            let path = source.path.clone().ok_or_else(|| missing("path"))?;
            let text_column = source
                .text_column
                .clone()
                .ok_or_else(|| missing("text_column"))?;
            let mut reader = TabularFileReader::new(
                path,
                ColumnMapping::new(text_column, source.metadata_columns.clone()),
            );
            if let Some(delimiter) = source.delimiter {
                if !delimiter.is_ascii() {
                    return Err(ConfigError::Invalid(format!(
                        "source #{}: delimiter must be a single ASCII character",
                        index
                    )));
                }
                reader = reader.with_delimiter(delimiter as u8);
            }
            Box::new(reader)
        }
        SourceKind::PageDocument => Box::new(PageDocumentReader::new(
            source.path.clone().ok_or_else(|| missing("path"))?,
        )),
        SourceKind::OfficeDocument => Box::new(OfficeDocumentReader::new(
            source.path.clone().ok_or_else(|| missing("path"))?,
        )),
        SourceKind::PlainText => Box::new(PlainTextReader::new(
            source.path.clone().ok_or_else(|| missing("path"))?,
        )),
        SourceKind::RelationalQuery => {
            let params = source
                .connection_params
                .clone()
                .ok_or_else(|| missing("connection_params"))?;
            let query = source.query.clone().ok_or_else(|| missing("query"))?;
            let text_column = source
                .text_column
                .clone()
                .ok_or_else(|| missing("text_column"))?;
            Box::new(RelationalQueryReader::new(
                params,
                query,
                ColumnMapping::new(text_column, source.metadata_columns.clone()),
            ))
        }
        SourceKind::WebPage => Box::new(WebPageReader::new(
            source.url.clone().ok_or_else(|| missing("url"))?,
            source
                .text_selector
                .clone()
                .ok_or_else(|| missing("text_selector"))?,
        )),
    };

    Ok(reader)
}

/// Which columns of a row become the text and which become metadata.
///
/// Shared by the tabular-file and relational-query readers. Without
/// `metadata_columns` no row values are carried as metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub text_column: String,
    pub metadata_columns: Option<Vec<String>>,
}

/// Column positions resolved against a concrete header row.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedColumns {
    pub text: usize,
    pub metadata: Vec<(String, usize)>,
}

impl ColumnMapping {
    pub fn new(text_column: impl Into<String>, metadata_columns: Option<Vec<String>>) -> Self {
        Self {
            text_column: text_column.into(),
            metadata_columns,
        }
    }

    pub(crate) fn resolve(
        &self,
        headers: &[String],
        origin: &str,
    ) -> Result<ResolvedColumns, ReadError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ReadError::MissingColumn {
                    column: name.to_string(),
                    origin: origin.to_string(),
                })
        };

        let text = position(&self.text_column)?;
        let metadata = self
            .metadata_columns
            .iter()
            .flatten()
            .map(|n| position(n).map(|i| (n.clone(), i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedColumns { text, metadata })
    }
}

impl ResolvedColumns {
    /// Builds a document from textual cells; metadata values are type-inferred.
    pub(crate) fn document_from_cells(&self, cells: &[&str]) -> Document {
        let mut doc = Document::new(cells.get(self.text).copied().unwrap_or_default());
        for (name, i) in &self.metadata {
            doc.metadata.insert(
                name.clone(),
                cells.get(*i).map(|c| infer_scalar(c)).unwrap_or_default(),
            );
        }
        doc
    }

    /// Builds a document from already-typed values, as decoded from a result row.
    pub(crate) fn document_from_values(&self, values: &[Value]) -> Document {
        let text = match values.get(self.text) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let mut doc = Document::new(text);
        for (name, i) in &self.metadata {
            doc = doc.with_meta(name.clone(), values.get(*i).cloned().unwrap_or_default());
        }
        doc
    }
}

/// Final path component, or the whole path when it has none.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReadError {
    let path: PathBuf = path.to_path_buf();
    move |source| ReadError::Io { path, source }
}

/// Reads a binary document and extracts its text off the async runtime.
pub(crate) async fn extract_file(path: &Path, format: DocumentFormat) -> Result<String, ReadError> {
    let bytes = tokio::fs::read(path).await.map_err(io_error(path))?;
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text(&bytes, format))
        .await
        .map_err(|e| ReadError::Task(e.to_string()))?
        .map_err(|source| ReadError::Extract {
            path: owned,
            source,
        })
}
