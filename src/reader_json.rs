//! `json` sources: a top-level array of `{ "content": ..., "metadata": {...} }` records.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ReadError;
use crate::models::Document;
use crate::reader::{file_name, io_error, DocumentReader};
use crate::sources::SourceKind;

pub struct RecordFileReader {
    path: PathBuf,
}

impl RecordFileReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn parse_error(&self, message: impl Into<String>) -> ReadError {
        ReadError::Parse {
            origin: self.origin(),
            message: message.into(),
        }
    }

    fn record_to_document(&self, position: usize, record: Value) -> Result<Document, ReadError> {
        let Value::Object(mut fields) = record else {
            return Err(self.parse_error(format!("record {} is not an object", position)));
        };

        let text = match fields.remove("content") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(
                    self.parse_error(format!("record {}: 'content' must be a string", position))
                )
            }
            None => {
                return Err(self.parse_error(format!("record {} has no 'content'", position)))
            }
        };

        let mut doc = Document::new(text);
        match fields.remove("metadata") {
            Some(Value::Object(meta)) => {
                for (key, value) in meta {
                    doc = doc.with_meta(key, value);
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => doc = doc.with_meta("item", other),
        }

        // Provenance keys win over record metadata of the same name.
        Ok(doc
            .with_meta("source", SourceKind::RecordFile.as_str())
            .with_meta("filename", file_name(&self.path)))
    }
}

#[async_trait]
impl DocumentReader for RecordFileReader {
    fn kind(&self) -> SourceKind {
        SourceKind::RecordFile
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(io_error(&self.path))?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|e| self.parse_error(e.to_string()))?;

        let Value::Array(records) = parsed else {
            return Err(self.parse_error("expected a top-level array of records"));
        };

        records
            .into_iter()
            .enumerate()
            .map(|(i, record)| self.record_to_document(i, record))
            .collect()
    }
}
