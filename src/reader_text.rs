//! `txt` sources: the whole file as one document.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ReadError;
use crate::models::Document;
use crate::reader::{file_name, io_error, DocumentReader};
use crate::sources::SourceKind;

pub struct PlainTextReader {
    path: PathBuf,
}

impl PlainTextReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DocumentReader for PlainTextReader {
    fn kind(&self) -> SourceKind {
        SourceKind::PlainText
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(io_error(&self.path))?;
        Ok(vec![Document::new(text)
            .with_meta("source", SourceKind::PlainText.as_str())
            .with_meta("filename", file_name(&self.path))])
    }
}
