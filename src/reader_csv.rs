//! `csv` sources: one document per data row.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ReadError;
use crate::models::Document;
use crate::reader::{file_name, io_error, ColumnMapping, DocumentReader};
use crate::sources::SourceKind;

pub struct TabularFileReader {
    path: PathBuf,
    columns: ColumnMapping,
    delimiter: u8,
}

impl TabularFileReader {
    pub fn new(path: PathBuf, columns: ColumnMapping) -> Self {
        Self {
            path,
            columns,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn parse(&self, data: &[u8]) -> Result<Vec<Document>, ReadError> {
        let origin = self.origin();
        let parse_error = |e: csv::Error| ReadError::Parse {
            origin: origin.clone(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(false)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(parse_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let resolved = self.columns.resolve(&headers, &origin)?;
        let filename = file_name(&self.path);

        let mut docs = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_error)?;
            let cells: Vec<&str> = record.iter().collect();
            let doc = resolved
                .document_from_cells(&cells)
                .with_meta("source", SourceKind::TabularFile.as_str())
                .with_meta("filename", filename.as_str());
            docs.push(doc);
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentReader for TabularFileReader {
    fn kind(&self) -> SourceKind {
        SourceKind::TabularFile
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(io_error(&self.path))?;
        self.parse(&data)
    }
}
