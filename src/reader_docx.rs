//! `docx` sources: the document body as one document.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ReadError;
use crate::extract::DocumentFormat;
use crate::models::Document;
use crate::reader::{extract_file, file_name, DocumentReader};
use crate::sources::SourceKind;

pub struct OfficeDocumentReader {
    path: PathBuf,
}

impl OfficeDocumentReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DocumentReader for OfficeDocumentReader {
    fn kind(&self) -> SourceKind {
        SourceKind::OfficeDocument
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        let text = extract_file(&self.path, DocumentFormat::Docx).await?;
        Ok(vec![Document::new(text)
            .with_meta("source", SourceKind::OfficeDocument.as_str())
            .with_meta("filename", file_name(&self.path))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn minimal_docx(text: &str) -> Vec<u8> {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[tokio::test]
    async fn docx_becomes_one_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minutes.docx");
        std::fs::write(&path, minimal_docx("board approved the budget")).unwrap();

        let docs = OfficeDocumentReader::new(path).load().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "board approved the budget");
        assert_eq!(docs[0].metadata["source"], json!("docx"));
        assert_eq!(docs[0].metadata["filename"], json!("minutes.docx"));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = OfficeDocumentReader::new("/nonexistent/a.docx".into())
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
    }
}
