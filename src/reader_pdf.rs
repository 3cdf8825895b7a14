//! `pdf` sources: the text of every page, concatenated into one document.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ReadError;
use crate::extract::DocumentFormat;
use crate::models::Document;
use crate::reader::{extract_file, file_name, DocumentReader};
use crate::sources::SourceKind;

pub struct PageDocumentReader {
    path: PathBuf,
}

impl PageDocumentReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DocumentReader for PageDocumentReader {
    fn kind(&self) -> SourceKind {
        SourceKind::PageDocument
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        let text = extract_file(&self.path, DocumentFormat::Pdf).await?;
        Ok(vec![Document::new(text)
            .with_meta("source", SourceKind::PageDocument.as_str())
            .with_meta("filename", file_name(&self.path))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    /// Single-page PDF with a correct xref table, drawing `phrase` in Helvetica.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >> stream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }

    #[tokio::test]
    async fn pdf_becomes_one_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handbook.pdf");
        std::fs::write(&path, minimal_pdf("quarterly leave policy")).unwrap();

        let docs = PageDocumentReader::new(path).load().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("quarterly leave policy"));
        assert_eq!(docs[0].metadata["source"], json!("pdf"));
        assert_eq!(docs[0].metadata["filename"], json!("handbook.pdf"));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_extract_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = PageDocumentReader::new(path).load().await.unwrap_err();
        assert!(matches!(err, ReadError::Extract { .. }));
    }
}
