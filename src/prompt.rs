//! Prompt assembly for answer synthesis.

use serde_json::Value;

use crate::models::Document;

const INSTRUCTIONS: &str = "You answer questions using only the numbered context passages below. \
If the passages do not contain the answer, say that you cannot find it in the provided documents. \
Cite passages by their number, e.g. [2].";

/// One numbered block per document, headed by its provenance.
pub fn build_context(context: &[Document]) -> String {
    let mut out = String::new();
    for (i, doc) in context.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n{}\n\n---\n\n", i + 1, provenance(doc), doc.text.trim()));
    }
    out
}

/// `source, filename` plus any other metadata, as `key=value` pairs.
fn provenance(doc: &Document) -> String {
    let mut parts: Vec<String> = Vec::new();
    for key in ["source", "filename"] {
        if let Some(v) = doc.metadata.get(key) {
            parts.push(render(v));
        }
    }
    for (k, v) in &doc.metadata {
        if k != "source" && k != "filename" && !v.is_null() {
            parts.push(format!("{}={}", k, render(v)));
        }
    }
    if parts.is_empty() {
        "unknown source".to_string()
    } else {
        parts.join(", ")
    }
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn build_prompt(query: &str, context: &[Document]) -> String {
    format!(
        "{instructions}\n\nCONTEXT:\n{context}QUESTION: {query}\n\nANSWER:",
        instructions = INSTRUCTIONS,
        context = build_context(context),
        query = query.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_numbered_with_provenance() {
        let docs = vec![
            Document::new("alpha beta")
                .with_meta("source", "txt")
                .with_meta("filename", "a.txt"),
            Document::new("gamma").with_meta("source", "https://example.com/faq"),
        ];
        let prompt = build_prompt("what is alpha?", &docs);
        assert!(prompt.contains("[1] txt, a.txt\nalpha beta"));
        assert!(prompt.contains("[2] https://example.com/faq\ngamma"));
        assert!(prompt.ends_with("QUESTION: what is alpha?\n\nANSWER:"));
    }

    #[test]
    fn extra_metadata_is_listed_after_origin() {
        let doc = Document::new("row")
            .with_meta("source", "csv")
            .with_meta("id", 7);
        assert_eq!(provenance(&doc), "csv, id=7");
        assert_eq!(provenance(&Document::new("bare")), "unknown source");
    }
}
