//! Plain-text extraction from binary document formats.
//!
//! Readers and the upload intake hand in raw bytes plus a [`DocumentFormat`];
//! this module returns UTF-8 text. Extraction never panics on malformed input.
//!
//! The Office Open XML formats are ZIP archives. Every entry is read with a
//! decompressed-size cap, and spreadsheets are additionally capped in sheets
//! and cells.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

const DOCX_BODY: &str = "word/document.xml";
const PPTX_SLIDE_PREFIX: &str = "ppt/slides/slide";
const XLSX_SHEET_PREFIX: &str = "xl/worksheets/sheet";
const XLSX_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no extractor for '{0}'")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Binary formats with a text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl DocumentFormat {
    /// Matches on the lowercased extension, with or without a leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "xlsx" => Some(DocumentFormat::Xlsx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Xlsx => extract_xlsx(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

/// Reads one entry, capped at [`MAX_XML_ENTRY_BYTES`]. `None` when absent.
fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>, ExtractError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::Ooxml(format!("{}: {}", name, e))),
    };

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "{} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(Some(xml))
}

/// Entries named `<prefix>N.xml`, ordered by N (so slide10 follows slide9).
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse::<u32>().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, DOCX_BODY)?
        .ok_or_else(|| ExtractError::Ooxml(format!("{} not found", DOCX_BODY)))?;
    collect_runs(&xml)
}

/// Slides in presentation order, one line per text paragraph.
fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_entries(&archive, PPTX_SLIDE_PREFIX);
    if slides.is_empty() {
        return Err(ExtractError::Ooxml("presentation has no slides".to_string()));
    }

    let mut parts = Vec::new();
    for name in slides {
        if let Some(xml) = read_entry(&mut archive, &name)? {
            let text = collect_runs(&xml)?;
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    Ok(parts.join("\n"))
}

/// Cells tab-separated, one line per row, a blank line between sheets.
fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = match read_entry(&mut archive, XLSX_SHARED_STRINGS)? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheets = numbered_entries(&archive, XLSX_SHEET_PREFIX);
    if sheets.is_empty() {
        return Err(ExtractError::Ooxml("workbook has no worksheets".to_string()));
    }
    if sheets.len() > XLSX_MAX_SHEETS {
        tracing::warn!(
            sheets = sheets.len(),
            limit = XLSX_MAX_SHEETS,
            "workbook truncated to sheet limit"
        );
    }

    let mut parts = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        if let Some(xml) = read_entry(&mut archive, &name)? {
            let text = sheet_rows(&xml, &shared)?;
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    Ok(parts.join("\n\n"))
}

/// Concatenates `<w:t>` / `<a:t>` runs, one line per `<w:p>` / `<a:p>` paragraph.
fn collect_runs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

/// The shared-string table. Rich-text items (several `<r><t>` runs inside
/// one `<si>`) are concatenated into a single string.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                if let Some(s) = current.as_mut() {
                    s.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    /// `t="s"`: the value is an index into the shared-string table.
    Shared,
    /// `t="inlineStr"`: the text sits in `<is><t>`.
    Inline,
    /// Numbers, booleans, formula results: the `<v>` text as written.
    Literal,
}

fn cell_kind(start: &BytesStart<'_>) -> CellKind {
    let kind = start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"t")
        .map(|a| a.value.into_owned());
    match kind.as_deref() {
        Some(b"s") => CellKind::Shared,
        Some(b"inlineStr") => CellKind::Inline,
        _ => CellKind::Literal,
    }
}

fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut kind = CellKind::Literal;
    let mut in_value = false;
    let mut cells = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    kind = cell_kind(&e);
                    cell.clear();
                }
                b"v" => in_value = kind != CellKind::Inline,
                b"t" => in_value = kind == CellKind::Inline,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                cell.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let value = match kind {
                        CellKind::Shared => cell
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default(),
                        CellKind::Inline | CellKind::Literal => cell.trim().to_string(),
                    };
                    if !value.is_empty() {
                        row.push(value);
                        cells += 1;
                    }
                    if cells >= XLSX_MAX_CELLS_PER_SHEET {
                        tracing::warn!(limit = XLSX_MAX_CELLS_PER_SHEET, "sheet truncated to cell limit");
                        break;
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join("\t"));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        lines.push(row.join("\t"));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    fn slide(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!(
            "<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"><p:cSld><p:spTree><p:sp><p:txBody>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
            body
        )
    }

    fn sheet(rows: &str) -> String {
        format!(
            "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
            rows
        )
    }

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file(DOCX_BODY, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension(".PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension(".PPTX"), Some(DocumentFormat::Pptx));
        assert_eq!(DocumentFormat::from_extension("xlsx"), Some(DocumentFormat::Xlsx));
        assert_eq!(DocumentFormat::from_extension(".txt"), None);
        assert_eq!(
            DocumentFormat::from_path(Path::new("/a/Report.Docx")),
            Some(DocumentFormat::Docx)
        );
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = docx_with_paragraphs(&["first line", "second &amp; last"]);
        let text = extract_text(&bytes, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "first line\nsecond & last");
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_without_body_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("docProps/core.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text(&buf, DocumentFormat::Docx).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn pptx_slides_follow_numeric_order() {
        let bytes = zip_of(&[
            ("ppt/slides/slide10.xml", slide(&["closing"]).as_str()),
            ("ppt/slides/slide2.xml", slide(&["agenda", "q&amp;a"]).as_str()),
            ("ppt/slides/slide1.xml", slide(&["quarterly plan"]).as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);
        let text = extract_text(&bytes, DocumentFormat::Pptx).unwrap();
        assert_eq!(text, "quarterly plan\nagenda\nq&a\nclosing");
    }

    #[test]
    fn pptx_without_slides_is_rejected() {
        let bytes = zip_of(&[("ppt/presentation.xml", "<p:presentation/>")]);
        let err = extract_text(&bytes, DocumentFormat::Pptx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
        assert!(err.to_string().contains("no slides"));
    }

    #[test]
    fn xlsx_resolves_shared_inline_and_literal_cells() {
        let shared = "<sst><si><t>region</t></si><si><r><t>North</t></r><r><t> East</t></r></si><si/><si><t>total</t></si></sst>";
        let sheet1 = sheet(
            "<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>3</v></c></row>\
             <row r=\"2\"><c r=\"A2\" t=\"s\"><v>1</v></c><c r=\"B2\"><v>42.5</v></c></row>\
             <row r=\"3\"><c r=\"A3\" t=\"inlineStr\"><is><t>note</t></is></c><c r=\"B3\" t=\"s\"><v>99</v></c></row>",
        );
        let sheet2 = sheet("<row><c t=\"s\"><v>2</v></c><c><v>7</v></c></row>");
        let bytes = zip_of(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet2.xml", sheet2.as_str()),
            ("xl/worksheets/sheet1.xml", sheet1.as_str()),
        ]);

        let text = extract_text(&bytes, DocumentFormat::Xlsx).unwrap();
        assert_eq!(text, "region\ttotal\nNorth East\t42.5\nnote\n\n7");
    }

    #[test]
    fn xlsx_without_shared_strings_keeps_literals() {
        let bytes = zip_of(&[(
            "xl/worksheets/sheet1.xml",
            sheet("<row><c><v>1</v></c><c t=\"b\"><v>0</v></c></row>").as_str(),
        )]);
        let text = extract_text(&bytes, DocumentFormat::Xlsx).unwrap();
        assert_eq!(text, "1\t0");
    }

    #[test]
    fn xlsx_stops_at_the_sheet_limit() {
        let names: Vec<String> = (1..=XLSX_MAX_SHEETS + 1)
            .map(|n| format!("xl/worksheets/sheet{}.xml", n))
            .collect();
        let bodies: Vec<String> = (1..=XLSX_MAX_SHEETS + 1)
            .map(|n| sheet(&format!("<row><c><v>{}</v></c></row>", n)))
            .collect();
        let entries: Vec<(&str, &str)> = names
            .iter()
            .zip(&bodies)
            .map(|(n, b)| (n.as_str(), b.as_str()))
            .collect();

        let text = extract_text(&zip_of(&entries), DocumentFormat::Xlsx).unwrap();
        let values: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(values.len(), XLSX_MAX_SHEETS);
        assert_eq!(values.last(), Some(&"100"));
    }

    #[test]
    fn xlsx_without_worksheets_is_rejected() {
        let bytes = zip_of(&[("xl/workbook.xml", "<workbook/>")]);
        let err = extract_text(&bytes, DocumentFormat::Xlsx).unwrap_err();
        assert!(err.to_string().contains("no worksheets"));
    }
}
