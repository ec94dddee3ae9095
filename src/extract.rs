//! Multi-format text extraction for source documents (PDF, DOCX, TXT).
//!
//! Extraction is training-layer: callers supply a file path; this module
//! returns plain UTF-8 text. PDF pages that fail to decode are skipped
//! individually so one corrupt page never sinks the whole document.

use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported source formats, dispatched by file extension (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Docx,
    Txt,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            "txt" => Some(SourceFormat::Txt),
            _ => None,
        }
    }
}

/// Extracts plain text from a source file, trimmed of surrounding whitespace.
///
/// An empty string is a valid result (scanned images, blank files), not an
/// error. Fails only when the file cannot be read or parsed at all.
pub fn extract_file(path: &Path, source_name: &str) -> Result<String> {
    let Some(format) = SourceFormat::from_path(path) else {
        return Err(PipelineError::extraction(
            source_name,
            format!("unsupported file extension: {}", path.display()),
        ));
    };
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::extraction(source_name, format!("read failed: {}", e)))?;
    extract_bytes(&bytes, format, source_name)
}

/// Extracts plain text from in-memory file content.
pub fn extract_bytes(bytes: &[u8], format: SourceFormat, source_name: &str) -> Result<String> {
    let text = match format {
        SourceFormat::Pdf => extract_pdf(bytes, source_name)?,
        SourceFormat::Docx => extract_docx(bytes, source_name)?,
        SourceFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
    };
    Ok(text.trim().to_string())
}

/// Page-by-page PDF extraction. Pages whose text cannot be decoded, or that
/// decode to nothing, are logged and skipped; remaining pages still count.
/// Falls back to whole-document extraction when the page-level parse fails.
fn extract_pdf(bytes: &[u8], source_name: &str) -> Result<String> {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(
                "page-level parse of {} failed ({}), trying whole-document extraction",
                source_name, e
            );
            return pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
                PipelineError::extraction(source_name, format!("PDF extraction failed: {}", e))
            });
        }
    };

    let mut out = String::new();
    for (&page_no, _) in doc.get_pages().iter() {
        match doc.extract_text(&[page_no]) {
            Ok(text) if !text.trim().is_empty() => {
                out.push_str(text.trim());
                out.push('\n');
            }
            Ok(_) => {
                warn!(
                    "page {} of {} has no extractable text, skipping",
                    page_no, source_name
                );
            }
            Err(e) => {
                warn!("skipping page {} of {}: {}", page_no, source_name, e);
            }
        }
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8], source_name: &str) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::extraction(source_name, format!("DOCX open failed: {}", e)))?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| PipelineError::extraction(source_name, e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| PipelineError::extraction(source_name, e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(PipelineError::extraction(
                    source_name,
                    "word/document.xml exceeds size limit",
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(PipelineError::extraction(
            source_name,
            "word/document.xml not found",
        ));
    }
    extract_docx_text(&doc_xml, source_name)
}

/// Walks `word/document.xml`, concatenating `w:t` text nodes and inserting
/// a newline at each paragraph end.
fn extract_docx_text(xml: &[u8], source_name: &str) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::extraction(source_name, e.to_string()));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
