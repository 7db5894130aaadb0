//! Plain-text extraction for uploaded files.
//!
//! The file type is chosen by extension (case-insensitive):
//!
//! | Extension | Extraction |
//! |-----------|------------|
//! | `txt` | bytes decoded as UTF-8, invalid sequences replaced |
//! | `pdf` | text layer via `pdf-extract` |
//! | `csv` | one `header: value` line per column, rows joined by a space |
//! | anything else | treated as text |
//!
//! The whole extracted document becomes a single chunk; nothing here splits
//! text.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("CSV extraction failed: {0}")]
    Csv(String),
}

/// File kinds with dedicated extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Csv,
}

impl FileKind {
    /// Determine the kind from a file name's extension.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => FileKind::Pdf,
            Some("csv") => FileKind::Csv,
            _ => FileKind::Text,
        }
    }
}

/// Extract plain text from an uploaded file's bytes.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    match FileKind::from_name(file_name) {
        FileKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Csv => extract_csv(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let lines: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}: {}", h, record.get(i).unwrap_or("").trim()))
            .collect();
        rows.push(lines.join("\n"));
    }
    Ok(rows.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(FileKind::from_name("cv.PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("projects.csv"), FileKind::Csv);
        assert_eq!(FileKind::from_name("notes.txt"), FileKind::Text);
        assert_eq!(FileKind::from_name("README"), FileKind::Text);
        assert_eq!(FileKind::from_name("page.md"), FileKind::Text);
    }

    #[test]
    fn test_text_is_lossy() {
        let text = extract_text("a.txt", b"hello \xff world").unwrap();
        assert!(text.starts_with("hello "));
        assert!(text.ends_with(" world"));
    }

    #[test]
    fn test_csv_rows_rendered_as_key_values() {
        let csv = b"name, stack\nAlpha, Rust\nBeta,Python\n";
        let text = extract_text("projects.csv", csv).unwrap();
        assert_eq!(text, "name: Alpha\nstack: Rust name: Beta\nstack: Python");
    }

    #[test]
    fn test_csv_short_rows_padded() {
        let csv = b"name,stack\nAlpha\n";
        let text = extract_text("p.csv", csv).unwrap();
        assert_eq!(text, "name: Alpha\nstack: ");
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let err = extract_text("cv.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
