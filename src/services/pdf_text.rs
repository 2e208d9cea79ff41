// PDF text extraction
// Thin wrapper over pdf-extract producing the raw text handed to the
// normalizer, plus a page count and any extraction warnings.

use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("pdf text extraction failed for {path}: {source}")]
    Extract {
        path: String,
        #[source]
        source: pdf_extract::OutputError,
    },
}

#[derive(Debug)]
pub struct PdfText {
    pub text: String,
    /// Derived from the form-feed page separators in the extracted text.
    pub page_count: usize,
    pub warnings: Vec<String>,
}

pub fn extract_pdf_text(path: &Path) -> Result<PdfText, PdfError> {
    if !path.is_file() {
        return Err(PdfError::NotFound(path.display().to_string()));
    }

    let text = pdf_extract::extract_text(path).map_err(|source| PdfError::Extract {
        path: path.display().to_string(),
        source,
    })?;

    let mut warnings = Vec::new();
    if text.trim().is_empty() {
        warn!(path = %path.display(), "pdf yielded no text, likely scanned images");
        warnings.push("pdf yielded no extractable text".to_string());
    }

    let page_count = if text.is_empty() {
        0
    } else {
        text.matches('\u{0C}').count() + 1
    };

    Ok(PdfText {
        text,
        page_count,
        warnings,
    })
}

/// Read input for extraction: PDFs go through pdf-extract, anything else is
/// treated as plain text. Plain-text support keeps the debugging loop fast.
pub fn read_document_text(path: &Path) -> Result<PdfText, PdfError> {
    if path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
    {
        return extract_pdf_text(path);
    }
    if !path.is_file() {
        return Err(PdfError::NotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| PdfError::NotFound(format!(
        "{}: {}",
        path.display(),
        e
    )))?;
    Ok(PdfText {
        text,
        page_count: 1,
        warnings: Vec::new(),
    })
}
