//! PDF text extraction.

use std::path::Path;

use crate::error::{AssistError, Result};

/// Extract text from in-memory PDF bytes. Scanned or image-only documents
/// come back empty; that is the caller's empty-input case, not an error.
pub fn pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AssistError::PdfExtraction(e.to_string()))
}

/// Extract text from a PDF on disk.
pub fn pdf_text_from_file(path: impl AsRef<Path>) -> Result<String> {
    pdf_extract::extract_text(path.as_ref())
        .map_err(|e| AssistError::PdfExtraction(e.to_string()))
}
