//! PDF and plain-text extraction from uploaded bytes.
//!
//! Payload bytes are persisted to a temp file scoped to the call; the RAII
//! guard removes it on every exit path, including extraction failures.

use super::{join_fragments, SourceError};
use std::io::Write;

pub(super) fn extract_pdf(bytes: &[u8]) -> Result<String, SourceError> {
    let temp = write_temp(bytes, ".pdf")?;
    let pages = pdf_extract::extract_text_by_pages(temp.path())
        .map_err(|e| SourceError::Unavailable(format!("pdf extraction failed: {e}")))?;
    Ok(join_fragments(pages))
}

pub(super) fn extract_text(bytes: &[u8]) -> Result<String, SourceError> {
    let temp = write_temp(bytes, ".txt")?;
    let raw = std::fs::read(temp.path())?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn write_temp(bytes: &[u8], suffix: &str) -> Result<tempfile::NamedTempFile, SourceError> {
    let mut temp = tempfile::Builder::new().suffix(suffix).tempfile()?;
    temp.write_all(bytes)?;
    temp.flush()?;
    Ok(temp)
}
