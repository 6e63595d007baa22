//! Source normalization: turns a document source (web page, YouTube
//! transcript, PDF, or plain text) into one UTF-8 text blob.
//!
//! Each source kind is dispatched exactly once here; adding a new kind means
//! one enum variant and one extraction function.

mod file;
mod site;
mod video;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Fragments from a multi-part source are joined with a blank line.
pub(crate) const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Tag identifying where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Site,
    Video,
    Pdf,
    Text,
}

impl SourceKind {
    /// Human-readable label, interpolated into the system instruction.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Site => "web page",
            SourceKind::Video => "video transcript",
            SourceKind::Pdf => "PDF file",
            SourceKind::Text => "text file",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A document source selected by the caller, with its payload.
#[derive(Debug, Clone)]
pub enum Source {
    Site { url: String },
    Video { id: String },
    Pdf { bytes: Vec<u8> },
    Text { bytes: Vec<u8> },
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Site { .. } => SourceKind::Site,
            Source::Video { .. } => SourceKind::Video,
            Source::Pdf { .. } => SourceKind::Pdf,
            Source::Text { .. } => SourceKind::Text,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Fetch or extraction failed (network, HTTP status, parse error).
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The video has no transcript in the requested language.
    #[error("no transcript available in language '{0}'")]
    UnavailableTranscript(String),

    /// Extraction succeeded but yielded no usable text. Non-fatal: the
    /// caller should prompt for a different source.
    #[error("source produced no extractable text")]
    Empty,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knobs for fetch-based sources.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Preferred transcript language for Video sources.
    pub transcript_language: String,
    pub fetch_timeout: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            transcript_language: "pt".to_string(),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Normalize a source into one text blob.
///
/// Temporary files created for Pdf/Text payloads are scoped to this call and
/// removed on every exit path. Whitespace-only output is reported as
/// [`SourceError::Empty`] rather than returned.
pub async fn normalize(source: Source, opts: &SourceOptions) -> Result<String, SourceError> {
    let text = match source {
        Source::Site { url } => {
            let client = fetch_client(opts)?;
            site::fetch(&client, &url).await?
        }
        Source::Video { id } => {
            let client = fetch_client(opts)?;
            video::fetch_transcript(&client, &id, &opts.transcript_language).await?
        }
        Source::Pdf { bytes } => {
            // pdf extraction is CPU-bound, keep it off the async runtime
            tokio::task::spawn_blocking(move || file::extract_pdf(&bytes))
                .await
                .map_err(|e| SourceError::Unavailable(format!("extraction task failed: {e}")))??
        }
        Source::Text { bytes } => file::extract_text(&bytes)?,
    };

    if text.trim().is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(text)
}

fn fetch_client(opts: &SourceOptions) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(opts.fetch_timeout)
        .build()
        .map_err(|e| SourceError::Unavailable(format!("http client init failed: {e}")))
}

/// Join non-empty fragments with the blank-line separator, preserving order.
pub(crate) fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}
