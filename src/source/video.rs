//! YouTube transcript fetch via the timedtext endpoint.

use super::{join_fragments, SourceError};
use quick_xml::events::Event;
use quick_xml::Reader;

const TIMEDTEXT_URL: &str = "https://video.google.com/timedtext";

/// Fetch the transcript for a video in the preferred language and flatten
/// its segments into one blob, in caption order.
///
/// The endpoint answers an empty body when no transcript exists for the
/// requested language; that is surfaced as `UnavailableTranscript`.
pub(super) async fn fetch_transcript(
    client: &reqwest::Client,
    video_id: &str,
    language: &str,
) -> Result<String, SourceError> {
    let response = client
        .get(TIMEDTEXT_URL)
        .query(&[("lang", language), ("v", video_id)])
        .send()
        .await
        .map_err(|e| SourceError::Unavailable(format!("transcript fetch failed: {e}")))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::UnavailableTranscript(language.to_string()));
    }
    if !status.is_success() {
        return Err(SourceError::Unavailable(format!(
            "transcript fetch returned HTTP {status}"
        )));
    }

    let xml = response
        .text()
        .await
        .map_err(|e| SourceError::Unavailable(format!("reading transcript failed: {e}")))?;

    if xml.trim().is_empty() {
        return Err(SourceError::UnavailableTranscript(language.to_string()));
    }

    let segments = parse_segments(&xml)?;
    if segments.is_empty() {
        return Err(SourceError::UnavailableTranscript(language.to_string()));
    }

    Ok(join_fragments(segments))
}

/// Pull the text of every `<text>` caption element, unescaped, in document
/// order.
fn parse_segments(xml: &str) -> Result<Vec<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments = Vec::new();
    let mut in_caption = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => in_caption = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => in_caption = false,
            Ok(Event::Text(t)) if in_caption => {
                let segment = t
                    .unescape()
                    .map_err(|e| {
                        SourceError::Unavailable(format!("transcript decode failed: {e}"))
                    })?
                    .into_owned();
                segments.push(segment);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SourceError::Unavailable(format!(
                    "transcript XML parse failed: {e}"
                )))
            }
        }
    }

    Ok(segments)
}
