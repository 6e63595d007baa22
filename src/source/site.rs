//! Web page fetch and HTML-to-text flattening.

use super::{join_fragments, SourceError};
use scraper::{Html, Selector};

/// Render width for the text conversion; long lines wrap here.
const TEXT_WIDTH: usize = 100;

/// Fetch a URL and flatten the page into text fragments joined by blank
/// lines: the title (when present) followed by the body text.
pub(super) async fn fetch(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::Unavailable(format!("fetch of {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Unavailable(format!(
            "fetch of {url} returned HTTP {status}"
        )));
    }

    let html = response
        .text()
        .await
        .map_err(|e| SourceError::Unavailable(format!("reading body of {url} failed: {e}")))?;

    page_text(&html)
}

/// Convert an HTML document to plain text, in document order.
fn page_text(html: &str) -> Result<String, SourceError> {
    let body = html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .map_err(|e| SourceError::Unavailable(format!("html conversion failed: {e}")))?;

    let mut fragments = Vec::new();
    if let Some(title) = extract_title(html) {
        fragments.push(title);
    }
    fragments.push(collapse_blank_runs(&body));

    Ok(join_fragments(fragments))
}

fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

/// Squash runs of three or more blank lines left behind by the converter.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blanks = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blanks += 1;
            if blanks <= 2 {
                out.push('\n');
            }
        } else {
            blanks = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_includes_title_and_body() {
        let html = "<html><head><title>My Page</title></head>\
                    <body><h1>Hello</h1><p>World</p></body></html>";
        let text = page_text(html).unwrap();
        assert!(text.starts_with("My Page\n\n"));
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }

    #[test]
    fn page_without_title_still_yields_body() {
        let html = "<html><body><p>Just content</p></body></html>";
        let text = page_text(html).unwrap();
        assert!(text.contains("Just content"));
    }

    #[test]
    fn malformed_html_is_best_effort() {
        let html = "<div><p>Unclosed<b>bold</div>";
        let text = page_text(html).unwrap();
        assert!(text.contains("Unclosed"));
    }

    #[test]
    fn blank_runs_are_collapsed() {
        let collapsed = collapse_blank_runs("a\n\n\n\n\nb\n");
        assert_eq!(collapsed, "a\n\n\nb");
    }
}
