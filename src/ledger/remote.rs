//! Shared remote ledger blob with optimistic-concurrency writes.
//!
//! The store speaks the GitHub contents API: a read returns the blob text
//! plus an opaque `sha` version marker, and a write must present the marker
//! it read. A stale marker means a concurrent writer won; that is reported
//! as a conflict after exactly one attempt, never retried here. A missing
//! blob is a valid empty ledger, written without a precondition.

use super::LedgerError;
use base64::prelude::*;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_ROOT: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

pub struct RemoteLedger {
    client: reqwest::Client,
    api_root: String,
    token: String,
    owner: String,
    repo: String,
    path: String,
    branch: Option<String>,
}

impl RemoteLedger {
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        branch: Option<String>,
    ) -> Result<Self, LedgerError> {
        // The API rejects requests without a User-Agent.
        let client = reqwest::Client::builder()
            .user_agent(concat!("docchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            api_root: DEFAULT_API_ROOT.to_string(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            branch,
        })
    }

    /// Point at a different store endpoint (e.g. GitHub Enterprise).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Append one count to the remote blob: read content and version, append
    /// the new line, write back with the version as precondition.
    pub async fn append(&self, count: usize) -> Result<(), LedgerError> {
        let (content, version) = self.read().await?;
        let updated = appended(&content, count);
        self.write(&updated, version.as_deref()).await
    }

    /// Read the current blob text and its version marker.
    ///
    /// Not-found is a valid state: an empty ledger with no version.
    async fn read(&self) -> Result<(String, Option<String>), LedgerError> {
        let mut request = self.client.get(self.contents_url()).bearer_auth(&self.token);
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("read failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok((String::new(), None));
        }
        if !response.status().is_success() {
            return Err(LedgerError::Unavailable(format!(
                "read returned HTTP {}",
                response.status()
            )));
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("read body malformed: {e}")))?;

        let text = decode_blob(&body.content)
            .map_err(|e| LedgerError::Unavailable(format!("blob decode failed: {e}")))?;
        Ok((text, Some(body.sha)))
    }

    /// Write the full new content with the previously read version marker as
    /// precondition. One attempt; a stale marker is a conflict.
    async fn write(&self, content: &str, version: Option<&str>) -> Result<(), LedgerError> {
        let mut body = json!({
            "message": "record token usage",
            "content": BASE64_STANDARD.encode(content),
        });
        if let Some(sha) = version {
            body["sha"] = json!(sha);
        }
        if let Some(branch) = &self.branch {
            body["branch"] = json!(branch);
        }

        let response = self
            .client
            .put(self.contents_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("write failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(classify_write_failure(status, detail))
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_root, self.owner, self.repo, self.path
        )
    }
}

/// The store signals a lost precondition with 409; it also answers 422 when
/// the presented sha does not match the current blob.
fn classify_write_failure(status: reqwest::StatusCode, detail: String) -> LedgerError {
    match status.as_u16() {
        409 | 422 => LedgerError::Conflict,
        _ => LedgerError::Unavailable(format!("write returned HTTP {status}: {detail}")),
    }
}

fn appended(content: &str, count: usize) -> String {
    format!("{content}{count}\n")
}

/// Contents API blobs are base64 with embedded newlines.
fn decode_blob(encoded: &str) -> Result<String, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD.decode(compact)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
