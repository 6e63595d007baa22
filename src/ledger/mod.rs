//! Token-usage ledger: counts response tokens and appends one record per
//! completed assistant turn.
//!
//! Two sinks: a local append-only line-oriented log (authoritative,
//! best-effort durable) and an optional shared remote blob written with a
//! version precondition. The local append happens before the remote attempt,
//! and a remote failure never rolls it back.

mod remote;

pub use remote::RemoteLedger;

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tiktoken_rs::CoreBPE;

/// The pinned tokenization scheme. Counts written with a different encoding
/// are not comparable, so changing this breaks every historical record.
pub const LEDGER_ENCODING: &str = "cl100k_base";

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The remote store rejected the write because the version precondition
    /// no longer matched (a concurrent writer got there first). Exactly one
    /// attempt is made; the local record already stands.
    #[error("remote ledger write rejected: version precondition no longer matches")]
    Conflict,

    /// The remote store could not be reached or answered unexpectedly.
    #[error("remote ledger unavailable: {0}")]
    Unavailable(String),
}

pub struct TokenLedger {
    bpe: CoreBPE,
    local_path: PathBuf,
    remote: Option<RemoteLedger>,
}

impl TokenLedger {
    pub fn new(local_path: impl Into<PathBuf>, remote: Option<RemoteLedger>) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .with_context(|| format!("failed to load {LEDGER_ENCODING} encoding"))?;
        Ok(Self {
            bpe,
            local_path: local_path.into(),
            remote,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Count the tokens of `text` under the pinned encoding.
    ///
    /// Pure and deterministic; no I/O.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Record one usage count.
    ///
    /// The local append is attempted first and never blocks the turn: a
    /// write failure is logged and swallowed. The remote attempt (when
    /// configured) happens after; only a version conflict is surfaced, as a
    /// warning for the caller, because the local line already captured the
    /// fact.
    pub async fn record(&self, count: usize) -> Result<(), LedgerError> {
        if let Err(e) = self.append_local(count) {
            tracing::warn!(
                path = %self.local_path.display(),
                error = %e,
                "local ledger append failed; turn continues"
            );
        }

        if let Some(remote) = &self.remote {
            match remote.append(count).await {
                Ok(()) => {}
                Err(LedgerError::Conflict) => return Err(LedgerError::Conflict),
                Err(e) => {
                    tracing::warn!(error = %e, "remote ledger unreachable; local record stands");
                }
            }
        }

        Ok(())
    }

    fn append_local(&self, count: usize) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.local_path)?;
        writeln!(file, "{count}")?;
        file.flush()
    }

    /// Read every count from the local log, in append order.
    pub fn read_local(&self) -> std::io::Result<Vec<u64>> {
        let content = match std::fs::read_to_string(&self.local_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }
}
