//! docchat: chat grounded in a single document, with durable token-usage
//! tracking.
//!
//! The core pieces:
//! - `source`: normalizes a web page, YouTube transcript, PDF, or text file
//!   into one text blob
//! - `session`: the grounding document, derived system instruction, and the
//!   replayed conversation transcript
//! - `llm`: streaming completion gateway
//! - `ledger`: per-reply token counts appended to a local log and an
//!   optional shared remote store with version-checked writes
//! - `chat`: the turn engine tying them together

pub mod chat;
pub mod config;
pub mod ledger;
pub mod llm;
pub mod session;
pub mod source;

pub use config::{Config, Credentials};
pub use session::SessionContext;
