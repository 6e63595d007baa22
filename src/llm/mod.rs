//! Completion gateway: streams replies from the completion service.

mod error;
mod openai;
pub mod streaming;
mod types;

pub use error::GatewayError;
pub use openai::OpenAiGateway;
pub use types::{Message, Role};

use async_trait::async_trait;

/// Streaming completion provider.
///
/// `stream_chat` sends the full replayed message sequence on every turn (the
/// service keeps no session state) and invokes `on_fragment` for each piece
/// of response text in arrival order. The returned string is the in-order
/// concatenation of every fragment delivered; no fragment is dropped or
/// reordered.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_chat(
        &self,
        messages: &[Message],
        user_id: &str,
        on_fragment: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, GatewayError>;
}
