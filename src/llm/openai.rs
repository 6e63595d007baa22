//! OpenAI-compatible streaming completion gateway.
//!
//! Sends the replayed message sequence to the chat-completions endpoint with
//! `stream: true` and yields response fragments in arrival order. The API
//! key is only ever sent to the configured endpoint.

use super::{streaming::SseDecoder, CompletionProvider, GatewayError, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    /// Free-form end-user identifier, forwarded for the provider's abuse
    /// monitoring. Carries the session's user id.
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: Option<usize>,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: OPENAI_CHAT_URL.to_string(),
            model: model.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Point the gateway at a different OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CompletionProvider for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        user_id: &str,
        on_fragment: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, GatewayError> {
        use futures::StreamExt;

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            max_tokens: self.max_tokens,
            user: user_id,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_http_status(status, detail));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut full_text = String::new();
        let mut finished = false;

        while let Some(chunk) = stream.next().await {
            // A transport failure after the response started means the stream
            // is truncated; the caller discards partial text and retries the
            // whole turn.
            let chunk = chunk
                .map_err(|e| GatewayError::StreamInterrupted(format!("read failed: {e}")))?;

            for payload in decoder.push(&chunk) {
                if payload == "[DONE]" {
                    finished = true;
                    continue;
                }
                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(&payload) {
                    for choice in &parsed.choices {
                        if let Some(text) = &choice.delta.content {
                            if !text.is_empty() {
                                full_text.push_str(text);
                                on_fragment(text);
                            }
                        }
                        if choice.finish_reason.is_some() {
                            finished = true;
                        }
                    }
                }
            }
        }

        for payload in decoder.finish() {
            if payload == "[DONE]" {
                finished = true;
            }
        }

        if !finished {
            return Err(GatewayError::StreamInterrupted(
                "stream ended before the service signaled completion".to_string(),
            ));
        }

        Ok(full_text)
    }
}
