#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Client for the Anthropic Messages API with streaming message assembly.
//!
//! [`Anthropic::stream`] yields a [`StreamUpdate`] per server event, for
//! incremental display, and finishes with [`StreamUpdate::Completed`]
//! carrying the same [`Message`] type a non-streaming [`Anthropic::send`]
//! returns.

pub mod assembler;
pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod prelude;
pub mod request;
pub mod sse;
pub mod stream;
pub mod tool;
pub mod usage;

pub use assembler::{MessageAssembler, StreamUpdate};
pub use error::AnthropicError;
pub use event::StreamEvent;
pub use message::Message;
pub use model::Model;
pub use request::MessageRequest;
pub use stream::collect_message;

use std::collections::HashMap;

use async_stream::try_stream;
use bon::Builder;
use core::fmt;
use futures_util::{StreamExt, stream::BoxStream};

use crate::sse::SseFrame;

const BASE_URL: &str = "https://api.anthropic.com";
const CHAT_URL: &str = "v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone, Default, Builder)]
pub struct Anthropic {
    #[builder(into)]
    pub(crate) api_key: Option<String>,
    #[builder(default)]
    pub(crate) client: reqwest::Client,
    #[builder(default = BASE_URL.to_string(), into)]
    pub(crate) base_url: String,
    #[builder(default = API_VERSION.to_string(), into)]
    pub(crate) api_version: String,
    #[builder(default)]
    pub(crate) headers: HashMap<String, String>,
}

impl Anthropic {
    /// Create a new Anthropic client with the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    pub fn load_from_env() -> Result<Self, std::env::VarError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")?;
        Ok(Self::builder().api_key(api_key).build())
    }

    /// Add a custom header to every request, e.g. `anthropic-beta`.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, AnthropicError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AnthropicError::AuthenticationMissing)?;

        let mut req = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json");

        for (key, value) in &self.headers {
            req = req.header(key, value);
        }

        Ok(req)
    }
}

impl Anthropic {
    /// Sends a request and waits for the whole message.
    pub async fn send(&self, request: &MessageRequest) -> Result<Message, AnthropicError> {
        let body = MessageRequest {
            stream: None,
            ..request.clone()
        };
        let res = self.post(CHAT_URL)?.json(&body).send().await?;

        let status = res.status();
        let bytes = res.bytes().await?;
        if status.is_success() {
            serde_json::from_slice(&bytes).map_err(AnthropicError::ResponseDecode)
        } else {
            Err(error::parse_error_response(status, &bytes))
        }
    }

    /// Streams the response as assembled updates. The last item is either
    /// [`StreamUpdate::Completed`] or an error.
    pub fn stream(
        &self,
        request: &MessageRequest,
    ) -> BoxStream<'static, Result<StreamUpdate, AnthropicError>> {
        stream::assemble(self.frames(request))
    }

    /// Streams the raw decoded events without assembling them.
    pub fn stream_events(
        &self,
        request: &MessageRequest,
    ) -> BoxStream<'static, Result<StreamEvent, AnthropicError>> {
        stream::events(self.frames(request))
    }

    fn frames(&self, request: &MessageRequest) -> BoxStream<'static, Result<SseFrame, AnthropicError>> {
        let req = self
            .post(CHAT_URL)
            .map(|req| req.header("accept", "text/event-stream").json(&request.streaming()));

        Box::pin(try_stream! {
            let response = req?.send().await?;
            let status = response.status();

            if status.is_success() {
                let mut frames = sse::frames(response.bytes_stream());
                while let Some(frame) = frames.next().await {
                    yield frame?;
                }
            } else {
                log::debug!("stream request failed with HTTP {status}");
                let bytes = response.bytes().await?;
                Err::<(), _>(error::parse_error_response(status, &bytes))?;
            }
        })
    }
}

impl fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anthropic")
            .field("api_key", &"[REDACTED]")
            .field("client", &self.client)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let client = Anthropic::new("sk-ant-secret");
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn builder_defaults() {
        let client = Anthropic::builder().api_key("k").build();
        assert_eq!(client.base_url, BASE_URL);
        assert_eq!(client.api_version, API_VERSION);
        assert!(client.headers.is_empty());
    }

    #[test]
    fn missing_key_fails_before_sending() {
        let client = Anthropic::default();
        assert!(matches!(
            client.post(CHAT_URL),
            Err(AnthropicError::AuthenticationMissing)
        ));
    }
}
