//! Common imports for working with the Anthropic API.
//!
//! ```rust,no_run
//! use anthropic_stream_ox::prelude::*;
//! use futures_util::StreamExt;
//!
//! # async fn example() -> Result<(), AnthropicError> {
//! let client = Anthropic::new("your-api-key");
//! let request = MessageRequest::builder()
//!     .model(Model::Claude35Sonnet)
//!     .message(InputMessage::user(vec!["Hello!"]))
//!     .build();
//!
//! let mut stream = client.stream(&request);
//! while let Some(update) = stream.next().await {
//!     let update = update?;
//!     if let Some(text) = update.display_text() {
//!         print!("{text}");
//!     }
//!     if let StreamUpdate::Completed(message) = update {
//!         println!("\n{:?}", message.usage);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use crate::{
    Anthropic, AnthropicError, MessageRequest, Model,
    assembler::{MessageAssembler, StreamUpdate},
    event::{ContentBlockDelta, StreamEvent},
    message::{Content, ContentBlock, Message, Role, StopReason, Text},
    request::InputMessage,
    stream::collect_message,
    tool::{Tool, ToolChoice, ToolResult, ToolUse},
    usage::Usage,
};
