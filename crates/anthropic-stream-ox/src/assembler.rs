//! Reconstructs a [`Message`] from the ordered event stream.

use std::borrow::Cow;

use crate::{
    error::AnthropicError,
    event::{ContentBlockDelta, StreamEvent},
    message::{Content, ContentBlock, Message, StopReason, Text},
    tool::ToolUseBuilder,
    usage::Usage,
};

/// What a single [`MessageAssembler::apply`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    MessageStarted {
        id: String,
        model: String,
        usage: Usage,
    },
    BlockStarted {
        index: usize,
        block: ContentBlock,
    },
    /// A text or partial-JSON fragment, exactly as received.
    Delta {
        index: usize,
        delta: ContentBlockDelta,
    },
    BlockFinished {
        index: usize,
        content: Content,
    },
    /// Metadata only: stop reason, stop sequence and the current usage.
    MessageUpdated {
        stop_reason: Option<StopReason>,
        stop_sequence: Option<String>,
        usage: Usage,
    },
    /// Terminal: the finalized message.
    Completed(Message),
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Text suitable for incremental display, if this update has any.
    pub fn display_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::BlockStarted {
                block: ContentBlock::Text { .. },
                ..
            } => Some(Cow::Borrowed("\n")),
            Self::BlockStarted {
                block: ContentBlock::ToolUse { name, .. },
                ..
            } => Some(Cow::Owned(format!("\nTool Use: {name}\n"))),
            Self::Delta { delta, .. } => Some(Cow::Borrowed(delta.fragment())),
            Self::MessageStarted { .. }
            | Self::BlockFinished { .. }
            | Self::MessageUpdated { .. }
            | Self::Completed(_) => None,
        }
    }
}

#[derive(Debug)]
struct InflightBlock {
    index: usize,
    block: ContentBlock,
    buffer: String,
}

impl InflightBlock {
    fn finish(self) -> Result<Content, AnthropicError> {
        match self.block {
            ContentBlock::Text { .. } => Ok(Content::Text(Text::new(self.buffer))),
            ContentBlock::ToolUse { id, name } => {
                let mut builder = ToolUseBuilder::new(id, name);
                builder.push_str(&self.buffer);
                builder.build().map(Content::ToolUse)
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    AwaitingStart,
    Open,
    Completed,
}

fn block_kind(block: &ContentBlock) -> &'static str {
    match block {
        ContentBlock::Text { .. } => "text",
        ContentBlock::ToolUse { .. } => "tool_use",
    }
}

fn delta_kind(delta: &ContentBlockDelta) -> &'static str {
    match delta {
        ContentBlockDelta::TextDelta { .. } => "text_delta",
        ContentBlockDelta::InputJsonDelta { .. } => "input_json_delta",
    }
}

/// Single-owner accumulation state for one streamed message.
///
/// Events must be applied in arrival order. The message opens with
/// `message_start` and nothing but pings and errors is accepted before it or
/// after `message_stop`. Only one content block can be open at a time, and
/// blocks must open at consecutive indexes starting from zero.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    message: Message,
    block: Option<InflightBlock>,
    next_index: usize,
    phase: Phase,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The message under construction.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Stream-level view of the usage counters. Reads the same storage as
    /// `self.message().usage`.
    pub fn usage(&self) -> Usage {
        self.message.usage
    }

    /// Index of the open content block, if any.
    pub fn open_block(&self) -> Option<usize> {
        self.block.as_ref().map(|b| b.index)
    }

    /// Applies one event. Returns `Ok(None)` for events with nothing to
    /// report (pings), and [`StreamUpdate::Completed`] once `message_stop`
    /// is seen.
    pub fn apply(&mut self, event: StreamEvent) -> Result<Option<StreamUpdate>, AnthropicError> {
        if let Some(reason) = self.out_of_phase(&event) {
            return Err(AnthropicError::UnexpectedEvent {
                kind: event.kind(),
                reason,
            });
        }

        let update = match event {
            StreamEvent::MessageStart { message } => {
                self.message = message;
                self.block = None;
                self.next_index = 0;
                self.phase = Phase::Open;
                StreamUpdate::MessageStarted {
                    id: self.message.id.clone(),
                    model: self.message.model.clone(),
                    usage: self.usage(),
                }
            }
            StreamEvent::Ping => return Ok(None),
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let expected = self.open_block().unwrap_or(self.next_index);
                if self.block.is_some() || index != expected {
                    return Err(AnthropicError::UnexpectedBlockIndex {
                        expected: Some(expected),
                        found: index,
                    });
                }
                // a text block may open with leading text; it is normally empty
                let buffer = match &content_block {
                    ContentBlock::Text { text } => text.clone(),
                    ContentBlock::ToolUse { .. } => String::new(),
                };
                self.block = Some(InflightBlock {
                    index,
                    block: content_block.clone(),
                    buffer,
                });
                StreamUpdate::BlockStarted {
                    index,
                    block: content_block,
                }
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                let block = self.inflight_mut(index)?;
                match (&block.block, &delta) {
                    (ContentBlock::Text { .. }, ContentBlockDelta::TextDelta { .. })
                    | (ContentBlock::ToolUse { .. }, ContentBlockDelta::InputJsonDelta { .. }) => {}
                    (open, delta) => {
                        return Err(AnthropicError::DeltaMismatch {
                            index,
                            block: block_kind(open),
                            delta: delta_kind(delta),
                        });
                    }
                }
                block.buffer.push_str(delta.fragment());
                StreamUpdate::Delta { index, delta }
            }
            StreamEvent::ContentBlockStop { index } => {
                let block = match self.block.take() {
                    Some(block) if block.index == index => block,
                    open => {
                        let expected = open.as_ref().map(|b| b.index);
                        self.block = open;
                        return Err(AnthropicError::UnexpectedBlockIndex {
                            expected,
                            found: index,
                        });
                    }
                };
                let content = block.finish()?;
                log::debug!("content block {index} finished");
                self.message.content.push(content.clone());
                self.next_index = index + 1;
                StreamUpdate::BlockFinished { index, content }
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(stop_reason) = delta.stop_reason {
                    self.message.stop_reason = Some(stop_reason);
                }
                if let Some(stop_sequence) = delta.stop_sequence {
                    self.message.stop_sequence = Some(stop_sequence);
                }
                self.message.usage.merge_delta(usage);
                StreamUpdate::MessageUpdated {
                    stop_reason: self.message.stop_reason.clone(),
                    stop_sequence: self.message.stop_sequence.clone(),
                    usage: self.usage(),
                }
            }
            StreamEvent::MessageStop => {
                if let Some(block) = self.block.take() {
                    log::warn!(
                        "message_stop while content block {} was open, discarding it",
                        block.index
                    );
                }
                self.next_index = 0;
                self.phase = Phase::Completed;
                log::debug!("message {} complete", self.message.id);
                StreamUpdate::Completed(std::mem::take(&mut self.message))
            }
            StreamEvent::Error { error } => return Err(error.into()),
        };
        Ok(Some(update))
    }

    fn out_of_phase(&self, event: &StreamEvent) -> Option<&'static str> {
        match (self.phase, event) {
            (_, StreamEvent::Ping | StreamEvent::Error { .. })
            | (Phase::AwaitingStart, StreamEvent::MessageStart { .. }) => None,
            (Phase::AwaitingStart, _) => Some("no message has started"),
            (Phase::Open, StreamEvent::MessageStart { .. }) => Some("a message is already open"),
            (Phase::Open, _) => None,
            (Phase::Completed, _) => Some("the message has already completed"),
        }
    }

    fn inflight_mut(&mut self, index: usize) -> Result<&mut InflightBlock, AnthropicError> {
        match self.block.as_mut() {
            Some(block) if block.index == index => Ok(block),
            open => Err(AnthropicError::UnexpectedBlockIndex {
                expected: open.map(|b| b.index),
                found: index,
            }),
        }
    }
}
