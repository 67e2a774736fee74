//! Typed server-sent events of the Messages streaming protocol.
//!
//! Every SSE frame carries an `event:` tag naming one of the eight
//! [`EventKind`]s and a JSON `data:` payload. [`decode_event`] dispatches on
//! the tag and extracts only the fields that kind defines.

use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::{
    error::{AnthropicError, ErrorInfo},
    message::{ContentBlock, Message, StopReason},
    sse::SseFrame,
    usage::DeltaUsage,
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    MessageStart,
    Ping,
    ContentBlockStart,
    ContentBlockDelta,
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Opens the message. The nested message usually has empty content and
    /// carries the initial usage counters.
    MessageStart { message: Message },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentBlockDelta,
    },
    ContentBlockStop { index: usize },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default)]
        usage: DeltaUsage,
    },
    MessageStop,
    Ping,
    Error { error: ErrorInfo },
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageStart { .. } => EventKind::MessageStart,
            Self::ContentBlockStart { .. } => EventKind::ContentBlockStart,
            Self::ContentBlockDelta { .. } => EventKind::ContentBlockDelta,
            Self::ContentBlockStop { .. } => EventKind::ContentBlockStop,
            Self::MessageDelta { .. } => EventKind::MessageDelta,
            Self::MessageStop => EventKind::MessageStop,
            Self::Ping => EventKind::Ping,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

/// Incremental content for the block at `index`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockDelta {
    TextDelta { text: String },
    /// A byte-exact slice of the tool input document. Slices are not valid
    /// JSON on their own; only their concatenation is.
    InputJsonDelta { partial_json: String },
}

impl ContentBlockDelta {
    pub fn fragment(&self) -> &str {
        match self {
            Self::TextDelta { text } => text,
            Self::InputJsonDelta { partial_json } => partial_json,
        }
    }
}

/// Top-level message changes announced near the end of a stream.
///
/// The wire format does not distinguish an absent field from an explicitly
/// empty one: `null`, a missing key and `""` all decode to `None`, and a zero
/// `output_tokens` is treated the same way. A field can therefore never be
/// reset to empty through a delta.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDelta {
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
}

#[derive(Deserialize)]
struct MessageStartPayload {
    message: Message,
}

#[derive(Deserialize)]
struct ContentBlockStartPayload {
    index: usize,
    content_block: ContentBlock,
}

#[derive(Deserialize)]
struct ContentBlockDeltaPayload {
    index: usize,
    delta: ContentBlockDelta,
}

#[derive(Deserialize)]
struct ContentBlockStopPayload {
    index: usize,
}

#[derive(Deserialize)]
struct MessageDeltaPayload {
    #[serde(default)]
    delta: MessageDeltaFields,
    #[serde(default)]
    usage: DeltaUsage,
}

#[derive(Default, Deserialize)]
struct MessageDeltaFields {
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    stop_sequence: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorInfo,
}

fn parse<T: DeserializeOwned>(kind: EventKind, payload: &str) -> Result<T, AnthropicError> {
    serde_json::from_str(payload).map_err(|source| AnthropicError::Decode {
        event: kind.to_string(),
        source,
    })
}

/// Payload-free events still have to be well-formed JSON when present.
fn check_empty_payload(kind: EventKind, payload: &str) -> Result<(), AnthropicError> {
    if payload.trim().is_empty() {
        return Ok(());
    }
    parse::<IgnoredAny>(kind, payload).map(|_| ())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Decodes one frame given its event tag and JSON payload.
///
/// An `error` event decodes into [`AnthropicError::Stream`] rather than an
/// event, so the caller's stream ends there.
pub fn decode_event(tag: &str, payload: &str) -> Result<StreamEvent, AnthropicError> {
    let kind = EventKind::from_str(tag)
        .map_err(|_| AnthropicError::UnsupportedEventKind(tag.to_string()))?;

    let event = match kind {
        EventKind::MessageStart => {
            let MessageStartPayload { message } = parse(kind, payload)?;
            StreamEvent::MessageStart { message }
        }
        EventKind::Ping => {
            check_empty_payload(kind, payload)?;
            StreamEvent::Ping
        }
        EventKind::ContentBlockStart => {
            let ContentBlockStartPayload {
                index,
                content_block,
            } = parse(kind, payload)?;
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            }
        }
        EventKind::ContentBlockDelta => {
            let ContentBlockDeltaPayload { index, delta } = parse(kind, payload)?;
            StreamEvent::ContentBlockDelta { index, delta }
        }
        EventKind::ContentBlockStop => {
            let ContentBlockStopPayload { index } = parse(kind, payload)?;
            StreamEvent::ContentBlockStop { index }
        }
        EventKind::MessageDelta => {
            let MessageDeltaPayload { delta, usage } = parse(kind, payload)?;
            let stop_reason = non_empty(delta.stop_reason).map(StopReason::from);
            StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason,
                    stop_sequence: non_empty(delta.stop_sequence),
                },
                usage,
            }
        }
        EventKind::MessageStop => {
            check_empty_payload(kind, payload)?;
            StreamEvent::MessageStop
        }
        EventKind::Error => {
            let ErrorPayload { error } = parse(kind, payload)?;
            log::debug!("server error event: {}: {}", error.r#type, error.message);
            return Err(error.into());
        }
    };

    log::debug!("decoded {kind} event");
    Ok(event)
}

/// Decodes a framed event. Frames without an `event:` line fall back to the
/// `type` field of the payload.
pub fn decode_frame(frame: &SseFrame) -> Result<StreamEvent, AnthropicError> {
    if let Some(tag) = frame.event.as_deref() {
        return decode_event(tag, &frame.data);
    }

    #[derive(Deserialize)]
    struct Tagged {
        r#type: String,
    }

    let Tagged { r#type } = serde_json::from_str(&frame.data).map_err(|e| {
        AnthropicError::InvalidEventData(format!("frame has neither event tag nor type: {e}"))
    })?;
    decode_event(&r#type, &frame.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::Usage;

    #[test]
    fn message_start_seeds_usage() {
        let event = decode_event(
            "message_start",
            r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","content":[],"model":"claude-3-5-sonnet-20240620","stop_reason":null,"stop_sequence":null,"usage":{"input_tokens":25,"output_tokens":1}}}"#,
        )
        .unwrap();

        let StreamEvent::MessageStart { message } = event else {
            panic!("expected message_start");
        };
        assert_eq!(message.id, "msg_1");
        assert!(message.content.is_empty());
        assert_eq!(message.usage, Usage::new(25, 1));
    }

    #[test]
    fn content_block_start_variants() {
        let text = decode_event(
            "content_block_start",
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        )
        .unwrap();
        assert_eq!(
            text,
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ContentBlock::Text {
                    text: String::new()
                }
            }
        );

        let tool = decode_event(
            "content_block_start",
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_01","name":"get_weather","input":{}}}"#,
        )
        .unwrap();
        assert_eq!(
            tool,
            StreamEvent::ContentBlockStart {
                index: 1,
                content_block: ContentBlock::ToolUse {
                    id: "toolu_01".to_string(),
                    name: "get_weather".to_string()
                }
            }
        );
    }

    #[test]
    fn content_block_delta_variants() {
        let text = decode_event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
        )
        .unwrap();
        assert!(matches!(
            text,
            StreamEvent::ContentBlockDelta { index: 0, ref delta } if delta.fragment() == "Hello"
        ));

        let json = decode_event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"city\":"}}"#,
        )
        .unwrap();
        assert_eq!(
            json,
            StreamEvent::ContentBlockDelta {
                index: 1,
                delta: ContentBlockDelta::InputJsonDelta {
                    partial_json: r#"{"city":"#.to_string()
                }
            }
        );
    }

    #[test]
    fn message_delta_treats_empty_as_unchanged() {
        let event = decode_event(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":""},"usage":{"output_tokens":15}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some(StopReason::EndTurn),
                    stop_sequence: None,
                },
                usage: DeltaUsage { output_tokens: 15 },
            }
        );

        let bare = decode_event("message_delta", r#"{"type":"message_delta","delta":{}}"#).unwrap();
        assert_eq!(
            bare,
            StreamEvent::MessageDelta {
                delta: MessageDelta::default(),
                usage: DeltaUsage::default(),
            }
        );
    }

    #[test]
    fn message_delta_carries_stop_sequence() {
        let event = decode_event(
            "message_delta",
            r####"{"type":"message_delta","delta":{"stop_reason":"stop_sequence","stop_sequence":"###"},"usage":{"output_tokens":12}}"####,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some(StopReason::StopSequence),
                    stop_sequence: Some("###".to_string()),
                },
                usage: DeltaUsage { output_tokens: 12 },
            }
        );
    }

    #[test]
    fn untagged_done_sentinel_is_rejected() {
        let frame = SseFrame {
            event: None,
            data: "[DONE]".to_string(),
        };
        assert!(matches!(
            decode_frame(&frame),
            Err(AnthropicError::InvalidEventData(_))
        ));
    }

    #[test]
    fn payload_free_events() {
        assert_eq!(decode_event("ping", r#"{"type": "ping"}"#).unwrap(), StreamEvent::Ping);
        assert_eq!(decode_event("message_stop", "").unwrap(), StreamEvent::MessageStop);
        assert!(matches!(
            decode_event("ping", "{not json"),
            Err(AnthropicError::Decode { ref event, .. }) if event == "ping"
        ));
    }

    #[test]
    fn error_event_short_circuits() {
        let err = decode_event(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnthropicError::Stream { ref kind, ref message } if kind == "overloaded_error" && message == "Overloaded"
        ));
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let err = decode_event("completion", "{}").unwrap_err();
        assert!(matches!(err, AnthropicError::UnsupportedEventKind(ref tag) if tag == "completion"));
    }

    #[test]
    fn malformed_payload_names_the_event() {
        let err = decode_event("content_block_stop", r#"{"index":"zero"}"#).unwrap_err();
        assert!(err.to_string().contains("content_block_stop"));
    }

    #[test]
    fn untagged_frame_uses_payload_type() {
        let frame = SseFrame {
            event: None,
            data: r#"{"type":"content_block_stop","index":2}"#.to_string(),
        };
        assert_eq!(
            decode_frame(&frame).unwrap(),
            StreamEvent::ContentBlockStop { index: 2 }
        );
    }

    #[test]
    fn kind_matches_wire_tag() {
        assert_eq!(EventKind::ContentBlockDelta.to_string(), "content_block_delta");
        assert_eq!(StreamEvent::Ping.kind(), EventKind::Ping);
        let tag: &'static str = EventKind::Error.into();
        assert_eq!(tag, "error");
    }
}
