use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    message::{Content, Role},
    tool::{Tool, ToolChoice},
};

/// One turn of the conversation sent to the API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InputMessage {
    pub role: Role,
    pub content: Vec<Content>,
}

impl InputMessage {
    pub fn user<T: Into<Content>>(content: Vec<T>) -> Self {
        Self {
            role: Role::User,
            content: content.into_iter().map(Into::into).collect(),
        }
    }

    pub fn assistant<T: Into<Content>>(content: Vec<T>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<crate::message::Message> for InputMessage {
    /// Echoes a previous assistant reply back into the conversation, e.g.
    /// before answering its tool calls.
    fn from(message: crate::message::Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct MessageRequest {
    #[builder(field)]
    pub messages: Vec<InputMessage>,
    #[builder(into)]
    pub model: String,
    #[builder(default = 1024)]
    pub max_tokens: u32,
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl<S: message_request_builder::State> MessageRequestBuilder<S> {
    pub fn messages(mut self, messages: impl IntoIterator<Item = impl Into<InputMessage>>) -> Self {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn message(mut self, message: impl Into<InputMessage>) -> Self {
        self.messages.push(message.into());
        self
    }
}

impl MessageRequest {
    pub fn push_message(&mut self, message: impl Into<InputMessage>) {
        self.messages.push(message.into());
    }

    /// Copy of this request with `stream: true`, as sent by the streaming calls.
    pub fn streaming(&self) -> Self {
        Self {
            stream: Some(true),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Model, tool::ToolResult};
    use serde_json::json;

    #[test]
    fn serializes_minimal_request() {
        let request = MessageRequest::builder()
            .model(Model::Claude35Sonnet)
            .message(InputMessage::user(vec!["Hello"]))
            .build();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [{"role": "user", "content": [{"type": "text", "text": "Hello"}]}],
                "model": "claude-3-5-sonnet-20240620",
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn streaming_copy_sets_flag_only() {
        let request = MessageRequest::builder()
            .model("claude-test")
            .system("be brief")
            .tool_choice(ToolChoice::Auto)
            .build();

        let streaming = request.streaming();
        assert_eq!(streaming.stream, Some(true));
        assert_eq!(request.stream, None);
        assert_eq!(streaming.system.as_deref(), Some("be brief"));
    }

    #[test]
    fn tool_results_go_in_user_turns() {
        let message = InputMessage::user(vec![Content::from(ToolResult::text("toolu_1", "72F"))]);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_1");
    }
}
