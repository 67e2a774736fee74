use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AnthropicError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Any,
    Tool { name: String },
}

/// A tool declaration. The caller supplies `input_schema` as a ready JSON
/// Schema object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A finalized tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
}

impl ToolUse {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Deserializes the input into a caller-defined argument type.
    pub fn parse_input<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.input.clone()))
    }
}

impl fmt::Display for ToolUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToolUse(id: {}, name: {})", self.id, self.name)
    }
}

/// Collects `input_json_delta` fragments for one tool-use block.
#[derive(Debug, Default, Clone)]
pub struct ToolUseBuilder {
    id: String,
    name: String,
    input: String,
}

impl ToolUseBuilder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_str(&mut self, s: &str) {
        self.input.push_str(s);
    }

    /// Parses the accumulated fragments as one JSON object. A tool called
    /// without arguments may stream no fragments at all; that yields an
    /// empty object.
    pub fn build(self) -> Result<ToolUse, AnthropicError> {
        let input = if self.input.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Map<String, Value>>(&self.input) {
                Ok(input) => input,
                Err(source) => {
                    return Err(AnthropicError::ToolInputDecode {
                        id: self.id,
                        name: self.name,
                        source,
                    });
                }
            }
        };

        Ok(ToolUse {
            id: self.id,
            name: self.name,
            input,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: Vec<ToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
}

impl ToolResult {
    pub fn text(tool_use_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(tool_use_id, error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_fragments_parse_like_a_single_one() {
        let mut split = ToolUseBuilder::new("toolu_1", "get_weather");
        split.push_str(r#"{"city":"#);
        split.push_str(r#" "Paris", "unit""#);
        split.push_str(r#": "celsius"}"#);

        let mut whole = ToolUseBuilder::new("toolu_1", "get_weather");
        whole.push_str(r#"{"city": "Paris", "unit": "celsius"}"#);

        assert_eq!(split.build().unwrap(), whole.build().unwrap());
    }

    #[test]
    fn no_fragments_means_empty_input() {
        let tool_use = ToolUseBuilder::new("toolu_2", "now").build().unwrap();
        assert!(tool_use.input.is_empty());
    }

    #[test]
    fn non_object_input_is_rejected() {
        let mut builder = ToolUseBuilder::new("toolu_3", "broken");
        builder.push_str(r#"["not", "an", "object"]"#);
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            AnthropicError::ToolInputDecode { ref name, .. } if name == "broken"
        ));
    }

    #[test]
    fn typed_input() {
        #[derive(Deserialize)]
        struct Weather {
            city: String,
        }

        let input = json!({"city": "Charleston"}).as_object().cloned().unwrap();
        let weather: Weather = ToolUse::new("t", "get_weather", input).parse_input().unwrap();
        assert_eq!(weather.city, "Charleston");
    }

    #[test]
    fn error_result_serializes_flag() {
        let json = serde_json::to_value(ToolResult::error("toolu_1", "boom")).unwrap();
        assert_eq!(
            json,
            json!({
                "tool_use_id": "toolu_1",
                "content": [{"type": "text", "text": "boom"}],
                "is_error": true
            })
        );
    }
}
