use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventKind;

/// Categorizes errors so callers can decide on their own retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limiting
    RateLimit,
    /// Authentication/authorization issues
    Auth,
    /// Invalid request format
    InvalidRequest,
    /// Server overloaded
    ServerOverloaded,
    /// Network/connection issues
    Network,
    /// API temporarily unavailable
    ServiceUnavailable,
    /// The event stream violated the wire protocol
    Protocol,
    /// Unknown/other errors
    Other,
}

/// `{type, message}` pair carried by the `error` stream event and by
/// non-2xx response bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub r#type: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Error)]
pub enum AnthropicError {
    /// Errors from the HTTP client
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The JSON payload of a stream event could not be parsed
    #[error("failed to decode `{event}` event: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// The non-streaming response body could not be parsed
    #[error("failed to decode response body: {0}")]
    ResponseDecode(#[source] serde_json::Error),

    /// The event tag is not one the protocol defines
    #[error("unsupported event kind: {0}")]
    UnsupportedEventKind(String),

    /// Accumulated `input_json_delta` fragments did not form a JSON object
    #[error("tool input for `{name}` ({id}) is not a valid JSON object: {source}")]
    ToolInputDecode {
        id: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A block event referenced an index other than the one in flight
    #[error("unexpected content block index {found} (expected {})", fmt_expected(.expected))]
    UnexpectedBlockIndex {
        expected: Option<usize>,
        found: usize,
    },

    /// An event arrived outside the message lifecycle, e.g. before
    /// `message_start` or after `message_stop`
    #[error("unexpected `{kind}` event: {reason}")]
    UnexpectedEvent {
        kind: EventKind,
        reason: &'static str,
    },

    /// A delta did not match the kind of the open block
    #[error("`{delta}` delta for `{block}` block {index}")]
    DeltaMismatch {
        index: usize,
        block: &'static str,
        delta: &'static str,
    },

    /// The server emitted an `error` event mid-stream
    #[error("stream error: {kind}: {message}")]
    Stream { kind: String, message: String },

    /// The transport ended before `message_stop`
    #[error("stream ended before message_stop")]
    IncompleteStream,

    /// Malformed server-sent-event framing
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// No API key configured
    #[error("Authentication missing: no API key provided")]
    AuthenticationMissing,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("API overloaded: {0}")]
    Overloaded(String),

    /// Unexpected response from the API
    #[error("Unexpected response from API: {0}")]
    UnexpectedResponse(String),
}

fn fmt_expected(expected: &Option<usize>) -> String {
    expected.map_or_else(|| "no open block".to_string(), |idx| idx.to_string())
}

impl AnthropicError {
    /// Returns the error kind for categorizing errors
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::Authentication(_) | Self::PermissionDenied(_) | Self::AuthenticationMissing => {
                ErrorKind::Auth
            }
            Self::InvalidRequest(_) | Self::NotFound(_) => ErrorKind::InvalidRequest,
            Self::Overloaded(_) => ErrorKind::ServerOverloaded,
            Self::Reqwest(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorKind::Network
                } else {
                    ErrorKind::Other
                }
            }
            Self::Api(_) | Self::UnexpectedResponse(_) => ErrorKind::ServiceUnavailable,
            Self::Stream { kind, .. } => match kind.as_str() {
                "overloaded_error" => ErrorKind::ServerOverloaded,
                "rate_limit_error" => ErrorKind::RateLimit,
                "api_error" => ErrorKind::ServiceUnavailable,
                _ => ErrorKind::Other,
            },
            Self::Decode { .. }
            | Self::UnsupportedEventKind(_)
            | Self::ToolInputDecode { .. }
            | Self::UnexpectedBlockIndex { .. }
            | Self::UnexpectedEvent { .. }
            | Self::DeltaMismatch { .. }
            | Self::IncompleteStream
            | Self::InvalidEventData(_) => ErrorKind::Protocol,
            Self::ResponseDecode(_) => ErrorKind::Other,
        }
    }

    /// Returns true if a caller-side retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimit
                | ErrorKind::ServerOverloaded
                | ErrorKind::Network
                | ErrorKind::ServiceUnavailable
        )
    }
}

impl From<ErrorInfo> for AnthropicError {
    fn from(error: ErrorInfo) -> Self {
        AnthropicError::Stream {
            kind: error.r#type,
            message: error.message,
        }
    }
}

/// Maps a vendor error `type` onto the error taxonomy.
fn from_vendor_type(kind: &str, message: String) -> Option<AnthropicError> {
    let error = match kind {
        "invalid_request_error" => AnthropicError::InvalidRequest(message),
        "authentication_error" => AnthropicError::Authentication(message),
        "permission_error" => AnthropicError::PermissionDenied(message),
        "not_found_error" => AnthropicError::NotFound(message),
        "rate_limit_error" => AnthropicError::RateLimit(message),
        "api_error" => AnthropicError::Api(message),
        "overloaded_error" => AnthropicError::Overloaded(message),
        _ => return None,
    };
    Some(error)
}

/// Parse an error response from the Anthropic API.
/// Prefers the structured JSON body, falls back to the HTTP status.
pub fn parse_error_response(status: reqwest::StatusCode, bytes: &bytes::Bytes) -> AnthropicError {
    if let Ok(payload) = serde_json::from_slice::<ApiErrorResponse>(bytes) {
        let ErrorInfo { r#type, message } = payload.error;
        return from_vendor_type(&r#type, message.clone())
            .unwrap_or_else(|| AnthropicError::UnexpectedResponse(format!("{}: {}", r#type, message)));
    }

    let error_text = String::from_utf8_lossy(bytes).to_string();
    match status.as_u16() {
        400 => AnthropicError::InvalidRequest(error_text),
        401 => AnthropicError::Authentication(error_text),
        403 => AnthropicError::PermissionDenied(error_text),
        404 => AnthropicError::NotFound(error_text),
        429 => AnthropicError::RateLimit(error_text),
        500 => AnthropicError::Api(error_text),
        529 => AnthropicError::Overloaded(error_text),
        code => AnthropicError::UnexpectedResponse(format!("HTTP status {code}: {error_text}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn structured_body_wins_over_status() {
        let body = bytes::Bytes::from_static(
            br#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        let err = parse_error_response(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(matches!(err, AnthropicError::Overloaded(ref m) if m == "Overloaded"));
        assert!(err.is_retryable());
    }

    #[test]
    fn plain_text_body_falls_back_to_status() {
        let body = bytes::Bytes::from_static(b"nope");
        let err = parse_error_response(StatusCode::UNAUTHORIZED, &body);
        assert!(matches!(err, AnthropicError::Authentication(ref m) if m == "nope"));
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err = parse_error_response(StatusCode::IM_A_TEAPOT, &body);
        assert!(matches!(err, AnthropicError::UnexpectedResponse(ref m) if m.contains("418")));
    }

    #[test]
    fn unknown_vendor_type_keeps_message() {
        let body = bytes::Bytes::from_static(
            br#"{"type":"error","error":{"type":"brand_new_error","message":"hm"}}"#,
        );
        let err = parse_error_response(StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, AnthropicError::UnexpectedResponse(ref m) if m == "brand_new_error: hm"));
    }

    #[test]
    fn unexpected_index_message_names_both_sides() {
        let err = AnthropicError::UnexpectedBlockIndex {
            expected: None,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "unexpected content block index 3 (expected no open block)"
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
