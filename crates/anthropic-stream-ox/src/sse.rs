use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream::BoxStream};

use crate::error::AnthropicError;

/// One dispatched server-sent event: the `event:` tag (if any) and the
/// joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// Incremental SSE framer. Bytes may be split anywhere, including inside a
/// multi-byte character; only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, AnthropicError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes = self.buffer.drain(..=pos).collect::<Vec<u8>>();
            let line = String::from_utf8(line_bytes)
                .map_err(|e| AnthropicError::InvalidEventData(format!("UTF-8 decode error: {e}")))?;
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Flushes a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Result<Option<SseFrame>, AnthropicError> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8(std::mem::take(&mut self.buffer))
                .map_err(|e| AnthropicError::InvalidEventData(format!("UTF-8 decode error: {e}")))?;
            if let Some(frame) = self.process_line(&line) {
                return Ok(Some(frame));
            }
        }
        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // id and retry carry nothing this protocol uses
            _ => log::trace!("ignoring SSE field `{field}`"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();

        log::trace!("SSE frame {event:?}: {data}");
        Some(SseFrame { event, data })
    }
}

/// Turns a byte stream into a stream of frames, in arrival order.
pub fn frames<S, E>(bytes: S) -> BoxStream<'static, Result<SseFrame, AnthropicError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<AnthropicError> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::<AnthropicError>::into)?;
            for frame in decoder.push(&chunk)? {
                yield frame;
            }
        }

        if let Some(frame) = decoder.finish()? {
            yield frame;
        }
    })
}
