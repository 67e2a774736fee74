use async_stream::try_stream;
use futures_util::{Stream, StreamExt, stream::BoxStream};

use crate::{
    assembler::{MessageAssembler, StreamUpdate},
    error::AnthropicError,
    event::{StreamEvent, decode_frame},
    message::Message,
    sse::SseFrame,
};

/// Decodes frames into typed events. The stream ends after the first error,
/// including a server `error` event.
pub fn events<S>(frames: S) -> BoxStream<'static, Result<StreamEvent, AnthropicError>>
where
    S: Stream<Item = Result<SseFrame, AnthropicError>> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut frames = Box::pin(frames);
        while let Some(frame) = frames.next().await {
            yield decode_frame(&frame?)?;
        }
    })
}

/// Decodes and assembles frames.
///
/// Yields one update per event that has something to report, in arrival
/// order, and ends with either [`StreamUpdate::Completed`] or exactly one
/// error. Frames arriving after `message_stop` are never read. Dropping the
/// stream drops `frames`, which releases the underlying connection.
pub fn assemble<S>(frames: S) -> BoxStream<'static, Result<StreamUpdate, AnthropicError>>
where
    S: Stream<Item = Result<SseFrame, AnthropicError>> + Send + 'static,
{
    Box::pin(try_stream! {
        let mut assembler = MessageAssembler::new();
        let mut events = events(frames);

        let mut completed = false;

        while !completed {
            let Some(event) = events.next().await else {
                break;
            };
            if let Some(update) = assembler.apply(event?)? {
                completed = update.is_terminal();
                yield update;
            }
        }

        if !completed {
            Err::<(), _>(AnthropicError::IncompleteStream)?;
        }
    })
}

/// Drives an update stream to its finalized message, discarding fragments.
pub async fn collect_message<S>(updates: S) -> Result<Message, AnthropicError>
where
    S: Stream<Item = Result<StreamUpdate, AnthropicError>>,
{
    let mut updates = Box::pin(updates);
    while let Some(update) = updates.next().await {
        if let StreamUpdate::Completed(message) = update? {
            return Ok(message);
        }
    }
    Err(AnthropicError::IncompleteStream)
}
