//! Incremental decoding of the daemon's chat stream.
//!
//! The daemon answers `/api/chat` with back-to-back JSON objects and no outer
//! array. [`FrameDecoder`] buffers raw bytes and hands out whole frames;
//! [`fragments`] turns a byte stream into the lazy sequence of text fragments
//! written to the client. A malformed frame, a transport error or the end of
//! the stream all end the sequence quietly.

use std::fmt::Display;

use async_stream::stream;
use axum::body::Bytes;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::daemon::ChatFrame;

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete frame, `Ok(None)` when more input is needed.
    pub fn next_frame(&mut self) -> Result<Option<ChatFrame>, serde_json::Error> {
        let (next, consumed) = {
            let mut frames =
                serde_json::Deserializer::from_slice(&self.buffer).into_iter::<ChatFrame>();
            let next = frames.next();
            (next, frames.byte_offset())
        };
        match next {
            None => {
                // only whitespace left
                self.buffer.clear();
                Ok(None)
            }
            Some(Ok(frame)) => {
                self.buffer.drain(..consumed);
                Ok(Some(frame))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e),
        }
    }

    /// True if a partial frame is still buffered.
    pub fn has_partial(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }
}

/// Decode `body` into text fragments, in arrival order, one item per frame.
///
/// The next chunk is only pulled from the daemon once the previous fragment
/// has been taken by the consumer, so nothing is buffered across fragments.
pub fn fragments<S, E>(body: S) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send,
{
    stream! {
        let mut body = Box::pin(body);
        let mut decoder = FrameDecoder::default();
        let mut emitted = 0usize;

        'relay: loop {
            loop {
                match decoder.next_frame() {
                    Ok(Some(frame)) => {
                        if let Some(err) = &frame.error {
                            warn!("Ollama reported an error mid-stream: {}", err);
                        }
                        let content = frame.into_content();
                        if !content.is_empty() {
                            emitted += 1;
                            yield Bytes::from(content);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!("relay stopped on undecodable frame: {}", e);
                        break 'relay;
                    }
                }
            }

            match body.next().await {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(e)) => {
                    debug!("relay stopped on read error: {}", e);
                    break;
                }
                None => {
                    if decoder.has_partial() {
                        debug!("relay stopped with a truncated frame");
                    }
                    break;
                }
            }
        }

        debug!("relay finished after {} fragments", emitted);
    }
}
