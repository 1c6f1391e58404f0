//! Response capture interposer.
//!
//! `CaptureBody` wraps the origin's response body. Every frame is passed to
//! the client unchanged and as soon as it arrives; data frames are also
//! mirrored into a bounded buffer. Once the last frame has been handed on
//! (or the body is dropped early, e.g. on client disconnect) a completion
//! callback receives the captured bytes exactly once.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};

use crate::security::limits::is_loggable_content_type;

/// Logged in place of a body whose content type is not loggable.
pub const NON_LOGGABLE_PLACEHOLDER: &str = "[Binary or non-loggable content]";

/// Logged in place of a body that exceeded the capture ceiling.
pub const TRUNCATED_PLACEHOLDER: &str = "[Truncated: response exceeded capture limit]";

/// What was observed on the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Bytes,
    /// More bytes were relayed than the buffer kept.
    pub truncated: bool,
    /// The stream reached its end normally.
    pub completed: bool,
    /// Error reported by the origin stream, if any.
    pub error: Option<String>,
}

impl Capture {
    /// Text for the exchange record, given the response content type.
    pub fn render_body(&self, content_type: Option<&str>) -> String {
        if !is_loggable_content_type(content_type) {
            NON_LOGGABLE_PLACEHOLDER.to_string()
        } else if self.truncated {
            TRUNCATED_PLACEHOLDER.to_string()
        } else {
            String::from_utf8_lossy(&self.bytes).into_owned()
        }
    }
}

type OnComplete = Box<dyn FnOnce(Capture) + Send + 'static>;

/// Body decorator that relays frames and mirrors data into a bounded buffer.
pub struct CaptureBody<B: Body> {
    inner: B,
    buffer: BytesMut,
    limit: usize,
    truncated: bool,
    error: Option<String>,
    on_complete: Option<OnComplete>,
}

impl<B: Body> CaptureBody<B> {
    pub fn new<F>(inner: B, limit: usize, on_complete: F) -> Self
    where
        F: FnOnce(Capture) + Send + 'static,
    {
        Self {
            inner,
            buffer: BytesMut::new(),
            limit,
            truncated: false,
            error: None,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn record(&mut self, data: &Bytes) {
        let room = self.limit.saturating_sub(self.buffer.len());
        if data.len() > room {
            self.buffer.extend_from_slice(&data[..room]);
            self.truncated = true;
        } else {
            self.buffer.extend_from_slice(data);
        }
    }

    fn finish(&mut self, completed: bool) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Capture {
                bytes: std::mem::take(&mut self.buffer).freeze(),
                truncated: self.truncated,
                completed,
                error: self.error.take(),
            });
        }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match Pin::new(&mut self.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    self.record(data);
                }
                // The final frame is still in flight here; completion waits
                // for the next poll or for the drop once it has been written.
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.error = Some(e.to_string());
                self.finish(false);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finish(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: Body> Drop for CaptureBody<B> {
    fn drop(&mut self) {
        // Fires after the last frame was handed to the connection, and for
        // bodies that are never polled at all (HEAD, 204).
        let completed = self.inner.is_end_stream();
        self.finish(completed);
    }
}
