//! Response observation.
//!
//! This module wraps an outgoing response so that its status, headers and body
//! can be recorded while the body keeps streaming to the client untouched.

use axum::body::{Body, Bytes, HttpBody};
use axum::http::HeaderMap;
use axum::response::Response;
use http_body::{Frame, SizeHint};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::entry::RequestLogEntry;
use crate::fields::ResponseSummary;
use crate::limit_buffer::LimitBuffer;
use crate::logger::Logger;
use crate::types::PanicReporter;

/// Observes one response on behalf of a pending [`RequestLogEntry`].
///
/// The entry is finalized when the recorder is dropped. That covers a body
/// that finished streaming, a client that went away mid-body, an inner service
/// that failed or never produced a response, and unwinding from a panic.
pub struct ResponseRecorder<L: Logger> {
    entry: Option<RequestLogEntry<L>>,
    panics: PanicReporter,
    started: Instant,
    status: u16,
    header: HeaderMap,
    bytes: u64,
    tee: LimitBuffer,
}

impl<L: Logger> ResponseRecorder<L> {
    pub fn new(entry: RequestLogEntry<L>, panics: PanicReporter) -> Self {
        Self {
            entry: Some(entry),
            panics,
            started: Instant::now(),
            status: 0,
            header: HeaderMap::new(),
            bytes: 0,
            tee: LimitBuffer::default(),
        }
    }

    /// Snapshots the response head. Headers are only kept when they will be logged.
    pub fn observe(&mut self, response: &Response) {
        self.status = response.status().as_u16();
        if self.entry.as_ref().is_some_and(|entry| !entry.concise()) {
            self.header = response.headers().clone();
        }
    }

    /// Accounts for a body chunk on its way to the client.
    pub fn write(&mut self, chunk: &[u8]) {
        self.bytes += chunk.len() as u64;
        self.tee.capture(chunk);
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn finish(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        if let Some(record) = self.panics.get() {
            entry.panic(record);
        }

        let body = if self.status >= 400 {
            self.tee.take_bytes()
        } else {
            Bytes::new()
        };
        entry.finalize(ResponseSummary {
            status: self.status,
            bytes: self.bytes,
            header: std::mem::take(&mut self.header),
            elapsed: self.elapsed(),
            body,
        });
    }
}

impl<L: Logger> Drop for ResponseRecorder<L> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Response body that feeds every data frame into a [`ResponseRecorder`].
///
/// Frames are forwarded as they are, trailers included, and the inner body's
/// size hint and end-of-stream state are reported unchanged.
pub struct RecordedBody<L: Logger> {
    inner: Body,
    recorder: ResponseRecorder<L>,
}

// Nothing is structurally pinned: `Body` is `Unpin` and the recorder is only
// ever accessed through `&mut`.
impl<L: Logger> Unpin for RecordedBody<L> {}

impl<L: Logger> HttpBody for RecordedBody<L> {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(chunk) = frame.data_ref() {
                    this.recorder.write(chunk);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                debug!(
                    error = %e,
                    bytes = this.recorder.bytes_written(),
                    "Response body stream failed"
                );
                Poll::Ready(Some(Err(e)))
            }
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Routes the response body through `recorder`.
///
/// The recorder lives inside the new body and finalizes its entry once hyper
/// is done with the body and drops it.
pub fn record_response<L: Logger>(response: Response, mut recorder: ResponseRecorder<L>) -> Response {
    recorder.observe(&response);
    debug!(status = recorder.status(), "Wrapping response body for capture");

    let (parts, inner) = response.into_parts();
    Response::from_parts(parts, Body::new(RecordedBody { inner, recorder }))
}
