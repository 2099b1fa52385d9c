//! Write-through capture of the outgoing response body.
//!
//! [`CaptureBody`] wraps the response body produced by the legacy handler and
//! tees every data frame into an in-memory buffer while passing the frame to
//! the client untouched. When the body finishes (or is dropped early, e.g.
//! on client disconnect) the completion hook runs exactly once with whatever
//! bytes were captured up to that point.
use std::{
    pin::Pin,
    task::{Context, Poll},
};

use axum::body::Body as AxumBody;
use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};

type CompletionHook = Box<dyn FnOnce(Bytes) + Send + 'static>;

/// A pure tee over the response byte stream.
pub struct CaptureBody {
    inner: AxumBody,
    captured: BytesMut,
    on_complete: Option<CompletionHook>,
}

impl CaptureBody {
    /// Wrap `inner`, invoking `on_complete` with the captured bytes once the
    /// stream ends or the body is dropped.
    pub fn new(inner: AxumBody, on_complete: impl FnOnce(Bytes) + Send + 'static) -> Self {
        Self {
            inner,
            captured: BytesMut::new(),
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn finish(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook(self.captured.split().freeze());
        }
    }
}

impl Body for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.captured.extend_from_slice(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        self.finish();
    }
}
