use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// Shared buffer holding the bytes a [`CaptureBody`] has seen so far.
///
/// Clones refer to the same underlying storage, so the pipeline can keep a
/// handle while the wrapped body is drained by the framework.
#[derive(Clone, Debug, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured at the moment of the call.
    pub fn captured_bytes(&self) -> Bytes {
        Bytes::from(self.inner.lock().unwrap().clone())
    }

    pub fn byte_size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    fn extend(&self, chunk: &[u8]) {
        self.inner.lock().unwrap().extend_from_slice(chunk);
    }
}

/// Pass-through body wrapper that mirrors every data frame into a
/// [`CaptureBuffer`] before handing it to the caller unchanged.
///
/// The real consumer reads the body once through this wrapper; the audit
/// logger reads the buffered copy, so the body is never pulled twice.
/// Errors from the inner body propagate untouched and nothing is captured
/// for the failed poll.
pub struct CaptureBody {
    inner: Body,
    buffer: CaptureBuffer,
}

impl CaptureBody {
    pub fn new(inner: Body) -> Self {
        Self {
            inner,
            buffer: CaptureBuffer::new(),
        }
    }

    /// Handle to the capture buffer, valid before and after draining.
    pub fn buffer(&self) -> CaptureBuffer {
        self.buffer.clone()
    }
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &result {
            if let Some(data) = frame.data_ref() {
                this.buffer.extend(data);
            }
        }
        result
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
