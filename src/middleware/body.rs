//! Body wrapper turning end-of-stream, errors and drops into signals.

use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Buf;
use hyper::body::{Body, Frame, SizeHint};
use pin_project::{pin_project, pinned_drop};

use super::signal::{Channel, CompletionSignal};
use crate::record::Message;

/// Body that fires its completion signal when the stream ends.
///
/// - end of stream (including a trailing frame after which the inner body
///   reports `is_end_stream`) fires `Ok`
/// - a body error fires `Err` with the error text
/// - a drop after the inner body ended fires `Ok`; the transport does not
///   poll bodies that already report end of stream
/// - a request body dropped unread fires `Ok`; the transport finishes the
///   stream on its own
/// - a response body without content (HEAD, 204, 304) fires `Ok` on drop
/// - any other drop cancels the signal
///
/// Data frames on the response channel are counted into the byte meter.
#[pin_project(PinnedDrop)]
pub struct ObservedBody<B>
where
    B: Body,
{
    #[pin]
    inner: B,
    signal: Option<CompletionSignal>,
    finish_on_drop: bool,
}

impl<B: Body> ObservedBody<B> {
    pub fn new(inner: B, signal: CompletionSignal) -> Self {
        Self {
            inner,
            finish_on_drop: signal.channel() == Channel::Request,
            signal: Some(signal).filter(CompletionSignal::is_armed),
        }
    }

    /// Wrap a request body, firing right away when it is already empty.
    pub(crate) fn request(inner: B, signal: CompletionSignal) -> Self {
        if signal.is_armed() && inner.is_end_stream() {
            signal.fire(Ok(()));
            return Self {
                inner,
                signal: None,
                finish_on_drop: false,
            };
        }
        Self::new(inner, signal)
    }

    /// Treat a drop as the end of the stream.
    ///
    /// For responses that carry no content (HEAD, 204, 304) the transport
    /// writes the head and drops the body without polling it.
    pub(crate) fn finish_on_drop(mut self) -> Self {
        self.finish_on_drop = true;
        self
    }

    /// Whether a signal is still waiting on this body.
    pub fn is_observed(&self) -> bool {
        self.signal.is_some()
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }
}

impl<B> Body for ObservedBody<B>
where
    B: Body,
    B::Error: fmt::Display,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        let result = ready!(this.inner.as_mut().poll_frame(cx));

        match &result {
            Some(Ok(frame)) => {
                if let (Some(signal), Some(data)) = (this.signal.as_ref(), frame.data_ref()) {
                    signal.record_sent(data.remaining() as u64);
                }
                if this.inner.is_end_stream() {
                    if let Some(signal) = this.signal.take() {
                        signal.fire(Ok(()));
                    }
                }
            }
            Some(Err(e)) => {
                if let Some(signal) = this.signal.take() {
                    signal.fire(Err(Message::error(e)));
                }
            }
            None => {
                if let Some(signal) = this.signal.take() {
                    signal.fire(Ok(()));
                }
            }
        }

        Poll::Ready(result)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[pinned_drop]
impl<B> PinnedDrop for ObservedBody<B>
where
    B: Body,
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if let Some(signal) = this.signal.take() {
            if *this.finish_on_drop || this.inner.is_end_stream() {
                signal.fire(Ok(()));
            } else {
                signal.cancel();
            }
        }
    }
}

impl<B> fmt::Debug for ObservedBody<B>
where
    B: Body + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedBody")
            .field("inner", &self.inner)
            .field("observed", &self.is_observed())
            .finish()
    }
}
