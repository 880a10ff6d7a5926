//! Text fragment streams returned by `complete_stream`.
//!
//! ```rust
//! use qprovider::{CompletionStream, ProviderId, VecTextStream};
//!
//! let stream = CompletionStream::new(
//!     ProviderId::Mock,
//!     "mock-model",
//!     VecTextStream::new(vec![Ok("hello".into())]),
//! );
//! assert_eq!(stream.model(), "mock-model");
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{CanonicalError, ProviderId};

/// Fragment stream contract.
///
/// Invariants for consumers:
/// - Fragments are assistant text only, in backend emission order.
/// - An `Err` item is terminal; nothing follows it.
/// - Once the stream yields `None`, it must not yield additional items.
pub trait TextStream: Stream<Item = Result<String, CanonicalError>> + Send {}

impl<T> TextStream for T where T: Stream<Item = Result<String, CanonicalError>> + Send {}

pub type BoxedTextStream<'a> = Pin<Box<dyn TextStream + 'a>>;

/// Single-consumer fragment stream with explicit cancellation.
///
/// Cancelling, finishing, failing or dropping the stream releases the inner
/// upstream (for HTTP adapters this drops the response body and closes the
/// connection).
pub struct CompletionStream<'a> {
    provider: ProviderId,
    model: String,
    inner: Option<BoxedTextStream<'a>>,
    cancelled: bool,
}

impl<'a> CompletionStream<'a> {
    pub fn new(provider: ProviderId, model: impl Into<String>, inner: impl TextStream + 'a) -> Self {
        Self::from_boxed(provider, model, Box::pin(inner))
    }

    pub fn from_boxed(
        provider: ProviderId,
        model: impl Into<String>,
        inner: BoxedTextStream<'a>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            inner: Some(inner),
            cancelled: false,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stops the stream and releases the upstream. Later polls yield `None`.
    pub fn cancel(&mut self) {
        if self.inner.take().is_some() {
            self.cancelled = true;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for CompletionStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("terminated", &self.inner.is_none())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

impl Stream for CompletionStream<'_> {
    type Item = Result<String, CanonicalError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(Err(error))) => {
                self.inner = None;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
        }
    }
}

#[derive(Debug)]
pub struct VecTextStream {
    items: VecDeque<Result<String, CanonicalError>>,
}

impl VecTextStream {
    pub fn new(items: Vec<Result<String, CanonicalError>>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl Stream for VecTextStream {
    type Item = Result<String, CanonicalError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.items.pop_front())
    }
}
