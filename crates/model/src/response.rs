use std::pin::Pin;
use std::task::{self, Poll};

use crate::provider::ChatProviderError;

/// A streamed response from the chat provider.
pub trait ChatResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ChatProviderError;

    /// Attempts to pull out the next text delta from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next delta. Implementations will ensure that the current
    ///   task will be notified when the next delta may be ready.
    /// - `Poll::Ready(Ok(Some(delta)))` means the response has a delta
    ///   to deliver, and may produce further deltas on subsequent
    ///   `poll_next_delta` calls.
    /// - `Poll::Ready(Ok(None))` means the stream signalled completion.
    /// - `Poll::Ready(Err(error))` means the stream failed mid-flight.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_delta(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>>;
}
