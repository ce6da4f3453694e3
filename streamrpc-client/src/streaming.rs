//! Streaming response wrapper.
//!
//! This module provides [`Streaming`], the response side of a
//! server-streaming call, and the guard that cancels an abandoned call.
//!
//! # Cancellation
//!
//! Dropping a [`Streaming`] before it has finished cancels the call with
//! `Canceled`. The handler's next `send()` fails with that status, so it can
//! stop without producing the rest of the stream.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use streamrpc_core::{CallContext, Message, Receiver, Status};

/// Cancels a call's context when dropped while still armed.
#[derive(Debug)]
pub(crate) struct CancelGuard {
    ctx: Option<CallContext>,
}

impl CancelGuard {
    pub(crate) fn new(ctx: CallContext) -> Self {
        Self { ctx: Some(ctx) }
    }

    /// The call finished on its own; dropping no longer cancels it.
    pub(crate) fn disarm(&mut self) {
        self.ctx = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.cancel(Status::cancelled("call abandoned by caller"));
        }
    }
}

/// Responses of a server-streaming call.
///
/// Yields `Ok(message)` items in the order the handler sent them. A failed
/// call ends with a single `Err(status)` item. After the stream ends,
/// [`status()`](Streaming::status) reports how.
///
/// # Example
///
/// ```ignore
/// let mut stream = client
///     .call_server_stream::<PrimeRequest, PrimeResponse>(
///         "calculator.CalculatorService/PrimeNumberDecomposition",
///         PrimeRequest { number: 120 },
///     )
///     .await?;
///
/// while let Some(factor) = stream.message().await? {
///     println!("factor: {}", factor.prime_factor);
/// }
/// ```
pub struct Streaming<T> {
    // Dropped first, so the handler sees the cancellation before the closed
    // queue.
    guard: CancelGuard,
    inner: BoxStream<'static, Result<T, Status>>,
    ctx: CallContext,
    status: Option<Status>,
}

impl<T: Message> Streaming<T> {
    pub(crate) fn new(receiver: Receiver<T>) -> Self {
        let ctx = receiver.context().clone();
        Self {
            inner: receiver.into_stream().boxed(),
            guard: CancelGuard::new(ctx.clone()),
            ctx,
            status: None,
        }
    }

    /// Wait for the next message.
    ///
    /// `Ok(None)` means the call finished with `OK`. After an error every
    /// further call returns the same error.
    pub async fn message(&mut self) -> Result<Option<T>, Status> {
        match self.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(status)) => Err(status),
            None => match &self.status {
                Some(status) if !status.is_ok() => Err(status.clone()),
                _ => Ok(None),
            },
        }
    }

    /// The final status, once the stream has ended.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Check if the stream has finished.
    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// The call's context.
    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    /// Stop the call early.
    pub fn cancel(&mut self) {
        self.ctx.cancel(Status::cancelled("call cancelled by caller"));
    }

    /// Consume all remaining messages without processing them.
    ///
    /// Returns the number of messages that were drained (not including
    /// errors). The final status is available afterwards.
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(result) = self.next().await {
            if result.is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Drain remaining messages with a timeout.
    ///
    /// Returns `Ok(count)` if the stream was fully drained, or `Err(count)`
    /// if the timeout expired (where `count` is the number of messages
    /// drained before the timeout).
    pub async fn drain_timeout(&mut self, timeout: std::time::Duration) -> Result<usize, usize> {
        let mut count = 0;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(deadline) => {
                    return Err(count);
                }

                item = self.next() => {
                    match item {
                        Some(Ok(_)) => count += 1,
                        Some(Err(_)) => {}
                        None => return Ok(count),
                    }
                }
            }
        }
    }
}

impl<T> Stream for Streaming<T> {
    type Item = Result<T, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.status.is_some() {
            return Poll::Ready(None);
        }
        let item = ready!(self.inner.poll_next_unpin(cx));
        match &item {
            Some(Ok(_)) => {}
            Some(Err(status)) => {
                self.status = Some(status.clone());
                self.guard.disarm();
            }
            None => {
                self.status = Some(Status::ok());
                self.guard.disarm();
            }
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.status.is_some() {
            (0, Some(0))
        } else {
            self.inner.size_hint()
        }
    }
}

impl<T> std::fmt::Debug for Streaming<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streaming")
            .field("status", &self.status)
            .finish()
    }
}
