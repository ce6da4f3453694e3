//! Typed channel halves.
//!
//! A [`Sender`] and a [`Receiver`] are the two ends of one direction of a
//! call. They carry encoded [`Frame`]s over a bounded queue, so `send()`
//! waits when the reader falls behind. Both ends watch the call's
//! [`CallContext`]: once it is cancelled, pending and future operations fail
//! with the cancellation reason.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;

use crate::{
    CallContext, Encoding, Frame, FrameReceiver, FrameSender, Message, MessageLimits, Status,
    frame_channel,
};

/// Create a connected sender/receiver pair sharing one context.
pub fn channel<T: Message>(
    ctx: &CallContext,
    encoding: Encoding,
    limits: MessageLimits,
    capacity: usize,
) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = frame_channel(capacity);
    (
        Sender::new(tx, ctx.clone(), encoding, limits),
        Receiver::new(rx, ctx.clone(), encoding, limits),
    )
}

/// Write-only end of a stream.
///
/// Clones share the closed state: closing through one clone closes them all.
pub struct Sender<T> {
    tx: FrameSender,
    ctx: CallContext,
    encoding: Encoding,
    limits: MessageLimits,
    closed: Arc<AtomicBool>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            ctx: self.ctx.clone(),
            encoding: self.encoding,
            limits: self.limits,
            closed: self.closed.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Message> Sender<T> {
    pub fn new(tx: FrameSender, ctx: CallContext, encoding: Encoding, limits: MessageLimits) -> Self {
        Self {
            tx,
            ctx,
            encoding,
            limits,
            closed: Arc::new(AtomicBool::new(false)),
            _marker: PhantomData,
        }
    }

    /// Append a message to the stream.
    ///
    /// Waits while the queue is full. Fails with `Internal` once the stream
    /// is closed or the reader is gone, and with the cancellation reason if
    /// the call is cancelled first.
    pub async fn send(&self, msg: T) -> Result<(), Status> {
        if self.is_closed() {
            return Err(Status::internal("send on a closed stream"));
        }
        self.ctx.check()?;
        let payload = self.encoding.encode_limited(&msg, &self.limits)?;
        self.push(Frame::Message(payload)).await
    }

    /// Mark normal end of stream.
    pub async fn close(&self) -> Result<(), Status> {
        self.terminate(Status::ok()).await
    }

    /// End the stream with an error the reader will observe.
    pub async fn close_with_error(&self, status: Status) -> Result<(), Status> {
        self.terminate(status).await
    }

    /// Deliver `status` as the terminal marker unless the stream is already
    /// closed.
    ///
    /// Never fails. Waits for room in the queue until the call is cancelled;
    /// after that the marker is parked behind the queued payloads instead.
    pub async fn finish(&self, status: Status) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.ctx.is_cancelled() {
            self.tx.end_now(status);
            return;
        }
        tokio::select! {
            biased;
            permit = self.tx.reserve() => {
                if let Ok(permit) = permit {
                    permit.send(Frame::End(status));
                }
            }
            _ = self.ctx.cancelled() => self.tx.end_now(status),
        }
    }

    /// Whether this stream has been closed through any clone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the reading end has gone away.
    pub fn is_peer_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the reading end has gone away.
    pub async fn peer_closed(&self) {
        self.tx.closed().await
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    async fn terminate(&self, status: Status) -> Result<(), Status> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Status::internal("stream already closed"));
        }
        self.push(Frame::End(status)).await
    }

    async fn push(&self, frame: Frame) -> Result<(), Status> {
        tokio::select! {
            biased;
            reason = self.ctx.cancelled() => Err(reason),
            sent = self.tx.send(frame) => {
                sent.map_err(|_| {
                    self.ctx
                        .reason()
                        .unwrap_or_else(|| Status::internal("receiving side has gone away"))
                })
            }
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("encoding", &self.encoding)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

/// Read-only end of a stream.
pub struct Receiver<T> {
    rx: FrameReceiver,
    ctx: CallContext,
    encoding: Encoding,
    limits: MessageLimits,
    terminal: Option<Result<(), Status>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Message> Receiver<T> {
    pub fn new(rx: FrameReceiver, ctx: CallContext, encoding: Encoding, limits: MessageLimits) -> Self {
        Self {
            rx,
            ctx,
            encoding,
            limits,
            terminal: None,
            _marker: PhantomData,
        }
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(Some(msg))` for a payload, `Ok(None)` at end of stream and
    /// `Err(status)` for an error terminal. Once a terminal has been seen,
    /// every further call returns it again.
    pub async fn receive(&mut self) -> Result<Option<T>, Status> {
        if let Some(terminal) = &self.terminal {
            return terminal.clone().map(|()| None);
        }

        let frame = tokio::select! {
            biased;
            reason = self.ctx.cancelled() => return Err(self.terminate(Err(reason))),
            frame = self.rx.recv() => frame,
        };

        match frame {
            Some(Frame::Message(payload)) => {
                match self.encoding.decode_limited(&payload, &self.limits) {
                    Ok(msg) => Ok(Some(msg)),
                    Err(status) => Err(self.terminate(Err(status))),
                }
            }
            Some(Frame::End(status)) if status.is_ok() => {
                self.terminate(Ok(()));
                Ok(None)
            }
            Some(Frame::End(status)) => Err(self.terminate(Err(status))),
            None => {
                let reason = self
                    .ctx
                    .reason()
                    .unwrap_or_else(|| Status::cancelled("stream ended without a status"));
                Err(self.terminate(Err(reason)))
            }
        }
    }

    /// The terminal result, once one has been observed.
    pub fn terminal(&self) -> Option<&Result<(), Status>> {
        self.terminal.as_ref()
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    /// Convert into a stream that ends after the terminal.
    ///
    /// An error terminal is yielded once, as the last item.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<T, Status>> + Send {
        async_stream::stream! {
            loop {
                match self.receive().await {
                    Ok(Some(msg)) => yield Ok(msg),
                    Ok(None) => break,
                    Err(status) => {
                        yield Err(status);
                        break;
                    }
                }
            }
        }
    }

    /// Record the terminal and stop accepting frames. Returns the error, if any.
    fn terminate(&mut self, terminal: Result<(), Status>) -> Status {
        self.rx.close();
        let status = terminal.clone().err().unwrap_or_else(Status::ok);
        self.terminal = Some(terminal);
        status
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("encoding", &self.encoding)
            .field("terminal", &self.terminal)
            .finish()
    }
}
