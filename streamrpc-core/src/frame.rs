//! Frames carried by one direction of a call.
//!
//! A direction is a bounded queue of [`Frame`]s: zero or more
//! [`Frame::Message`] payloads followed by exactly one [`Frame::End`].
//! `End(Status::ok())` is the end-of-stream marker; any other status is the
//! error terminal.
//!
//! Next to the queue sits a terminal slot. [`FrameSender::end_now`] parks the
//! final status there when the queue is full, and the reader receives it as
//! an `End` frame once it has drained the queued payloads. A full queue can
//! therefore delay the terminal but never lose it.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, error::SendError, error::TrySendError};

use crate::Status;

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// An encoded payload.
    Message(Bytes),
    /// Terminal marker. Nothing follows it.
    End(Status),
}

impl Frame {
    pub fn is_end(&self) -> bool {
        matches!(self, Frame::End(_))
    }
}

#[derive(Debug, Default)]
struct TerminalSlot {
    status: OnceLock<Status>,
    notify: Notify,
}

/// Writing end of a frame queue.
#[derive(Clone, Debug)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
    slot: Arc<TerminalSlot>,
}

impl FrameSender {
    /// Queue a frame, waiting for room.
    pub async fn send(&self, frame: Frame) -> Result<(), SendError<Frame>> {
        self.tx.send(frame).await
    }

    /// Wait for room in the queue.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, Frame>, SendError<()>> {
        self.tx.reserve().await
    }

    /// Deliver `status` as the terminal without waiting for room.
    ///
    /// If the queue is full the status goes to the terminal slot. Only the
    /// first parked status is kept.
    pub fn end_now(&self, status: Status) {
        match self.tx.try_send(Frame::End(status)) {
            Err(TrySendError::Full(Frame::End(status))) => {
                if self.slot.status.set(status).is_ok() {
                    self.slot.notify.notify_one();
                }
            }
            Ok(()) | Err(_) => {}
        }
    }

    /// Whether the reading end has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the reading end has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Reading end of a frame queue.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Frame>,
    slot: Arc<TerminalSlot>,
    slot_taken: bool,
}

impl FrameReceiver {
    /// Wait for the next frame.
    ///
    /// Queued frames come first. A parked terminal is returned once the queue
    /// is empty. `None` means every writer is gone and nothing was parked.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if let Ok(frame) = self.rx.try_recv() {
                return Some(frame);
            }
            if let Some(frame) = self.take_parked() {
                return Some(frame);
            }
            tokio::select! {
                frame = self.rx.recv() => {
                    return frame.or_else(|| self.take_parked());
                }
                _ = self.slot.notify.notified() => {}
            }
        }
    }

    /// Stop accepting frames. Writers see the queue as closed.
    pub fn close(&mut self) {
        self.rx.close();
        self.slot_taken = true;
    }

    fn take_parked(&mut self) -> Option<Frame> {
        if self.slot_taken {
            return None;
        }
        let status = self.slot.status.get()?.clone();
        self.slot_taken = true;
        Some(Frame::End(status))
    }
}

/// Create a bounded frame queue.
///
/// Once `capacity` frames are queued, writers wait until the reader catches
/// up. A capacity of zero is raised to one.
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let slot = Arc::new(TerminalSlot::default());
    (
        FrameSender {
            tx,
            slot: Arc::clone(&slot),
        },
        FrameReceiver {
            rx,
            slot,
            slot_taken: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn message(text: &'static str) -> Frame {
        Frame::Message(Bytes::from_static(text.as_bytes()))
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (tx, mut rx) = frame_channel(4);
        tx.send(message("a")).await.unwrap();
        tx.send(message("b")).await.unwrap();
        tx.send(Frame::End(Status::ok())).await.unwrap();

        assert_eq!(rx.recv().await, Some(message("a")));
        assert_eq!(rx.recv().await, Some(message("b")));
        assert!(rx.recv().await.unwrap().is_end());
    }

    #[tokio::test]
    async fn test_zero_capacity_is_usable() {
        let (tx, mut rx) = frame_channel(0);
        tx.send(Frame::End(Status::ok())).await.unwrap();
        assert_eq!(rx.recv().await, Some(Frame::End(Status::ok())));
    }

    #[tokio::test]
    async fn test_end_now_with_room_is_queued() {
        let (tx, mut rx) = frame_channel(2);
        tx.send(message("a")).await.unwrap();
        tx.end_now(Status::internal("stop"));

        assert_eq!(rx.recv().await, Some(message("a")));
        assert_eq!(rx.recv().await, Some(Frame::End(Status::internal("stop"))));
    }

    #[tokio::test]
    async fn test_end_now_on_full_queue_follows_queued_frames() {
        let (tx, mut rx) = frame_channel(2);
        tx.send(message("a")).await.unwrap();
        tx.send(message("b")).await.unwrap();
        tx.end_now(Status::deadline_exceeded("too slow"));
        tx.end_now(Status::cancelled("second terminal is ignored"));
        drop(tx);

        assert_eq!(rx.recv().await, Some(message("a")));
        assert_eq!(rx.recv().await, Some(message("b")));
        assert_eq!(
            rx.recv().await,
            Some(Frame::End(Status::deadline_exceeded("too slow")))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parked_terminal_reaches_waiting_reader_while_writers_live() {
        let (tx, mut rx) = frame_channel(1);
        tx.send(message("a")).await.unwrap();
        tx.end_now(Status::cancelled("caller left"));

        assert_eq!(rx.recv().await, Some(message("a")));
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(next.unwrap(), Some(Frame::End(Status::cancelled("caller left"))));
        drop(tx);
    }

    #[tokio::test]
    async fn test_closed_receiver_ignores_parked_terminal() {
        let (tx, mut rx) = frame_channel(1);
        tx.send(message("a")).await.unwrap();
        tx.end_now(Status::internal("late"));
        rx.close();

        assert!(tx.is_closed());
        assert_eq!(rx.recv().await, Some(message("a")));
        assert_eq!(rx.recv().await, None);
    }
}
