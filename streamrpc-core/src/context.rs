//! Per-call deadline and cancellation state.
//!
//! A [`CallContext`] is shared by both ends of one call. It becomes cancelled
//! when someone calls [`CallContext::cancel`], when its deadline passes, or
//! when the context it was derived from is cancelled. The first reason
//! recorded is the one every observer sees.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Status;

/// Deadline and cancellation carrier for a single call.
///
/// Cloning is cheap and every clone observes the same state.
///
/// Handlers doing long work check the context between work units:
///
/// ```
/// use std::time::Duration;
/// use streamrpc_core::{CallContext, Code, Status};
///
/// fn work(ctx: &CallContext) -> Result<u32, Status> {
///     let mut done = 0;
///     for _ in 0..3 {
///         ctx.check()?;
///         done += 1;
///     }
///     Ok(done)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = CallContext::with_deadline(Duration::ZERO);
/// assert_eq!(work(&ctx).unwrap_err().code(), Code::DeadlineExceeded);
/// # }
/// ```
#[derive(Clone)]
pub struct CallContext {
    inner: Arc<Inner>,
}

struct Inner {
    token: CancellationToken,
    reason: OnceLock<Status>,
    deadline: Option<Instant>,
    parent: Option<CallContext>,
}

impl CallContext {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self::build(CancellationToken::new(), None, None)
    }

    /// A context that cancels itself with `DeadlineExceeded` after `timeout`.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self::with_deadline_at(Instant::now() + timeout)
    }

    /// A context that cancels itself with `DeadlineExceeded` at `deadline`.
    pub fn with_deadline_at(deadline: Instant) -> Self {
        Self::build(CancellationToken::new(), Some(deadline), None)
    }

    fn build(token: CancellationToken, deadline: Option<Instant>, parent: Option<CallContext>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                reason: OnceLock::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Derive a context for the serving side of a call.
    ///
    /// The child is cancelled whenever this context is, with the same reason.
    /// Its deadline is the earlier of this context's deadline and `timeout`
    /// from now. Cancelling the child does not cancel the parent.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let local = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.inner.deadline, local) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self::build(self.inner.token.child_token(), deadline, Some(self.clone()))
    }

    /// The instant this context expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline. `Some(Duration::ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel the call. Only the first reason is kept; later calls are no-ops.
    pub fn cancel(&self, reason: Status) {
        if self.inner.reason.set(reason).is_ok() {
            self.inner.token.cancel();
        }
    }

    /// Non-blocking poll. Also notices an elapsed deadline.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The cancellation reason, or `None` while the call is live.
    pub fn reason(&self) -> Option<Status> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(reason.clone());
        }
        if let Some(parent) = &self.inner.parent {
            if let Some(reason) = parent.reason() {
                return Some(self.inner.reason.get_or_init(|| reason).clone());
            }
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                self.cancel(Status::deadline_exceeded("deadline exceeded"));
            }
        }
        self.inner.reason.get().cloned()
    }

    /// `Err(reason)` once cancelled. Meant for `?` at handler checkpoints.
    pub fn check(&self) -> Result<(), Status> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Wait until the context is cancelled and return the reason.
    pub async fn cancelled(&self) -> Status {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        self.cancel(Status::deadline_exceeded("deadline exceeded"));
                    }
                }
            }
            None => self.inner.token.cancelled().await,
        }
        self.reason()
            .unwrap_or_else(|| Status::cancelled("call cancelled"))
    }

    /// Run `fut` unless the context is cancelled first.
    ///
    /// Cancellation is checked before `fut` is polled, so an already
    /// cancelled context never runs it.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, Status> {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            out = fut => Ok(out),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("deadline", &self.inner.deadline)
            .field("reason", &self.inner.reason.get())
            .finish()
    }
}
