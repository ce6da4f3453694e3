//! The seam between callers and servers.
//!
//! A [`Transport`] opens one logical call at a time and hands back the
//! caller's ends of its two frame queues. How the frames physically travel
//! is up to the implementation; the in-process connection in `streamrpc`
//! passes them directly to the dispatched handler.

use futures::future::BoxFuture;

use crate::{CallContext, CallHeader, FrameReceiver, FrameSender, Status};

/// The caller's side of an opened call.
#[derive(Debug)]
pub struct OpenCall {
    /// Requests flow to the handler through here.
    pub requests: FrameSender,
    /// Responses and the final status arrive here.
    pub responses: FrameReceiver,
}

/// Opens calls.
///
/// `open` resolves once the call has been accepted. Dispatch failures
/// (unknown operation, rejected credentials, a context cancelled before
/// dispatch) are returned here, before any handler runs.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, header: CallHeader, ctx: CallContext) -> BoxFuture<'_, Result<OpenCall, Status>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn open(&self, header: CallHeader, ctx: CallContext) -> BoxFuture<'_, Result<OpenCall, Status>> {
        (**self).open(header, ctx)
    }
}
