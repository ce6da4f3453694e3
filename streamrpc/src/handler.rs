//! Typed handler adapters.
//!
//! Handlers are plain async functions in one of four shapes. [`Method`]
//! erases their request and response types so they can live in one
//! [`Registry`](crate::Registry):
//!
//! | Shape | Handler signature |
//! |-------|-------------------|
//! | unary | `async fn(Req, CallContext) -> Result<Res, Status>` |
//! | server streaming | `async fn(Req, CallContext, Sender<Res>) -> Result<(), Status>` |
//! | client streaming | `async fn(Receiver<Req>, CallContext) -> Result<Res, Status>` |
//! | bidi streaming | `async fn(Receiver<Req>, Sender<Res>, CallContext) -> Result<(), Status>` |
//!
//! When a handler returns, its response stream is closed with the returned
//! status. A streaming handler may also close the stream itself; the returned
//! status is then ignored.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use streamrpc_core::{
    CallContext, CallShape, Encoding, FrameReceiver, FrameSender, Message, MessageLimits,
    Receiver, Sender, Status,
};

/// Everything a type-erased handler needs for one call.
pub struct CallIo {
    pub ctx: CallContext,
    pub encoding: Encoding,
    pub limits: MessageLimits,
    pub requests: FrameReceiver,
    pub responses: FrameSender,
}

impl CallIo {
    fn split<Req: Message, Res: Message>(self) -> (CallContext, Receiver<Req>, Sender<Res>) {
        let requests = Receiver::new(self.requests, self.ctx.clone(), self.encoding, self.limits);
        let responses = Sender::new(self.responses, self.ctx.clone(), self.encoding, self.limits);
        (self.ctx, requests, responses)
    }
}

type BoxHandler = Arc<dyn Fn(CallIo) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered handler together with its call shape.
#[derive(Clone)]
pub struct Method {
    shape: CallShape,
    handler: BoxHandler,
}

impl Method {
    /// Wrap a unary handler.
    pub fn unary<F, Fut, Req, Res>(handler: F) -> Self
    where
        F: Fn(Req, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        let handler = Arc::new(handler);
        Self::erase(CallShape::Unary, move |io| {
            let handler = Arc::clone(&handler);
            async move {
                let (ctx, mut requests, responses) = io.split::<Req, Res>();
                let result = async {
                    let request = single_request(&mut requests).await?;
                    let response = handler(request, ctx).await?;
                    responses.send(response).await
                }
                .await;
                complete(&responses, result).await;
            }
        })
    }

    /// Wrap a server-streaming handler.
    pub fn server_streaming<F, Fut, Req, Res>(handler: F) -> Self
    where
        F: Fn(Req, CallContext, Sender<Res>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        let handler = Arc::new(handler);
        Self::erase(CallShape::ServerStreaming, move |io| {
            let handler = Arc::clone(&handler);
            async move {
                let (ctx, mut requests, responses) = io.split::<Req, Res>();
                let result = match single_request(&mut requests).await {
                    Ok(request) => handler(request, ctx, responses.clone()).await,
                    Err(status) => Err(status),
                };
                complete(&responses, result).await;
            }
        })
    }

    /// Wrap a client-streaming handler.
    pub fn client_streaming<F, Fut, Req, Res>(handler: F) -> Self
    where
        F: Fn(Receiver<Req>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        let handler = Arc::new(handler);
        Self::erase(CallShape::ClientStreaming, move |io| {
            let handler = Arc::clone(&handler);
            async move {
                let (ctx, requests, responses) = io.split::<Req, Res>();
                let result = match handler(requests, ctx).await {
                    Ok(response) => responses.send(response).await,
                    Err(status) => Err(status),
                };
                complete(&responses, result).await;
            }
        })
    }

    /// Wrap a bidirectional-streaming handler.
    pub fn bidi_streaming<F, Fut, Req, Res>(handler: F) -> Self
    where
        F: Fn(Receiver<Req>, Sender<Res>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        let handler = Arc::new(handler);
        Self::erase(CallShape::BidiStreaming, move |io| {
            let handler = Arc::clone(&handler);
            async move {
                let (ctx, requests, responses) = io.split::<Req, Res>();
                let result = handler(requests, responses.clone(), ctx).await;
                complete(&responses, result).await;
            }
        })
    }

    fn erase<W, Fut>(shape: CallShape, wrapper: W) -> Self
    where
        W: Fn(CallIo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            shape,
            handler: Arc::new(move |io| Box::pin(wrapper(io)) as BoxFuture<'static, ()>),
        }
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }

    /// Run the handler for one call. Resolves once the response stream has
    /// been closed.
    pub fn call(&self, io: CallIo) -> BoxFuture<'static, ()> {
        (self.handler)(io)
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method").field("shape", &self.shape).finish()
    }
}

/// Read the one request of a unary or server-streaming call.
async fn single_request<Req: Message>(requests: &mut Receiver<Req>) -> Result<Req, Status> {
    requests
        .receive()
        .await?
        .ok_or_else(|| Status::invalid_argument("call closed without a request"))
}

/// Close the response stream with the handler's outcome.
async fn complete<Res: Message>(responses: &Sender<Res>, result: Result<(), Status>) {
    let status = match result {
        Ok(()) => Status::ok(),
        Err(status) => {
            tracing::debug!(code = %status.code(), "handler returned error: {}", status);
            status
        }
    };
    responses.finish(status).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use streamrpc_core::{Code, Frame, frame_channel};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    struct Num {
        #[prost(int64, tag = "1")]
        value: i64,
    }

    struct Harness {
        ctx: CallContext,
        requests: FrameSender,
        responses: FrameReceiver,
    }

    fn start(method: &Method) -> (Harness, tokio::task::JoinHandle<()>) {
        let ctx = CallContext::new();
        let (req_tx, req_rx) = frame_channel(8);
        let (res_tx, res_rx) = frame_channel(8);
        let io = CallIo {
            ctx: ctx.clone(),
            encoding: Encoding::Proto,
            limits: MessageLimits::default(),
            requests: req_rx,
            responses: res_tx,
        };
        let task = tokio::spawn(method.call(io));
        (
            Harness {
                ctx,
                requests: req_tx,
                responses: res_rx,
            },
            task,
        )
    }

    impl Harness {
        async fn send(&self, value: i64) {
            let bytes = Encoding::Proto.encode(&Num { value }).unwrap();
            self.requests.send(Frame::Message(bytes)).await.unwrap();
        }

        async fn close(&self) {
            self.requests.send(Frame::End(Status::ok())).await.unwrap();
        }

        async fn responses(mut self) -> (Vec<i64>, Status) {
            let mut values = Vec::new();
            loop {
                match self.responses.recv().await {
                    Some(Frame::Message(bytes)) => {
                        values.push(Encoding::Proto.decode::<Num>(&bytes).unwrap().value)
                    }
                    Some(Frame::End(status)) => return (values, status),
                    None => panic!("stream ended without a terminal frame"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_unary_adapter() {
        let method = Method::unary(|req: Num, _ctx| async move {
            Ok(Num {
                value: req.value * 2,
            })
        });
        assert_eq!(method.shape(), CallShape::Unary);

        let (harness, task) = start(&method);
        harness.send(21).await;
        harness.close().await;
        let (values, status) = harness.responses().await;
        task.await.unwrap();

        assert_eq!(values, vec![42]);
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn test_unary_without_request_is_invalid() {
        let method = Method::unary(|req: Num, _ctx| async move { Ok(req) });
        let (harness, task) = start(&method);
        harness.close().await;
        let (values, status) = harness.responses().await;
        task.await.unwrap();

        assert!(values.is_empty());
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_server_streaming_error_after_payloads() {
        let method = Method::server_streaming(|req: Num, _ctx, tx: Sender<Num>| async move {
            for value in 0..req.value {
                tx.send(Num { value }).await?;
            }
            Err(Status::internal("storage failed"))
        });

        let (harness, task) = start(&method);
        harness.send(3).await;
        harness.close().await;
        let (values, status) = harness.responses().await;
        task.await.unwrap();

        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(status.code(), Code::Internal);
    }

    #[tokio::test]
    async fn test_handler_close_wins_over_returned_status() {
        let method = Method::server_streaming(|_req: Num, _ctx, tx: Sender<Num>| async move {
            tx.close().await?;
            Err(Status::internal("ignored"))
        });

        let (harness, task) = start(&method);
        harness.send(1).await;
        let (_, status) = harness.responses().await;
        task.await.unwrap();
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn test_client_streaming_adapter() {
        let method = Method::client_streaming(|mut rx: Receiver<Num>, _ctx| async move {
            let mut total = 0;
            while let Some(msg) = rx.receive().await? {
                total += msg.value;
            }
            Ok(Num { value: total })
        });

        let (harness, task) = start(&method);
        for value in [1, 2, 3, 4] {
            harness.send(value).await;
        }
        harness.close().await;
        let (values, status) = harness.responses().await;
        task.await.unwrap();

        assert_eq!(values, vec![10]);
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn test_bidi_adapter_echoes() {
        let method = Method::bidi_streaming(
            |mut rx: Receiver<Num>, tx: Sender<Num>, _ctx| async move {
                while let Some(msg) = rx.receive().await? {
                    tx.send(msg).await?;
                }
                Ok(())
            },
        );

        let (harness, task) = start(&method);
        harness.send(5).await;
        harness.send(6).await;
        harness.close().await;
        let (values, status) = harness.responses().await;
        task.await.unwrap();

        assert_eq!(values, vec![5, 6]);
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_context_reaches_handler() {
        let method = Method::unary(|_req: Num, ctx: CallContext| async move {
            let reason = ctx.cancelled().await;
            Err::<Num, _>(reason)
        });

        let (harness, task) = start(&method);
        harness.send(1).await;
        harness.ctx.cancel(Status::cancelled("caller left"));
        task.await.unwrap();
    }
}
