//! Typed RPC client.
//!
//! A [`Client`] opens calls through a [`Transport`] and wraps the two frame
//! queues of each call in typed channels. Every call runs in a context of its
//! own, derived from the one given in [`CallOptions`] (or a fresh one), so
//! abandoning a call never cancels the caller's context.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use streamrpc_core::{
    CallContext, CallHeader, CallShape, Encoding, Message, MessageLimits, Receiver, Sender,
    Status, Transport,
};

use crate::builder::ClientBuilder;
use crate::call::{BidiStreamingCall, ClientStreamingCall, single_response, unless_peer_closed};
use crate::options::CallOptions;
use crate::streaming::{CancelGuard, Streaming};

/// Client for calling operations on a server.
///
/// Cheap to clone; clones share the transport.
///
/// # Example
///
/// ```ignore
/// use streamrpc_client::Client;
///
/// let client = Client::builder(server.connect()).use_proto().build();
///
/// let res: SumResponse = client
///     .call_unary("calculator.CalculatorService/Sum", SumRequest { a: 3, b: 10 })
///     .await?;
/// assert_eq!(res.sum, 13);
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    encoding: Encoding,
    limits: MessageLimits,
    default_timeout: Option<Duration>,
    credentials: Option<String>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("encoding", &self.encoding)
            .field("limits", &self.limits)
            .field("default_timeout", &self.default_timeout)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl Client {
    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        encoding: Encoding,
        limits: MessageLimits,
        default_timeout: Option<Duration>,
        credentials: Option<String>,
    ) -> Self {
        Self {
            transport,
            encoding,
            limits,
            default_timeout,
            credentials,
        }
    }

    /// Create a new client builder.
    pub fn builder(transport: impl Transport) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// The payload encoding used for every call.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    // ========================================================================
    // Unary
    // ========================================================================

    /// Make a unary call.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let greeting: GreetResponse = client
    ///     .call_unary("greet.GreetService/Greet", GreetRequest { first_name: "Ada".into() })
    ///     .await?;
    /// ```
    pub async fn call_unary<Req, Res>(&self, operation: &str, request: Req) -> Result<Res, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.call_unary_with_options(operation, request, CallOptions::default())
            .await
    }

    /// Make a unary call with per-call options.
    pub async fn call_unary_with_options<Req, Res>(
        &self,
        operation: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Res, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.traced(operation, CallShape::Unary, async {
            let ctx = self.context(&options);
            let (tx, mut rx) = self
                .open::<Req, Res>(operation, CallShape::Unary, &ctx)
                .await?;
            let mut guard = CancelGuard::new(ctx);

            let sent = tx.send(request).await;
            unless_peer_closed(&tx, sent)?;
            let closed = tx.close().await;
            unless_peer_closed(&tx, closed)?;

            let response = single_response(&mut rx).await;
            guard.disarm();
            response
        })
        .await
    }

    // ========================================================================
    // Server streaming
    // ========================================================================

    /// Make a server-streaming call.
    ///
    /// The returned [`Streaming`] yields responses in order. Dropping it
    /// before the end cancels the call.
    pub async fn call_server_stream<Req, Res>(
        &self,
        operation: &str,
        request: Req,
    ) -> Result<Streaming<Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.call_server_stream_with_options(operation, request, CallOptions::default())
            .await
    }

    /// Make a server-streaming call with per-call options.
    pub async fn call_server_stream_with_options<Req, Res>(
        &self,
        operation: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Streaming<Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.traced(operation, CallShape::ServerStreaming, async {
            let ctx = self.context(&options);
            let (tx, rx) = self
                .open::<Req, Res>(operation, CallShape::ServerStreaming, &ctx)
                .await?;
            let stream = Streaming::new(rx);

            let sent = tx.send(request).await;
            unless_peer_closed(&tx, sent)?;
            let closed = tx.close().await;
            unless_peer_closed(&tx, closed)?;

            Ok(stream)
        })
        .await
    }

    // ========================================================================
    // Client streaming
    // ========================================================================

    /// Open a client-streaming call.
    ///
    /// Push requests with [`ClientStreamingCall::send`], then
    /// [`close_and_receive`](ClientStreamingCall::close_and_receive).
    pub async fn call_client_stream<Req, Res>(
        &self,
        operation: &str,
    ) -> Result<ClientStreamingCall<Req, Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.call_client_stream_with_options(operation, CallOptions::default())
            .await
    }

    /// Open a client-streaming call with per-call options.
    pub async fn call_client_stream_with_options<Req, Res>(
        &self,
        operation: &str,
        options: CallOptions,
    ) -> Result<ClientStreamingCall<Req, Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.traced(operation, CallShape::ClientStreaming, async {
            let ctx = self.context(&options);
            let (tx, rx) = self
                .open::<Req, Res>(operation, CallShape::ClientStreaming, &ctx)
                .await?;
            Ok(ClientStreamingCall::new(tx, rx))
        })
        .await
    }

    /// Send every item of `requests` on a client-streaming call and wait for
    /// the response.
    ///
    /// If the handler answers before consuming all requests, the rest are not
    /// sent and its answer is returned.
    pub async fn call_client_stream_from<Req, Res, S>(
        &self,
        operation: &str,
        requests: S,
    ) -> Result<Res, Status>
    where
        Req: Message,
        Res: Message,
        S: Stream<Item = Req> + Send,
    {
        self.traced(operation, CallShape::ClientStreaming, async {
            let ctx = self.context(&CallOptions::default());
            let (tx, rx) = self
                .open::<Req, Res>(operation, CallShape::ClientStreaming, &ctx)
                .await?;
            let call = ClientStreamingCall::new(tx, rx);
            let mut requests = std::pin::pin!(requests);
            while let Some(msg) = requests.next().await {
                if let Err(status) = call.send(msg).await {
                    if call.is_peer_closed() {
                        break;
                    }
                    return Err(status);
                }
            }
            call.close_and_receive().await
        })
        .await
    }

    // ========================================================================
    // Bidirectional streaming
    // ========================================================================

    /// Open a bidirectional-streaming call.
    pub async fn call_bidi_stream<Req, Res>(
        &self,
        operation: &str,
    ) -> Result<BidiStreamingCall<Req, Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.call_bidi_stream_with_options(operation, CallOptions::default())
            .await
    }

    /// Open a bidirectional-streaming call with per-call options.
    pub async fn call_bidi_stream_with_options<Req, Res>(
        &self,
        operation: &str,
        options: CallOptions,
    ) -> Result<BidiStreamingCall<Req, Res>, Status>
    where
        Req: Message,
        Res: Message,
    {
        self.traced(operation, CallShape::BidiStreaming, async {
            let ctx = self.context(&options);
            let (tx, rx) = self
                .open::<Req, Res>(operation, CallShape::BidiStreaming, &ctx)
                .await?;
            Ok(BidiStreamingCall::new(tx, rx))
        })
        .await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn context(&self, options: &CallOptions) -> CallContext {
        let timeout = options.timeout.or(self.default_timeout);
        match &options.context {
            Some(parent) => parent.child(timeout),
            None => CallContext::new().child(timeout),
        }
    }

    async fn open<Req: Message, Res: Message>(
        &self,
        operation: &str,
        shape: CallShape,
        ctx: &CallContext,
    ) -> Result<(Sender<Req>, Receiver<Res>), Status> {
        let mut header = CallHeader::new(operation, shape, self.encoding);
        if let Some(credentials) = &self.credentials {
            header = header.with_credentials(credentials.clone());
        }

        let call = ctx
            .run_until_cancelled(self.transport.open(header, ctx.clone()))
            .await??;

        let tx = Sender::new(call.requests, ctx.clone(), self.encoding, self.limits);
        let rx = Receiver::new(call.responses, ctx.clone(), self.encoding, self.limits);
        Ok((tx, rx))
    }

    /// Run `call` inside the client `rpc.call` span, logging a failure.
    async fn traced<T, F>(&self, operation: &str, shape: CallShape, call: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        #[cfg(feature = "tracing")]
        let call = tracing::Instrument::instrument(call, self.span(operation, shape));

        let result = call.await;
        #[cfg(feature = "tracing")]
        if let Err(status) = &result {
            tracing::debug!(
                rpc.method = %operation,
                rpc.type = shape.as_str(),
                code = %status.code(),
                "call failed"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = (operation, shape);
        result
    }

    #[cfg(feature = "tracing")]
    fn span(&self, operation: &str, shape: CallShape) -> tracing::Span {
        tracing::info_span!(
            "rpc.call",
            rpc.method = %operation,
            rpc.type = shape.as_str(),
            rpc.encoding = self.encoding.as_str(),
            otel.kind = "client",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use streamrpc::{Registry, Server, ServerBuilder};
    use streamrpc_core::Code;
    use tokio::sync::mpsc;

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    struct Num {
        #[prost(int64, tag = "1")]
        value: i64,
    }

    fn num(value: i64) -> Num {
        Num { value }
    }

    async fn double(req: Num, _ctx: CallContext) -> Result<Num, Status> {
        Ok(num(req.value * 2))
    }

    async fn stall(_req: Num, _ctx: CallContext) -> Result<Num, Status> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(num(0))
    }

    async fn count_up(req: Num, _ctx: CallContext, tx: Sender<Num>) -> Result<(), Status> {
        for value in 1..=req.value {
            tx.send(num(value)).await?;
        }
        Ok(())
    }

    async fn sum(mut rx: Receiver<Num>, _ctx: CallContext) -> Result<Num, Status> {
        let mut total = 0;
        while let Some(n) = rx.receive().await? {
            total += n.value;
        }
        Ok(num(total))
    }

    async fn first_only(mut rx: Receiver<Num>, _ctx: CallContext) -> Result<Num, Status> {
        let first = rx.receive().await?.unwrap_or_default();
        Ok(first)
    }

    async fn echo(mut rx: Receiver<Num>, tx: Sender<Num>, _ctx: CallContext) -> Result<(), Status> {
        while let Some(n) = rx.receive().await? {
            tx.send(n).await?;
        }
        Ok(())
    }

    async fn take_two(mut rx: Receiver<Num>, tx: Sender<Num>, _ctx: CallContext) -> Result<(), Status> {
        for _ in 0..2 {
            if let Some(n) = rx.receive().await? {
                tx.send(n).await?;
            }
        }
        Ok(())
    }

    async fn reject_negative(
        mut rx: Receiver<Num>,
        tx: Sender<Num>,
        _ctx: CallContext,
    ) -> Result<(), Status> {
        while let Some(n) = rx.receive().await? {
            if n.value < 0 {
                return Err(Status::invalid_argument("negative value"));
            }
            tx.send(n).await?;
        }
        Ok(())
    }

    async fn flood(_req: Num, _ctx: CallContext, tx: Sender<Num>) -> Result<(), Status> {
        let mut value = 0;
        loop {
            value += 1;
            tx.send(num(value)).await?;
        }
    }

    /// Answers every second request with the sum of the pair, then a burst
    /// of five totals once the input ends.
    async fn pair_sums(
        mut rx: Receiver<Num>,
        tx: Sender<Num>,
        _ctx: CallContext,
    ) -> Result<(), Status> {
        let mut pending = None;
        let mut total = 0;
        while let Some(n) = rx.receive().await? {
            total += n.value;
            match pending.take() {
                Some(first) => tx.send(num(first + n.value)).await?,
                None => pending = Some(n.value),
            }
        }
        if let Some(first) = pending {
            tx.send(num(first)).await?;
        }
        for _ in 0..5 {
            tx.send(num(total)).await?;
        }
        Ok(())
    }

    /// Streams until the caller goes away, then reports why.
    async fn forever(report: mpsc::UnboundedSender<Status>, tx: Sender<Num>) -> Result<(), Status> {
        let mut value = 0;
        loop {
            value += 1;
            if let Err(status) = tx.send(num(value)).await {
                let _ = report.send(status.clone());
                return Err(status);
            }
            tokio::task::yield_now().await;
        }
    }

    fn registry(report: mpsc::UnboundedSender<Status>) -> Registry {
        Registry::builder()
            .unary("test.Math/Double", double)
            .unary("test.Math/Stall", stall)
            .server_streaming("test.Math/CountUp", count_up)
            .server_streaming(
                "test.Math/Forever",
                move |_req: Num, _ctx: CallContext, tx: Sender<Num>| forever(report.clone(), tx),
            )
            .client_streaming("test.Math/Sum", sum)
            .client_streaming("test.Math/FirstOnly", first_only)
            .bidi_streaming("test.Math/Echo", echo)
            .bidi_streaming("test.Math/TakeTwo", take_two)
            .bidi_streaming("test.Math/RejectNegative", reject_negative)
            .server_streaming("test.Math/Flood", flood)
            .bidi_streaming("test.Math/PairSums", pair_sums)
            .build()
            .unwrap()
    }

    fn client() -> Client {
        client_with_report().0
    }

    fn client_with_report() -> (Client, mpsc::UnboundedReceiver<Status>) {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let server = Server::builder()
            .registry(registry(report_tx))
            .build()
            .unwrap();
        (Client::builder(server.connect()).build(), report_rx)
    }

    fn client_with_server(configure: impl FnOnce(ServerBuilder) -> ServerBuilder) -> Client {
        let (report_tx, _report_rx) = mpsc::unbounded_channel();
        let server = configure(Server::builder().registry(registry(report_tx)))
            .build()
            .unwrap();
        Client::builder(server.connect()).build()
    }

    #[tokio::test]
    async fn test_unary_call() {
        let client = client();
        let res: Num = client.call_unary("test.Math/Double", num(21)).await.unwrap();
        assert_eq!(res.value, 42);
    }

    #[tokio::test]
    async fn test_unary_call_with_proto() {
        let (report_tx, _report_rx) = mpsc::unbounded_channel();
        let server = Server::builder()
            .registry(registry(report_tx))
            .build()
            .unwrap();
        let client = Client::builder(server.connect()).use_proto().build();
        assert_eq!(client.encoding(), Encoding::Proto);

        let res: Num = client.call_unary("test.Math/Double", num(-4)).await.unwrap();
        assert_eq!(res.value, -8);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let client = client();
        let err = client
            .call_unary::<Num, Num>("test.Math/Missing", num(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_streaming_entry_points_report_dispatch_failures() {
        let client = client();
        let missing = "test.Math/Missing";

        let err = client
            .call_server_stream::<Num, Num>(missing, num(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        let err = client
            .call_client_stream::<Num, Num>(missing)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        let err = client
            .call_client_stream_from::<Num, Num, _>(missing, futures::stream::iter(vec![num(1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
        let err = client
            .call_bidi_stream::<Num, Num>(missing)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_pre_cancelled_context() {
        let client = client();
        let ctx = CallContext::new();
        ctx.cancel(Status::cancelled("user gave up"));

        let err = client
            .call_unary_with_options::<Num, Num>(
                "test.Math/Double",
                num(1),
                CallOptions::new().context(ctx),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_deadline() {
        let client = client();
        let err = client
            .call_unary_with_options::<Num, Num>(
                "test.Math/Stall",
                num(1),
                CallOptions::new().timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let (report_tx, _report_rx) = mpsc::unbounded_channel();
        let server = Server::builder()
            .registry(registry(report_tx))
            .build()
            .unwrap();
        let client = Client::builder(server.connect())
            .timeout(Duration::from_millis(50))
            .build();

        let err = client
            .call_unary::<Num, Num>("test.Math/Stall", num(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_finished_call_leaves_parent_context_alone() {
        let client = client();
        let ctx = CallContext::new();
        let _: Num = client
            .call_unary_with_options(
                "test.Math/Double",
                num(1),
                CallOptions::new().context(ctx.clone()),
            )
            .await
            .unwrap();
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_server_stream() {
        let client = client();
        let stream = client
            .call_server_stream::<Num, Num>("test.Math/CountUp", num(5))
            .await
            .unwrap();
        let values: Vec<i64> = stream.map(|r| r.unwrap().value).collect().await;
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_server_stream_empty() {
        let client = client();
        let mut stream = client
            .call_server_stream::<Num, Num>("test.Math/CountUp", num(0))
            .await
            .unwrap();
        assert!(stream.message().await.unwrap().is_none());
        assert!(stream.status().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_handler() {
        let (client, mut report) = client_with_report();
        let mut stream = client
            .call_server_stream::<Num, Num>("test.Math/Forever", num(0))
            .await
            .unwrap();
        assert_eq!(stream.message().await.unwrap().unwrap().value, 1);
        drop(stream);

        let status = report.recv().await.unwrap();
        assert_eq!(status.code(), Code::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_deadline_reaches_slow_reader_behind_full_queue() {
        let client = client_with_server(|server| {
            server
                .channel_capacity(2)
                .timeout(Duration::from_millis(50))
        });
        let mut stream = client
            .call_server_stream::<Num, Num>("test.Math/Flood", num(0))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut received = 0;
        let status = loop {
            match stream.message().await {
                Ok(Some(_)) => received += 1,
                Ok(None) => panic!("flood ended without an error"),
                Err(status) => break status,
            }
        };
        assert_eq!(received, 2);
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_deadline_ends_unary_call_promptly() {
        let client = client_with_server(|server| server.timeout(Duration::from_millis(50)));
        let started = tokio::time::Instant::now();
        let err = client
            .call_unary::<Num, Num>("test.Math/Stall", num(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_client_stream() {
        let client = client();
        let call = client
            .call_client_stream::<Num, Num>("test.Math/Sum")
            .await
            .unwrap();
        for value in [1, 2, 3, 4] {
            call.send(num(value)).await.unwrap();
        }
        assert_eq!(call.close_and_receive().await.unwrap().value, 10);
    }

    #[tokio::test]
    async fn test_client_stream_without_requests() {
        let client = client();
        let call = client
            .call_client_stream::<Num, Num>("test.Math/Sum")
            .await
            .unwrap();
        assert_eq!(call.close_and_receive().await.unwrap().value, 0);
    }

    #[tokio::test]
    async fn test_client_stream_from_stops_when_handler_answers() {
        let client = client();
        let requests = futures::stream::iter((1..=100).map(num));
        let res: Num = client
            .call_client_stream_from("test.Math/FirstOnly", requests)
            .await
            .unwrap();
        assert_eq!(res.value, 1);
    }

    #[tokio::test]
    async fn test_bidi_collect() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/Echo")
            .await
            .unwrap();
        let requests = futures::stream::iter(vec![num(3), num(1), num(4)]);
        let responses = call.collect(requests).await.unwrap();
        let values: Vec<i64> = responses.iter().map(|n| n.value).collect();
        assert_eq!(values, vec![3, 1, 4]);
    }

    #[tokio::test]
    async fn test_bidi_handler_ends_early() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/TakeTwo")
            .await
            .unwrap();
        let requests = futures::stream::iter((1..=100).map(num));
        let responses = call.collect(requests).await.unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_bidi_handler_error() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/RejectNegative")
            .await
            .unwrap();
        let requests = futures::stream::iter(vec![num(1), num(-1), num(2)]);
        let err = call.collect(requests).await.unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidi_collect_ends_when_handler_fails_on_idle_input() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/RejectNegative")
            .await
            .unwrap();
        let requests = futures::stream::iter(vec![num(-1)]).chain(futures::stream::pending());

        let result = tokio::time::timeout(Duration::from_secs(2), call.collect(requests)).await;
        assert_eq!(result.unwrap().unwrap_err().code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_bidi_batching_handler_with_single_slot_queues() {
        let client = client_with_server(|server| server.channel_capacity(1));
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/PairSums")
            .await
            .unwrap();
        let requests = futures::stream::iter((1..=50).map(num));

        let responses = tokio::time::timeout(Duration::from_secs(5), call.collect(requests))
            .await
            .unwrap()
            .unwrap();
        let values: Vec<i64> = responses.iter().map(|n| n.value).collect();

        let mut expected: Vec<i64> = (1..=25).map(|k| 4 * k - 1).collect();
        expected.extend([1275; 5]);
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_bidi_drive_batching_handler() {
        let client = client_with_server(|server| server.channel_capacity(1));
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/PairSums")
            .await
            .unwrap();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        call.drive(futures::stream::iter((1..=51).map(num)), move |n| {
            let _ = seen_tx.send(n.value);
        })
        .await
        .unwrap();

        let mut seen = Vec::new();
        while let Some(value) = seen_rx.recv().await {
            seen.push(value);
        }
        assert_eq!(seen.len(), 25 + 1 + 5);
        assert_eq!(seen[25], 51);
        assert_eq!(seen[26..], [1326; 5]);
    }

    #[tokio::test]
    async fn test_bidi_split_interleaved() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/Echo")
            .await
            .unwrap();
        let (tx, mut rx) = call.split();

        for value in 1..=3 {
            tx.send(num(value)).await.unwrap();
            assert_eq!(rx.receive().await.unwrap().unwrap().value, value);
        }
        tx.close().await.unwrap();
        assert!(rx.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bidi_drive() {
        let client = client();
        let call = client
            .call_bidi_stream::<Num, Num>("test.Math/Echo")
            .await
            .unwrap();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        call.drive(futures::stream::iter(vec![num(7), num(8)]), move |n| {
            let _ = seen_tx.send(n.value);
        })
        .await
        .unwrap();

        assert_eq!(seen_rx.recv().await, Some(7));
        assert_eq!(seen_rx.recv().await, Some(8));
    }

    #[tokio::test]
    async fn test_credentials_checked_by_server() {
        let (report_tx, _report_rx) = mpsc::unbounded_channel();
        let server = Server::builder()
            .registry(registry(report_tx))
            .transport_security(true)
            .security_provider(streamrpc_core::SharedSecret::new("s3cret"))
            .build()
            .unwrap();

        let anonymous = Client::builder(server.connect()).build();
        let err = anonymous
            .call_unary::<Num, Num>("test.Math/Double", num(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let trusted = Client::builder(server.connect()).credentials("s3cret").build();
        let res: Num = trusted.call_unary("test.Math/Double", num(1)).await.unwrap();
        assert_eq!(res.value, 2);
    }
}
