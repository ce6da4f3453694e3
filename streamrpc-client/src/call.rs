//! Call objects for the request-streaming shapes.
//!
//! - [`ClientStreamingCall`]: push requests, then wait for the single response
//! - [`BidiStreamingCall`]: drive independent send and receive flows
//!
//! A bidirectional call runs its send flow and its receive flow as two
//! spawned tasks. The caller waits on one join point that completes only
//! after both flows have reached a terminal state.

use futures::{Stream, StreamExt};
use streamrpc_core::{CallContext, Message, Receiver, Sender, Status};
use tokio::task::JoinError;

use crate::streaming::CancelGuard;

/// Ignore a failed send or close when the handler has already stopped
/// reading. The response stream carries the real outcome in that case.
pub(crate) fn unless_peer_closed<T: Message>(
    tx: &Sender<T>,
    result: Result<(), Status>,
) -> Result<(), Status> {
    match result {
        Err(_) if tx.is_peer_closed() => Ok(()),
        other => other,
    }
}

/// Read exactly one response followed by a successful end of stream.
pub(crate) async fn single_response<T: Message>(rx: &mut Receiver<T>) -> Result<T, Status> {
    let response = rx
        .receive()
        .await?
        .ok_or_else(|| Status::internal("call completed without a response"))?;
    match rx.receive().await? {
        None => Ok(response),
        Some(_) => Err(Status::internal("call returned more than one response")),
    }
}

/// An open client-streaming call.
///
/// Dropping the call before [`close_and_receive`](Self::close_and_receive)
/// completes cancels it.
#[derive(Debug)]
pub struct ClientStreamingCall<Req, Res> {
    guard: CancelGuard,
    tx: Sender<Req>,
    rx: Receiver<Res>,
}

impl<Req: Message, Res: Message> ClientStreamingCall<Req, Res> {
    pub(crate) fn new(tx: Sender<Req>, rx: Receiver<Res>) -> Self {
        let guard = CancelGuard::new(tx.context().clone());
        Self { guard, tx, rx }
    }

    /// Send one request.
    ///
    /// Fails with `Internal` if the handler has stopped reading; call
    /// [`close_and_receive`](Self::close_and_receive) to learn why.
    pub async fn send(&self, msg: Req) -> Result<(), Status> {
        self.tx.send(msg).await
    }

    /// Signal end of input and wait for the aggregated response.
    pub async fn close_and_receive(mut self) -> Result<Res, Status> {
        let closed = self.tx.close().await;
        let result = match unless_peer_closed(&self.tx, closed) {
            Ok(()) => single_response(&mut self.rx).await,
            Err(status) => Err(status),
        };
        self.guard.disarm();
        result
    }

    /// Whether the handler has stopped reading requests.
    pub fn is_peer_closed(&self) -> bool {
        self.tx.is_peer_closed()
    }

    pub fn context(&self) -> &CallContext {
        self.tx.context()
    }
}

/// An open bidirectional-streaming call.
///
/// Either hand both halves to your own code with [`split`](Self::split), or
/// let [`drive`](Self::drive) run the two flows concurrently.
#[derive(Debug)]
pub struct BidiStreamingCall<Req, Res> {
    guard: CancelGuard,
    tx: Sender<Req>,
    rx: Receiver<Res>,
}

impl<Req: Message, Res: Message> BidiStreamingCall<Req, Res> {
    pub(crate) fn new(tx: Sender<Req>, rx: Receiver<Res>) -> Self {
        let guard = CancelGuard::new(tx.context().clone());
        Self { guard, tx, rx }
    }

    pub fn context(&self) -> &CallContext {
        self.tx.context()
    }

    /// Take both halves.
    ///
    /// The caller becomes responsible for closing the sender and for reading
    /// the receiver to its terminal. Both flows must run concurrently: a
    /// handler may wait for several requests before it answers.
    pub fn split(mut self) -> (Sender<Req>, Receiver<Res>) {
        self.guard.disarm();
        (self.tx, self.rx)
    }

    /// Send every item of `requests`, then close, while passing each
    /// response to `on_response`.
    ///
    /// Returns once both flows are done. The result is the receive flow's
    /// terminal status unless the send flow failed first for a reason other
    /// than the handler ending the stream early.
    pub async fn drive<S, F>(self, requests: S, mut on_response: F) -> Result<(), Status>
    where
        S: Stream<Item = Req> + Send + 'static,
        F: FnMut(Res) + Send + 'static,
    {
        self.run(requests, (), move |_, msg| on_response(msg)).await
    }

    /// Like [`drive`](Self::drive), collecting the responses in order.
    pub async fn collect<S>(self, requests: S) -> Result<Vec<Res>, Status>
    where
        S: Stream<Item = Req> + Send + 'static,
    {
        self.run(requests, Vec::new(), |responses, msg| responses.push(msg))
            .await
    }

    async fn run<S, A, F>(self, requests: S, acc: A, mut fold: F) -> Result<A, Status>
    where
        S: Stream<Item = Req> + Send + 'static,
        A: Send + 'static,
        F: FnMut(&mut A, Res) + Send + 'static,
    {
        let Self { mut guard, tx, mut rx } = self;

        let send_flow = tokio::spawn(send_all(tx, requests));
        let receive_flow = tokio::spawn(async move {
            let mut acc = acc;
            loop {
                match rx.receive().await {
                    Ok(Some(msg)) => fold(&mut acc, msg),
                    Ok(None) => return Ok(acc),
                    Err(status) => return Err(status),
                }
            }
        });

        let (sent, received) = tokio::join!(send_flow, receive_flow);
        guard.disarm();

        let sent = sent.map_err(|err| flow_failed("send", err))?;
        let received = received.map_err(|err| flow_failed("receive", err))?;
        match (sent, received) {
            (_, Err(status)) => Err(status),
            (Err(status), Ok(_)) => Err(status),
            (Ok(()), Ok(acc)) => Ok(acc),
        }
    }
}

/// Send flow of a driven bidirectional call.
///
/// Ends as soon as the call does, even while `requests` has nothing ready.
async fn send_all<Req: Message, S>(tx: Sender<Req>, requests: S) -> Result<(), Status>
where
    S: Stream<Item = Req> + Send,
{
    let mut requests = std::pin::pin!(requests);
    loop {
        let next = tokio::select! {
            biased;
            reason = tx.context().cancelled() => return Err(reason),
            _ = tx.peer_closed() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("handler stopped reading while requests were pending");
                return Ok(());
            }
            next = requests.next() => next,
        };
        let Some(msg) = next else {
            break;
        };
        if let Err(status) = tx.send(msg).await {
            if tx.is_peer_closed() {
                #[cfg(feature = "tracing")]
                tracing::debug!("handler ended the stream before all requests were sent");
                return Ok(());
            }
            // Tell the handler why its input ended.
            let _ = tx.close_with_error(status.clone()).await;
            return Err(status);
        }
    }
    let closed = tx.close().await;
    unless_peer_closed(&tx, closed)
}

fn flow_failed(flow: &str, err: JoinError) -> Status {
    Status::internal(format!("{} flow failed: {}", flow, err))
}
