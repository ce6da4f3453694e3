//! Call dispatch.
//!
//! A [`Server`] owns a [`Registry`] and a [`ServerConfig`]. Each accepted
//! call gets its own pair of frame queues, a context derived from the
//! caller's, and its own spawned task running the handler. A failing or
//! panicking handler only ends its own call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use streamrpc_core::{
    CallContext, CallHeader, MessageLimits, OpenCall, Status, Transport, TransportSecurity,
    frame_channel,
};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::handler::CallIo;
use crate::registry::Registry;
use crate::timeout::compute_effective_timeout;

/// How long a handler may keep running after its call has ended before its
/// task is aborted.
const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Errors returned by [`ServerBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerBuildError {
    #[error("no handler registry configured")]
    MissingRegistry,
    #[error("transport security enabled but no security provider configured")]
    MissingSecurityProvider,
}

/// Builder for [`Server`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use streamrpc::{Registry, Server};
///
/// let server = Server::builder()
///     .registry(Registry::builder().build().unwrap())
///     .channel_capacity(32)
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(server.config().channel_capacity, 32);
/// ```
#[derive(Default)]
pub struct ServerBuilder {
    registry: Option<Registry>,
    config: ServerConfig,
    security: Option<Arc<dyn TransportSecurity>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handlers this server dispatches to.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Frames buffered per direction of a call. Default is 16.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Upper bound on the duration of any call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.server_timeout = Some(timeout);
        self
    }

    /// Set custom message size limits.
    ///
    /// Default is 4 MB.
    pub fn message_limits(mut self, limits: MessageLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Require every call to pass the security provider.
    pub fn transport_security(mut self, enabled: bool) -> Self {
        self.config.transport_security = enabled;
        self
    }

    /// Provider consulted when transport security is enabled.
    pub fn security_provider(mut self, provider: impl TransportSecurity) -> Self {
        self.security = Some(Arc::new(provider));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let registry = self.registry.ok_or(ServerBuildError::MissingRegistry)?;
        let security = if self.config.transport_security {
            Some(self.security.ok_or(ServerBuildError::MissingSecurityProvider)?)
        } else {
            None
        };
        if let Some(security) = &security {
            tracing::info!(provider = security.name(), "transport security enabled");
        }
        Ok(Server {
            inner: Arc::new(ServerInner {
                registry,
                config: self.config,
                security,
            }),
        })
    }
}

/// Dispatches calls to registered handlers.
///
/// Cheap to clone; clones share the registry and configuration.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    registry: Registry,
    config: ServerConfig,
    security: Option<Arc<dyn TransportSecurity>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// An in-process connection to this server.
    pub fn connect(&self) -> Connection {
        Connection {
            server: self.clone(),
        }
    }

    /// Accept a call and start its handler.
    ///
    /// Fails before any handler runs if the context is already cancelled,
    /// the caller is not authorized, the operation is unknown
    /// (`Unimplemented`) or registered with a different shape
    /// (`InvalidArgument`).
    pub fn dispatch(&self, header: CallHeader, ctx: CallContext) -> Result<OpenCall, Status> {
        ctx.check()?;

        if let Some(security) = &self.inner.security {
            security.authorize(&header)?;
        }

        let method = self
            .inner
            .registry
            .lookup(&header.operation)
            .ok_or_else(|| {
                Status::unimplemented(format!("unknown operation: {}", header.operation))
            })?
            .clone();

        if method.shape() != header.shape {
            return Err(Status::invalid_argument(format!(
                "operation {} is {}, called as {}",
                header.operation,
                method.shape(),
                header.shape
            )));
        }

        let config = &self.inner.config;
        let timeout = compute_effective_timeout(config.server_timeout, ctx.remaining());
        let call_ctx = ctx.child(timeout);

        let (requests_tx, requests_rx) = frame_channel(config.channel_capacity);
        let (responses_tx, responses_rx) = frame_channel(config.channel_capacity);

        let span = tracing::info_span!(
            "rpc.call",
            rpc.method = %header.operation,
            rpc.type = header.shape.as_str(),
            rpc.encoding = header.encoding.as_str(),
            otel.kind = "server",
        );

        let io = CallIo {
            ctx: call_ctx.clone(),
            encoding: header.encoding,
            limits: config.limits,
            requests: requests_rx,
            responses: responses_tx.clone(),
        };

        tokio::spawn(
            async move {
                tracing::debug!(?timeout, "call accepted");
                let mut task = tokio::spawn(method.call(io).in_current_span());
                let joined = tokio::select! {
                    biased;
                    joined = &mut task => joined,
                    reason = call_ctx.cancelled() => {
                        // The caller hears the reason now, whatever the handler does.
                        tracing::debug!(code = %reason.code(), "call ended before its handler");
                        responses_tx.end_now(reason);
                        match tokio::time::timeout(CANCEL_GRACE, &mut task).await {
                            Ok(joined) => joined,
                            Err(_) => {
                                tracing::warn!("handler ignored cancellation, aborting it");
                                task.abort();
                                return;
                            }
                        }
                    }
                };
                match joined {
                    Ok(()) => tracing::debug!("call finished"),
                    Err(err) if err.is_panic() => {
                        tracing::warn!("handler panicked");
                        responses_tx.end_now(Status::internal("handler panicked"));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "handler task aborted");
                        responses_tx.end_now(Status::internal("handler aborted"));
                    }
                }
            }
            .instrument(span),
        );

        Ok(OpenCall {
            requests: requests_tx,
            responses: responses_rx,
        })
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("operations", &self.inner.registry.len())
            .field("config", &self.inner.config)
            .field(
                "security",
                &self.inner.security.as_ref().map(|s| s.name()),
            )
            .finish()
    }
}

/// In-process connection to a [`Server`].
///
/// Every call opened on it is an independent logical channel.
#[derive(Clone, Debug)]
pub struct Connection {
    server: Server,
}

impl Transport for Connection {
    fn open(&self, header: CallHeader, ctx: CallContext) -> BoxFuture<'_, Result<OpenCall, Status>> {
        Box::pin(async move { self.server.dispatch(header, ctx) })
    }
}
