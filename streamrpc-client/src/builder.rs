//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`Client`].

use std::sync::Arc;
use std::time::Duration;

use streamrpc_core::{Encoding, MessageLimits, Transport};

use crate::client::Client;

/// Builder for creating a [`Client`].
///
/// # Example
///
/// ```ignore
/// use streamrpc_client::ClientBuilder;
///
/// let client = ClientBuilder::new(server.connect())
///     .use_proto()
///     .timeout(Duration::from_secs(10))
///     .build();
/// ```
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    /// Payload encoding for every call.
    encoding: Encoding,
    /// Size limits for sent and received messages.
    limits: MessageLimits,
    /// Default timeout for calls.
    default_timeout: Option<Duration>,
    /// Credentials presented to the server's transport security.
    credentials: Option<String>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("encoding", &self.encoding)
            .field("limits", &self.limits)
            .field("default_timeout", &self.default_timeout)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder that opens calls through `transport`.
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            encoding: Encoding::Json, // Default to JSON, readable in logs
            limits: MessageLimits::default(),
            default_timeout: None,
            credentials: None,
        }
    }

    /// Use protobuf encoding for payloads.
    pub fn use_proto(mut self) -> Self {
        self.encoding = Encoding::Proto;
        self
    }

    /// Use JSON encoding for payloads (default).
    pub fn use_json(mut self) -> Self {
        self.encoding = Encoding::Json;
        self
    }

    /// Set the default timeout for all calls.
    ///
    /// Individual calls can override it with [`CallOptions::timeout`](crate::CallOptions::timeout).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set message size limits.
    ///
    /// Default is 4 MB.
    pub fn message_limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Present `credentials` on every call.
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn build(self) -> Client {
        Client::from_parts(
            self.transport,
            self.encoding,
            self.limits,
            self.default_timeout,
            self.credentials,
        )
    }
}
