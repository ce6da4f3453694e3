//! Operation registry.
//!
//! A [`Registry`] maps operation identifiers to [`Method`]s. It is built once
//! with a [`RegistryBuilder`], is immutable afterwards, and is handed to the
//! [`Server`](crate::Server) that dispatches against it. Lookups need no
//! locking.
//!
//! # Example
//!
//! ```rust
//! use streamrpc::{Registry, operation_path};
//! use streamrpc::core::{CallContext, Status};
//! # #[derive(Clone, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
//! # struct Ping { #[prost(string, tag = "1")] text: String }
//!
//! async fn echo(req: Ping, _ctx: CallContext) -> Result<Ping, Status> {
//!     Ok(req)
//! }
//!
//! let registry = Registry::builder()
//!     .unary(operation_path("echo.EchoService", "Echo"), echo)
//!     .build()
//!     .unwrap();
//! assert!(registry.lookup("echo.EchoService/Echo").is_some());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use streamrpc_core::{CallContext, Message, Receiver, Sender, Status};

use crate::handler::Method;

/// Build the identifier of `method` on `service`, e.g. `greet.GreetService/Greet`.
pub fn operation_path(service: &str, method: &str) -> String {
    format!("{}/{}", service, method)
}

/// Errors returned by [`RegistryBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("operation registered more than once: {0}")]
    DuplicateOperation(String),
    #[error("operation identifier must not be empty")]
    EmptyOperation,
}

/// Immutable mapping from operation identifier to handler.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    methods: Arc<HashMap<String, Method>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, operation: &str) -> Option<&Method> {
        self.methods.get(operation)
    }

    /// Registered operation identifiers, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut operations: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        operations.sort_unstable();
        operations
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Collects handlers for a [`Registry`].
///
/// Registration problems are reported by [`build`](Self::build), so the
/// builder can be chained without intermediate error handling.
#[derive(Default)]
pub struct RegistryBuilder {
    methods: HashMap<String, Method>,
    error: Option<RegistryError>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already wrapped [`Method`].
    pub fn method(mut self, operation: impl Into<String>, method: Method) -> Self {
        let operation = operation.into();
        if self.error.is_some() {
            return self;
        }
        if operation.is_empty() {
            self.error = Some(RegistryError::EmptyOperation);
        } else if self.methods.contains_key(&operation) {
            self.error = Some(RegistryError::DuplicateOperation(operation));
        } else {
            self.methods.insert(operation, method);
        }
        self
    }

    /// Register a unary handler.
    pub fn unary<F, Fut, Req, Res>(self, operation: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Req, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        self.method(operation, Method::unary(handler))
    }

    /// Register a server-streaming handler.
    pub fn server_streaming<F, Fut, Req, Res>(self, operation: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Req, CallContext, Sender<Res>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        self.method(operation, Method::server_streaming(handler))
    }

    /// Register a client-streaming handler.
    pub fn client_streaming<F, Fut, Req, Res>(self, operation: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Receiver<Req>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        self.method(operation, Method::client_streaming(handler))
    }

    /// Register a bidirectional-streaming handler.
    pub fn bidi_streaming<F, Fut, Req, Res>(self, operation: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Receiver<Req>, Sender<Res>, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Status>> + Send + 'static,
        Req: Message,
        Res: Message,
    {
        self.method(operation, Method::bidi_streaming(handler))
    }

    /// Apply a registration function, typically one exported by a service module.
    pub fn register(self, f: impl FnOnce(Self) -> Self) -> Self {
        f(self)
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        tracing::debug!(operations = self.methods.len(), "handler registry built");
        Ok(Registry {
            methods: Arc::new(self.methods),
        })
    }
}
