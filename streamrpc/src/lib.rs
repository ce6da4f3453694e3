//! # streamrpc
//!
//! Server runtime for typed RPC calls in four shapes: unary,
//! server-streaming, client-streaming and bidirectional-streaming.
//!
//! Handlers are plain `async fn`s registered in an immutable [`Registry`].
//! A [`Server`] dispatches each incoming call to its handler in a task of
//! its own, wiring the handler to bounded, cancellation-aware message
//! channels.
//!
//! ## Getting Started
//!
//! ```rust
//! use streamrpc::prelude::*;
//! # #[derive(Clone, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
//! # struct Number { #[prost(int64, tag = "1")] value: i64 }
//!
//! async fn count_up(req: Number, ctx: CallContext, tx: Sender<Number>) -> Result<(), Status> {
//!     for value in 1..=req.value {
//!         ctx.check()?;
//!         tx.send(Number { value }).await?;
//!     }
//!     Ok(())
//! }
//!
//! let registry = Registry::builder()
//!     .server_streaming("demo.Counter/CountUp", count_up)
//!     .build()
//!     .unwrap();
//! let server = Server::builder().registry(registry).build().unwrap();
//! let _connection = server.connect();
//! ```

pub mod config;
pub mod handler;
pub mod registry;
pub mod server;
pub mod timeout;

pub use config::ServerConfig;
pub use handler::{CallIo, Method};
pub use registry::{Registry, RegistryBuilder, RegistryError, operation_path};
pub use server::{Connection, Server, ServerBuildError, ServerBuilder};
pub use timeout::{compute_effective_timeout, parse_timeout_ms};

// Re-export several crates
pub use futures;
pub use prost;
pub use serde;
pub use streamrpc_core as core;

pub mod prelude {
    //! A prelude for `streamrpc` providing the most common types.
    pub use crate::registry::{Registry, RegistryBuilder, operation_path};
    pub use crate::server::{Connection, Server};
    pub use streamrpc_core::{CallContext, Code, Receiver, Sender, Status};
}
