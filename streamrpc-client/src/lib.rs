//! Client for `streamrpc` servers.
//!
//! ## Features
//!
//! - Unary calls (request-response)
//! - Server-streaming calls
//! - Client-streaming calls
//! - Bidirectional-streaming calls
//! - Protobuf and JSON payload encoding
//! - Per-call timeouts and cancellation through [`CallContext`]
//!
//! ## Example
//!
//! ```ignore
//! use streamrpc_client::Client;
//!
//! let client = Client::builder(server.connect()).use_proto().build();
//!
//! let response: SumResponse = client
//!     .call_unary("calculator.CalculatorService/Sum", SumRequest { a: 3, b: 10 })
//!     .await?;
//! ```
//!
//! ## Bidirectional Streaming Example
//!
//! ```ignore
//! use futures::stream;
//!
//! let call = client
//!     .call_bidi_stream::<FindMaximumRequest, FindMaximumResponse>(
//!         "calculator.CalculatorService/FindMaximum",
//!     )
//!     .await?;
//!
//! let requests = stream::iter([1, 5, 3, 6, 2, 20].map(|number| FindMaximumRequest { number }));
//! let maxima = call.collect(requests).await?;
//! ```
//!
//! ## Cancellation
//!
//! - Drop a [`Streaming`] or an unfinished call object to cancel the call.
//! - Cancel the context passed with [`CallOptions::context`] to cancel every
//!   call derived from it.
//! - Set [`CallOptions::timeout`] or [`ClientBuilder::timeout`] for a
//!   deadline. The call fails with `DeadlineExceeded` once it passes.
//!
//! [`CallContext`]: streamrpc_core::CallContext

mod builder;
mod call;
mod client;
mod options;
mod streaming;

pub use builder::ClientBuilder;
pub use call::{BidiStreamingCall, ClientStreamingCall};
pub use client::Client;
pub use options::CallOptions;
pub use streaming::Streaming;

// Re-export core types
pub use streamrpc_core;
pub use streamrpc_core::{CallContext, Code, Encoding, MessageLimits, Status};
