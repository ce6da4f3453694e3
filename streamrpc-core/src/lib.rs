//! Core types for streamrpc.
//!
//! This crate provides the types shared by the server (`streamrpc`) and the
//! client (`streamrpc-client`) crates.
//!
//! ## Modules
//!
//! - [`error`]: Status codes and the [`Status`] outcome type
//! - [`context`]: Per-call deadline and cancellation ([`CallContext`])
//! - [`codec`]: Message encoding ([`Encoding`])
//! - [`frame`]: Frames and bounded frame queues
//! - [`channel`]: Typed [`Sender`] and [`Receiver`] halves
//! - [`call`]: Call shapes and headers
//! - [`transport`]: The [`Transport`] seam between caller and server
//! - [`security`]: The [`TransportSecurity`] hook

mod call;
mod channel;
mod codec;
mod context;
mod error;
mod frame;
mod limits;
mod security;
mod transport;

pub use call::*;
pub use channel::*;
pub use codec::*;
pub use context::*;
pub use error::*;
pub use frame::*;
pub use limits::*;
pub use security::*;
pub use transport::*;
