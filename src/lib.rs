//! # wirecall
//!
//! Request/response and fire-and-forget remote invocation over a
//! persistent, bidirectional byte connection shared by one client and one
//! server.
//!
//! ## Architecture
//!
//! ```text
//!  application            application
//!      │ invoke/notify        ▲ handlers
//! ┌────▼─────┐          ┌─────┴─────┐
//! │  Sender  │          │ Receiver  │   one pair per connection,
//! └────┬─────┘          └─────▲─────┘   composed by Client and Server
//!      │ envelopes            │ Dispatch
//! ┌────▼────────────────────────────┐
//! │        Transport (external)     │   connect/send/receive, heartbeats
//! └─────────────────────────────────┘
//! ```
//!
//! Three call kinds share the wire, distinguished by one-byte command
//! codes: Sync (blocking, transport-correlated reply), Async (correlated by
//! a 128-bit token through the sender's pending table), and Notify
//! (fire-and-forget, never answered). Each side owns a method registry;
//! inbound envelopes resolve against it by name and fail closed -- an
//! unresolved call is logged and produces no reply traffic.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wirecall::{Client, MethodContext};
//!
//! # async fn run(transport: Arc<impl wirecall::Transport>) -> wirecall::CallResult<()> {
//! let client = Client::new(transport);
//! client.register_sync("echo", |s: String| async move { s });
//! client.connect(false).await.unwrap();
//!
//! let pong: String = client.invoke(&MethodContext::new("echo"), &"ping").await?;
//! assert_eq!(pong, "ping");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod protocol;

mod client;
mod context;
mod dispatch;
mod error;
mod pending;
mod receiver;
mod registry;
mod sender;
mod server;
mod transport;

pub use client::{
    Client, ClientConfig, ClientHooks, NullClientHooks, DEFAULT_CALL_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL,
};
pub use context::{Endpoint, MethodContext};
pub use dispatch::Dispatch;
pub use error::{CallError, CallResult, Result, WirecallError};
pub use protocol::{CallToken, Envelope, OpCode, Role, PROTOCOL_VERSION};
pub use receiver::Receiver;
pub use registry::{MethodKind, Registry};
pub use sender::Sender;
pub use server::{NullServerHooks, Server, ServerConfig, ServerHooks};
pub use transport::Transport;
