//! Transport boundary.
//!
//! The connection under this layer -- stream connect, reconnection,
//! heartbeating, multiplexed socket I/O -- is an external collaborator.
//! [`Transport`] is its contract: the handful of primitives the invocation
//! layer consumes, and nothing else. Retries, encryption, and flow control
//! all live behind it; `try_count` in the [`MethodContext`] is forwarded as
//! an opaque hint.
//!
//! A transport delivers inbound traffic by driving the [`Dispatch`] handle
//! it receives in [`Transport::open`]: for every received frame it calls
//! [`Dispatch::handle`], sends back the returned reply bytes (if any) as
//! the correlated answer to a blocking call, and reports peer lifecycle
//! through the `peer_*` notification methods.

use std::future::Future;

use bytes::Bytes;

use crate::context::{Endpoint, MethodContext};
use crate::dispatch::Dispatch;
use crate::error::{Result, WirecallError};

/// Contract consumed from the connection this layer rides on.
///
/// `call` is the synchronous named-send: it parks the caller until the
/// transport has a correlated reply or reports failure. `post` is
/// fire-and-forget: it resolves once the send is accepted. The `_all`
/// variants are the server-role broadcast forms; their success value is the
/// transport's own all-or-best-effort contract, forwarded verbatim by this
/// layer.
pub trait Transport: Send + Sync + 'static {
    /// True while a usable connection exists.
    fn connected(&self) -> bool;

    /// Open the connection and install the inbound dispatcher.
    ///
    /// `async_open` requests a non-blocking open where the transport
    /// supports one; it is ignored otherwise.
    fn open(
        &self,
        dispatch: Dispatch<Self>,
        async_open: bool,
    ) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;

    /// Tear the connection down.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Send a frame and wait for its correlated reply.
    fn call(&self, ctx: &MethodContext, frame: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// Send a frame, resolving once the send is accepted.
    fn post(&self, ctx: &MethodContext, frame: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Broadcast variant of [`Transport::call`] (server role).
    fn call_all(
        &self,
        ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = Result<Bytes>> + Send {
        let _ = (ctx, frame);
        async {
            Err(WirecallError::Protocol(
                "broadcast is not supported by this transport".to_string(),
            ))
        }
    }

    /// Broadcast variant of [`Transport::post`] (server role).
    fn post_all(
        &self,
        ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = Result<()>> + Send {
        let _ = (ctx, frame);
        async {
            Err(WirecallError::Protocol(
                "broadcast is not supported by this transport".to_string(),
            ))
        }
    }

    /// Forcibly disconnect one peer (server role). Default: no-op.
    fn drop_peer(&self, endpoint: &Endpoint) -> impl Future<Output = ()> + Send {
        let _ = endpoint;
        async {}
    }
}
