//! Sender role: the outbound-call half of the protocol.
//!
//! Three call kinds leave through the sender. `invoke` wraps a request in a
//! Sync envelope and parks the caller on the transport's blocking
//! named-send until the correlated reply is back. `invoke_async` mints a
//! correlation token, files a pending record, and returns as soon as the
//! send is accepted; the response arrives later through the dispatcher and
//! fires the stored callback. `notify` is fire-and-forget.
//!
//! On a server, a call whose context has no target endpoint is a broadcast
//! and routes through the transport's send-to-all primitives; a concrete
//! endpoint goes to exactly that peer. On a client the endpoint is always
//! empty and the call rides the one connection the sender is bound to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::MsgPackCodec;
use crate::context::MethodContext;
use crate::error::{CallError, CallResult, Result};
use crate::pending::{Completion, PendingCall, PendingTable};
use crate::protocol::{CallToken, Envelope, Role};
use crate::transport::Transport;

/// The outbound half of a connection.
pub struct Sender<T> {
    transport: Arc<T>,
    pending: Arc<PendingTable>,
    role: Role,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            pending: self.pending.clone(),
            role: self.role,
        }
    }
}

impl<T: Transport> Sender<T> {
    pub(crate) fn new(transport: Arc<T>, pending: Arc<PendingTable>, role: Role) -> Self {
        Self {
            transport,
            pending,
            role,
        }
    }

    /// True while a usable connection exists.
    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// Issue a blocking call: send the request and wait for the correlated
    /// reply.
    ///
    /// Without a live connection this returns `Disconnected` before any
    /// side effect. Transport failure -- including a peer that never
    /// replies because nothing is registered under `ctx.name` -- surfaces
    /// as `Comm`.
    pub async fn invoke<Req, Resp>(&self, ctx: &MethodContext, request: &Req) -> CallResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        if !self.connected() {
            return Err(CallError::Disconnected);
        }

        let body = MsgPackCodec::encode(request).map_err(CallError::Comm)?;
        let envelope = Envelope::Sync {
            name: ctx.name().to_string(),
            body: Bytes::from(body),
        };

        let reply = self
            .dispatch_call(ctx, envelope.encode(self.role))
            .await
            .map_err(CallError::Comm)?;

        MsgPackCodec::decode(&reply).map_err(CallError::Comm)
    }

    /// Issue a correlated call: file a pending record, send the request,
    /// and return once the send is accepted.
    ///
    /// The record is inserted before transmission, so the correlation entry
    /// exists before any reply could arrive. `callback` fires exactly once,
    /// on whatever task drives inbound dispatch: with the request snapshot
    /// and the decoded response on arrival, or with `Comm` if the entry
    /// expires first (see [`Sender::expire_stale`]). A send failure returns
    /// `Comm` but leaves the record in place.
    pub async fn invoke_async<Req, Resp, F>(
        &self,
        ctx: &MethodContext,
        request: &Req,
        callback: F,
    ) -> CallResult<()>
    where
        Req: Serialize + Clone + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
        F: FnOnce(Req, CallResult<Resp>) + Send + 'static,
    {
        if !self.connected() {
            return Err(CallError::Disconnected);
        }

        let body = MsgPackCodec::encode(request).map_err(CallError::Comm)?;
        let token = CallToken::mint();
        let name = ctx.name().to_string();

        let snapshot = request.clone();
        let log_name = name.clone();
        let complete: Completion = Box::new(move |reply| match reply {
            Ok(payload) => match MsgPackCodec::decode::<Resp>(payload) {
                Ok(response) => callback(snapshot, Ok(response)),
                Err(e) => {
                    tracing::warn!(
                        "async response for '{}' failed to decode, callback suppressed: {}",
                        log_name,
                        e
                    );
                }
            },
            Err(e) => callback(snapshot, Err(e)),
        });

        self.pending.insert(
            token,
            PendingCall {
                name: name.clone(),
                issued_at: Instant::now(),
                complete,
            },
        );

        let envelope = Envelope::AsyncRequest {
            name,
            token,
            body: Bytes::from(body),
        };

        self.dispatch_post(ctx, envelope.encode(self.role))
            .await
            .map_err(CallError::Comm)
    }

    /// Issue a fire-and-forget call. Never waits for or expects a reply.
    pub async fn notify<Info>(&self, ctx: &MethodContext, info: &Info) -> CallResult<()>
    where
        Info: Serialize,
    {
        if !self.connected() {
            return Err(CallError::Disconnected);
        }

        let body = MsgPackCodec::encode(info).map_err(CallError::Comm)?;
        let envelope = Envelope::Notify {
            name: ctx.name().to_string(),
            body: Bytes::from(body),
        };

        self.dispatch_post(ctx, envelope.encode(self.role))
            .await
            .map_err(CallError::Comm)
    }

    /// Number of calls still awaiting a correlated response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Age out pending records older than `max_age`, firing each callback
    /// once with `Comm`. Returns how many expired.
    pub fn expire_stale(&self, max_age: Duration) -> usize {
        self.pending.expire_older_than(max_age)
    }

    async fn dispatch_call(&self, ctx: &MethodContext, frame: Bytes) -> Result<Bytes> {
        if self.role == Role::Server && ctx.endpoint().is_none() {
            self.transport.call_all(ctx, frame).await
        } else {
            self.transport.call(ctx, frame).await
        }
    }

    async fn dispatch_post(&self, ctx: &MethodContext, frame: Bytes) -> Result<()> {
        if self.role == Role::Server && ctx.endpoint().is_none() {
            self.transport.post_all(ctx, frame).await
        } else {
            self.transport.post(ctx, frame).await
        }
    }
}
