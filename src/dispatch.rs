//! Inbound instruction dispatcher.
//!
//! A [`Dispatch`] handle is installed into the transport when a connection
//! opens. The transport calls [`Dispatch::handle`] for every received
//! frame; the dispatcher decodes the command byte, validates that the
//! envelope was originated by the peer role, and routes it to the matching
//! Sender/Receiver hook:
//!
//! ```text
//! Sync          ─► Receiver::on_sync          ─► Some(reply) back to transport
//! AsyncRequest  ─► Receiver::on_async_request ─► response posted by receiver
//! AsyncResponse ─► pending-table completion
//! Notify        ─► Receiver::on_notify
//! Heartbeat     ─► no-op
//! Close         ─► connection/peer teardown
//! ```
//!
//! The handle also carries the transport's lifecycle notifications (peer
//! liveness on a client, peer accept/close on a server) to the application
//! hook traits.

use std::sync::Arc;

use bytes::Bytes;

use crate::client::ClientHooks;
use crate::context::Endpoint;
use crate::error::Result;
use crate::pending::PendingTable;
use crate::protocol::{Envelope, Role};
use crate::receiver::Receiver;
use crate::server::ServerHooks;
use crate::transport::Transport;

/// Role-appropriate lifecycle hooks.
pub(crate) enum Hooks {
    Client(Arc<dyn ClientHooks>),
    Server(Arc<dyn ServerHooks>),
}

struct DispatchInner<T> {
    role: Role,
    pending: Arc<PendingTable>,
    receiver: Arc<Receiver<T>>,
    transport: Arc<T>,
    hooks: Hooks,
}

/// Inbound surface of one connection, driven by the transport.
///
/// Cheaply cloneable; the transport keeps one per connection.
pub struct Dispatch<T> {
    inner: Arc<DispatchInner<T>>,
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> Dispatch<T> {
    pub(crate) fn new(
        role: Role,
        pending: Arc<PendingTable>,
        receiver: Arc<Receiver<T>>,
        transport: Arc<T>,
        hooks: Hooks,
    ) -> Self {
        Self {
            inner: Arc::new(DispatchInner {
                role,
                pending,
                receiver,
                transport,
                hooks,
            }),
        }
    }

    /// Decode one inbound frame and run the matching hook.
    ///
    /// `peer` is the sending peer's address on a multi-peer connection
    /// (server role); `None` on a client's single connection. Returns
    /// `Some(reply)` when the frame was a Sync call answered by a
    /// registered handler -- the transport must send those bytes back as
    /// the correlated reply -- and `None` in every other case, including
    /// dispatch failures, which must produce no reply traffic.
    ///
    /// # Errors
    ///
    /// Only malformed frames error; how to react (log, kill the
    /// connection) is the transport's decision.
    pub async fn handle(&self, frame: &[u8], peer: Option<Endpoint>) -> Result<Option<Bytes>> {
        let (envelope, origin) = Envelope::decode(frame)?;

        if let Some(origin) = origin {
            if origin != self.inner.role.peer() {
                tracing::warn!(
                    "dropping envelope with {:?}-originated opcode on the {:?} side",
                    origin,
                    self.inner.role
                );
                return Ok(None);
            }
        }

        match envelope {
            Envelope::Heartbeat => {
                tracing::trace!("heartbeat");
                Ok(None)
            }
            Envelope::Close => {
                self.handle_close(peer).await;
                Ok(None)
            }
            Envelope::Sync { name, body } => {
                Ok(self.inner.receiver.on_sync(&name, &body).await)
            }
            Envelope::AsyncRequest { name, token, body } => {
                self.inner
                    .receiver
                    .on_async_request(&name, &body, token, peer)
                    .await;
                Ok(None)
            }
            Envelope::AsyncResponse { name, token, body } => {
                if !self.inner.pending.complete(token, &body) {
                    tracing::warn!(
                        "async response for '{}' with unknown token {} dropped",
                        name,
                        token
                    );
                }
                Ok(None)
            }
            Envelope::Notify { name, body } => {
                self.inner.receiver.on_notify(&name, &body).await;
                Ok(None)
            }
        }
    }

    /// Liveness report from the transport's sampler (client role).
    pub fn peer_status_changed(&self, online: bool) {
        if let Hooks::Client(hooks) = &self.inner.hooks {
            hooks.on_server_status_changed(online);
        }
    }

    /// A peer connected (server role).
    pub fn peer_opened(&self, endpoint: &Endpoint) {
        if let Hooks::Server(hooks) = &self.inner.hooks {
            hooks.on_client_opened(endpoint);
        }
    }

    /// A peer disconnected (server role).
    pub fn peer_closed(&self, endpoint: &Endpoint) {
        if let Hooks::Server(hooks) = &self.inner.hooks {
            hooks.on_client_closed(endpoint);
        }
    }

    async fn handle_close(&self, peer: Option<Endpoint>) {
        match &self.inner.hooks {
            Hooks::Client(_) => {
                tracing::debug!("peer closed the connection");
                self.inner.transport.close().await;
            }
            Hooks::Server(hooks) => match peer {
                Some(endpoint) => {
                    tracing::debug!("client {} requested close", endpoint);
                    self.inner.transport.drop_peer(&endpoint).await;
                    hooks.on_client_closed(&endpoint);
                }
                None => {
                    tracing::warn!("close instruction without a peer endpoint ignored");
                }
            },
        }
    }
}
