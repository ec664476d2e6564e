//! Server: one Sender + Receiver pair bound to a listening connection.
//!
//! The server accepts many clients over one listening transport. Its call
//! surface is the same as the client's, with one addressing rule on top:
//! a call whose [`MethodContext`] has no target endpoint is broadcast to
//! every connected peer through the transport's send-to-all primitive; a
//! concrete endpoint is delivered to exactly that peer. Peer accept/close
//! is reported through [`ServerHooks`] -- that is the only per-peer
//! lifecycle signal; outstanding async correlation is not notified when a
//! peer disconnects, those records age out under the configured call
//! timeout.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::client::{DEFAULT_CALL_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
use crate::context::{Endpoint, MethodContext};
use crate::dispatch::{Dispatch, Hooks};
use crate::error::{CallResult, Result};
use crate::pending::{spawn_sweeper, PendingTable};
use crate::protocol::Role;
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::transport::Transport;

/// Lifecycle notifications delivered to server applications.
///
/// All methods default to no-ops; implement only what you need.
pub trait ServerHooks: Send + Sync + 'static {
    /// A client connected.
    fn on_client_opened(&self, _endpoint: &Endpoint) {}

    /// A client disconnected or was dropped.
    fn on_client_closed(&self, _endpoint: &Endpoint) {}
}

/// Hook set that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullServerHooks;

impl ServerHooks for NullServerHooks {}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Age after which a pending asynchronous call is expired and its
    /// callback fired with a communication failure. `None` keeps pending
    /// calls forever.
    pub call_timeout: Option<Duration>,
    /// Interval between expiry sweeps; only used when `call_timeout` is set.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// One Sender + Receiver pair on a listening, multi-peer connection.
pub struct Server<T> {
    transport: Arc<T>,
    sender: Sender<T>,
    receiver: Arc<Receiver<T>>,
    dispatch: Dispatch<T>,
    pending: Arc<PendingTable>,
    config: ServerConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Server<T> {
    /// Create a server with default hooks and configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_hooks(transport, Arc::new(NullServerHooks), ServerConfig::default())
    }

    /// Create a server with application hooks and explicit configuration.
    pub fn with_hooks(
        transport: Arc<T>,
        hooks: Arc<dyn ServerHooks>,
        config: ServerConfig,
    ) -> Self {
        let pending = Arc::new(PendingTable::new());
        let receiver = Arc::new(Receiver::new(transport.clone(), Role::Server));
        let sender = Sender::new(transport.clone(), pending.clone(), Role::Server);
        let dispatch = Dispatch::new(
            Role::Server,
            pending.clone(),
            receiver.clone(),
            transport.clone(),
            Hooks::Server(hooks),
        );

        Self {
            transport,
            sender,
            receiver,
            dispatch,
            pending,
            config,
            sweeper: Mutex::new(None),
        }
    }

    /// Start listening: open the transport and install this connection's
    /// instruction dispatcher. Also starts the pending-call expiry sweeper
    /// when a call timeout is configured.
    pub async fn start(&self) -> Result<()> {
        self.transport.open(self.dispatch.clone(), false).await?;
        self.start_sweeper();
        tracing::debug!("server started");
        Ok(())
    }

    /// Stop listening and tear the connection down.
    pub async fn stop(&self) {
        self.stop_sweeper();
        self.transport.close().await;
        tracing::debug!("server stopped");
    }

    /// Forcibly disconnect one peer.
    pub async fn close_client(&self, endpoint: &Endpoint) {
        self.transport.drop_peer(endpoint).await;
    }

    /// True while the listening connection is usable.
    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// The outbound half.
    pub fn sender(&self) -> &Sender<T> {
        &self.sender
    }

    /// The inbound half.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }

    /// The inbound dispatcher, for transports wired up by hand.
    pub fn dispatch(&self) -> Dispatch<T> {
        self.dispatch.clone()
    }

    /// Register a Sync method on this connection.
    pub fn register_sync<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.receiver.register_sync(name, handler);
    }

    /// Register an Async method on this connection.
    pub fn register_async<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.receiver.register_async(name, handler);
    }

    /// Register a Notify method on this connection.
    pub fn register_notify<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.receiver.register_notify(name, handler);
    }

    /// Issue a blocking call; broadcast when `ctx` has no endpoint.
    /// See [`Sender::invoke`].
    pub async fn invoke<Req, Resp>(&self, ctx: &MethodContext, request: &Req) -> CallResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.sender.invoke(ctx, request).await
    }

    /// Issue a correlated call; broadcast when `ctx` has no endpoint.
    /// See [`Sender::invoke_async`].
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
        self.sender.invoke_async(ctx, request, callback).await
    }

    /// Issue a fire-and-forget call; broadcast when `ctx` has no endpoint.
    /// See [`Sender::notify`].
    pub async fn notify<Info>(&self, ctx: &MethodContext, info: &Info) -> CallResult<()>
    where
        Info: Serialize,
    {
        self.sender.notify(ctx, info).await
    }

    fn start_sweeper(&self) {
        let Some(call_timeout) = self.config.call_timeout else {
            return;
        };

        let handle = spawn_sweeper(self.pending.clone(), call_timeout, self.config.sweep_interval);
        if let Some(previous) = self.swap_sweeper(Some(handle)) {
            previous.abort();
        }
    }

    fn stop_sweeper(&self) {
        if let Some(handle) = self.swap_sweeper(None) {
            handle.abort();
        }
    }

    fn swap_sweeper(&self, new: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, new)
    }
}

impl<T> Drop for Server<T> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
