//! Client: one Sender + Receiver pair bound to a single outbound connection.
//!
//! The client opens the transport toward one server endpoint, installs the
//! connection's instruction dispatcher, and exposes the combined call
//! surface of its two halves. Server liveness changes reported by the
//! transport reach the application through [`ClientHooks`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::context::MethodContext;
use crate::dispatch::{Dispatch, Hooks};
use crate::error::{CallResult, Result};
use crate::pending::{spawn_sweeper, PendingTable};
use crate::protocol::{Envelope, Role};
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::transport::Transport;

/// Default age after which a pending asynchronous call is expired.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle notifications delivered to client applications.
///
/// All methods default to no-ops; implement only what you need.
pub trait ClientHooks: Send + Sync + 'static {
    /// The transport's liveness sampler reports the server online/offline.
    fn on_server_status_changed(&self, _online: bool) {}
}

/// Hook set that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClientHooks;

impl ClientHooks for NullClientHooks {}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Age after which a pending asynchronous call is expired and its
    /// callback fired with a communication failure. `None` keeps pending
    /// calls forever (a response that never arrives then leaks its record).
    pub call_timeout: Option<Duration>,
    /// Interval between expiry sweeps; only used when `call_timeout` is set.
    pub sweep_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// One Sender + Receiver pair on one outbound connection.
pub struct Client<T> {
    transport: Arc<T>,
    sender: Sender<T>,
    receiver: Arc<Receiver<T>>,
    dispatch: Dispatch<T>,
    pending: Arc<PendingTable>,
    config: ClientConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Client<T> {
    /// Create a client with default hooks and configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_hooks(transport, Arc::new(NullClientHooks), ClientConfig::default())
    }

    /// Create a client with application hooks and explicit configuration.
    pub fn with_hooks(
        transport: Arc<T>,
        hooks: Arc<dyn ClientHooks>,
        config: ClientConfig,
    ) -> Self {
        let pending = Arc::new(PendingTable::new());
        let receiver = Arc::new(Receiver::new(transport.clone(), Role::Client));
        let sender = Sender::new(transport.clone(), pending.clone(), Role::Client);
        let dispatch = Dispatch::new(
            Role::Client,
            pending.clone(),
            receiver.clone(),
            transport.clone(),
            Hooks::Client(hooks),
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

    /// Open the transport and install this connection's instruction
    /// dispatcher. Also starts the pending-call expiry sweeper when a call
    /// timeout is configured.
    pub async fn connect(&self, async_open: bool) -> Result<()> {
        self.transport.open(self.dispatch.clone(), async_open).await?;
        self.start_sweeper();
        tracing::debug!("client connected");
        Ok(())
    }

    /// Send a Close envelope best-effort, then tear the connection down.
    pub async fn disconnect(&self) {
        let close = Envelope::Close.encode(Role::Client);
        if let Err(e) = self.transport.post(&MethodContext::new("$close"), close).await {
            tracing::debug!("close envelope could not be delivered: {}", e);
        }

        self.stop_sweeper();
        self.transport.close().await;
        tracing::debug!("client disconnected");
    }

    /// True while a usable connection exists.
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

    /// Issue a blocking call. See [`Sender::invoke`].
    pub async fn invoke<Req, Resp>(&self, ctx: &MethodContext, request: &Req) -> CallResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.sender.invoke(ctx, request).await
    }

    /// Issue a correlated call. See [`Sender::invoke_async`].
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

    /// Issue a fire-and-forget call. See [`Sender::notify`].
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

impl<T> Drop for Client<T> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CallError, WirecallError};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct LifecycleTransport {
        connected: AtomicBool,
        opens: AtomicUsize,
        closes: AtomicUsize,
        posted: StdMutex<Vec<Bytes>>,
    }

    impl Transport for LifecycleTransport {
        fn connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn open(
            &self,
            _dispatch: Dispatch<Self>,
            _async_open: bool,
        ) -> impl Future<Output = Result<()>> + Send {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            async { Ok(()) }
        }

        fn close(&self) -> impl Future<Output = ()> + Send {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            async {}
        }

        fn call(
            &self,
            _ctx: &MethodContext,
            _frame: Bytes,
        ) -> impl Future<Output = Result<Bytes>> + Send {
            async { Err(WirecallError::ConnectionClosed) }
        }

        fn post(
            &self,
            _ctx: &MethodContext,
            frame: Bytes,
        ) -> impl Future<Output = Result<()>> + Send {
            self.posted.lock().unwrap().push(frame);
            async { Ok(()) }
        }
    }

    #[tokio::test]
    async fn test_connect_opens_transport_once() {
        let transport = Arc::new(LifecycleTransport::default());
        let client = Client::new(transport.clone());

        client.connect(false).await.unwrap();
        assert!(client.connected());
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_sends_close_then_tears_down() {
        let transport = Arc::new(LifecycleTransport::default());
        let client = Client::new(transport.clone());
        client.connect(false).await.unwrap();

        client.disconnect().await;

        assert!(!client.connected());
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);

        let posted = transport.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        let (envelope, origin) = Envelope::decode(&posted[0]).unwrap();
        assert_eq!(envelope, Envelope::Close);
        assert_eq!(origin, None);
    }

    #[tokio::test]
    async fn test_invoke_before_connect_is_disconnected() {
        let client = Client::new(Arc::new(LifecycleTransport::default()));

        let result: CallResult<String> = client.invoke(&MethodContext::new("echo"), &"x").await;
        assert!(matches!(result, Err(CallError::Disconnected)));
    }

    #[tokio::test]
    async fn test_status_hook_fires_through_dispatch() {
        struct RecordingHooks {
            online_reports: AtomicUsize,
        }

        impl ClientHooks for RecordingHooks {
            fn on_server_status_changed(&self, online: bool) {
                if online {
                    self.online_reports.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let hooks = Arc::new(RecordingHooks {
            online_reports: AtomicUsize::new(0),
        });
        let client = Client::with_hooks(
            Arc::new(LifecycleTransport::default()),
            hooks.clone(),
            ClientConfig::default(),
        );

        client.dispatch().peer_status_changed(true);
        assert_eq!(hooks.online_reports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sweeper_expires_stale_calls() {
        let transport = Arc::new(LifecycleTransport::default());
        let client = Client::with_hooks(
            transport.clone(),
            Arc::new(NullClientHooks),
            ClientConfig {
                call_timeout: Some(Duration::from_millis(20)),
                sweep_interval: Duration::from_millis(10),
            },
        );
        client.connect(false).await.unwrap();

        let expired = Arc::new(AtomicBool::new(false));
        let expired_in_cb = expired.clone();
        client
            .invoke_async(
                &MethodContext::new("never-answered"),
                &1i32,
                move |_: i32, result: CallResult<i32>| {
                    expired_in_cb.store(result.is_err(), Ordering::SeqCst);
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(expired.load(Ordering::SeqCst));
        assert_eq!(client.sender().pending_calls(), 0);
    }
}
