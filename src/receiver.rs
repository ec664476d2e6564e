//! Receiver role: the inbound-dispatch half of the protocol.
//!
//! The receiver owns the method [`Registry`] for its connection and turns
//! decoded envelopes into handler invocations. For Sync calls the encoded
//! response travels back inline through the dispatcher; for Async calls the
//! receiver itself posts a correlated response envelope; Notify calls never
//! produce response traffic.
//!
//! Every resolution failure -- no entry, wrong kind, payload that does not
//! decode -- fails closed: it is logged locally and nothing is sent, so the
//! remote caller observes a missing reply rather than an error envelope.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::{Endpoint, MethodContext};
use crate::protocol::{CallToken, Envelope, Role};
use crate::registry::{MethodKind, Registry};
use crate::transport::Transport;

/// The inbound half of a connection: registry plus dispatch hooks.
pub struct Receiver<T> {
    transport: Arc<T>,
    registry: Registry,
    role: Role,
}

impl<T: Transport> Receiver<T> {
    pub(crate) fn new(transport: Arc<T>, role: Role) -> Self {
        Self {
            transport,
            registry: Registry::new(),
            role,
        }
    }

    /// True while a usable connection exists.
    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// The method registry for this connection.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a Sync method. See [`Registry::register_sync`].
    pub fn register_sync<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.registry.register_sync(name, handler);
    }

    /// Register an Async method. See [`Registry::register_async`].
    pub fn register_async<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.registry.register_async(name, handler);
    }

    /// Register a Notify method. See [`Registry::register_notify`].
    pub fn register_notify<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registry.register_notify(name, handler);
    }

    /// Handle an inbound Sync call. Returns the encoded response for the
    /// dispatcher to send back, or `None` when no reply must be sent.
    pub(crate) async fn on_sync(&self, name: &str, payload: &[u8]) -> Option<Bytes> {
        let Some(fut) = self.registry.reply_future(name, MethodKind::Sync, payload) else {
            tracing::warn!("sync call for unresolved method '{}' dropped", name);
            return None;
        };

        match fut.await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::error!("sync handler for '{}' failed: {}", name, e);
                None
            }
        }
    }

    /// Handle an inbound AsyncRequest: run the handler and, if still
    /// connected, post the correlated response back to `peer`.
    pub(crate) async fn on_async_request(
        &self,
        name: &str,
        payload: &[u8],
        token: CallToken,
        peer: Option<Endpoint>,
    ) {
        let Some(fut) = self.registry.reply_future(name, MethodKind::Async, payload) else {
            tracing::warn!("async request for unresolved method '{}' dropped", name);
            return;
        };

        let body = match fut.await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("async handler for '{}' failed: {}", name, e);
                return;
            }
        };

        if !self.transport.connected() {
            tracing::warn!(
                "connection lost before async response for '{}' could be sent",
                name
            );
            return;
        }

        let mut ctx = MethodContext::new(name);
        if let Some(endpoint) = peer {
            ctx = ctx.with_endpoint(endpoint);
        }

        let envelope = Envelope::AsyncResponse {
            name: name.to_string(),
            token,
            body,
        };

        if let Err(e) = self.transport.post(&ctx, envelope.encode(self.role)).await {
            tracing::warn!("failed to send async response for '{}': {}", name, e);
        }
    }

    /// Handle an inbound Notify: run the handler. Never produces a reply.
    pub(crate) async fn on_notify(&self, name: &str, payload: &[u8]) {
        let Some(fut) = self.registry.notify_future(name, payload) else {
            tracing::warn!("notify for unresolved method '{}' dropped", name);
            return;
        };

        if let Err(e) = fut.await {
            tracing::error!("notify handler for '{}' failed: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;
    use crate::error::Result;
    use crate::protocol::PROTOCOL_VERSION;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport stub that records posted frames.
    #[derive(Default)]
    struct RecordingTransport {
        connected: AtomicBool,
        posted: Mutex<Vec<(Option<Endpoint>, Bytes)>>,
        posts: AtomicUsize,
    }

    impl RecordingTransport {
        fn live() -> Arc<Self> {
            let transport = Self::default();
            transport.connected.store(true, Ordering::SeqCst);
            Arc::new(transport)
        }
    }

    impl Transport for RecordingTransport {
        fn connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn open(
            &self,
            _dispatch: crate::dispatch::Dispatch<Self>,
            _async_open: bool,
        ) -> impl std::future::Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }

        fn close(&self) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn call(
            &self,
            _ctx: &MethodContext,
            _frame: Bytes,
        ) -> impl std::future::Future<Output = Result<Bytes>> + Send {
            async { Err(crate::error::WirecallError::ConnectionClosed) }
        }

        fn post(
            &self,
            ctx: &MethodContext,
            frame: Bytes,
        ) -> impl std::future::Future<Output = Result<()>> + Send {
            self.posts.fetch_add(1, Ordering::SeqCst);
            self.posted
                .lock()
                .unwrap()
                .push((ctx.endpoint().cloned(), frame));
            async { Ok(()) }
        }
    }

    #[tokio::test]
    async fn test_on_sync_returns_encoded_response() {
        let receiver = Receiver::new(RecordingTransport::live(), Role::Client);
        receiver.register_sync("echo", |s: String| async move { s });

        let payload = MsgPackCodec::encode(&"hello").unwrap();
        let response = receiver.on_sync("echo", &payload).await.unwrap();

        let decoded: String = MsgPackCodec::decode(&response).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[tokio::test]
    async fn test_on_sync_miss_returns_none() {
        let receiver: Receiver<RecordingTransport> =
            Receiver::new(RecordingTransport::live(), Role::Client);
        let payload = MsgPackCodec::encode(&()).unwrap();
        assert!(receiver.on_sync("absent", &payload).await.is_none());
    }

    #[tokio::test]
    async fn test_on_sync_rejects_async_entry() {
        let receiver = Receiver::new(RecordingTransport::live(), Role::Client);
        receiver.register_async("deferred", |n: i32| async move { n });

        let payload = MsgPackCodec::encode(&1i32).unwrap();
        assert!(receiver.on_sync("deferred", &payload).await.is_none());
    }

    #[tokio::test]
    async fn test_async_request_posts_correlated_response() {
        let transport = RecordingTransport::live();
        let receiver = Receiver::new(transport.clone(), Role::Server);
        receiver.register_async("add", |(a, b): (i32, i32)| async move { a + b });

        let token = CallToken::mint();
        let payload = MsgPackCodec::encode(&(2i32, 3i32)).unwrap();
        let peer = Endpoint::new("peer-1");
        receiver
            .on_async_request("add", &payload, token, Some(peer.clone()))
            .await;

        let posted = transport.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        let (endpoint, frame) = &posted[0];
        assert_eq!(endpoint.as_ref(), Some(&peer));
        assert_eq!(frame[1], PROTOCOL_VERSION);

        let (envelope, origin) = Envelope::decode(frame).unwrap();
        assert_eq!(origin, Some(Role::Server));
        match envelope {
            Envelope::AsyncResponse {
                name,
                token: echoed,
                body,
            } => {
                assert_eq!(name, "add");
                assert_eq!(echoed, token);
                let sum: i32 = MsgPackCodec::decode(&body).unwrap();
                assert_eq!(sum, 5);
            }
            other => panic!("wrong envelope: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_request_miss_sends_nothing() {
        let transport = RecordingTransport::live();
        let receiver = Receiver::new(transport.clone(), Role::Server);

        receiver
            .on_async_request("absent", &[], CallToken::mint(), None)
            .await;

        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_response_suppressed_when_disconnected() {
        let transport = Arc::new(RecordingTransport::default());
        transport.connected.store(true, Ordering::SeqCst);
        let receiver = Receiver::new(transport.clone(), Role::Server);

        let transport_in_handler = transport.clone();
        receiver.register_async("drop-link", move |_: ()| {
            let transport = transport_in_handler.clone();
            async move {
                transport.connected.store(false, Ordering::SeqCst);
            }
        });

        let payload = MsgPackCodec::encode(&()).unwrap();
        receiver
            .on_async_request("drop-link", &payload, CallToken::mint(), None)
            .await;

        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_notify_never_replies() {
        let transport = RecordingTransport::live();
        let receiver = Receiver::new(transport.clone(), Role::Client);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = hits.clone();
        receiver.register_notify("ping", move |_: ()| {
            let hits = hits_in_handler.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        let payload = MsgPackCodec::encode(&()).unwrap();
        receiver.on_notify("ping", &payload).await;
        receiver.on_notify("unregistered", &payload).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
    }
}
