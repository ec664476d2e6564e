//! Method registry: per-connection table of callable names.
//!
//! The registry is a closed set of three entry kinds -- Sync, Async, Notify
//! -- each carrying a type-erased async handler. Typed registration wraps
//! the caller's handler so that payload decoding and response encoding
//! happen inside the erased closure; dispatch resolves by name, checks the
//! kind, and fails closed (no entry, no reply) on any mismatch.
//!
//! Registration is read-mostly: methods are registered at startup and read
//! on every dispatch, potentially from several dispatch tasks at once, so
//! the table lives behind an `RwLock`. Re-registering a name replaces the
//! previous entry.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::MsgPackCodec;
use crate::error::Result;

/// Boxed future returned by type-erased handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The three capability variants a registered method can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Handler's response is returned inline to the dispatcher.
    Sync,
    /// Handler's response is sent back as a correlated response envelope.
    Async,
    /// Handler produces no response.
    Notify,
}

/// Type-erased handler that produces an encoded response.
trait ReplyHandler: Send + Sync {
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<Bytes>>;
}

/// Type-erased handler with no response path.
trait OneWayHandler: Send + Sync {
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<()>>;
}

/// Wrapper that decodes the request and encodes the handler's response.
struct TypedReplyHandler<F, Req, Fut> {
    handler: F,
    _phantom: PhantomData<fn(Req) -> Fut>,
}

impl<F, Req, Fut> ReplyHandler for TypedReplyHandler<F, Req, Fut>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Serialize,
{
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<Bytes>> {
        let request: Req = match MsgPackCodec::decode(payload) {
            Ok(value) => value,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            let response = fut.await;
            Ok(Bytes::from(MsgPackCodec::encode(&response)?))
        })
    }
}

/// Wrapper that decodes the request for a handler with no response.
struct TypedOneWayHandler<F, Req, Fut> {
    handler: F,
    _phantom: PhantomData<fn(Req) -> Fut>,
}

impl<F, Req, Fut> OneWayHandler for TypedOneWayHandler<F, Req, Fut>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, payload: &[u8]) -> BoxFuture<'static, Result<()>> {
        let request: Req = match MsgPackCodec::decode(payload) {
            Ok(value) => value,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            fut.await;
            Ok(())
        })
    }
}

enum MethodEntry {
    Sync(Box<dyn ReplyHandler>),
    Async(Box<dyn ReplyHandler>),
    Notify(Box<dyn OneWayHandler>),
}

impl MethodEntry {
    fn kind(&self) -> MethodKind {
        match self {
            MethodEntry::Sync(_) => MethodKind::Sync,
            MethodEntry::Async(_) => MethodKind::Async,
            MethodEntry::Notify(_) => MethodKind::Notify,
        }
    }
}

/// Table mapping method names to handlers, at most one entry per name.
pub struct Registry {
    methods: RwLock<HashMap<String, MethodEntry>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Register a Sync method: the handler's response is returned inline.
    ///
    /// Replaces any previous entry under `name`.
    pub fn register_sync<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.insert(
            name,
            MethodEntry::Sync(Box::new(TypedReplyHandler {
                handler,
                _phantom: PhantomData,
            })),
        );
    }

    /// Register an Async method: the handler's response is sent back as a
    /// correlated response envelope rather than returned inline.
    ///
    /// Replaces any previous entry under `name`.
    pub fn register_async<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Serialize,
    {
        self.insert(
            name,
            MethodEntry::Async(Box::new(TypedReplyHandler {
                handler,
                _phantom: PhantomData,
            })),
        );
    }

    /// Register a Notify method: fire-and-forget, no response path.
    ///
    /// Replaces any previous entry under `name`.
    pub fn register_notify<Req, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.insert(
            name,
            MethodEntry::Notify(Box::new(TypedOneWayHandler {
                handler,
                _phantom: PhantomData,
            })),
        );
    }

    /// The kind registered under `name`, if any.
    pub fn kind_of(&self, name: &str) -> Option<MethodKind> {
        self.read().get(name).map(MethodEntry::kind)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Resolve a response-producing entry of the wanted kind and start its
    /// handler. `None` on registry miss or kind mismatch; the caller must
    /// not send a reply in that case.
    ///
    /// The future is created under the read lock and awaited after it is
    /// released, so long-running handlers never block registration.
    pub(crate) fn reply_future(
        &self,
        name: &str,
        wanted: MethodKind,
        payload: &[u8],
    ) -> Option<BoxFuture<'static, Result<Bytes>>> {
        let guard = self.read();
        match (guard.get(name), wanted) {
            (Some(MethodEntry::Sync(handler)), MethodKind::Sync) => Some(handler.call(payload)),
            (Some(MethodEntry::Async(handler)), MethodKind::Async) => Some(handler.call(payload)),
            _ => None,
        }
    }

    /// Resolve a Notify entry and start its handler. `None` on miss or
    /// kind mismatch.
    pub(crate) fn notify_future(
        &self,
        name: &str,
        payload: &[u8],
    ) -> Option<BoxFuture<'static, Result<()>>> {
        let guard = self.read();
        match guard.get(name) {
            Some(MethodEntry::Notify(handler)) => Some(handler.call(payload)),
            _ => None,
        }
    }

    fn insert(&self, name: &str, entry: MethodEntry) {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), entry);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MethodEntry>> {
        self.methods.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
