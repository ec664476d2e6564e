//! Loopback demo - one client and one server joined by an in-memory wire.
//!
//! This example demonstrates the three call kinds sharing one connection:
//! - a blocking `invoke` against a Sync method,
//! - a correlated `invoke_async` against an Async method,
//! - a fire-and-forget `notify`.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example echo
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use wirecall::{
    CallResult, Client, Dispatch, Endpoint, MethodContext, Server, Transport, WirecallError,
};

/// In-memory wire that hands every frame straight to the linked peer's
/// dispatcher.
struct Loopback {
    connected: AtomicBool,
    /// Our address as the peer sees it (None on the server-to-client path).
    address: Option<Endpoint>,
    peer: Mutex<Option<Dispatch<Loopback>>>,
}

impl Loopback {
    fn online(address: Option<Endpoint>) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            address,
            peer: Mutex::new(None),
        })
    }

    fn link(&self, peer: Dispatch<Loopback>) {
        *self.peer.lock().unwrap() = Some(peer);
    }

    fn deliver(
        &self,
        frame: Bytes,
    ) -> Pin<Box<dyn Future<Output = wirecall::Result<Option<Bytes>>> + Send>> {
        let peer = self.peer.lock().unwrap().clone();
        let from = self.address.clone();
        Box::pin(async move {
            let peer = peer.ok_or(WirecallError::ConnectionClosed)?;
            peer.handle(&frame, from).await
        })
    }
}

impl Transport for Loopback {
    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn open(
        &self,
        _dispatch: Dispatch<Self>,
        _async_open: bool,
    ) -> impl Future<Output = wirecall::Result<()>> + Send {
        async { Ok(()) }
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        self.connected.store(false, Ordering::SeqCst);
        async {}
    }

    fn call(
        &self,
        ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = wirecall::Result<Bytes>> + Send {
        let name = ctx.name().to_string();
        let fut = self.deliver(frame);
        async move { fut.await?.ok_or(WirecallError::MethodNotFound(name)) }
    }

    fn post(
        &self,
        _ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = wirecall::Result<()>> + Send {
        let fut = self.deliver(frame);
        async move { fut.await.map(|_| ()) }
    }

    // One peer on this wire, so broadcast degenerates to it.
    fn call_all(
        &self,
        ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = wirecall::Result<Bytes>> + Send {
        self.call(ctx, frame)
    }

    fn post_all(
        &self,
        ctx: &MethodContext,
        frame: Bytes,
    ) -> impl Future<Output = wirecall::Result<()>> + Send {
        self.post(ctx, frame)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client_wire = Loopback::online(Some(Endpoint::new("demo-client")));
    let server_wire = Loopback::online(None);

    let client = Client::new(client_wire.clone());
    let server = Server::new(server_wire.clone());

    client_wire.link(server.dispatch());
    server_wire.link(client.dispatch());

    // The server answers echo calls, adds number pairs, and collects log lines.
    server.register_sync("echo", |s: String| async move { s });
    server.register_async("add", |(a, b): (i64, i64)| async move { a + b });
    server.register_notify("log", |line: String| async move {
        println!("[server] {line}");
    });

    client.connect(false).await?;
    server.start().await?;

    let reply: String = client
        .invoke(&MethodContext::new("echo"), &"hello".to_string())
        .await?;
    println!("echo -> {reply}");

    client
        .invoke_async(
            &MethodContext::new("add"),
            &(2i64, 3i64),
            |(a, b): (i64, i64), result: CallResult<i64>| match result {
                Ok(sum) => println!("add({a}, {b}) -> {sum}"),
                Err(e) => eprintln!("add({a}, {b}) failed: {e}"),
            },
        )
        .await?;

    client
        .notify(&MethodContext::new("log"), &"client says hi".to_string())
        .await?;

    client.disconnect().await;
    server.stop().await;

    Ok(())
}
