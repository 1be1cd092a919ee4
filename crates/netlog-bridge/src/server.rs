//! Listener binding and the relay's top-level serve loop.

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;

use netlog_core::error::{NetlogError, Result};

use crate::app_state::AppState;
use crate::config::BridgeSection;
use crate::relay::producer;
use crate::router;

/// The three sockets the relay owns, bound before anything is served.
pub struct Listeners {
    pub tcp: TcpListener,
    pub ws: TcpListener,
    pub http: TcpListener,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundAddrs {
    pub tcp: SocketAddr,
    pub ws: SocketAddr,
    pub http: SocketAddr,
}

impl Listeners {
    pub async fn bind(bridge: &BridgeSection) -> Result<Self> {
        Ok(Self {
            tcp: bind("producer", bridge.tcp_addr()?).await?,
            ws: bind("websocket", bridge.ws_addr()?).await?,
            http: bind("http", bridge.http_addr()?).await?,
        })
    }

    pub fn local_addrs(&self) -> Result<BoundAddrs> {
        Ok(BoundAddrs {
            tcp: self.tcp.local_addr()?,
            ws: self.ws.local_addr()?,
            http: self.http.local_addr()?,
        })
    }
}

async fn bind(role: &str, addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        NetlogError::Io(io::Error::new(e.kind(), format!("bind {role} listener on {addr}: {e}")))
    })
}

/// Run until `shutdown` resolves. The WS and HTTP servers drain gracefully;
/// the producer accept loop is aborted.
pub async fn serve<F>(state: AppState, listeners: Listeners, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let producers = tokio::spawn(producer::accept_loop(listeners.tcp, state.clone()));

    let ws = axum::serve(listeners.ws, router::build_ws_router(state.clone()))
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let http = axum::serve(listeners.http, router::build_http_router(state))
        .with_graceful_shutdown(stopped(stop_rx));

    let served = tokio::try_join!(ws.into_future(), http.into_future());
    producers.abort();
    served?;

    tracing::info!("relay stopped");
    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
