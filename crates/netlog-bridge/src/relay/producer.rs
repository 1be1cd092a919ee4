//! Producer side of the relay: one TCP accept loop, one task per producer.
//!
//! Every read is forwarded as one WebSocket text message to all viewers
//! connected at that moment. Nothing is framed, reordered or retained for
//! late viewers. Idle producers are never timed out.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use netlog_core::protocol::Utf8Carry;

use crate::app_state::AppState;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept producers until the task is aborted.
pub async fn accept_loop(listener: TcpListener, app: AppState) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let app = app.clone();
                tokio::spawn(async move {
                    handle_producer(app, stream, peer).await;
                });
            }
            Err(e) => {
                app.metrics().producer_errors.inc(&[("stage", "accept")]);
                tracing::warn!(error = %e, "producer accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_producer(app: AppState, mut stream: TcpStream, peer: SocketAddr) {
    let metrics = app.metrics();
    metrics.producer_connections.inc(&[]);
    metrics.producers_active.inc(&[]);
    tracing::info!(%peer, "producer connected");

    let cap = app.cfg().bridge.read_buffer_bytes;
    let mut buf = BytesMut::with_capacity(cap);
    let mut carry = Utf8Carry::new();

    loop {
        buf.clear();
        buf.reserve(cap);
        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                if let Some(rest) = carry.finish() {
                    forward(&app, rest).await;
                }
                tracing::info!(%peer, "producer closed");
                break;
            }
            Ok(n) => {
                tracing::debug!(%peer, bytes = n, "producer chunk");
                if let Some(text) = carry.push(&buf) {
                    forward(&app, text).await;
                }
            }
            Err(e) => {
                metrics.producer_errors.inc(&[("stage", "read")]);
                tracing::warn!(%peer, error = %e, "producer read failed");
                break;
            }
        }
    }

    metrics.producers_active.dec(&[]);
}

async fn forward(app: &AppState, text: String) {
    let len = text.len();
    let delivery = app.viewers().broadcast(Message::Text(text)).await;

    let metrics = app.metrics();
    metrics.chunks_forwarded.inc(&[]);
    metrics.bytes_forwarded.add(&[], len as u64);
    if delivery.closed > 0 {
        metrics.viewer_send_failures.add(&[("reason", "closed")], delivery.closed as u64);
    }
    if delivery.stalled > 0 {
        metrics.viewer_send_failures.add(&[("reason", "stalled")], delivery.stalled as u64);
    }
    if delivery.dropped() > 0 {
        tracing::warn!(closed = delivery.closed, stalled = delivery.stalled, "viewers removed from fan-out");
    }
}
