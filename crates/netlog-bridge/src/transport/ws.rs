//! Viewer WebSocket session.
//!
//! Each viewer gets a bounded outbound queue registered in the fan-out set.
//! The session task drains that queue into the socket, answers pings, sends
//! keepalive pings and ignores anything the viewer writes. Close, error or
//! eviction by the fan-out (queue stuck full) tears down only this viewer.

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::relay::Connection;

pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_session(app, socket))
}

async fn run_session(app: AppState, socket: WebSocket) {
    let bridge = &app.cfg().bridge;
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(bridge.viewer_queue);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let conn = Connection::new(out_tx.clone());
    let evicted = conn.eviction();
    let viewer_id = app.viewers().insert(conn);
    let metrics = app.metrics();
    metrics.viewer_connections.inc(&[]);
    metrics.viewers_active.inc(&[]);
    tracing::info!(viewer_id, viewers = app.viewers().len(), "viewer connected");

    let ping_enabled = bridge.ping_interval_ms > 0;
    let ping_every = Duration::from_millis(bridge.ping_interval_ms.max(1));
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                let Some(m) = maybe_out else { break };
                if let Err(e) = ws_tx.send(m).await {
                    tracing::debug!(viewer_id, error = %e, "viewer write failed");
                    break;
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Ping(payload) => {
                        let _ = out_tx.try_send(Message::Pong(payload));
                    }
                    Message::Close(_) => break,
                    Message::Text(_) | Message::Binary(_) | Message::Pong(_) => {}
                }
            }

            _ = ping_tick.tick(), if ping_enabled => {
                let _ = out_tx.try_send(Message::Ping(Vec::new()));
            }

            _ = evicted.notified() => {
                tracing::warn!(viewer_id, "viewer too slow, closing");
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    app.viewers().remove(viewer_id);
    metrics.viewers_active.dec(&[]);
    tracing::info!(viewer_id, "viewer disconnected");
}
