//! Relay end-to-end tests over real sockets on ephemeral ports.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use netlog_bridge::{
    app_state::AppState,
    config::NetlogConfig,
    server::{self, BoundAddrs, Listeners},
};
use netlog_core::error::Result;
use netlog_core::viewer::{Applied, HtmlSurface, ViewerSession};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

const HELLO: &str = r#"{"action":"msg","channel":"core","message":"aGVsbG8=","timestamp":"t0","type":1,"severity":0,"file":"","line":0}"#;

struct Harness {
    state: AppState,
    addrs: BoundAddrs,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl Harness {
    async fn start(static_dir: Option<PathBuf>) -> Self {
        let mut cfg = NetlogConfig::default();
        cfg.bridge.tcp_port = 0;
        cfg.bridge.ws_bind_address = "127.0.0.1".into();
        cfg.bridge.ws_port = 0;
        cfg.bridge.http_bind_address = "127.0.0.1".into();
        cfg.bridge.http_port = 0;
        cfg.bridge.ping_interval_ms = 0;
        if let Some(dir) = static_dir {
            cfg.bridge.static_dir = dir.to_string_lossy().into_owned();
        }

        let listeners = Listeners::bind(&cfg.bridge).await.unwrap();
        let addrs = listeners.local_addrs().unwrap();
        let state = AppState::new(cfg);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server::serve(state.clone(), listeners, async move {
            let _ = stopped.await;
        }));

        Self { state, addrs, stop: Some(stop), task }
    }

    async fn viewer(&self) -> Ws {
        let (ws, _) = connect_async(format!("ws://{}/", self.addrs.ws)).await.unwrap();
        ws
    }

    async fn producer(&self) -> TcpStream {
        TcpStream::connect(self.addrs.tcp).await.unwrap()
    }

    async fn wait_viewers(&self, n: usize) {
        timeout(WAIT, async {
            while self.state.viewers().len() != n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("viewer count never settled");
    }

    async fn wait_chunks(&self, n: u64) {
        timeout(WAIT, async {
            while self.state.metrics().chunks_forwarded.get(&[]) < n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("chunks never forwarded");
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(WAIT, self.task).await.unwrap().unwrap().unwrap();
    }
}

/// Read text messages until `want` bytes have arrived; pings are skipped.
async fn read_texts(ws: &mut Ws, want: usize) -> Vec<String> {
    let mut texts = Vec::new();
    let mut total = 0;
    timeout(WAIT, async {
        while total < want {
            match ws.next().await {
                Some(Ok(Message::Text(t))) => {
                    total += t.len();
                    texts.push(t);
                }
                Some(Ok(_)) => {}
                other => panic!("viewer stream ended early: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for relay output");
    texts
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut s = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    s.write_all(req.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    timeout(WAIT, s.read_to_end(&mut buf)).await.unwrap().unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn two_viewers_receive_every_chunk_in_order() {
    let h = Harness::start(None).await;
    let mut v1 = h.viewer().await;
    let mut v2 = h.viewer().await;
    h.wait_viewers(2).await;

    let mut p = h.producer().await;
    let chunks = [r#"{"action":"set_channels","#, r#""channels":["core"]}"#, HELLO, "{\"action\":\"disc", "onnect\"}"];
    for c in chunks {
        p.write_all(c.as_bytes()).await.unwrap();
        p.flush().await.unwrap();
        sleep(Duration::from_millis(5)).await;
    }
    let expected = chunks.concat();

    assert_eq!(read_texts(&mut v1, expected.len()).await.concat(), expected);
    assert_eq!(read_texts(&mut v2, expected.len()).await.concat(), expected);

    h.shutdown().await;
}

#[tokio::test]
async fn viewer_leaving_mid_stream_does_not_disturb_others() {
    let h = Harness::start(None).await;
    let mut v1 = h.viewer().await;
    let mut v2 = h.viewer().await;
    h.wait_viewers(2).await;

    let mut p = h.producer().await;
    p.write_all(b"{\"action\":\"connect\"}").await.unwrap();
    assert_eq!(read_texts(&mut v1, 20).await.concat(), "{\"action\":\"connect\"}");
    assert_eq!(read_texts(&mut v2, 20).await.concat(), "{\"action\":\"connect\"}");

    v1.close(None).await.unwrap();
    drop(v1);
    h.wait_viewers(1).await;

    p.write_all(HELLO.as_bytes()).await.unwrap();
    assert_eq!(read_texts(&mut v2, HELLO.len()).await.concat(), HELLO);
    assert_eq!(h.state.metrics().viewers_active.get(&[]), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn msg_then_new_connection_leaves_viewer_empty() {
    let h = Harness::start(None).await;
    let mut ws = h.viewer().await;
    h.wait_viewers(1).await;

    let mut p = h.producer().await;
    let payload = format!("{HELLO}{{\"action\":\"new_connection\"}}");
    p.write_all(payload.as_bytes()).await.unwrap();

    let mut session = ViewerSession::new(HtmlSurface::new());
    let mut applied = Vec::new();
    for text in read_texts(&mut ws, payload.len()).await {
        applied.extend(session.on_transport_message(&text));
    }

    assert_eq!(applied, vec![Applied::Rendered, Applied::Cleared]);
    assert!(session.sink().is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn split_utf8_arrives_as_valid_text() {
    let h = Harness::start(None).await;
    let mut ws = h.viewer().await;
    h.wait_viewers(1).await;

    let text = r#"{"action":"set_channels","channels":["café"]}"#;
    let bytes = text.as_bytes();
    let cut = text.find('é').unwrap() + 1;

    let mut p = h.producer().await;
    p.write_all(&bytes[..cut]).await.unwrap();
    p.flush().await.unwrap();
    sleep(Duration::from_millis(50)).await;
    p.write_all(&bytes[cut..]).await.unwrap();

    assert_eq!(read_texts(&mut ws, bytes.len()).await.concat(), text);

    h.shutdown().await;
}

#[tokio::test]
async fn late_viewer_sees_only_new_data_and_producers_are_independent() {
    let h = Harness::start(None).await;

    let mut early = h.producer().await;
    early.write_all(b"{\"action\":\"disconnect\"}").await.unwrap();
    h.wait_chunks(1).await;
    drop(early);

    let mut ws = h.viewer().await;
    h.wait_viewers(1).await;

    let mut late = h.producer().await;
    late.write_all(HELLO.as_bytes()).await.unwrap();
    assert_eq!(read_texts(&mut ws, HELLO.len()).await.concat(), HELLO);
    assert_eq!(h.state.metrics().producer_connections.get(&[]), 2);

    h.shutdown().await;
}

#[tokio::test]
async fn http_serves_assets_redirect_and_ops() {
    let dir = std::env::temp_dir().join(format!("netlog-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("log.html"), "<html>netlog viewer</html>").unwrap();

    let h = Harness::start(Some(dir.clone())).await;

    let root = http_get(h.addrs.http, "/").await.to_ascii_lowercase();
    assert!(root.starts_with("http/1.1 307"), "{root}");
    assert!(root.contains("location: /log.html"), "{root}");

    let page = http_get(h.addrs.http, "/log.html").await;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.ends_with("<html>netlog viewer</html>"));

    let health = http_get(h.addrs.http, "/healthz").await;
    assert!(health.ends_with("ok"));

    let metrics = http_get(h.addrs.http, "/metrics").await;
    assert!(metrics.contains("netlog_viewers_active 0"));
    assert!(metrics.contains("# TYPE netlog_bytes_forwarded_total counter"));

    let missing = http_get(h.addrs.http, "/nope.js").await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

    h.shutdown().await;
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn bind_conflict_is_an_io_error() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut cfg = NetlogConfig::default();
    cfg.bridge.tcp_port = port;
    cfg.bridge.ws_port = 0;
    cfg.bridge.http_port = 0;

    let err = Listeners::bind(&cfg.bridge).await.err().expect("bind must fail");
    assert_eq!(err.code().as_str(), "IO");
    assert!(err.to_string().contains("producer"));
}
