use axum::extract::ws::Message;
use dashmap::DashMap;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio::time::{timeout, Duration};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// One viewer's outbound queue sender plus the signal that tells its session
/// it was dropped from the fan-out.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
    evicted: Arc<Notify>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self {
            tx,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Resolves once the registry has evicted this viewer.
    pub fn eviction(&self) -> Arc<Notify> {
        self.evicted.clone()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Viewers whose queue was closed; they have been removed.
    pub closed: usize,
    /// Viewers whose queue stayed full past the send timeout; evicted.
    pub stalled: usize,
}

impl Delivery {
    pub fn dropped(&self) -> usize {
        self.closed + self.stalled
    }
}

enum Outcome {
    Queued,
    Closed,
    Stalled,
}

/// Fan-out set of connected viewers: `viewer_id -> Connection`.
pub struct ViewerRegistry {
    viewers: DashMap<u64, Connection>,
    seq: AtomicU64,
    send_timeout: Duration,
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            viewers: DashMap::new(),
            seq: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Register a viewer and return its id.
    pub fn insert(&self, conn: Connection) -> u64 {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.viewers.insert(id, conn);
        id
    }

    pub fn remove(&self, id: u64) -> Option<Connection> {
        self.viewers.remove(&id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Queue `msg` on every viewer concurrently. A queue that stays full for
    /// the send timeout, or is closed, gets its viewer evicted; the others
    /// are never held up by more than that timeout.
    pub async fn broadcast(&self, msg: Message) -> Delivery {
        // Snapshot first: no map guard may be held across an await.
        let targets: Vec<(u64, Connection)> = self
            .viewers
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();

        let wait = self.send_timeout;
        let mut futs = FuturesUnordered::new();
        for (id, conn) in targets {
            let msg = msg.clone();
            futs.push(async move {
                let outcome = match timeout(wait, conn.tx.send(msg)).await {
                    Ok(Ok(())) => Outcome::Queued,
                    Ok(Err(_)) => Outcome::Closed,
                    Err(_) => Outcome::Stalled,
                };
                (id, conn, outcome)
            });
        }

        let mut report = Delivery::default();
        while let Some((id, conn, outcome)) = futs.next().await {
            match outcome {
                Outcome::Queued => report.delivered += 1,
                Outcome::Closed => {
                    self.viewers.remove(&id);
                    report.closed += 1;
                    tracing::debug!(viewer_id = id, "viewer queue closed, removed from fan-out");
                }
                Outcome::Stalled => {
                    self.viewers.remove(&id);
                    conn.evicted.notify_one();
                    report.stalled += 1;
                    tracing::warn!(viewer_id = id, timeout_ms = wait.as_millis() as u64, "viewer queue full, evicted");
                }
            }
        }
        report
    }
}
