//! In-process relay metrics rendered in Prometheus text format.
//!
//! Counters and gauges carry optional labels backed by `DashMap`. Label sets
//! are sorted so one series always maps to one key.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn series(name: &str, key: &LabelKey) -> String {
    if key.is_empty() {
        return name.to_string();
    }
    let labels = key
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{labels}}}")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        if self.map.is_empty() {
            let _ = writeln!(out, "{name} 0");
        }
        for r in self.map.iter() {
            let _ = writeln!(out, "{} {}", series(name, r.key()), r.value().load(Ordering::Relaxed));
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self.map.entry(label_key(labels)).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |g| g.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        if self.map.is_empty() {
            let _ = writeln!(out, "{name} 0");
        }
        for r in self.map.iter() {
            let _ = writeln!(out, "{} {}", series(name, r.key()), r.value().load(Ordering::Relaxed));
        }
    }
}

#[derive(Default)]
pub struct RelayMetrics {
    pub producers_active: GaugeVec,
    pub viewers_active: GaugeVec,
    pub producer_connections: CounterVec,
    pub viewer_connections: CounterVec,
    pub chunks_forwarded: CounterVec,
    pub bytes_forwarded: CounterVec,
    /// Labelled by `reason` (`closed`, `stalled`).
    pub viewer_send_failures: CounterVec,
    /// Labelled by `stage` (`accept`, `read`).
    pub producer_errors: CounterVec,
}

impl RelayMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.producers_active.render("netlog_producers_active", &mut out);
        self.viewers_active.render("netlog_viewers_active", &mut out);
        self.producer_connections.render("netlog_producer_connections_total", &mut out);
        self.viewer_connections.render("netlog_viewer_connections_total", &mut out);
        self.chunks_forwarded.render("netlog_chunks_forwarded_total", &mut out);
        self.bytes_forwarded.render("netlog_bytes_forwarded_total", &mut out);
        self.viewer_send_failures.render("netlog_viewer_send_failures_total", &mut out);
        self.producer_errors.render("netlog_producer_errors_total", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_unlabelled_and_labelled_series() {
        let m = RelayMetrics::default();
        m.viewers_active.inc(&[]);
        m.viewers_active.inc(&[]);
        m.viewers_active.dec(&[]);
        m.producer_errors.inc(&[("stage", "read")]);
        m.bytes_forwarded.add(&[], 42);

        let text = m.render();
        assert!(text.contains("# TYPE netlog_viewers_active gauge\nnetlog_viewers_active 1\n"));
        assert!(text.contains("netlog_producer_errors_total{stage=\"read\"} 1"));
        assert!(text.contains("netlog_bytes_forwarded_total 42"));
        assert!(text.contains("netlog_chunks_forwarded_total 0"));
        assert_eq!(m.bytes_forwarded.get(&[]), 42);
    }

    #[test]
    fn label_order_does_not_split_series() {
        let c = CounterVec::default();
        c.inc(&[("a", "1"), ("b", "2")]);
        c.inc(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.get(&[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn label_values_are_escaped() {
        let c = CounterVec::default();
        c.inc(&[("peer", "a\"b")]);
        let mut out = String::new();
        c.render("x", &mut out);
        assert!(out.contains(r#"x{peer="a\"b"} 1"#));
    }
}
