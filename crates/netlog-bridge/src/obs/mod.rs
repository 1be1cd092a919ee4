//! Relay observability: atomics-backed counters and gauges served on
//! `/metrics`.

pub mod metrics;

pub use metrics::RelayMetrics;
