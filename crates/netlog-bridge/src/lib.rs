//! netlog bridge library entry.
//!
//! Wires config, the producer TCP intake, the viewer fan-out registry and
//! the WebSocket/HTTP routers into one relay. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod relay;
pub mod router;
pub mod server;
pub mod transport;
