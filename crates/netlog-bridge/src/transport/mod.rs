//! Transport layer (viewer WebSocket endpoint).

pub mod ws;
