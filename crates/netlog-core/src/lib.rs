//! netlog core: transport-agnostic log protocol primitives and viewer state.
//!
//! This crate defines the wire contract between instrumented producers and
//! viewers (packet schema, stream framing) together with the viewer-side
//! state machine that turns decoded packets into rendered, filterable log
//! entries. It carries no async runtime dependency so the relay, tests and
//! offline tooling can all share it.
//!
//! # Panic-free
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed input from producers surfaces as `NetlogError` and is rendered
//! as an inline error entry rather than stopping the stream.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod viewer;

/// Shared error types.
pub use error::{ErrorCode, NetlogError, Result};
