//! netlog: network log relay and viewer state machine.
//!
//! Re-exports the protocol/viewer core and the bridge relay so users can
//! depend on a single crate. `prelude` carries the types a viewer embedding
//! needs.

pub mod core {
    pub use netlog_core::*;
}

pub mod bridge {
    pub use netlog_bridge::*;
}

pub mod prelude {
    pub use netlog_core::protocol::{FrameDecoder, LogRecord, Packet, Utf8Carry};
    pub use netlog_core::viewer::{Applied, HtmlSurface, RenderSink, ViewerOptions, ViewerSession};
    pub use netlog_core::{ErrorCode, NetlogError, Result};
}
