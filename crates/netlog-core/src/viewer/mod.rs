//! Viewer-side state machine: channel registry, filters, markup and the
//! render surface driven by decoded packets.

pub mod channels;
pub mod filter;
pub mod markup;
pub mod render;
pub mod session;

pub use channels::{ChannelEntry, ChannelRegistry, Rgb};
pub use filter::FilterState;
pub use markup::{AnsiHtml, MarkupConverter};
pub use render::{HtmlSurface, RenderEntry, RenderSink, SessionMeta, Visibility};
pub use session::{Applied, SessionState, ViewerOptions, ViewerSession};
