//! Protocol modules (stream framing + packet schema).
//!
//! - `chunk`: UTF-8 carry for relaying arbitrary TCP reads as text messages.
//! - `frame`: incremental scanner that cuts a text stream into JSON objects.
//! - `packet`: the closed set of producer actions and their fields.
//!
//! All parsers are panic-free: malformed input is reported as `NetlogError`
//! so one bad packet never stalls the rest of the stream.

pub mod chunk;
pub mod frame;
pub mod packet;

pub use chunk::Utf8Carry;
pub use frame::FrameDecoder;
pub use packet::{LogRecord, Packet};
