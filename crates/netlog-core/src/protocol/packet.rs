//! Producer packet schema.
//!
//! Every packet is a JSON object with an `action` tag. The tag is read first,
//! then the body is parsed against the schema for that action, so an unknown
//! action is reported by name instead of failing as a parse error.
//!
//! Producers have historically quoted numeric fields (`"severity":"2"`), so
//! `type`, `severity`, `line` and `peer_port` accept numbers or decimal
//! strings, and `timestamp` accepts either form as text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{de, Deserialize, Deserializer};
use serde_json::json;

use crate::error::{NetlogError, Result};

/// Highest (most verbose) severity rank.
pub const MAX_SEVERITY: u8 = 3;

/// Message style, indexed by the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Raw,
    Normal,
    Item,
    Event,
    Notify,
    Warning,
    Error,
    Fatal,
    Bang,
    Good,
    Bad,
}

impl MsgType {
    pub const ALL: [MsgType; 11] = [
        MsgType::Raw,
        MsgType::Normal,
        MsgType::Item,
        MsgType::Event,
        MsgType::Notify,
        MsgType::Warning,
        MsgType::Error,
        MsgType::Fatal,
        MsgType::Bang,
        MsgType::Good,
        MsgType::Bad,
    ];

    pub fn from_index(idx: u64) -> Option<Self> {
        usize::try_from(idx).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Style class name used by the render surface.
    pub fn class_name(self) -> &'static str {
        match self {
            MsgType::Raw => "raw",
            MsgType::Normal => "normal",
            MsgType::Item => "item",
            MsgType::Event => "event",
            MsgType::Notify => "notify",
            MsgType::Warning => "warning",
            MsgType::Error => "error",
            MsgType::Fatal => "fatal",
            MsgType::Bang => "bang",
            MsgType::Good => "good",
            MsgType::Bad => "bad",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.class_name() == name)
    }
}

/// A single log statement (`action = "msg"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub channel: String,
    /// Decoded message bytes (usually text with ANSI escapes).
    pub message: Vec<u8>,
    pub timestamp: String,
    pub msg_type: MsgType,
    /// 3 = always shown .. 0 = only at max verbosity.
    pub severity: u8,
    /// Empty when not applicable.
    pub file: String,
    pub line: u32,
}

/// Decoded producer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Msg(LogRecord),
    SetChannels { channels: Vec<String> },
    NewConnection,
    /// Producer announced its socket endpoint.
    Connect { peer_ip: String, peer_port: u16 },
    /// Producer is about to close its connection.
    Disconnect,
    Unknown { action: String },
}

impl Packet {
    /// Parse one frame of packet text.
    pub fn parse(text: &str) -> Result<Packet> {
        let header: Header = serde_json::from_str(text)
            .map_err(|e| NetlogError::BadPacket(format!("invalid packet json: {e}")))?;

        match header.action.as_str() {
            "msg" => {
                let w: MsgWire = body(text)?;
                let msg_type = MsgType::from_index(w.msg_type).ok_or_else(|| {
                    NetlogError::BadPacket(format!("msg type out of range: {}", w.msg_type))
                })?;
                let severity = u8::try_from(w.severity)
                    .ok()
                    .filter(|s| *s <= MAX_SEVERITY)
                    .ok_or_else(|| {
                        NetlogError::BadPacket(format!("severity out of range: {}", w.severity))
                    })?;
                let line = u32::try_from(w.line)
                    .map_err(|_| NetlogError::BadPacket(format!("line out of range: {}", w.line)))?;
                let message = BASE64
                    .decode(w.message.trim())
                    .map_err(|e| NetlogError::BadPacket(format!("message is not base64: {e}")))?;

                Ok(Packet::Msg(LogRecord {
                    channel: w.channel,
                    message,
                    timestamp: w.timestamp,
                    msg_type,
                    severity,
                    file: w.file,
                    line,
                }))
            }
            "set_channels" => {
                let w: SetChannelsWire = body(text)?;
                Ok(Packet::SetChannels { channels: w.channels })
            }
            "new_connection" => Ok(Packet::NewConnection),
            "connect" => {
                let w: ConnectWire = body(text)?;
                let peer_port = u16::try_from(w.peer_port).map_err(|_| {
                    NetlogError::BadPacket(format!("peer_port out of range: {}", w.peer_port))
                })?;
                Ok(Packet::Connect { peer_ip: w.peer_ip, peer_port })
            }
            "disconnect" => Ok(Packet::Disconnect),
            _ => Ok(Packet::Unknown { action: header.action }),
        }
    }

    /// Wire action name.
    pub fn action(&self) -> &str {
        match self {
            Packet::Msg(_) => "msg",
            Packet::SetChannels { .. } => "set_channels",
            Packet::NewConnection => "new_connection",
            Packet::Connect { .. } => "connect",
            Packet::Disconnect => "disconnect",
            Packet::Unknown { action } => action,
        }
    }

    /// Encode back to the producer wire form.
    pub fn to_json(&self) -> String {
        let v = match self {
            Packet::Msg(r) => json!({
                "action": "msg",
                "channel": r.channel,
                "message": BASE64.encode(&r.message),
                "timestamp": r.timestamp,
                "type": r.msg_type.index(),
                "severity": r.severity,
                "file": r.file,
                "line": r.line,
            }),
            Packet::SetChannels { channels } => json!({
                "action": "set_channels",
                "channels": channels,
            }),
            Packet::Connect { peer_ip, peer_port } => json!({
                "action": "connect",
                "peer_ip": peer_ip,
                "peer_port": peer_port,
            }),
            other => json!({ "action": other.action() }),
        };
        v.to_string()
    }
}

fn body<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| NetlogError::BadPacket(format!("invalid packet body: {e}")))
}

#[derive(Deserialize)]
struct Header {
    action: String,
}

#[derive(Deserialize)]
struct MsgWire {
    channel: String,
    message: String,
    #[serde(deserialize_with = "lenient_text")]
    timestamp: String,
    #[serde(rename = "type", deserialize_with = "lenient_uint")]
    msg_type: u64,
    #[serde(deserialize_with = "lenient_uint")]
    severity: u64,
    #[serde(default)]
    file: String,
    #[serde(default, deserialize_with = "lenient_uint")]
    line: u64,
}

#[derive(Deserialize)]
struct SetChannelsWire {
    channels: Vec<String>,
}

#[derive(Deserialize)]
struct ConnectWire {
    #[serde(default)]
    peer_ip: String,
    #[serde(default, deserialize_with = "lenient_uint")]
    peer_port: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(u64),
    Float(f64),
    Text(String),
}

fn lenient_uint<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    match Lenient::deserialize(d)? {
        Lenient::Int(n) => Ok(n),
        Lenient::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        Lenient::Float(f) => Err(de::Error::custom(format!("expected unsigned integer, got {f}"))),
        Lenient::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected unsigned integer, got {s:?}"))),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Lenient::deserialize(d)? {
        Lenient::Int(n) => n.to_string(),
        Lenient::Float(f) => f.to_string(),
        Lenient::Text(s) => s,
    })
}
