//! Shared error type across netlog crates.

use thiserror::Error;

/// Stable error codes (rendered in inline error entries and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Packet text is not valid JSON or violates the packet schema.
    BadPacket,
    /// A frame grew past the decoder limit before it was closed.
    FrameTooLarge,
    /// An exported session fragment could not be read back.
    BadSession,
    /// Configuration could not be parsed or failed validation.
    BadConfig,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Socket or file I/O failure.
    Io,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in rendered entries.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadPacket => "BAD_PACKET",
            ErrorCode::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorCode::BadSession => "BAD_SESSION",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, NetlogError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Error)]
pub enum NetlogError {
    #[error("bad packet: {0}")]
    BadPacket(String),
    #[error("frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("bad session file: {0}")]
    BadSession(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl NetlogError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            NetlogError::BadPacket(_) => ErrorCode::BadPacket,
            NetlogError::FrameTooLarge { .. } => ErrorCode::FrameTooLarge,
            NetlogError::BadSession(_) => ErrorCode::BadSession,
            NetlogError::BadConfig(_) => ErrorCode::BadConfig,
            NetlogError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            NetlogError::Io(_) => ErrorCode::Io,
            NetlogError::Internal(_) => ErrorCode::Internal,
        }
    }
}
