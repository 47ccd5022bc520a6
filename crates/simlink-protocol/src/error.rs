//! Error types for the adapter seam and the replay format

use thiserror::Error;

/// Errors reported by a simulation host adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The adapter has no open link to the host
    #[error("not connected to the simulator")]
    NotConnected,

    /// The host refused or dropped the connection
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// A request to the host failed
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The host answered, but with data the adapter could not use
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while reading or writing replay data
#[derive(Debug, Error)]
pub enum ReplayFormatError {
    /// File is not larger than the header, so it holds no records
    #[error("file is too small ({len} bytes, header alone is {header} bytes)")]
    TooSmall { len: u64, header: u64 },

    /// Magic number does not identify a replay file
    #[error("not a replay file - wrong magic number 0x{found:08X}")]
    BadMagic { found: u32 },

    /// Format version is not the one this build understands
    #[error("wrong version {found}, expected {expected}")]
    BadVersion { found: u32, expected: u32 },

    /// Data ended in the middle of a record
    #[error("record truncated while reading {field}")]
    Truncated { field: &'static str },

    /// Status byte is neither OK nor ERROR
    #[error("invalid packet status byte 0x{0:02X}")]
    InvalidStatus(u8),

    /// A length prefix exceeds the sanity bound
    #[error("{field} length {len} exceeds limit of {limit} bytes")]
    FieldTooLarge {
        field: &'static str,
        len: u32,
        limit: u32,
    },

    /// A text field is not valid UTF-8
    #[error("{field} is not valid UTF-8")]
    InvalidText { field: &'static str },

    /// Weather-only replies are never persisted
    #[error("packet {0} is not a telemetry packet")]
    NotTelemetry(u64),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
