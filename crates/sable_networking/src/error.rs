//! # Networking Error Types

use thiserror::Error;

/// Errors raised while encoding or decoding replication messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Packet shorter than the fixed header.
    #[error("packet of {len} bytes is shorter than the header")]
    TooShort {
        /// Packet length.
        len: usize,
    },

    /// Header type byte out of range.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// A component segment runs past the end of the packet.
    #[error("component segment at offset {offset} is truncated")]
    TruncatedSegment {
        /// Offset of the segment start.
        offset: usize,
    },

    /// A segment's system name is not UTF-8.
    #[error("component segment at offset {offset} has an invalid system name")]
    InvalidSystemName {
        /// Offset of the segment start.
        offset: usize,
    },

    /// A system name does not fit the one-byte length prefix.
    #[error("system name '{0}' is longer than 255 bytes")]
    NameTooLong(String),
}

/// Result type for networking operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
