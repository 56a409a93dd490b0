//! Error types for sFlow decoding and agent configuration

use thiserror::Error;

/// Broad failure category of a rejected datagram or sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer ended before a field or block could be read.
    TooShort,
    /// A version, type or format value is not the one this decoder handles.
    Mismatch,
    /// Declared lengths disagree with each other or with the buffer.
    Inconsistent,
}

/// Errors raised while decoding an sFlow v5 datagram
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SflowError {
    /// A field or block extends past the end of the datagram
    #[error("datagram truncated: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Datagram header carries a version other than 5
    #[error("unsupported sflow version {0}")]
    UnsupportedVersion(u32),

    /// Agent address type is neither IPv4 (1) nor IPv6 (2)
    #[error("unknown agent address type {0}")]
    UnknownAddressType(u32),

    /// A sample or record declares more bytes than remain
    #[error("block length {declared} exceeds the {remaining} remaining bytes")]
    LengthOverrun { declared: usize, remaining: usize },

    /// Decoding finished somewhere other than the declared end
    #[error("decoding stopped at offset {cursor}, datagram ends at {end}")]
    LengthMismatch { cursor: usize, end: usize },

    /// Flow sample does not carry exactly one flow record
    #[error("flow sample carries {0} records, expected exactly one")]
    RecordCount(u32),

    /// Flow record is not a raw packet header (enterprise 0, format 1)
    #[error("unsupported flow record {enterprise}:{format}")]
    UnsupportedRecord { enterprise: u32, format: u32 },

    /// Raw packet header is not Ethernet
    #[error("unsupported header protocol {0}")]
    UnsupportedHeaderProtocol(u32),

    /// Sampled header had bytes stripped before export
    #[error("sampled header has {0} stripped bytes")]
    StrippedBytes(u32),
}

impl SflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SflowError::Truncated { .. } => ErrorKind::TooShort,
            SflowError::UnsupportedVersion(_)
            | SflowError::UnknownAddressType(_)
            | SflowError::UnsupportedRecord { .. }
            | SflowError::UnsupportedHeaderProtocol(_)
            | SflowError::StrippedBytes(_) => ErrorKind::Mismatch,
            SflowError::LengthOverrun { .. }
            | SflowError::LengthMismatch { .. }
            | SflowError::RecordCount(_) => ErrorKind::Inconsistent,
        }
    }
}

/// Invalid [`SflowConfig`](crate::SflowConfig) values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window_secs must be greater than zero")]
    ZeroWindow,

    #[error("history_capacity must be greater than zero")]
    ZeroHistoryCapacity,

    #[error("agent_idle_timeout_secs must be greater than zero when set")]
    ZeroIdleTimeout,
}

/// Result type alias for sFlow decoding
pub type Result<T> = std::result::Result<T, SflowError>;
