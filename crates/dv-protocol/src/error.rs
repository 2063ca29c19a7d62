//! Error types for digital-voice protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing or building protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Packet is shorter than its fixed layout requires
    #[error("short packet: need {needed} bytes, got {actual}")]
    ShortPacket { needed: usize, actual: usize },

    /// Packet does not start with the expected magic
    #[error("bad magic: {0:02X?}")]
    BadMagic(Vec<u8>),

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// CRC check failed
    #[error("{0} CRC mismatch")]
    CrcMismatch(&'static str),

    /// FEC decoding found more errors than it can correct
    #[error("uncorrectable {0} codeword")]
    Uncorrectable(&'static str),

    /// Callsign contains characters outside the protocol alphabet or is too long
    #[error("invalid callsign: {0}")]
    InvalidCallsign(String),

    /// Field value does not fit its wire width
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

impl ParseError {
    /// Convenience constructor for length checks
    pub fn check_len(data: &[u8], needed: usize) -> Result<(), ParseError> {
        if data.len() < needed {
            Err(ParseError::ShortPacket {
                needed,
                actual: data.len(),
            })
        } else {
            Ok(())
        }
    }
}
