//! Link information channel

use crate::error::ParseError;

pub const RFCT_RCCH: u8 = 0;
pub const RFCT_RTCH: u8 = 1;
pub const RFCT_RDCH: u8 = 2;

pub const USC_SACCH_NS: u8 = 0;
pub const USC_UDCH: u8 = 1;
pub const USC_SACCH_SS: u8 = 2;
pub const USC_SACCH_SS_IDLE: u8 = 3;

/// Both halves carry FACCH1 (header and trailer)
pub const STEAL_FACCH: u8 = 0;
/// First half FACCH1, second half voice
pub const STEAL_FACCH1_1: u8 = 1;
/// First half voice, second half FACCH1
pub const STEAL_FACCH1_2: u8 = 2;
/// Four voice blocks
pub const STEAL_NONE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lich {
    pub rfct: u8,
    pub usc: u8,
    pub option: u8,
    pub outbound: bool,
}

impl Lich {
    pub fn new(rfct: u8, usc: u8, option: u8) -> Self {
        Self {
            rfct: rfct & 0x03,
            usc: usc & 0x03,
            option: option & 0x03,
            outbound: true,
        }
    }

    /// Pack into one byte; bit 0 is even parity over the top four bits
    pub fn encode(&self) -> u8 {
        let byte = (self.rfct << 6) | (self.usc << 4) | (self.option << 2) | (u8::from(self.outbound) << 1);
        byte | ((byte >> 4).count_ones() as u8 & 1)
    }

    pub fn decode(byte: u8) -> Result<Self, ParseError> {
        if (byte >> 4).count_ones() as u8 & 1 != byte & 1 {
            return Err(ParseError::CrcMismatch("NXDN LICH"));
        }
        Ok(Self {
            rfct: byte >> 6,
            usc: (byte >> 4) & 0x03,
            option: (byte >> 2) & 0x03,
            outbound: byte & 0x02 != 0,
        })
    }

    /// Number of voice blocks the steal option leaves in a frame
    pub fn voice_blocks(&self) -> usize {
        match self.option {
            STEAL_NONE => 4,
            STEAL_FACCH1_1 | STEAL_FACCH1_2 => 2,
            _ => 0,
        }
    }
}
