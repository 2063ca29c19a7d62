//! DMR link control
//!
//! The 9-byte LC names the call: FLCO (group or private), feature set,
//! service options, destination and source. Voice headers and terminators
//! carry it as full LC (RS(12,9) + BPTC), voice superframes as embedded LC.

use crate::error::ParseError;
use crate::fec::{bptc, rs129};

/// FLCO of a group voice call
pub const FLCO_GROUP: u8 = 0x00;
/// FLCO of a unit-to-unit voice call
pub const FLCO_PRIVATE: u8 = 0x03;

/// Which full-LC burst the RS parity is masked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullLcKind {
    VoiceHeader,
    Terminator,
}

impl FullLcKind {
    fn mask(self) -> u8 {
        match self {
            FullLcKind::VoiceHeader => 0x96,
            FullLcKind::Terminator => 0x99,
        }
    }
}

/// Decoded link control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lc {
    pub group: bool,
    pub fid: u8,
    pub options: u8,
    pub dst: u32,
    pub src: u32,
}

impl Lc {
    pub fn new(group: bool, src: u32, dst: u32) -> Self {
        Self {
            group,
            fid: 0,
            options: 0,
            dst: dst & 0xFF_FFFF,
            src: src & 0xFF_FFFF,
        }
    }

    pub fn to_bytes(&self) -> [u8; 9] {
        let dst = self.dst.to_be_bytes();
        let src = self.src.to_be_bytes();
        [
            if self.group { FLCO_GROUP } else { FLCO_PRIVATE },
            self.fid,
            self.options,
            dst[1],
            dst[2],
            dst[3],
            src[1],
            src[2],
            src[3],
        ]
    }

    pub fn from_bytes(data: &[u8; 9]) -> Result<Self, ParseError> {
        let group = match data[0] & 0x3F {
            FLCO_GROUP => true,
            FLCO_PRIVATE => false,
            other => {
                return Err(ParseError::InvalidFrame(format!(
                    "unsupported FLCO 0x{other:02X}"
                )))
            }
        };
        Ok(Self {
            group,
            fid: data[1],
            options: data[2],
            dst: u32::from_be_bytes([0, data[3], data[4], data[5]]),
            src: u32::from_be_bytes([0, data[6], data[7], data[8]]),
        })
    }
}

/// Write full LC into the BPTC payload of a data burst
pub fn encode_full(lc: &Lc, kind: FullLcKind, burst: &mut [u8; 33]) {
    let msg = lc.to_bytes();
    let parity = rs129::encode(&msg);
    let mut codeword = [0u8; 12];
    codeword[..9].copy_from_slice(&msg);
    for (i, p) in parity.iter().enumerate() {
        codeword[9 + i] = p ^ kind.mask();
    }
    bptc::encode(&codeword, burst);
}

/// Recover full LC from a data burst, checking the masked RS parity
pub fn decode_full(burst: &[u8; 33], kind: FullLcKind) -> Result<Lc, ParseError> {
    let mut codeword = bptc::decode(burst);
    for p in &mut codeword[9..] {
        *p ^= kind.mask();
    }
    if !rs129::check(&codeword) {
        return Err(ParseError::CrcMismatch("DMR full LC"));
    }
    let mut msg = [0u8; 9];
    msg.copy_from_slice(&codeword[..9]);
    Lc::from_bytes(&msg)
}
