//! Yaesu System Fusion network protocol (`YSFD`)
//!
//! ```text
//! 0..4     "YSFD"
//! 4..14    gateway / repeater tag
//! 14..24   source callsign
//! 24..34   destination callsign
//! 34       frame counter << 1 | end of transmission
//! 35..155  air frame: sync(5) FICH(25) payload(90)
//! ```
//!
//! The payload is five 18-byte sections. Header and terminator frames fill
//! them with two convolutionally coded data channels (CSD1 and CSD2);
//! V/D mode 2 frames carry a 5-byte data channel and a 13-byte voice channel
//! per section.

pub mod fich;
pub mod payload;

use crate::callsign::YsfCallsign;
use crate::error::ParseError;

pub use fich::Fich;

pub const MAGIC: &[u8; 4] = b"YSFD";
pub const POLL_MAGIC: &[u8; 4] = b"YSFP";
pub const PACKET_LEN: usize = 155;
pub const FRAME_LEN: usize = 120;
pub const POLL_LEN: usize = 14;

pub const SYNC: [u8; 5] = [0xD4, 0x71, 0xC9, 0x63, 0x4D];
pub const SYNC_LEN: usize = 5;
pub const FICH_LEN: usize = 25;
/// Start of the 90-byte payload inside the air frame
pub const PAYLOAD_OFFSET: usize = SYNC_LEN + FICH_LEN;
pub const SECTION_LEN: usize = 18;
pub const SECTIONS: usize = 5;

/// Voice channel bytes per section, the DN-mode vocoder block size
pub const VCH_LEN: usize = 13;

/// Keystream XORed over data and voice channels
pub const WHITENING: [u8; 20] = [
    0x93, 0xD7, 0x51, 0x21, 0x9C, 0x2F, 0x6C, 0xD0, 0xEF, 0x0F, 0xF8, 0x3D, 0xF1, 0x73, 0x20, 0x94,
    0xED, 0x1E, 0x7C, 0xD8,
];

/// A parsed YSFD packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub gateway: YsfCallsign,
    pub src: YsfCallsign,
    pub dst: YsfCallsign,
    pub counter: u8,
    pub end: bool,
    pub frame: [u8; FRAME_LEN],
}

impl Packet {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 4)?;
        if &data[0..4] != MAGIC {
            return Err(ParseError::BadMagic(data[0..4].to_vec()));
        }
        ParseError::check_len(data, PACKET_LEN)?;

        let mut frame = [0u8; FRAME_LEN];
        frame.copy_from_slice(&data[35..155]);
        Ok(Self {
            gateway: YsfCallsign::from_bytes(&data[4..14]),
            src: YsfCallsign::from_bytes(&data[14..24]),
            dst: YsfCallsign::from_bytes(&data[24..34]),
            counter: data[34] >> 1,
            end: data[34] & 0x01 != 0,
            frame,
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4..14].copy_from_slice(self.gateway.as_bytes());
        out[14..24].copy_from_slice(self.src.as_bytes());
        out[24..34].copy_from_slice(self.dst.as_bytes());
        out[34] = (self.counter << 1) | u8::from(self.end);
        out[35..].copy_from_slice(&self.frame);
        out
    }
}

/// Keepalive carrying the gateway callsign
pub fn build_poll(callsign: &YsfCallsign) -> [u8; POLL_LEN] {
    let mut out = [0u8; POLL_LEN];
    out[0..4].copy_from_slice(POLL_MAGIC);
    out[4..].copy_from_slice(callsign.as_bytes());
    out
}

/// Air frame with the sync pattern in place and everything else zero
pub fn new_frame() -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..SYNC_LEN].copy_from_slice(&SYNC);
    frame
}

/// Pair positions for `sections` x 20 interleave, in coded-bit order
pub(crate) fn pair_interleave(sections: usize) -> Vec<usize> {
    (0..sections * 20)
        .map(|i| ((i % sections) * 20 + i / sections) * 2)
        .collect()
}

/// Bit positions for the 26 x 4 voice channel interleave
pub(crate) fn vch_interleave() -> [usize; 104] {
    let mut table = [0usize; 104];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (i % 26) * 4 + i / 26;
    }
    table
}

pub(crate) fn whiten(data: &mut [u8]) {
    for (b, k) in data.iter_mut().zip(WHITENING.iter()) {
        *b ^= k;
    }
}
