//! NXDN over the Icom network protocol (`ICOM`)
//!
//! Packets are 102 bytes. Bytes 37..40 say whether the frame is a
//! header/trailer or voice; the frame itself starts at byte 40:
//!
//! ```text
//! 40      LICH
//! 41..45  SACCH (26 bits + CRC-6)
//! 45..63  first half: two 9-byte voice blocks or FACCH1
//! 63..81  second half: two 9-byte voice blocks or FACCH1
//! ```
//!
//! A connect request (`ICOM 01 61 ...`) is answered by echoing the packet
//! back with a few bytes rewritten.

pub mod facch;
pub mod layer3;
pub mod lich;
pub mod sacch;

use crate::error::ParseError;

pub use layer3::Layer3;
pub use lich::Lich;
pub use sacch::{Sacch, SacchCollector};

pub const MAGIC: &[u8; 4] = b"ICOM";
pub const PACKET_LEN: usize = 102;
pub const VCH_LEN: usize = 9;
pub const HALF_LEN: usize = 18;

const PREAMBLE: [u8; 4] = [0x01, 0x01, 0x08, 0xE0];
const KIND_HEADER: [u8; 3] = [0x23, 0x1C, 0x21];
const KIND_VOICE: [u8; 3] = [0x23, 0x10, 0x21];
const FRAME_OFFSET: usize = 40;

/// A parsed Icom NXDN frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Voice frame rather than header/trailer
    pub voice: bool,
    pub lich: Lich,
    pub sacch: [u8; sacch::SACCH_LEN],
    pub halves: [[u8; HALF_LEN]; 2],
}

impl Packet {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 4)?;
        if &data[0..4] != MAGIC {
            return Err(ParseError::BadMagic(data[0..4].to_vec()));
        }
        ParseError::check_len(data, PACKET_LEN)?;

        let voice = match [data[37], data[38], data[39]] {
            KIND_VOICE => true,
            KIND_HEADER => false,
            other => {
                return Err(ParseError::InvalidFrame(format!(
                    "unknown Icom frame kind {other:02X?}"
                )))
            }
        };

        let frame = &data[FRAME_OFFSET..];
        let mut sacch = [0u8; sacch::SACCH_LEN];
        sacch.copy_from_slice(&frame[1..5]);
        let mut halves = [[0u8; HALF_LEN]; 2];
        halves[0].copy_from_slice(&frame[5..23]);
        halves[1].copy_from_slice(&frame[23..41]);

        Ok(Self {
            voice,
            lich: Lich::decode(frame[0])?,
            sacch,
            halves,
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4..8].copy_from_slice(&PREAMBLE);
        out[37..40].copy_from_slice(if self.voice { &KIND_VOICE } else { &KIND_HEADER });
        out[40] = self.lich.encode();
        out[41..45].copy_from_slice(&self.sacch);
        out[45..63].copy_from_slice(&self.halves[0]);
        out[63..81].copy_from_slice(&self.halves[1]);
        out
    }

    /// Header or trailer: both halves carry the same FACCH1 message
    pub fn control(message: &Layer3, ran: u8) -> Self {
        let facch = facch::encode(&message.to_bytes());
        let mut half = [0u8; HALF_LEN];
        half[..facch::FACCH1_LEN].copy_from_slice(&facch);
        let sacch = Sacch::new(sacch::SR_SINGLE, ran, 0);
        Self {
            voice: false,
            lich: Lich::new(lich::RFCT_RDCH, lich::USC_SACCH_NS, lich::STEAL_FACCH),
            sacch: sacch.encode(),
            halves: [half, half],
        }
    }

    /// Voice frame with four blocks and one superframe part of `message` in the SACCH
    pub fn voice(blocks: &[[u8; VCH_LEN]; 4], message: &Layer3, part: usize, ran: u8) -> Self {
        let mut halves = [[0u8; HALF_LEN]; 2];
        for (i, block) in blocks.iter().enumerate() {
            let at = (i % 2) * VCH_LEN;
            halves[i / 2][at..at + VCH_LEN].copy_from_slice(block);
        }
        let data = sacch::superframe_part(&message.to_bytes(), part);
        Self {
            voice: true,
            lich: Lich::new(lich::RFCT_RDCH, lich::USC_SACCH_SS, lich::STEAL_NONE),
            sacch: Sacch::new(sacch::structure_for(part), ran, data).encode(),
            halves,
        }
    }

    /// Voice blocks left by the steal option, in order
    pub fn voice_blocks(&self) -> Vec<[u8; VCH_LEN]> {
        let halves: &[usize] = match self.lich.option {
            lich::STEAL_NONE => &[0, 1],
            lich::STEAL_FACCH1_2 => &[0],
            lich::STEAL_FACCH1_1 => &[1],
            _ => &[],
        };
        let mut blocks = Vec::with_capacity(4);
        for &h in halves {
            for at in [0, VCH_LEN] {
                let mut block = [0u8; VCH_LEN];
                block.copy_from_slice(&self.halves[h][at..at + VCH_LEN]);
                blocks.push(block);
            }
        }
        blocks
    }

    /// Layer-3 message from the stolen half, if any
    pub fn facch(&self) -> Option<Layer3> {
        let half = match self.lich.option {
            lich::STEAL_FACCH | lich::STEAL_FACCH1_1 => 0,
            lich::STEAL_FACCH1_2 => 1,
            _ => return None,
        };
        let mut coded = [0u8; facch::FACCH1_LEN];
        coded.copy_from_slice(&self.halves[half][..facch::FACCH1_LEN]);
        let bytes = facch::decode(&coded).ok()?;
        Layer3::from_bytes(&bytes).ok()
    }

    /// Decoded SACCH, if its CRC is good
    pub fn sacch(&self) -> Option<Sacch> {
        Sacch::decode(&self.sacch).ok()
    }
}

/// Whether a datagram is a connect request from the radio side
pub fn is_connect_request(data: &[u8]) -> bool {
    data.len() >= FRAME_OFFSET && &data[0..4] == MAGIC && data[4] == 0x01 && data[5] == 0x61
}

/// The reply echoed back for a connect request
pub fn connect_reply(request: &[u8]) -> Vec<u8> {
    let mut reply = request.to_vec();
    reply[5] = 0x60;
    reply[37] = 0x00;
    reply[38] = 0x00;
    reply[39] = 0x00;
    reply
}
