//! DMR Homebrew network protocol (`DMRD`)
//!
//! Every DMRD datagram carries one 33-byte air-interface burst plus routing
//! metadata:
//!
//! ```text
//! 0..4   "DMRD"
//! 4      sequence
//! 5..8   source id (24 bit)
//! 8..11  destination id (24 bit)
//! 11..15 repeater id
//! 15     flags: 0x80 slot 2, 0x40 private call, 0x20 data sync, 0x10 voice sync,
//!        low nibble = data type (data sync) or voice burst index N
//! 16..20 stream id
//! 20..53 burst
//! 53     BER
//! 54     RSSI
//! ```

pub mod emb;
pub mod embedded;
pub mod lc;
pub mod slot_type;

use crate::bits::copy_bits;
use crate::error::ParseError;

pub const MAGIC: &[u8; 4] = b"DMRD";
pub const PACKET_LEN: usize = 55;
pub const BURST_LEN: usize = 33;
/// AMBE+2 bytes per vocoder frame; a voice burst carries three
pub const AMBE_LEN: usize = 9;
pub const AMBE_PER_BURST: usize = 3;

pub const DT_VOICE_PI_HEADER: u8 = 0x00;
pub const DT_VOICE_LC_HEADER: u8 = 0x01;
pub const DT_TERMINATOR_WITH_LC: u8 = 0x02;
pub const DT_CSBK: u8 = 0x03;
pub const DT_DATA_HEADER: u8 = 0x06;
pub const DT_RATE_12_DATA: u8 = 0x07;
pub const DT_RATE_34_DATA: u8 = 0x08;
pub const DT_IDLE: u8 = 0x09;
pub const DT_RATE_1_DATA: u8 = 0x0A;

const FLAG_SLOT2: u8 = 0x80;
const FLAG_PRIVATE: u8 = 0x40;
const FLAG_DATA_SYNC: u8 = 0x20;
const FLAG_VOICE_SYNC: u8 = 0x10;

/// Base-station sourced voice sync, nibble aligned at burst bytes 13..19
pub const VOICE_SYNC: [u8; 7] = [0x07, 0x55, 0xFD, 0x7D, 0xF7, 0x5F, 0x70];
/// Base-station sourced data sync
pub const DATA_SYNC: [u8; 7] = [0x0D, 0xFF, 0x57, 0xD7, 0x5D, 0xF5, 0xD0];

/// What the burst in a DMRD packet is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Voice burst A carrying the sync pattern
    VoiceSync,
    /// Voice burst B..F, `n` in 1..=5
    Voice { n: u8 },
    /// Data burst with the given data type
    DataSync { data_type: u8 },
}

/// A parsed DMRD packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: u8,
    pub src: u32,
    pub dst: u32,
    pub repeater_id: u32,
    pub slot: u8,
    pub group: bool,
    pub frame: FrameType,
    pub stream_id: u32,
    pub burst: [u8; BURST_LEN],
    pub ber: u8,
    pub rssi: u8,
}

impl Packet {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 4)?;
        if &data[0..4] != MAGIC {
            return Err(ParseError::BadMagic(data[0..4].to_vec()));
        }
        ParseError::check_len(data, PACKET_LEN)?;

        let flags = data[15];
        let frame = if flags & FLAG_DATA_SYNC != 0 {
            FrameType::DataSync {
                data_type: flags & 0x0F,
            }
        } else if flags & FLAG_VOICE_SYNC != 0 {
            FrameType::VoiceSync
        } else {
            FrameType::Voice { n: flags & 0x0F }
        };

        let mut burst = [0u8; BURST_LEN];
        burst.copy_from_slice(&data[20..53]);

        Ok(Self {
            seq: data[4],
            src: u32::from_be_bytes([0, data[5], data[6], data[7]]),
            dst: u32::from_be_bytes([0, data[8], data[9], data[10]]),
            repeater_id: u32::from_be_bytes([data[11], data[12], data[13], data[14]]),
            slot: if flags & FLAG_SLOT2 != 0 { 2 } else { 1 },
            group: flags & FLAG_PRIVATE == 0,
            frame,
            stream_id: u32::from_be_bytes([data[16], data[17], data[18], data[19]]),
            burst,
            ber: data[53],
            rssi: data[54],
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4] = self.seq;
        out[5..8].copy_from_slice(&self.src.to_be_bytes()[1..]);
        out[8..11].copy_from_slice(&self.dst.to_be_bytes()[1..]);
        out[11..15].copy_from_slice(&self.repeater_id.to_be_bytes());

        let mut flags = if self.slot == 2 { FLAG_SLOT2 } else { 0 };
        if !self.group {
            flags |= FLAG_PRIVATE;
        }
        flags |= match self.frame {
            FrameType::VoiceSync => FLAG_VOICE_SYNC,
            FrameType::Voice { n } => n & 0x0F,
            FrameType::DataSync { data_type } => FLAG_DATA_SYNC | (data_type & 0x0F),
        };
        out[15] = flags;

        out[16..20].copy_from_slice(&self.stream_id.to_be_bytes());
        out[20..53].copy_from_slice(&self.burst);
        out[53] = self.ber;
        out[54] = self.rssi;
        out
    }

    /// Whether this burst carries voice
    pub fn is_voice(&self) -> bool {
        !matches!(self.frame, FrameType::DataSync { .. })
    }
}

/// Keepalive sent to the master
pub fn build_ping(repeater_id: u32) -> Vec<u8> {
    let mut out = b"RPTPING".to_vec();
    out.extend_from_slice(&repeater_id.to_be_bytes());
    out
}

/// Write a 48-bit sync pattern into the centre of a burst
pub fn add_sync(burst: &mut [u8; BURST_LEN], pattern: &[u8; 7]) {
    burst[13] = (burst[13] & 0xF0) | (pattern[0] & 0x0F);
    burst[14..19].copy_from_slice(&pattern[1..6]);
    burst[19] = (burst[19] & 0x0F) | (pattern[6] & 0xF0);
}

/// Whether the burst centre matches a sync pattern
pub fn has_sync(burst: &[u8; BURST_LEN], pattern: &[u8; 7]) -> bool {
    burst[13] & 0x0F == pattern[0] & 0x0F
        && burst[14..19] == pattern[1..6]
        && burst[19] & 0xF0 == pattern[6] & 0xF0
}

/// Burst bit ranges (start, length) for each of the three AMBE frames
const AMBE_BITS: [[(usize, usize); 2]; AMBE_PER_BURST] = [
    [(0, 72), (0, 0)],
    [(72, 36), (156, 36)],
    [(192, 72), (0, 0)],
];

/// Place three AMBE frames into the voice bits of a burst
pub fn insert_ambe(burst: &mut [u8; BURST_LEN], frames: &[[u8; AMBE_LEN]; AMBE_PER_BURST]) {
    for (frame, ranges) in frames.iter().zip(AMBE_BITS.iter()) {
        let mut offset = 0;
        for &(start, len) in ranges {
            copy_bits(frame, offset, burst, start, len);
            offset += len;
        }
    }
}

/// Take the three AMBE frames out of a voice burst
pub fn extract_ambe(burst: &[u8; BURST_LEN]) -> [[u8; AMBE_LEN]; AMBE_PER_BURST] {
    let mut frames = [[0u8; AMBE_LEN]; AMBE_PER_BURST];
    for (frame, ranges) in frames.iter_mut().zip(AMBE_BITS.iter()) {
        let mut offset = 0;
        for &(start, len) in ranges {
            copy_bits(burst, start, frame, offset, len);
            offset += len;
        }
    }
    frames
}

/// Write a 32-bit embedded signalling fragment at burst bits 116..147
pub fn insert_embedded(burst: &mut [u8; BURST_LEN], fragment: &[u8; 4]) {
    copy_bits(fragment, 0, burst, 116, 32);
}

pub fn extract_embedded(burst: &[u8; BURST_LEN]) -> [u8; 4] {
    let mut fragment = [0u8; 4];
    copy_bits(burst, 116, &mut fragment, 0, 32);
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Packet {
        Packet {
            seq: 3,
            src: 1_234_567,
            dst: 9,
            repeater_id: 123_456_789,
            slot: 2,
            group: true,
            frame: FrameType::Voice { n: 4 },
            stream_id: 0xDEAD_BEEF,
            burst: [0x11; BURST_LEN],
            ber: 0,
            rssi: 0,
        }
    }

    #[test]
    fn test_packet_layout() {
        let bytes = sample().encode();
        assert_eq!(&bytes[0..4], b"DMRD");
        assert_eq!(&bytes[5..8], &[0x12, 0xD6, 0x87]);
        assert_eq!(&bytes[8..11], &[0x00, 0x00, 0x09]);
        assert_eq!(bytes[15], 0x84);
        assert_eq!(Packet::parse(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_flags() {
        let mut p = sample();
        p.slot = 1;
        p.group = false;
        p.frame = FrameType::DataSync {
            data_type: DT_TERMINATOR_WITH_LC,
        };
        let bytes = p.encode();
        assert_eq!(bytes[15], 0x62);
        let parsed = Packet::parse(&bytes).unwrap();
        assert!(!parsed.is_voice());
        assert_eq!(parsed.slot, 1);
        assert!(!parsed.group);
    }

    #[test]
    fn test_short_packet() {
        assert!(matches!(
            Packet::parse(b"DMRD\x00\x00"),
            Err(ParseError::ShortPacket { needed: 55, .. })
        ));
    }

    #[test]
    fn test_sync() {
        let mut burst = [0xFFu8; BURST_LEN];
        add_sync(&mut burst, &VOICE_SYNC);
        assert_eq!(burst[13], 0xF7);
        assert_eq!(burst[19], 0x7F);
        assert!(has_sync(&burst, &VOICE_SYNC));
        assert!(!has_sync(&burst, &DATA_SYNC));
    }

    #[test]
    fn test_ambe_placement() {
        let frames = [[0xA1; AMBE_LEN], [0xB2; AMBE_LEN], [0xC3; AMBE_LEN]];
        let mut burst = [0u8; BURST_LEN];
        add_sync(&mut burst, &VOICE_SYNC);
        insert_ambe(&mut burst, &frames);
        assert!(has_sync(&burst, &VOICE_SYNC));
        assert_eq!(extract_ambe(&burst), frames);
    }

    #[test]
    fn test_embedded_placement() {
        let mut burst = [0u8; BURST_LEN];
        insert_embedded(&mut burst, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(extract_embedded(&burst), [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(burst[14], 0x0D);
    }
}
