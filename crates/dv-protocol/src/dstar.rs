//! D-Star repeater protocol (`DSRP`)
//!
//! A talk-spurt is one 49-byte header packet followed by 21-byte data
//! packets, each carrying 9 bytes of AMBE and 3 bytes of slow data. The
//! sequence byte counts 0..20 and the last packet sets bit `0x40`.
//!
//! # Packet layouts
//!
//! ```text
//! header: "DSRP" 0x20 id(2) 0x00 flags(3) rpt2(8) rpt1(8) your(8) my(8) suffix(4) crc(2)
//! data:   "DSRP" 0x21 id(2) seq err ambe(9) slow(3)
//! poll:   "DSRP" 0x0A text...
//! ```

use crate::callsign::DStarCallsign;
use crate::error::ParseError;
use crate::fec::crc;

pub const MAGIC: &[u8; 4] = b"DSRP";
pub const TYPE_POLL: u8 = 0x0A;
pub const TYPE_HEADER: u8 = 0x20;
pub const TYPE_DATA: u8 = 0x21;
pub const TYPE_BUSY_DATA: u8 = 0x23;

/// Radio header length including CRC
pub const HEADER_LEN: usize = 41;
pub const HEADER_PACKET_LEN: usize = 49;
pub const DATA_PACKET_LEN: usize = 21;

/// AMBE bytes per data packet
pub const AMBE_LEN: usize = 9;
/// Data packets per slow-data superframe
pub const FRAMES_PER_SUPERFRAME: u8 = 21;
/// Sequence flag marking the final packet of a stream
pub const END_FLAG: u8 = 0x40;

/// Slow-data sync sent in frame 0 of every superframe
pub const DATA_SYNC: [u8; 3] = [0x55, 0x2D, 0x16];
/// Scrambled slow-data filler
pub const FILLER: [u8; 3] = [0x16, 0x29, 0xF5];
/// Silence frame sent with the end-of-stream flag
pub const NULL_AMBE: [u8; AMBE_LEN] = [0x9E, 0x8D, 0x32, 0x88, 0x26, 0x1A, 0x3F, 0x61, 0xE8];

const SCRAMBLER: [u8; 3] = [0x70, 0x4F, 0x93];
const SLOW_DATA_TEXT: u8 = 0x40;
const TEXT_LEN: usize = 20;

/// Radio header carried at the start of every stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub flags: [u8; 3],
    pub rpt2: DStarCallsign,
    pub rpt1: DStarCallsign,
    pub your: DStarCallsign,
    pub my: DStarCallsign,
    pub suffix: [u8; 4],
}

impl Header {
    /// Voice header from `my` to `your` through the given repeater
    pub fn new(my: &str, your: &str, repeater: &str) -> Self {
        Self {
            flags: [0; 3],
            rpt2: DStarCallsign::new(repeater),
            rpt1: DStarCallsign::new(repeater),
            your: DStarCallsign::new(your),
            my: DStarCallsign::new(my),
            suffix: *b"    ",
        }
    }

    /// Serialise with the header CRC appended
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..3].copy_from_slice(&self.flags);
        out[3..11].copy_from_slice(self.rpt2.as_bytes());
        out[11..19].copy_from_slice(self.rpt1.as_bytes());
        out[19..27].copy_from_slice(self.your.as_bytes());
        out[27..35].copy_from_slice(self.my.as_bytes());
        out[35..39].copy_from_slice(&self.suffix);
        crc::add_ccitt161(&mut out);
        out
    }

    /// Parse and CRC-check a 41-byte radio header
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, HEADER_LEN)?;
        let data = &data[..HEADER_LEN];
        if !crc::check_ccitt161(data) {
            return Err(ParseError::CrcMismatch("D-Star header"));
        }
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&data[0..3]);
        let mut suffix = [0u8; 4];
        suffix.copy_from_slice(&data[35..39]);
        Ok(Self {
            flags,
            rpt2: DStarCallsign::from_bytes(&data[3..11]),
            rpt1: DStarCallsign::from_bytes(&data[11..19]),
            your: DStarCallsign::from_bytes(&data[19..27]),
            my: DStarCallsign::from_bytes(&data[27..35]),
            suffix,
        })
    }
}

/// A parsed DSRP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Poll(String),
    Header {
        id: u16,
        header: Header,
    },
    Data {
        id: u16,
        seq: u8,
        end: bool,
        ambe: [u8; AMBE_LEN],
        slow: [u8; 3],
    },
}

/// Parse one DSRP datagram
pub fn parse(data: &[u8]) -> Result<Packet, ParseError> {
    ParseError::check_len(data, 5)?;
    if &data[0..4] != MAGIC {
        return Err(ParseError::BadMagic(data[0..4].to_vec()));
    }

    match data[4] {
        TYPE_POLL => Ok(Packet::Poll(
            String::from_utf8_lossy(&data[5..])
                .trim_end_matches('\0')
                .to_string(),
        )),
        TYPE_HEADER => {
            ParseError::check_len(data, HEADER_PACKET_LEN)?;
            Ok(Packet::Header {
                id: u16::from_be_bytes([data[5], data[6]]),
                header: Header::decode(&data[8..])?,
            })
        }
        TYPE_DATA | TYPE_BUSY_DATA => {
            ParseError::check_len(data, DATA_PACKET_LEN)?;
            let mut ambe = [0u8; AMBE_LEN];
            ambe.copy_from_slice(&data[9..18]);
            let mut slow = [0u8; 3];
            slow.copy_from_slice(&data[18..21]);
            Ok(Packet::Data {
                id: u16::from_be_bytes([data[5], data[6]]),
                seq: data[7] & !END_FLAG,
                end: data[7] & END_FLAG != 0,
                ambe,
                slow,
            })
        }
        other => Err(ParseError::InvalidFrame(format!(
            "unknown DSRP type 0x{other:02X}"
        ))),
    }
}

/// Build a header packet
pub fn build_header(id: u16, header: &Header) -> [u8; HEADER_PACKET_LEN] {
    let mut out = [0u8; HEADER_PACKET_LEN];
    out[0..4].copy_from_slice(MAGIC);
    out[4] = TYPE_HEADER;
    out[5..7].copy_from_slice(&id.to_be_bytes());
    out[8..].copy_from_slice(&header.encode());
    out
}

/// Build a data packet
pub fn build_data(
    id: u16,
    seq: u8,
    end: bool,
    ambe: &[u8; AMBE_LEN],
    slow: &[u8; 3],
) -> [u8; DATA_PACKET_LEN] {
    let mut out = [0u8; DATA_PACKET_LEN];
    out[0..4].copy_from_slice(MAGIC);
    out[4] = TYPE_DATA;
    out[5..7].copy_from_slice(&id.to_be_bytes());
    out[7] = if end { seq | END_FLAG } else { seq };
    out[9..18].copy_from_slice(ambe);
    out[18..21].copy_from_slice(slow);
    out
}

/// Build a keepalive poll carrying free text
pub fn build_poll(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + text.len());
    out.extend_from_slice(MAGIC);
    out.push(TYPE_POLL);
    out.extend_from_slice(text.as_bytes());
    out.push(0x00);
    out
}

/// Whether a slow-data field is the superframe sync
pub fn is_sync(slow: &[u8; 3]) -> bool {
    *slow == DATA_SYNC
}

fn scramble(block: [u8; 3]) -> [u8; 3] {
    [
        block[0] ^ SCRAMBLER[0],
        block[1] ^ SCRAMBLER[1],
        block[2] ^ SCRAMBLER[2],
    ]
}

/// Produces the slow-data field for each frame of an outbound stream
///
/// Frame 0 of every superframe carries the sync, frames 1..8 carry a
/// 20-character text message in four 5-character blocks, the rest filler.
#[derive(Debug, Clone)]
pub struct SlowDataEncoder {
    text: [u8; TEXT_LEN],
}

impl SlowDataEncoder {
    pub fn new(text: &str) -> Self {
        let mut padded = [b' '; TEXT_LEN];
        for (slot, b) in padded.iter_mut().zip(text.bytes()) {
            *slot = b;
        }
        Self { text: padded }
    }

    /// Slow data for the frame at superframe position `seq`
    pub fn frame(&self, seq: u8) -> [u8; 3] {
        match seq {
            0 => DATA_SYNC,
            1..=8 => {
                let block = usize::from((seq - 1) / 2);
                let chars = &self.text[block * 5..block * 5 + 5];
                let plain = if seq % 2 == 1 {
                    [SLOW_DATA_TEXT | block as u8, chars[0], chars[1]]
                } else {
                    [chars[2], chars[3], chars[4]]
                };
                scramble(plain)
            }
            _ => FILLER,
        }
    }
}

/// Reassembles the slow-data text message from inbound frames
#[derive(Debug, Clone, Default)]
pub struct SlowDataDecoder {
    text: [u8; TEXT_LEN],
    received: u8,
    first: Option<[u8; 3]>,
}

impl SlowDataDecoder {
    pub fn new() -> Self {
        Self {
            text: [b' '; TEXT_LEN],
            ..Default::default()
        }
    }

    /// Feed one frame; returns the message once all four blocks arrived
    pub fn add(&mut self, seq: u8, slow: &[u8; 3]) -> Option<String> {
        if seq == 0 || is_sync(slow) {
            self.first = None;
            return None;
        }

        let plain = scramble(*slow);
        if seq % 2 == 1 {
            self.first = Some(plain);
            return None;
        }

        let first = self.first.take()?;
        if first[0] & 0xF0 != SLOW_DATA_TEXT {
            return None;
        }
        let block = usize::from(first[0] & 0x03);
        let chars = [first[1], first[2], plain[0], plain[1], plain[2]];
        self.text[block * 5..block * 5 + 5].copy_from_slice(&chars);
        self.received |= 1 << block;

        if self.received == 0x0F {
            self.received = 0;
            Some(String::from_utf8_lossy(&self.text).trim_end().to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = Header::new("N0CALL", "TESTBM", "GATEWAY G");
        let packet = build_header(0x1234, &header);
        assert_eq!(packet.len(), 49);
        match parse(&packet).unwrap() {
            Packet::Header { id, header: parsed } => {
                assert_eq!(id, 0x1234);
                assert_eq!(parsed.my.trimmed(), "N0CALL");
                assert_eq!(parsed.your.as_bytes(), b"TESTBM  ");
                assert_eq!(parsed, header);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_header_crc_rejected() {
        let mut packet = build_header(1, &Header::new("N0CALL", "CQCQCQ", "GW"));
        packet[30] ^= 0x01;
        assert!(matches!(
            parse(&packet),
            Err(ParseError::CrcMismatch(_))
        ));
    }

    #[test]
    fn test_data_end_flag() {
        let packet = build_data(7, 20, true, &NULL_AMBE, &FILLER);
        match parse(&packet).unwrap() {
            Packet::Data { id, seq, end, ambe, .. } => {
                assert_eq!(id, 7);
                assert_eq!(seq, 20);
                assert!(end);
                assert_eq!(ambe, NULL_AMBE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            parse(b"DMRD\x21"),
            Err(ParseError::BadMagic(_))
        ));
    }

    #[test]
    fn test_slow_data_text() {
        let encoder = SlowDataEncoder::new("N0CALL via DMR");
        assert_eq!(encoder.frame(0), DATA_SYNC);
        assert_eq!(encoder.frame(12), FILLER);

        let mut decoder = SlowDataDecoder::new();
        let mut message = None;
        for seq in 0..FRAMES_PER_SUPERFRAME {
            if let Some(text) = decoder.add(seq, &encoder.frame(seq)) {
                message = Some(text);
            }
        }
        assert_eq!(message.as_deref(), Some("N0CALL via DMR"));
    }

    #[test]
    fn test_poll() {
        let poll = build_poll("dvbridge");
        assert_eq!(parse(&poll).unwrap(), Packet::Poll("dvbridge".into()));
    }
}
