//! M17 network protocol
//!
//! ```text
//! 0..4    "M17 "
//! 4..6    stream id
//! 6..34   LICH: destination(6) source(6) type(2) meta(14)
//! 34..36  frame number, bit 15 marks the last frame
//! 36..52  payload: two 8-byte Codec2 3200 frames
//! 52..54  CRC-16 over bytes 0..52
//! ```
//!
//! Callsigns are packed base-40 into 48 bits.

use crate::error::ParseError;
use crate::fec::crc;

pub const MAGIC: &[u8; 4] = b"M17 ";
pub const PING_MAGIC: &[u8; 4] = b"PING";
pub const PACKET_LEN: usize = 54;
pub const PAYLOAD_LEN: usize = 16;
/// Codec2 3200 frame length
pub const CODEC2_LEN: usize = 8;

/// Stream mode, voice data type, Codec2 3200
pub const TYPE_VOICE_3200: u16 = 0x0005;

const ALPHABET: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-/.";
const MAX_CALLSIGN_LEN: usize = 9;
/// 40^9, the first value outside the callsign space
const CALLSIGN_LIMIT: u64 = 0xEE6B_2800_0000;
const BROADCAST: u64 = 0xFFFF_FFFF_FFFF;

/// Pack a callsign into six bytes; `"ALL"` is the broadcast address
///
/// Trailing spaces are padding. Space is digit zero, so they would only add
/// high-order zeros; dropping them first keeps padded nine-character fields
/// within the length limit. Decoding never yields trailing spaces.
pub fn encode_callsign(callsign: &str) -> Result<[u8; 6], ParseError> {
    let trimmed = callsign.trim_end().to_ascii_uppercase();
    if trimmed.len() > MAX_CALLSIGN_LEN {
        return Err(ParseError::InvalidCallsign(callsign.to_string()));
    }

    let value = if trimmed == "ALL" {
        BROADCAST
    } else {
        let mut value = 0u64;
        for c in trimmed.bytes().rev() {
            let index = ALPHABET
                .iter()
                .position(|&a| a == c)
                .ok_or_else(|| ParseError::InvalidCallsign(callsign.to_string()))?;
            value = value * 40 + index as u64;
        }
        value
    };

    let bytes = value.to_be_bytes();
    let mut out = [0u8; 6];
    out.copy_from_slice(&bytes[2..]);
    Ok(out)
}

/// Unpack a callsign; `None` when the value is outside the base-40 range
pub fn decode_callsign(encoded: &[u8; 6]) -> Option<String> {
    let mut bytes = [0u8; 8];
    bytes[2..].copy_from_slice(encoded);
    let mut value = u64::from_be_bytes(bytes);

    if value == BROADCAST {
        return Some("ALL".to_string());
    }
    if value >= CALLSIGN_LIMIT {
        return None;
    }

    let mut out = String::with_capacity(MAX_CALLSIGN_LEN);
    while value > 0 {
        out.push(ALPHABET[(value % 40) as usize] as char);
        value /= 40;
    }
    Some(out)
}

/// Link information: addressing and stream type, repeated in every packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lich {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub stream_type: u16,
    pub meta: [u8; 14],
}

impl Lich {
    /// Voice stream LICH between two callsigns
    pub fn voice(src: &str, dst: &str) -> Result<Self, ParseError> {
        Ok(Self {
            dst: encode_callsign(dst)?,
            src: encode_callsign(src)?,
            stream_type: TYPE_VOICE_3200,
            meta: [0; 14],
        })
    }

    pub fn src_callsign(&self) -> Option<String> {
        decode_callsign(&self.src)
    }

    pub fn dst_callsign(&self) -> Option<String> {
        decode_callsign(&self.dst)
    }
}

/// A parsed stream packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub stream_id: u16,
    pub lich: Lich,
    pub frame_number: u16,
    pub end: bool,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 4)?;
        if &data[0..4] != MAGIC {
            return Err(ParseError::BadMagic(data[0..4].to_vec()));
        }
        ParseError::check_len(data, PACKET_LEN)?;

        let stored = u16::from_be_bytes([data[52], data[53]]);
        if crc::m17_crc16(&data[..52]) != stored {
            return Err(ParseError::CrcMismatch("M17 packet"));
        }

        let mut dst = [0u8; 6];
        dst.copy_from_slice(&data[6..12]);
        let mut src = [0u8; 6];
        src.copy_from_slice(&data[12..18]);
        let mut meta = [0u8; 14];
        meta.copy_from_slice(&data[20..34]);
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&data[36..52]);
        let fn_field = u16::from_be_bytes([data[34], data[35]]);

        Ok(Self {
            stream_id: u16::from_be_bytes([data[4], data[5]]),
            lich: Lich {
                dst,
                src,
                stream_type: u16::from_be_bytes([data[18], data[19]]),
                meta,
            },
            frame_number: fn_field & 0x7FFF,
            end: fn_field & 0x8000 != 0,
            payload,
        })
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4..6].copy_from_slice(&self.stream_id.to_be_bytes());
        out[6..12].copy_from_slice(&self.lich.dst);
        out[12..18].copy_from_slice(&self.lich.src);
        out[18..20].copy_from_slice(&self.lich.stream_type.to_be_bytes());
        out[20..34].copy_from_slice(&self.lich.meta);
        let fn_field = (self.frame_number & 0x7FFF) | if self.end { 0x8000 } else { 0 };
        out[34..36].copy_from_slice(&fn_field.to_be_bytes());
        out[36..52].copy_from_slice(&self.payload);
        let crc = crc::m17_crc16(&out[..52]);
        out[52..54].copy_from_slice(&crc.to_be_bytes());
        out
    }
}

/// Keepalive carrying the gateway callsign
pub fn build_ping(callsign: &str) -> Result<[u8; 10], ParseError> {
    let mut out = [0u8; 10];
    out[0..4].copy_from_slice(PING_MAGIC);
    out[4..].copy_from_slice(&encode_callsign(callsign)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_broadcast() {
        assert_eq!(encode_callsign("ALL").unwrap(), [0xFF; 6]);
        assert_eq!(encode_callsign("ALL      ").unwrap(), [0xFF; 6]);
        assert_eq!(decode_callsign(&[0xFF; 6]).as_deref(), Some("ALL"));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(decode_callsign(&[0xEE, 0x6B, 0x28, 0x00, 0x00, 0x00]), None);
        assert_eq!(decode_callsign(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]), None);
        assert!(decode_callsign(&[0xEE, 0x6B, 0x27, 0xFF, 0xFF, 0xFF]).is_some());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(encode_callsign("TOOLONGCALL").is_err());
        assert!(encode_callsign("N0CALL*").is_err());
    }

    #[test]
    fn test_lowercase_accepted() {
        assert_eq!(encode_callsign("n0call").unwrap(), encode_callsign("N0CALL").unwrap());
    }

    #[test]
    fn test_trailing_space_is_padding() {
        assert_eq!(encode_callsign("AB ").unwrap(), encode_callsign("AB").unwrap());
        assert_eq!(decode_callsign(&encode_callsign("AB ").unwrap()).as_deref(), Some("AB"));
        // Ten characters, but the last is padding
        assert!(encode_callsign("N0CALL/P1 ").is_ok());
        assert!(encode_callsign("N0CALL/P12").is_err());
        // Leading and inner spaces are significant
        assert_ne!(encode_callsign(" AB").unwrap(), encode_callsign("AB").unwrap());
        assert_eq!(decode_callsign(&encode_callsign("A B").unwrap()).as_deref(), Some("A B"));
    }

    #[test]
    fn test_packet_roundtrip() {
        let packet = Packet {
            stream_id: 0xBEEF,
            lich: Lich::voice("N0CALL", "ALL").unwrap(),
            frame_number: 0x0102,
            end: true,
            payload: [0x42; PAYLOAD_LEN],
        };
        let bytes = packet.encode();
        assert_eq!(&bytes[34..36], &[0x81, 0x02]);
        assert_eq!(Packet::parse(&bytes).unwrap(), packet);
        assert_eq!(packet.lich.src_callsign().as_deref(), Some("N0CALL"));
    }

    #[test]
    fn test_crc_rejected() {
        let packet = Packet {
            stream_id: 1,
            lich: Lich::voice("N0CALL", "ALL").unwrap(),
            frame_number: 0,
            end: false,
            payload: [0; PAYLOAD_LEN],
        };
        let mut bytes = packet.encode();
        bytes[40] ^= 0x04;
        assert!(matches!(Packet::parse(&bytes), Err(ParseError::CrcMismatch(_))));
    }

    proptest! {
        #[test]
        fn callsign_roundtrip(s in "[ A-Z0-9/.\\-]{0,8}[A-Z0-9/.\\-]") {
            prop_assume!(s != "ALL");
            let encoded = encode_callsign(&s).unwrap();
            prop_assert_eq!(decode_callsign(&encoded), Some(s));
        }
    }
}
