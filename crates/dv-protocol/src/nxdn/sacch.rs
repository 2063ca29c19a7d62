//! Slow associated control channel
//!
//! Each SACCH holds 18 bits of layer-3 data; four of them make up a
//! superframe carrying the first 72 bits of the current call message.

use super::layer3::Layer3;
use crate::bits::{bits_to_u32, read_bit, u32_to_bits, write_bit};
use crate::error::ParseError;
use crate::fec::crc;

pub const SR_SINGLE: u8 = 0;
pub const SR_1_4: u8 = 3;
pub const SR_2_4: u8 = 2;
pub const SR_3_4: u8 = 1;
pub const SR_4_4: u8 = 0;

pub const SACCH_LEN: usize = 4;
const DATA_BITS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sacch {
    /// Superframe position
    pub structure: u8,
    /// Radio access number
    pub ran: u8,
    /// 18 data bits, right aligned
    pub data: u32,
}

impl Sacch {
    pub fn new(structure: u8, ran: u8, data: u32) -> Self {
        Self {
            structure: structure & 0x03,
            ran: ran & 0x3F,
            data: data & 0x3_FFFF,
        }
    }

    fn payload_bits(&self) -> [bool; 26] {
        let mut bits = [false; 26];
        u32_to_bits(u32::from(self.structure), 2, &mut bits[0..2]);
        u32_to_bits(u32::from(self.ran), 6, &mut bits[2..8]);
        u32_to_bits(self.data, DATA_BITS, &mut bits[8..26]);
        bits
    }

    /// 26 bits of content followed by CRC-6
    pub fn encode(&self) -> [u8; SACCH_LEN] {
        let bits = self.payload_bits();
        let crc = crc::crc6(&bits);
        let mut out = [0u8; SACCH_LEN];
        for (i, &b) in bits.iter().enumerate() {
            write_bit(&mut out, i, b);
        }
        for i in 0..6 {
            write_bit(&mut out, 26 + i, (crc >> (5 - i)) & 1 == 1);
        }
        out
    }

    pub fn decode(data: &[u8; SACCH_LEN]) -> Result<Self, ParseError> {
        let bits: Vec<bool> = (0..32).map(|i| read_bit(data, i)).collect();
        let crc = bits_to_u32(&bits[26..32]) as u8;
        if crc::crc6(&bits[..26]) != crc {
            return Err(ParseError::CrcMismatch("NXDN SACCH"));
        }
        Ok(Self {
            structure: bits_to_u32(&bits[0..2]) as u8,
            ran: bits_to_u32(&bits[2..8]) as u8,
            data: bits_to_u32(&bits[8..26]),
        })
    }
}

/// The 18-bit slice of a layer-3 message sent in superframe part `index` (0..4)
pub fn superframe_part(message: &[u8], index: usize) -> u32 {
    let start = index * DATA_BITS;
    (0..DATA_BITS).fold(0u32, |acc, i| (acc << 1) | u32::from(read_bit(message, start + i)))
}

/// Structure value for superframe part `index` (0..4)
pub fn structure_for(index: usize) -> u8 {
    match index {
        0 => SR_1_4,
        1 => SR_2_4,
        2 => SR_3_4,
        _ => SR_4_4,
    }
}

/// Reassembles a layer-3 message from a SACCH superframe for late entry
#[derive(Debug, Clone, Default)]
pub struct SacchCollector {
    message: [u8; 9],
    next: Option<usize>,
}

impl SacchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one SACCH; returns the message when the fourth part completes it
    pub fn add(&mut self, sacch: &Sacch) -> Option<Layer3> {
        let index = match (sacch.structure, self.next) {
            (SR_1_4, _) => 0,
            (SR_2_4, Some(1)) => 1,
            (SR_3_4, Some(2)) => 2,
            (SR_4_4, Some(3)) => 3,
            _ => {
                self.next = None;
                return None;
            }
        };

        for i in 0..DATA_BITS {
            let bit = (sacch.data >> (DATA_BITS - 1 - i)) & 1 == 1;
            write_bit(&mut self.message, index * DATA_BITS + i, bit);
        }

        if index < 3 {
            self.next = Some(index + 1);
            return None;
        }
        self.next = None;
        Layer3::from_bytes(&self.message).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip() {
        let sacch = Sacch::new(SR_2_4, 1, 0x2_ABCD);
        assert_eq!(Sacch::decode(&sacch.encode()).unwrap(), sacch);
    }

    #[test]
    fn test_superframe() {
        let msg = Layer3::vcall(true, 1234, 65).to_bytes();
        let mut collector = SacchCollector::new();
        let mut result = None;
        for index in 0..4 {
            let sacch = Sacch::new(structure_for(index), 1, superframe_part(&msg, index));
            let decoded = Sacch::decode(&sacch.encode()).unwrap();
            result = collector.add(&decoded);
        }
        assert_eq!(result, Some(Layer3::vcall(true, 1234, 65)));
    }

    #[test]
    fn test_superframe_out_of_order() {
        let msg = Layer3::vcall(true, 1, 2).to_bytes();
        let mut collector = SacchCollector::new();
        assert!(collector
            .add(&Sacch::new(SR_3_4, 1, superframe_part(&msg, 2)))
            .is_none());
        assert!(collector
            .add(&Sacch::new(SR_4_4, 1, superframe_part(&msg, 3)))
            .is_none());
    }

    proptest! {
        #[test]
        fn single_bit_errors_detected(data in 0u32..0x4_0000, ran in 0u8..64, flip in 0usize..32) {
            let mut bytes = Sacch::new(SR_1_4, ran, data).encode();
            bytes[flip / 8] ^= 0x80 >> (flip % 8);
            prop_assert!(Sacch::decode(&bytes).is_err());
        }
    }
}
