//! Embedded signalling (EMB) field of DMR voice bursts B to F

use crate::bits::{read_bit, write_bit};
use crate::fec::qr1676;

/// Link control start/stop marker for embedded fragments
pub const LCSS_SINGLE: u8 = 0;
pub const LCSS_FIRST: u8 = 1;
pub const LCSS_LAST: u8 = 2;
pub const LCSS_CONTINUATION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emb {
    pub color_code: u8,
    pub pi: bool,
    pub lcss: u8,
}

fn bit_pos(i: usize) -> usize {
    if i < 8 {
        108 + i
    } else {
        140 + i
    }
}

impl Emb {
    pub fn new(color_code: u8, lcss: u8) -> Self {
        Self {
            color_code: color_code & 0x0F,
            pi: false,
            lcss: lcss & 0x03,
        }
    }

    /// Write the QR-protected EMB into burst bits 108..115 and 148..155
    pub fn encode(&self, burst: &mut [u8; 33]) {
        let value = (self.color_code << 3) | (u8::from(self.pi) << 2) | self.lcss;
        let word = qr1676::encode(value);
        for i in 0..16 {
            write_bit(burst, bit_pos(i), (word >> (15 - i)) & 1 == 1);
        }
    }

    pub fn decode(burst: &[u8; 33]) -> Option<Self> {
        let word = (0..16).fold(0u16, |acc, i| (acc << 1) | u16::from(read_bit(burst, bit_pos(i))));
        let value = qr1676::decode(word)?;
        Some(Self {
            color_code: value >> 3,
            pi: value & 0x04 != 0,
            lcss: value & 0x03,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mut burst = [0u8; 33];
        let emb = Emb::new(1, LCSS_CONTINUATION);
        emb.encode(&mut burst);
        assert_eq!(burst[15..18], [0u8; 3]);
        assert_eq!(Emb::decode(&burst), Some(emb));
    }
}
