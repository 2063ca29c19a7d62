//! Slot type field of DMR data bursts
//!
//! Colour code and data type are Golay(20,8) protected and split in two
//! 10-bit halves either side of the sync at burst bits 98..107 and 156..165.

use crate::bits::{read_bit, write_bit};
use crate::fec::golay;

/// Colour code and data type of a data burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotType {
    pub color_code: u8,
    pub data_type: u8,
}

fn bit_pos(i: usize) -> usize {
    if i < 10 {
        98 + i
    } else {
        146 + i
    }
}

impl SlotType {
    pub fn new(color_code: u8, data_type: u8) -> Self {
        Self {
            color_code: color_code & 0x0F,
            data_type: data_type & 0x0F,
        }
    }

    /// Write the encoded slot type into a burst
    pub fn encode(&self, burst: &mut [u8; 33]) {
        let word = golay::encode_2087((self.color_code << 4) | self.data_type);
        for i in 0..20 {
            write_bit(burst, bit_pos(i), (word >> (19 - i)) & 1 == 1);
        }
    }

    /// Read and correct the slot type of a burst
    pub fn decode(burst: &[u8; 33]) -> Option<Self> {
        let word = (0..20).fold(0u32, |acc, i| (acc << 1) | u32::from(read_bit(burst, bit_pos(i))));
        let value = golay::decode_2087(word)?;
        Some(Self::new(value >> 4, value & 0x0F))
    }
}
