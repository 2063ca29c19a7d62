//! Fast associated control channel (FACCH1)
//!
//! 80 bits of layer-3 data, CRC-12 and a 4-bit zero tail in 12 bytes.

use super::layer3::LAYER3_LEN;
use crate::bits::{bytes_to_bits, read_bit, write_bit};
use crate::error::ParseError;
use crate::fec::crc;

pub const FACCH1_LEN: usize = 12;

pub fn encode(layer3: &[u8; LAYER3_LEN]) -> [u8; FACCH1_LEN] {
    let crc = crc::crc12(&bytes_to_bits(layer3));
    let mut out = [0u8; FACCH1_LEN];
    out[..LAYER3_LEN].copy_from_slice(layer3);
    for i in 0..12 {
        write_bit(&mut out, 80 + i, (crc >> (11 - i)) & 1 == 1);
    }
    out
}

pub fn decode(data: &[u8; FACCH1_LEN]) -> Result<[u8; LAYER3_LEN], ParseError> {
    let mut layer3 = [0u8; LAYER3_LEN];
    layer3.copy_from_slice(&data[..LAYER3_LEN]);
    let stored = (0..12).fold(0u16, |acc, i| (acc << 1) | u16::from(read_bit(data, 80 + i)));
    if crc::crc12(&bytes_to_bits(&layer3)) != stored {
        return Err(ParseError::CrcMismatch("NXDN FACCH1"));
    }
    Ok(layer3)
}
