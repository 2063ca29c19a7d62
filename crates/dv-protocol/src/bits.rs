//! Bit-level helpers shared by the FEC and framing code
//!
//! All bit positions are MSB-first: bit 0 is the most significant bit of byte 0.

/// Read one bit from a byte buffer
#[inline]
pub fn read_bit(data: &[u8], pos: usize) -> bool {
    data[pos / 8] & (0x80 >> (pos % 8)) != 0
}

/// Write one bit into a byte buffer
#[inline]
pub fn write_bit(data: &mut [u8], pos: usize, value: bool) {
    let mask = 0x80u8 >> (pos % 8);
    if value {
        data[pos / 8] |= mask;
    } else {
        data[pos / 8] &= !mask;
    }
}

/// Expand bytes into a vector of bits
pub fn bytes_to_bits(data: &[u8]) -> Vec<bool> {
    (0..data.len() * 8).map(|i| read_bit(data, i)).collect()
}

/// Pack bits into bytes; a trailing partial byte is zero-padded
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &b) in bits.iter().enumerate() {
        write_bit(&mut out, i, b);
    }
    out
}

/// Copy `count` bits from `src` starting at `src_pos` into `dst` at `dst_pos`
pub fn copy_bits(src: &[u8], src_pos: usize, dst: &mut [u8], dst_pos: usize, count: usize) {
    for i in 0..count {
        write_bit(dst, dst_pos + i, read_bit(src, src_pos + i));
    }
}

/// Interpret up to 32 bits as an unsigned integer
pub fn bits_to_u32(bits: &[bool]) -> u32 {
    bits.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32)
}

/// Write the low `width` bits of `value` into `bits`, most significant first
pub fn u32_to_bits(value: u32, width: usize, bits: &mut [bool]) {
    for (i, bit) in bits.iter_mut().take(width).enumerate() {
        *bit = (value >> (width - 1 - i)) & 1 == 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_bit() {
        let mut buf = [0u8; 2];
        write_bit(&mut buf, 0, true);
        write_bit(&mut buf, 15, true);
        assert_eq!(buf, [0x80, 0x01]);
        assert!(read_bit(&buf, 0));
        assert!(!read_bit(&buf, 1));
        write_bit(&mut buf, 0, false);
        assert_eq!(buf[0], 0x00);
    }

    #[test]
    fn test_copy_bits_unaligned() {
        let src = [0xFF, 0x00];
        let mut dst = [0u8; 2];
        copy_bits(&src, 4, &mut dst, 2, 8);
        assert_eq!(dst, [0x3C, 0x00]);
    }

    #[test]
    fn test_bits_roundtrip() {
        let data = [0xA5, 0x3C, 0x01];
        assert_eq!(bits_to_bytes(&bytes_to_bits(&data)), data.to_vec());
        let mut bits = [false; 12];
        u32_to_bits(0xABC, 12, &mut bits);
        assert_eq!(bits_to_u32(&bits), 0xABC);
    }
}
