//! Embedded link control carried in voice bursts B to E
//!
//! The 72 LC bits and a 5-bit checksum fill seven Hamming(16,11,4) rows,
//! an eighth row holds column parity. The 128-bit block is interleaved and
//! sent as four 32-bit fragments.

use super::emb::{LCSS_CONTINUATION, LCSS_FIRST, LCSS_LAST};
use crate::bits::{read_bit, write_bit};
use crate::fec::{crc, hamming};

/// (row start, data bits) for the seven coded rows
const ROWS: [(usize, usize); 7] = [(0, 11), (16, 11), (32, 10), (48, 10), (64, 10), (80, 10), (96, 10)];
/// Checksum bit positions, most significant first
const CHECKSUM_BITS: [usize; 5] = [42, 58, 74, 90, 106];

/// Interleaved position of each raw bit, in transmission order
fn interleave_order() -> [usize; 128] {
    let mut order = [0usize; 128];
    let mut b = 0;
    for slot in order.iter_mut() {
        *slot = b;
        b += 16;
        if b > 127 {
            b -= 127;
        }
    }
    order
}

/// Encode 9 LC bytes into four 32-bit fragments
pub fn encode(lc: &[u8; 9]) -> [[u8; 4]; 4] {
    let mut raw = [false; 128];

    let mut pos = 0;
    for &(start, count) in &ROWS {
        for slot in &mut raw[start..start + count] {
            *slot = read_bit(lc, pos);
            pos += 1;
        }
    }

    let checksum = crc::five_bit(lc);
    for (i, &at) in CHECKSUM_BITS.iter().enumerate() {
        raw[at] = (checksum >> (4 - i)) & 1 == 1;
    }

    for r in 0..7 {
        hamming::encode_16_11(&mut raw[r * 16..r * 16 + 16]);
    }
    for c in 0..16 {
        raw[112 + c] = (0..7).fold(false, |acc, r| acc ^ raw[r * 16 + c]);
    }

    let mut fragments = [[0u8; 4]; 4];
    for (a, &b) in interleave_order().iter().enumerate() {
        write_bit(&mut fragments[a / 32], a % 32, raw[b]);
    }
    fragments
}

/// Decode four fragments, returning the LC when every row and the checksum check out
pub fn decode(fragments: &[[u8; 4]; 4]) -> Option<[u8; 9]> {
    let mut raw = [false; 128];
    for (a, &b) in interleave_order().iter().enumerate() {
        raw[b] = read_bit(&fragments[a / 32], a % 32);
    }

    for r in 0..7 {
        if !hamming::decode_16_11(&mut raw[r * 16..r * 16 + 16]) {
            return None;
        }
    }

    let mut lc = [0u8; 9];
    let mut pos = 0;
    for &(start, count) in &ROWS {
        for &bit in &raw[start..start + count] {
            write_bit(&mut lc, pos, bit);
            pos += 1;
        }
    }

    let checksum = CHECKSUM_BITS
        .iter()
        .fold(0u8, |acc, &at| (acc << 1) | u8::from(raw[at]));
    (checksum == crc::five_bit(&lc)).then_some(lc)
}

/// LCSS value for the fragment sent in voice burst `n` (1..=4)
pub fn lcss_for(n: u8) -> u8 {
    match n {
        1 => LCSS_FIRST,
        4 => LCSS_LAST,
        _ => LCSS_CONTINUATION,
    }
}

/// Collects fragments from a voice superframe for late entry
#[derive(Debug, Clone, Default)]
pub struct EmbeddedCollector {
    fragments: [[u8; 4]; 4],
    next: Option<usize>,
}

impl EmbeddedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment with its LCSS; returns the LC once a full set decodes
    pub fn add(&mut self, lcss: u8, fragment: &[u8; 4]) -> Option<[u8; 9]> {
        let index = match (lcss, self.next) {
            (LCSS_FIRST, _) => 0,
            (LCSS_CONTINUATION, Some(i @ (1 | 2))) => i,
            (LCSS_LAST, Some(3)) => 3,
            _ => {
                self.next = None;
                return None;
            }
        };

        self.fragments[index] = *fragment;
        if index < 3 {
            self.next = Some(index + 1);
            return None;
        }

        self.next = None;
        decode(&self.fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LC: [u8; 9] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x12, 0xD6, 0x87];

    #[test]
    fn test_interleave_is_permutation() {
        let mut seen = [false; 128];
        for b in interleave_order() {
            assert!(!seen[b]);
            seen[b] = true;
        }
    }

    #[test]
    fn test_roundtrip() {
        let fragments = encode(&LC);
        assert_eq!(decode(&fragments), Some(LC));
    }

    #[test]
    fn test_single_error_per_row_corrected() {
        let mut fragments = encode(&LC);
        fragments[2][1] ^= 0x08;
        assert_eq!(decode(&fragments), Some(LC));
    }

    #[test]
    fn test_collector() {
        let fragments = encode(&LC);
        let mut collector = EmbeddedCollector::new();
        // Joining mid-superframe yields nothing until a first fragment arrives
        assert_eq!(collector.add(LCSS_CONTINUATION, &fragments[2]), None);
        for n in 1..=4u8 {
            let result = collector.add(lcss_for(n), &fragments[usize::from(n - 1)]);
            if n < 4 {
                assert_eq!(result, None);
            } else {
                assert_eq!(result, Some(LC));
            }
        }
    }
}
