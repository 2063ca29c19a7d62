//! BPTC(196,96) block product turbo code for DMR full link control
//!
//! The 96 data bits sit in a 13 x 15 matrix: nine data rows protected by
//! Hamming(15,11,3) and fifteen columns protected by Hamming(13,9,3). The
//! matrix is interleaved with stride 181 and carried in the two halves of a
//! DMR data burst either side of the slot type and sync.

use super::hamming;
use crate::bits::{read_bit, write_bit};

/// Data bit ranges inside the de-interleaved matrix
const DATA_RANGES: [(usize, usize); 9] = [
    (4, 11),
    (16, 26),
    (31, 41),
    (46, 56),
    (61, 71),
    (76, 86),
    (91, 101),
    (106, 116),
    (121, 131),
];

fn interleave_index(a: usize) -> usize {
    (a * 181) % 196
}

/// Burst bit position of coded bit `i`
fn burst_pos(i: usize) -> usize {
    if i < 98 {
        i
    } else {
        i + 68
    }
}

/// Encode 12 bytes (LC + RS parity) into the payload bits of a 33-byte burst
pub fn encode(data: &[u8; 12], burst: &mut [u8; 33]) {
    let mut matrix = [false; 196];

    let mut pos = 0;
    for &(start, end) in &DATA_RANGES {
        for slot in &mut matrix[start..=end] {
            *slot = read_bit(data, pos);
            pos += 1;
        }
    }

    for r in 0..9 {
        let start = r * 15 + 1;
        hamming::encode_15_11(&mut matrix[start..start + 15]);
    }

    for c in 0..15 {
        let mut col = [false; 13];
        for (a, bit) in col.iter_mut().enumerate() {
            *bit = matrix[c + 1 + a * 15];
        }
        hamming::encode_13_9(&mut col);
        for (a, &bit) in col.iter().enumerate() {
            matrix[c + 1 + a * 15] = bit;
        }
    }

    let mut raw = [false; 196];
    for (a, &bit) in matrix.iter().enumerate() {
        raw[interleave_index(a)] = bit;
    }

    for (i, &bit) in raw.iter().enumerate() {
        write_bit(burst, burst_pos(i), bit);
    }
}

/// Decode the payload bits of a burst, repairing what the row and column codes allow
///
/// Returns the 12 corrected bytes; the caller validates them with the RS parity.
pub fn decode(burst: &[u8; 33]) -> [u8; 12] {
    let mut raw = [false; 196];
    for (i, bit) in raw.iter_mut().enumerate() {
        *bit = read_bit(burst, burst_pos(i));
    }

    let mut matrix = [false; 196];
    for (a, bit) in matrix.iter_mut().enumerate() {
        *bit = raw[interleave_index(a)];
    }

    for _ in 0..5 {
        let mut fixed = false;

        for c in 0..15 {
            let mut col = [false; 13];
            for (a, bit) in col.iter_mut().enumerate() {
                *bit = matrix[c + 1 + a * 15];
            }
            let before = col;
            if hamming::decode_13_9(&mut col) && col != before {
                fixed = true;
                for (a, &bit) in col.iter().enumerate() {
                    matrix[c + 1 + a * 15] = bit;
                }
            }
        }

        for r in 0..9 {
            let start = r * 15 + 1;
            let row = &mut matrix[start..start + 15];
            let before: Vec<bool> = row.to_vec();
            if hamming::decode_15_11(row) && row[..] != before[..] {
                fixed = true;
            }
        }

        if !fixed {
            break;
        }
    }

    let mut data = [0u8; 12];
    let mut pos = 0;
    for &(start, end) in &DATA_RANGES {
        for &bit in &matrix[start..=end] {
            write_bit(&mut data, pos, bit);
            pos += 1;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_interleave_is_permutation() {
        let mut seen = [false; 196];
        for a in 0..196 {
            seen[interleave_index(a)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_leaves_centre_alone() {
        let mut burst = [0u8; 33];
        burst[13..20].fill(0x5A);
        encode(&[0xFF; 12], &mut burst);
        // Bits 98..165 belong to slot type and sync
        for pos in 104..160 {
            assert_eq!(read_bit(&burst, pos), read_bit(&[0x5A; 33], pos), "bit {pos}");
        }
    }

    proptest! {
        #[test]
        fn roundtrip_with_single_error(data in any::<[u8; 12]>(), flip in 0usize..196) {
            let mut burst = [0u8; 33];
            encode(&data, &mut burst);
            prop_assert_eq!(decode(&burst), data);

            let pos = burst_pos(flip);
            burst[pos / 8] ^= 0x80 >> (pos % 8);
            prop_assert_eq!(decode(&burst), data);
        }
    }
}
