//! Golay codes: (20,8) for the DMR slot type, (24,12) for the YSF FICH
//!
//! Both are built on the (23,12) generator x^11+x^10+x^6+x^5+x^4+x^2+1 with
//! an overall even-parity bit appended.

use std::sync::OnceLock;

const GENERATOR: u32 = 0xC75;

/// Remainder of `value` (a polynomial of `bits` terms) modulo the generator
const fn poly_mod(mut value: u32, bits: u32) -> u32 {
    let mut i = bits;
    while i > 11 {
        i -= 1;
        if value & (1 << i) != 0 {
            value ^= GENERATOR << (i - 11);
        }
    }
    value & 0x7FF
}

const fn build_2087() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut d = 0;
    while d < 256 {
        let cw = ((d as u32) << 11) | poly_mod((d as u32) << 11, 19);
        let parity = cw.count_ones() & 1;
        table[d] = (cw << 1) | parity;
        d += 1;
    }
    table
}

/// Golay(20,8) codewords indexed by the 8-bit value
pub const ENCODING_TABLE_2087: [u32; 256] = build_2087();

/// Encode the 8-bit slot type into its 20-bit codeword
pub fn encode_2087(data: u8) -> u32 {
    ENCODING_TABLE_2087[data as usize]
}

/// Decode a 20-bit slot type word, correcting up to three bit errors
pub fn decode_2087(word: u32) -> Option<u8> {
    let word = word & 0xF_FFFF;
    let (best, distance) = ENCODING_TABLE_2087
        .iter()
        .enumerate()
        .map(|(d, &cw)| (d as u8, (cw ^ word).count_ones()))
        .min_by_key(|&(_, dist)| dist)?;
    (distance <= 3).then_some(best)
}

/// Encode 12 data bits into a 24-bit extended Golay codeword
pub fn encode_24128(data: u16) -> u32 {
    let d = u32::from(data & 0xFFF);
    let cw = (d << 11) | poly_mod(d << 11, 23);
    (cw << 1) | (cw.count_ones() & 1)
}

/// Error patterns of weight three or less indexed by syndrome
///
/// The (23,12) code is perfect, so every syndrome has exactly one such pattern.
fn syndrome_table() -> &'static [u32; 2048] {
    static TABLE: OnceLock<[u32; 2048]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 2048];
        for a in 0..23 {
            let e1 = 1u32 << a;
            table[poly_mod(e1, 23) as usize] = e1;
            for b in a + 1..23 {
                let e2 = e1 | (1 << b);
                table[poly_mod(e2, 23) as usize] = e2;
                for c in b + 1..23 {
                    let e3 = e2 | (1 << c);
                    table[poly_mod(e3, 23) as usize] = e3;
                }
            }
        }
        table
    })
}

/// Decode a 24-bit codeword, correcting up to three errors in the first 23 bits
pub fn decode_24128(word: u32) -> u16 {
    let cw = (word >> 1) & 0x7F_FFFF;
    let fixed = cw ^ syndrome_table()[poly_mod(cw, 23) as usize];
    (fixed >> 11) as u16
}
