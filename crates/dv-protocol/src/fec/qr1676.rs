//! Quadratic residue (16,7,6) code protecting the DMR EMB field

const GENERATOR: u32 = 0x139;

const fn build_1676() -> [u16; 128] {
    let mut table = [0u16; 128];
    let mut d = 0;
    while d < 128 {
        let mut rem = (d as u32) << 8;
        let mut i = 15;
        while i > 8 {
            i -= 1;
            if rem & (1 << i) != 0 {
                rem ^= GENERATOR << (i - 8);
            }
        }
        let cw = ((d as u32) << 9) | ((rem & 0xFF) << 1);
        table[d] = (cw | (cw.count_ones() & 1)) as u16;
        d += 1;
    }
    table
}

/// Codewords indexed by the 7-bit EMB value
pub const ENCODING_TABLE_1676: [u16; 128] = build_1676();

/// Encode 7 data bits
pub fn encode(data: u8) -> u16 {
    ENCODING_TABLE_1676[(data & 0x7F) as usize]
}

/// Decode a codeword, correcting up to two bit errors
pub fn decode(word: u16) -> Option<u8> {
    let (best, distance) = ENCODING_TABLE_1676
        .iter()
        .enumerate()
        .map(|(d, &cw)| (d as u8, (cw ^ word).count_ones()))
        .min_by_key(|&(_, dist)| dist)?;
    (distance <= 2).then_some(best)
}
