//! Hamming codes used by the DMR BPTC and embedded link control
//!
//! Codewords are bool slices with the data bits first and the check bits
//! after them. Decoders correct a single bit error in place.

fn parity_15_11(d: &[bool]) -> [bool; 4] {
    [
        d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8],
        d[1] ^ d[2] ^ d[3] ^ d[4] ^ d[6] ^ d[8] ^ d[9],
        d[2] ^ d[3] ^ d[4] ^ d[5] ^ d[7] ^ d[9] ^ d[10],
        d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7] ^ d[10],
    ]
}

fn parity_13_9(d: &[bool]) -> [bool; 4] {
    [
        d[0] ^ d[1] ^ d[3] ^ d[5] ^ d[6],
        d[0] ^ d[1] ^ d[2] ^ d[4] ^ d[6] ^ d[7],
        d[0] ^ d[1] ^ d[2] ^ d[3] ^ d[5] ^ d[7] ^ d[8],
        d[0] ^ d[2] ^ d[4] ^ d[5] ^ d[8],
    ]
}

fn parity_16_11(d: &[bool]) -> [bool; 5] {
    let [p0, p1, p2, p3] = parity_15_11(d);
    [p0, p1, p2, p3, d[0] ^ d[2] ^ d[5] ^ d[6] ^ d[8] ^ d[9] ^ d[10]]
}

/// Try the word as-is, then every single-bit flip, against a parity function
fn correct<const P: usize>(word: &mut [bool], k: usize, parity: fn(&[bool]) -> [bool; P]) -> bool {
    let valid = |w: &[bool]| parity(w)[..] == w[k..k + P];
    if valid(word) {
        return true;
    }
    for i in 0..k + P {
        word[i] = !word[i];
        if valid(word) {
            return true;
        }
        word[i] = !word[i];
    }
    false
}

/// Fill bits 11..15 of a Hamming(15,11,3) word
pub fn encode_15_11(word: &mut [bool]) {
    let p = parity_15_11(word);
    word[11..15].copy_from_slice(&p);
}

/// Correct a Hamming(15,11,3) word; `false` when it cannot be repaired
pub fn decode_15_11(word: &mut [bool]) -> bool {
    correct(&mut word[..15], 11, parity_15_11)
}

/// Fill bits 9..13 of a Hamming(13,9,3) word
pub fn encode_13_9(word: &mut [bool]) {
    let p = parity_13_9(word);
    word[9..13].copy_from_slice(&p);
}

/// Correct a Hamming(13,9,3) word
pub fn decode_13_9(word: &mut [bool]) -> bool {
    correct(&mut word[..13], 9, parity_13_9)
}

/// Fill bits 11..16 of a Hamming(16,11,4) word
pub fn encode_16_11(word: &mut [bool]) {
    let p = parity_16_11(word);
    word[11..16].copy_from_slice(&p);
}

/// Correct a Hamming(16,11,4) word
pub fn decode_16_11(word: &mut [bool]) -> bool {
    correct(&mut word[..16], 11, parity_16_11)
}
