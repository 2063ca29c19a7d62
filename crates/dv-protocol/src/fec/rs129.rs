//! Reed-Solomon (12,9) over GF(2^8) for DMR full link control

/// Generator polynomial coefficients, lowest order first
const POLY: [u8; 4] = [64, 56, 14, 1];

/// Multiply in GF(256) with the field polynomial x^8+x^4+x^3+x^2+1
fn gmult(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80 != 0;
        a <<= 1;
        if carry {
            a ^= 0x1D;
        }
        b >>= 1;
    }
    product
}

/// Three parity bytes for a 9-byte message, most significant first
pub fn encode(msg: &[u8; 9]) -> [u8; 3] {
    let mut parity = [0u8; 3];
    for &byte in msg {
        let feedback = byte ^ parity[2];
        parity[2] = parity[1] ^ gmult(POLY[2], feedback);
        parity[1] = parity[0] ^ gmult(POLY[1], feedback);
        parity[0] = gmult(POLY[0], feedback);
    }
    [parity[2], parity[1], parity[0]]
}

/// Whether the last three bytes are the parity of the first nine
pub fn check(codeword: &[u8; 12]) -> bool {
    let mut msg = [0u8; 9];
    msg.copy_from_slice(&codeword[..9]);
    encode(&msg)[..] == codeword[9..]
}
