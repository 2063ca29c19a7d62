//! CRC variants used across the supported protocols

/// CRC-CCITT as used by the D-Star radio header
///
/// Reflected polynomial 0x8408, initial value 0xFFFF, complemented result.
pub fn ccitt161(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0x8408
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// Write the D-Star CRC into the last two bytes, little-endian
pub fn add_ccitt161(buf: &mut [u8]) {
    let n = buf.len() - 2;
    let crc = ccitt161(&buf[..n]);
    buf[n..].copy_from_slice(&crc.to_le_bytes());
}

/// Check a buffer whose last two bytes are a D-Star CRC
pub fn check_ccitt161(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }
    let n = buf.len() - 2;
    ccitt161(&buf[..n]).to_le_bytes() == buf[n..]
}

/// CRC-CCITT as used by System Fusion
///
/// Polynomial 0x1021 MSB first, initial value zero, complemented result.
pub fn ccitt162(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    !crc
}

/// Write the System Fusion CRC into the last two bytes, big-endian
pub fn add_ccitt162(buf: &mut [u8]) {
    let n = buf.len() - 2;
    let crc = ccitt162(&buf[..n]);
    buf[n..].copy_from_slice(&crc.to_be_bytes());
}

/// Check a buffer whose last two bytes are a System Fusion CRC
pub fn check_ccitt162(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }
    let n = buf.len() - 2;
    ccitt162(&buf[..n]).to_be_bytes() == buf[n..]
}

/// Five-bit checksum of the DMR embedded link control
pub fn five_bit(data: &[u8; 9]) -> u8 {
    let sum: u32 = data.iter().map(|&b| u32::from(b)).sum();
    (sum % 31) as u8
}

/// MSB-first CRC over a bit slice
///
/// `poly` omits the implicit top term; the register is `width` bits wide.
fn crc_bits(bits: &[bool], width: u32, poly: u32, init: u32) -> u32 {
    let mask = (1u32 << width) - 1;
    let top = 1u32 << (width - 1);
    let mut crc = init & mask;
    for &bit in bits {
        let feedback = (crc & top != 0) ^ bit;
        crc = (crc << 1) & mask;
        if feedback {
            crc ^= poly & mask;
        }
    }
    crc
}

/// NXDN CRC-6 (x^6 + x^5 + x^2 + x + 1, preset all ones)
pub fn crc6(bits: &[bool]) -> u8 {
    crc_bits(bits, 6, 0x27, 0x3F) as u8
}

/// NXDN CRC-12 (x^12 + x^11 + x^3 + x^2 + x + 1, preset all ones)
pub fn crc12(bits: &[bool]) -> u16 {
    crc_bits(bits, 12, 0x80F, 0xFFF) as u16
}

/// M17 CRC-16 (polynomial 0x5935, initial value 0xFFFF, no final xor)
pub fn m17_crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x5935
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_check_values() {
        // CRC-16/X-25 and complemented CRC-16/XMODEM catalogue check values
        assert_eq!(ccitt161(b"123456789"), 0x906E);
        assert_eq!(ccitt162(b"123456789"), !0x31C3);
        assert_eq!(m17_crc16(b""), 0xFFFF);
    }

    #[test]
    fn test_add_and_check() {
        let mut buf = *b"N0CALL  xx";
        add_ccitt161(&mut buf);
        assert!(check_ccitt161(&buf));
        buf[0] ^= 0x01;
        assert!(!check_ccitt161(&buf));

        let mut buf = *b"TESTBM    yy";
        add_ccitt162(&mut buf);
        assert!(check_ccitt162(&buf));
        buf[11] ^= 0x80;
        assert!(!check_ccitt162(&buf));
    }

    #[test]
    fn test_five_bit() {
        assert_eq!(five_bit(&[0; 9]), 0);
        assert_eq!(five_bit(&[0xFF; 9]), ((0xFF * 9) % 31) as u8);
    }

    proptest! {
        #[test]
        fn crc6_detects_single_bit(bits in proptest::collection::vec(any::<bool>(), 26), flip in 0usize..26) {
            let crc = crc6(&bits);
            let mut corrupted = bits.clone();
            corrupted[flip] = !corrupted[flip];
            prop_assert_ne!(crc6(&corrupted), crc);
        }

        #[test]
        fn crc12_detects_single_bit(bits in proptest::collection::vec(any::<bool>(), 80), flip in 0usize..80) {
            let crc = crc12(&bits);
            let mut corrupted = bits.clone();
            corrupted[flip] = !corrupted[flip];
            prop_assert_ne!(crc12(&corrupted), crc);
        }

        #[test]
        fn ccitt162_detects_single_bit(data in proptest::collection::vec(any::<u8>(), 22), flip in 0usize..176) {
            let mut buf = data.clone();
            add_ccitt162(&mut buf);
            buf[flip / 8] ^= 0x80 >> (flip % 8);
            prop_assert!(!check_ccitt162(&buf));
        }
    }
}
