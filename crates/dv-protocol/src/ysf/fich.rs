//! Frame information channel
//!
//! Four bytes of frame metadata plus CRC, split into four Golay(24,12)
//! words, convolutionally coded and interleaved over 25 bytes.

use super::{pair_interleave, FICH_LEN, FRAME_LEN, SYNC_LEN};
use crate::bits::{read_bit, write_bit};
use crate::error::ParseError;
use crate::fec::{convolution, crc, golay};

pub const FI_HEADER: u8 = 0;
pub const FI_COMMUNICATIONS: u8 = 1;
pub const FI_TERMINATOR: u8 = 2;

pub const DT_VD_MODE1: u8 = 0;
pub const DT_DATA_FR: u8 = 1;
pub const DT_VD_MODE2: u8 = 2;
pub const DT_VOICE_FR: u8 = 3;

/// Decoded FICH fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fich {
    /// Frame indicator: header, communications or terminator
    pub fi: u8,
    pub cs: u8,
    pub cm: u8,
    pub bn: u8,
    pub bt: u8,
    /// Frame number within the data channel cycle
    pub fn_: u8,
    /// Frame total of the cycle
    pub ft: u8,
    pub dev: bool,
    pub mr: u8,
    pub voip: bool,
    /// Data type (V/D mode 1, data FR, V/D mode 2, voice FR)
    pub dt: u8,
    pub sql: bool,
    pub dg_id: u8,
}

impl Fich {
    /// FICH for a V/D mode 2 frame of the given type
    pub fn vd_mode2(fi: u8, fn_: u8, ft: u8, dg_id: u8) -> Self {
        Self {
            fi,
            cs: 2,
            fn_,
            ft,
            dt: DT_VD_MODE2,
            dg_id: dg_id & 0x7F,
            ..Self::default()
        }
    }

    fn to_bytes(self) -> [u8; 4] {
        [
            (self.fi << 6) | ((self.cs & 0x03) << 4) | ((self.cm & 0x03) << 2) | (self.bn & 0x03),
            (self.bt << 6) | ((self.fn_ & 0x07) << 3) | (self.ft & 0x07),
            (u8::from(self.dev) << 6)
                | ((self.mr & 0x07) << 3)
                | (u8::from(self.voip) << 2)
                | (self.dt & 0x03),
            (u8::from(self.sql) << 7) | (self.dg_id & 0x7F),
        ]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            fi: b[0] >> 6,
            cs: (b[0] >> 4) & 0x03,
            cm: (b[0] >> 2) & 0x03,
            bn: b[0] & 0x03,
            bt: b[1] >> 6,
            fn_: (b[1] >> 3) & 0x07,
            ft: b[1] & 0x07,
            dev: b[2] & 0x40 != 0,
            mr: (b[2] >> 3) & 0x07,
            voip: b[2] & 0x04 != 0,
            dt: b[2] & 0x03,
            sql: b[3] & 0x80 != 0,
            dg_id: b[3] & 0x7F,
        }
    }

    /// Write the coded FICH after the sync of an air frame
    pub fn encode(&self, frame: &mut [u8; FRAME_LEN]) {
        let mut plain = [0u8; 6];
        plain[..4].copy_from_slice(&self.to_bytes());
        crc::add_ccitt162(&mut plain);

        let words = [
            (u16::from(plain[0]) << 4) | u16::from(plain[1] >> 4),
            (u16::from(plain[1] & 0x0F) << 8) | u16::from(plain[2]),
            (u16::from(plain[3]) << 4) | u16::from(plain[4] >> 4),
            (u16::from(plain[4] & 0x0F) << 8) | u16::from(plain[5]),
        ];
        // Twelve bytes of Golay words plus a zero byte for the encoder tail
        let mut golay_bytes = [0u8; 13];
        for (i, &w) in words.iter().enumerate() {
            let cw = golay::encode_24128(w).to_be_bytes();
            golay_bytes[i * 3..i * 3 + 3].copy_from_slice(&cw[1..]);
        }

        let mut coded = [0u8; FICH_LEN];
        convolution::encode(&golay_bytes, &mut coded, 100);

        let field = &mut frame[SYNC_LEN..SYNC_LEN + FICH_LEN];
        for (i, &n) in pair_interleave(5).iter().enumerate() {
            write_bit(field, n, read_bit(&coded, 2 * i));
            write_bit(field, n + 1, read_bit(&coded, 2 * i + 1));
        }
    }

    /// Decode and CRC-check the FICH of an air frame
    pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<Self, ParseError> {
        let field = &frame[SYNC_LEN..SYNC_LEN + FICH_LEN];
        let mut coded = [0u8; FICH_LEN];
        for (i, &n) in pair_interleave(5).iter().enumerate() {
            write_bit(&mut coded, 2 * i, read_bit(field, n));
            write_bit(&mut coded, 2 * i + 1, read_bit(field, n + 1));
        }

        let golay_bytes = convolution::decode(&coded, 100, 96);
        let mut words = [0u16; 4];
        for (i, w) in words.iter_mut().enumerate() {
            let b = &golay_bytes[i * 3..i * 3 + 3];
            *w = golay::decode_24128(u32::from_be_bytes([0, b[0], b[1], b[2]]));
        }

        let plain = [
            (words[0] >> 4) as u8,
            (((words[0] & 0x0F) << 4) | (words[1] >> 8)) as u8,
            (words[1] & 0xFF) as u8,
            (words[2] >> 4) as u8,
            (((words[2] & 0x0F) << 4) | (words[3] >> 8)) as u8,
            (words[3] & 0xFF) as u8,
        ];
        if !crc::check_ccitt162(&plain) {
            return Err(ParseError::CrcMismatch("YSF FICH"));
        }
        Ok(Self::from_bytes(&plain))
    }
}
