//! P25 network records
//!
//! A voice superframe is two LDUs of nine records each. Every record is a
//! fixed template whose first byte names it; the gateway overwrites control
//! fields at known offsets and drops one 11-byte IMBE frame into each.
//!
//! ```text
//! LDU1 0x62..0x6A: 0x64 LCF/MFID/options, 0x65 destination, 0x66 source
//! LDU2 0x6B..0x73: 0x6D..0x6F message indicator, 0x70 algorithm and key id
//! 0x80 end of transmission
//! ```

use crate::error::ParseError;

/// IMBE frame length carried per record
pub const IMBE_LEN: usize = 11;
/// Records per LDU
pub const RECORDS_PER_LDU: usize = 9;

pub const REC_END: u8 = 0x80;
pub const POLL: u8 = 0xF0;
pub const UNLINK: u8 = 0xF1;

pub const LCF_GROUP: u8 = 0x00;
pub const LCF_PRIVATE: u8 = 0x03;

const REC62: [u8; 22] = [
    0x62, 0x02, 0x02, 0x0C, 0x0B, 0x12, 0x64, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const REC63: [u8; 14] = [0x63, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];
const REC64: [u8; 17] = [0x64, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];
const REC6A: [u8; 16] = [0x6A, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];
const REC6B: [u8; 22] = [
    0x6B, 0x02, 0x02, 0x0C, 0x0B, 0x12, 0x64, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
const REC80: [u8; 17] = [0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Byte offset of the IMBE frame within a record
fn imbe_offset(record: u8) -> Option<usize> {
    match record {
        0x62 | 0x6B => Some(10),
        0x63 | 0x6C => Some(1),
        0x64..=0x69 | 0x6D..=0x72 => Some(5),
        0x6A | 0x73 => Some(4),
        _ => None,
    }
}

/// Template for a voice record type
fn template(record: u8) -> Vec<u8> {
    let mut out = match record {
        0x62 => REC62.to_vec(),
        0x6B => REC6B.to_vec(),
        0x63 | 0x6C => REC63.to_vec(),
        0x6A | 0x73 => REC6A.to_vec(),
        _ => REC64.to_vec(),
    };
    out[0] = record;
    out
}

/// Control fields of an LDU1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ldu1Info {
    pub group: bool,
    pub src: u32,
    pub dst: u32,
}

/// Build record `index` (0..9) of an LDU1
pub fn build_ldu1_record(index: usize, info: &Ldu1Info, imbe: &[u8; IMBE_LEN]) -> Vec<u8> {
    let record = 0x62 + index as u8;
    let mut out = template(record);
    match record {
        0x64 => {
            out[1] = if info.group { LCF_GROUP } else { LCF_PRIVATE };
            out[2] = 0x00;
            out[3] = 0x00;
        }
        0x65 => out[1..4].copy_from_slice(&info.dst.to_be_bytes()[1..]),
        0x66 => out[1..4].copy_from_slice(&info.src.to_be_bytes()[1..]),
        _ => {}
    }
    if let Some(at) = imbe_offset(record) {
        out[at..at + IMBE_LEN].copy_from_slice(imbe);
    }
    out
}

/// Build record `index` (0..9) of a clear-voice LDU2
pub fn build_ldu2_record(index: usize, imbe: &[u8; IMBE_LEN]) -> Vec<u8> {
    let record = 0x6B + index as u8;
    let mut out = template(record);
    if record == 0x70 {
        // Algorithm id: unencrypted
        out[1] = 0x80;
    }
    if let Some(at) = imbe_offset(record) {
        out[at..at + IMBE_LEN].copy_from_slice(imbe);
    }
    out
}

/// Terminator record
pub fn build_end() -> [u8; 17] {
    REC80
}

/// Keepalive carrying the gateway callsign
pub fn build_poll(callsign: &str) -> [u8; 11] {
    let mut out = [b' '; 11];
    out[0] = POLL;
    for (slot, b) in out[1..].iter_mut().zip(callsign.bytes()) {
        *slot = b;
    }
    out
}

/// A parsed network record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Voice record with its IMBE frame and any control field it carries
    Voice {
        record: u8,
        imbe: [u8; IMBE_LEN],
        control: Option<Control>,
    },
    End,
    Poll,
    /// Anything else (headers, data), forwarded untouched on same-mode routes
    Other(u8),
}

/// Control fields that ride on particular LDU1 records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Lcf { group: bool },
    Destination(u32),
    Source(u32),
}

impl Record {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let Some(&record) = data.first() else {
            return Err(ParseError::ShortPacket {
                needed: 1,
                actual: 0,
            });
        };

        match record {
            REC_END => Ok(Record::End),
            POLL => Ok(Record::Poll),
            0x62..=0x73 => {
                let at = imbe_offset(record).ok_or_else(|| {
                    ParseError::InvalidFrame(format!("P25 record 0x{record:02X} without voice"))
                })?;
                ParseError::check_len(data, at + IMBE_LEN)?;
                let mut imbe = [0u8; IMBE_LEN];
                imbe.copy_from_slice(&data[at..at + IMBE_LEN]);
                let id = || u32::from_be_bytes([0, data[1], data[2], data[3]]);
                let control = match record {
                    0x64 => Some(Control::Lcf {
                        group: data[1] != LCF_PRIVATE,
                    }),
                    0x65 => Some(Control::Destination(id())),
                    0x66 => Some(Control::Source(id())),
                    _ => None,
                };
                Ok(Record::Voice {
                    record,
                    imbe,
                    control,
                })
            }
            other => Ok(Record::Other(other)),
        }
    }
}

/// Rewrite the addressing of a raw LDU1 record for same-mode forwarding
pub fn rewrite_address(record: &mut [u8], src: u32, dst: u32) {
    match record.first() {
        Some(0x65) if record.len() >= 4 => record[1..4].copy_from_slice(&dst.to_be_bytes()[1..]),
        Some(0x66) if record.len() >= 4 => record[1..4].copy_from_slice(&src.to_be_bytes()[1..]),
        _ => {}
    }
}
