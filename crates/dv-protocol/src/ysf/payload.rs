//! Data and voice channels of the YSF payload

use super::{pair_interleave, vch_interleave, whiten, FRAME_LEN, PAYLOAD_OFFSET, SECTIONS, SECTION_LEN, VCH_LEN};
use crate::bits::{read_bit, write_bit};
use crate::callsign::YsfCallsign;
use crate::error::ParseError;
use crate::fec::{convolution, crc};

const CSD_LEN: usize = 20;
const CSD_CODED_PER_SECTION: usize = 9;
const VD2_DCH_LEN: usize = 10;
const VD2_DCH_CODED_PER_SECTION: usize = 5;

/// Addressing carried by header and terminator frames
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderData {
    pub dst: YsfCallsign,
    pub src: YsfCallsign,
    pub downlink: YsfCallsign,
    pub uplink: YsfCallsign,
}

/// Whiten, CRC, convolve and interleave one data channel
///
/// `data_len` bytes of data become `(data_len + 2) * 8 + 4` encoder steps,
/// which must equal `sections * 20`.
fn encode_channel(data: &[u8], sections: usize) -> Vec<u8> {
    let mut plain = data.to_vec();
    whiten(&mut plain);
    plain.extend_from_slice(&[0, 0]);
    // The CRC covers the whitened bytes
    crc::add_ccitt162(&mut plain);
    // Tail byte flushes the encoder
    plain.push(0);

    let steps = sections * 20;
    let mut coded = vec![0u8; steps / 4];
    convolution::encode(&plain, &mut coded, steps);

    let mut out = vec![0u8; steps / 4];
    for (i, &n) in pair_interleave(sections).iter().enumerate() {
        write_bit(&mut out, n, read_bit(&coded, 2 * i));
        write_bit(&mut out, n + 1, read_bit(&coded, 2 * i + 1));
    }
    out
}

fn decode_channel(interleaved: &[u8], sections: usize, data_len: usize) -> Option<Vec<u8>> {
    let steps = sections * 20;
    let mut coded = vec![0u8; steps / 4];
    for (i, &n) in pair_interleave(sections).iter().enumerate() {
        write_bit(&mut coded, 2 * i, read_bit(interleaved, n));
        write_bit(&mut coded, 2 * i + 1, read_bit(interleaved, n + 1));
    }

    let mut plain = convolution::decode(&coded, steps, (data_len + 2) * 8);
    if !crc::check_ccitt162(&plain) {
        return None;
    }
    plain.truncate(data_len);
    whiten(&mut plain);
    Some(plain)
}

/// Scatter coded bytes over the sections at `offset` within each
fn scatter(frame: &mut [u8; FRAME_LEN], coded: &[u8], per_section: usize, offset: usize) {
    for (i, chunk) in coded.chunks(per_section).enumerate() {
        let at = PAYLOAD_OFFSET + i * SECTION_LEN + offset;
        frame[at..at + chunk.len()].copy_from_slice(chunk);
    }
}

fn gather(frame: &[u8; FRAME_LEN], per_section: usize, offset: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(per_section * SECTIONS);
    for i in 0..SECTIONS {
        let at = PAYLOAD_OFFSET + i * SECTION_LEN + offset;
        out.extend_from_slice(&frame[at..at + per_section]);
    }
    out
}

/// Fill the payload of a header or terminator frame
pub fn create_header_data(header: &HeaderData, frame: &mut [u8; FRAME_LEN]) {
    let mut csd1 = [0u8; CSD_LEN];
    csd1[..10].copy_from_slice(header.dst.as_bytes());
    csd1[10..].copy_from_slice(header.src.as_bytes());
    let mut csd2 = [0u8; CSD_LEN];
    csd2[..10].copy_from_slice(header.downlink.as_bytes());
    csd2[10..].copy_from_slice(header.uplink.as_bytes());

    scatter(frame, &encode_channel(&csd1, 9), CSD_CODED_PER_SECTION, 0);
    scatter(frame, &encode_channel(&csd2, 9), CSD_CODED_PER_SECTION, CSD_CODED_PER_SECTION);
}

/// Recover the addressing of a header or terminator frame
pub fn process_header_data(frame: &[u8; FRAME_LEN]) -> Result<HeaderData, ParseError> {
    let csd1 = decode_channel(&gather(frame, CSD_CODED_PER_SECTION, 0), 9, CSD_LEN)
        .ok_or(ParseError::CrcMismatch("YSF CSD1"))?;
    let csd2 = decode_channel(
        &gather(frame, CSD_CODED_PER_SECTION, CSD_CODED_PER_SECTION),
        9,
        CSD_LEN,
    )
    .ok_or(ParseError::CrcMismatch("YSF CSD2"))?;

    Ok(HeaderData {
        dst: YsfCallsign::from_bytes(&csd1[..10]),
        src: YsfCallsign::from_bytes(&csd1[10..]),
        downlink: YsfCallsign::from_bytes(&csd2[..10]),
        uplink: YsfCallsign::from_bytes(&csd2[10..]),
    })
}

/// Write the 10-byte data channel of a V/D mode 2 frame
pub fn create_vd_mode2_data(dch: &[u8; VD2_DCH_LEN], frame: &mut [u8; FRAME_LEN]) {
    scatter(frame, &encode_channel(dch, 5), VD2_DCH_CODED_PER_SECTION, 0);
}

/// Read the data channel of a V/D mode 2 frame
pub fn process_vd_mode2_data(frame: &[u8; FRAME_LEN]) -> Result<[u8; VD2_DCH_LEN], ParseError> {
    let dch = decode_channel(&gather(frame, VD2_DCH_CODED_PER_SECTION, 0), 5, VD2_DCH_LEN)
        .ok_or(ParseError::CrcMismatch("YSF VD2 DCH"))?;
    let mut out = [0u8; VD2_DCH_LEN];
    out.copy_from_slice(&dch);
    Ok(out)
}

/// Write five voice channel blocks into a V/D mode 2 frame
pub fn write_vd_mode2_audio(blocks: &[[u8; VCH_LEN]; SECTIONS], frame: &mut [u8; FRAME_LEN]) {
    let table = vch_interleave();
    for (i, block) in blocks.iter().enumerate() {
        let mut plain = *block;
        whiten(&mut plain);
        let at = PAYLOAD_OFFSET + i * SECTION_LEN + VD2_DCH_CODED_PER_SECTION;
        let vch = &mut frame[at..at + VCH_LEN];
        for (bit, &n) in table.iter().enumerate() {
            write_bit(vch, n, read_bit(&plain, bit));
        }
    }
}

/// Read the five voice channel blocks of a V/D mode 2 frame
pub fn read_vd_mode2_audio(frame: &[u8; FRAME_LEN]) -> [[u8; VCH_LEN]; SECTIONS] {
    let table = vch_interleave();
    let mut blocks = [[0u8; VCH_LEN]; SECTIONS];
    for (i, block) in blocks.iter_mut().enumerate() {
        let at = PAYLOAD_OFFSET + i * SECTION_LEN + VD2_DCH_CODED_PER_SECTION;
        let vch = &frame[at..at + VCH_LEN];
        for (bit, &n) in table.iter().enumerate() {
            write_bit(block, bit, read_bit(vch, n));
        }
        whiten(block);
    }
    blocks
}
