//! Native transmissions as a remote network would send them
//!
//! Each builder returns the datagrams of one complete transmission, in
//! order. Voice frame `i` carries the byte `i + 1` throughout, so the
//! frames can be told apart after conversion.

use dv_protocol::callsign::YsfCallsign;
use dv_protocol::dmr::emb::{Emb, LCSS_SINGLE};
use dv_protocol::dmr::lc::{self, FullLcKind, Lc};
use dv_protocol::dmr::slot_type::SlotType;
use dv_protocol::dmr::{self, embedded, FrameType, AMBE_LEN, AMBE_PER_BURST, BURST_LEN};
use dv_protocol::dstar::{self, Header, SlowDataEncoder};
use dv_protocol::m17::{self, Lich, CODEC2_LEN, PAYLOAD_LEN};
use dv_protocol::nxdn::{self, Layer3};
use dv_protocol::p25::{self, Ldu1Info, IMBE_LEN, RECORDS_PER_LDU};
use dv_protocol::ysf::fich::{self, Fich};
use dv_protocol::ysf::payload::{self, HeaderData};
use dv_protocol::ysf::{self, SECTIONS, VCH_LEN};
use dv_protocol::{fm, ParseError};

fn fill<const N: usize>(i: usize) -> [u8; N] {
    [(i + 1) as u8; N]
}

/// D-Star header then `frames` voice frames, the last flagged as the end
pub fn dstar(id: u16, my: &str, your: &str, frames: usize) -> Vec<Vec<u8>> {
    let header = Header::new(my, your, "DIRECT");
    let slow = SlowDataEncoder::new(my);
    let mut out = vec![dstar::build_header(id, &header).to_vec()];
    for i in 0..frames {
        let seq = (i % usize::from(dstar::FRAMES_PER_SUPERFRAME)) as u8;
        let end = i + 1 == frames;
        out.push(dstar::build_data(id, seq, end, &fill(i), &slow.frame(seq)).to_vec());
    }
    out
}

/// DMR voice LC header, voice bursts of three frames and a terminator
pub fn dmr(
    stream_id: u32,
    slot: u8,
    src: u32,
    dst: u32,
    group: bool,
    bursts: usize,
) -> Vec<Vec<u8>> {
    const COLOR_CODE: u8 = 1;
    let lc = Lc::new(group, src, dst);
    let fragments = embedded::encode(&lc.to_bytes());
    let packet = |seq: usize, frame: FrameType, burst: [u8; BURST_LEN]| {
        dmr::Packet {
            seq: seq as u8,
            src,
            dst,
            repeater_id: 1,
            slot,
            group,
            frame,
            stream_id,
            burst,
            ber: 0,
            rssi: 0,
        }
        .encode()
        .to_vec()
    };

    let mut burst = [0u8; BURST_LEN];
    lc::encode_full(&lc, FullLcKind::VoiceHeader, &mut burst);
    SlotType::new(COLOR_CODE, dmr::DT_VOICE_LC_HEADER).encode(&mut burst);
    dmr::add_sync(&mut burst, &dmr::DATA_SYNC);
    let mut out = vec![packet(
        0,
        FrameType::DataSync {
            data_type: dmr::DT_VOICE_LC_HEADER,
        },
        burst,
    )];

    for i in 0..bursts {
        let frames: [[u8; AMBE_LEN]; AMBE_PER_BURST] =
            std::array::from_fn(|j| fill(i * AMBE_PER_BURST + j));
        let mut burst = [0u8; BURST_LEN];
        dmr::insert_ambe(&mut burst, &frames);
        let n = (i % 6) as u8;
        let frame = if n == 0 {
            dmr::add_sync(&mut burst, &dmr::VOICE_SYNC);
            FrameType::VoiceSync
        } else {
            let (lcss, fragment) = match n {
                1..=4 => (embedded::lcss_for(n), fragments[usize::from(n - 1)]),
                _ => (LCSS_SINGLE, [0u8; 4]),
            };
            Emb::new(COLOR_CODE, lcss).encode(&mut burst);
            dmr::insert_embedded(&mut burst, &fragment);
            FrameType::Voice { n }
        };
        out.push(packet(i + 1, frame, burst));
    }

    let mut burst = [0u8; BURST_LEN];
    lc::encode_full(&lc, FullLcKind::Terminator, &mut burst);
    SlotType::new(COLOR_CODE, dmr::DT_TERMINATOR_WITH_LC).encode(&mut burst);
    dmr::add_sync(&mut burst, &dmr::DATA_SYNC);
    out.push(packet(
        bursts + 1,
        FrameType::DataSync {
            data_type: dmr::DT_TERMINATOR_WITH_LC,
        },
        burst,
    ));
    out
}

/// System Fusion V/D mode 2 header, communications frames and terminator
///
/// Every datagram carries `tag` as its gateway field.
pub fn ysf(tag: &str, src: &str, dg_id: u8, frames: usize) -> Vec<Vec<u8>> {
    let (tag, src) = (YsfCallsign::new(tag), YsfCallsign::new(src));
    let all = YsfCallsign::new("ALL");
    let packet = |counter: usize, end: bool, frame: [u8; ysf::FRAME_LEN]| {
        ysf::Packet {
            gateway: tag,
            src,
            dst: all,
            counter: (counter & 0x7F) as u8,
            end,
            frame,
        }
        .encode()
        .to_vec()
    };
    let header_frame = |fi: u8| {
        let mut frame = ysf::new_frame();
        Fich::vd_mode2(fi, 0, 6, dg_id).encode(&mut frame);
        let header = HeaderData {
            dst: all,
            src,
            downlink: tag,
            uplink: tag,
        };
        payload::create_header_data(&header, &mut frame);
        frame
    };

    let mut out = vec![packet(0, false, header_frame(fich::FI_HEADER))];
    for i in 0..frames {
        let fn_ = (i % 7) as u8;
        let mut frame = ysf::new_frame();
        Fich::vd_mode2(fich::FI_COMMUNICATIONS, fn_, 6, dg_id).encode(&mut frame);
        let dch = if fn_ == 1 { *src.as_bytes() } else { *all.as_bytes() };
        payload::create_vd_mode2_data(&dch, &mut frame);
        let blocks: [[u8; VCH_LEN]; SECTIONS] = std::array::from_fn(|j| fill(i * SECTIONS + j));
        payload::write_vd_mode2_audio(&blocks, &mut frame);
        out.push(packet(i + 1, false, frame));
    }
    out.push(packet(frames + 1, true, header_frame(fich::FI_TERMINATOR)));
    out
}

/// P25 superframes of LDU1 and LDU2 records, then the end record
pub fn p25(src: u32, dst: u32, group: bool, superframes: usize) -> Vec<Vec<u8>> {
    let info = Ldu1Info { group, src, dst };
    let records = superframes * 2 * RECORDS_PER_LDU;
    let mut out: Vec<Vec<u8>> = (0..records)
        .map(|i| {
            let imbe = fill::<IMBE_LEN>(i);
            match i % (2 * RECORDS_PER_LDU) {
                index if index < RECORDS_PER_LDU => p25::build_ldu1_record(index, &info, &imbe),
                index => p25::build_ldu2_record(index - RECORDS_PER_LDU, &imbe),
            }
        })
        .collect();
    out.push(p25::build_end().to_vec());
    out
}

/// NXDN VCALL header, voice frames with the call in their SACCH, then TX_REL
///
/// Frame `i` carries SACCH part `i % 4`, so any four consecutive frames
/// starting on a multiple of four rebuild the VCALL.
pub fn nxdn(src: u16, dst: u16, group: bool, frames: usize) -> Vec<Vec<u8>> {
    const RAN: u8 = 1;
    let call = Layer3::vcall(group, src, dst);
    let mut out = vec![nxdn::Packet::control(&call, RAN).encode().to_vec()];
    for i in 0..frames {
        let blocks: [[u8; nxdn::VCH_LEN]; 4] = std::array::from_fn(|j| fill(i * 4 + j));
        out.push(nxdn::Packet::voice(&blocks, &call, i % 4, RAN).encode().to_vec());
    }
    let release = Layer3::tx_rel(group, src, dst);
    out.push(nxdn::Packet::control(&release, RAN).encode().to_vec());
    out
}

/// M17 stream of `packets` packets, two Codec2 frames each
pub fn m17(stream_id: u16, src: &str, dst: &str, packets: usize) -> Result<Vec<Vec<u8>>, ParseError> {
    let lich = Lich::voice(src, dst)?;
    Ok((0..packets)
        .map(|i| {
            let mut payload = [0u8; PAYLOAD_LEN];
            for (j, chunk) in payload.chunks_exact_mut(CODEC2_LEN).enumerate() {
                chunk.copy_from_slice(&fill::<CODEC2_LEN>(i * 2 + j));
            }
            m17::Packet {
                stream_id,
                lich,
                frame_number: i as u16,
                end: i + 1 == packets,
                payload,
            }
            .encode()
            .to_vec()
        })
        .collect())
}

/// USRP voice packets of a constant level, then the end marker
pub fn fm(frames: usize) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = (0..frames)
        .map(|i| fm::build_voice(i as u32, &[(i as i16 + 1) * 100; fm::SAMPLES_PER_FRAME]))
        .collect();
    out.push(fm::build_end(frames as u32).to_vec());
    out
}
