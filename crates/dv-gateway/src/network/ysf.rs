//! System Fusion adapter (`YSFD`)
//!
//! The adapter locks onto the gateway tag of the first valid frame it sees
//! and ignores every other tag until that tag's stream ends, falls silent
//! for [`TAG_HOLD`], or the adapter is reset, so two repeaters behind one
//! reflector cannot interleave their streams. Outbound streams use
//! V/D mode 2: a header frame, communications frames of five voice blocks
//! each, and a terminator.

use std::time::Duration;

use dv_protocol::callsign::YsfCallsign;
use dv_protocol::ysf::fich::{self, Fich};
use dv_protocol::ysf::payload::{self, HeaderData};
use dv_protocol::ysf::{self, Packet, SECTIONS, VCH_LEN};
use dv_protocol::{Mode, RingBuffer, Timer};
use tracing::{debug, info, warn};

use super::{block, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;
use crate::routing::Destination;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Silence after which the tag lock is released
pub const TAG_HOLD: Duration = Duration::from_millis(1500);
/// Frame numbers 0..=6 in each communications superframe
const FRAME_TOTAL: u8 = 6;

struct Outbound {
    src: YsfCallsign,
    dg_id: u8,
    counter: u8,
    fn_: u8,
    pending: Vec<[u8; VCH_LEN]>,
}

pub struct YsfNetwork {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    callsign: YsfCallsign,
    poll: Timer,
    tag: Option<YsfCallsign>,
    tag_hold: Timer,
    in_active: bool,
    out: Option<Outbound>,
}

impl YsfNetwork {
    pub fn new(endpoint: Endpoint, callsign: &str) -> Self {
        let mut poll = Timer::new(POLL_INTERVAL);
        poll.start();
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "YSF network"),
            callsign: YsfCallsign::new(callsign),
            poll,
            tag: None,
            tag_hold: Timer::new(TAG_HOLD),
            in_active: false,
            out: None,
        }
    }

    pub fn clock(&mut self, ms: u64) {
        self.poll.clock(ms);
        if self.poll.has_expired() {
            self.endpoint.send(&ysf::build_poll(&self.callsign));
            self.poll.start();
        }

        self.tag_hold.clock(ms);
        if self.tag_hold.has_expired() {
            self.release_tag();
        }

        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if datagram.starts_with(ysf::POLL_MAGIC) {
            return;
        }
        if !datagram.starts_with(ysf::MAGIC) || datagram.len() < ysf::PACKET_LEN {
            debug!("YSF: dropping {} byte datagram", datagram.len());
            return;
        }

        let tag = YsfCallsign::from_bytes(&datagram[4..14]);
        match self.tag {
            None => {
                debug!("YSF: locked to tag {tag}");
                self.tag = Some(tag);
            }
            Some(locked) if locked != tag => {
                debug!("YSF: ignoring tag {tag}, locked to {locked}");
                return;
            }
            Some(_) => {}
        }
        self.buffer.add_frame(&datagram);

        if datagram[34] & 0x01 != 0 {
            self.release_tag();
        } else {
            self.tag_hold.start();
        }
    }

    fn release_tag(&mut self) {
        if let Some(tag) = self.tag.take() {
            debug!("YSF: released tag {tag}");
        }
        self.tag_hold.stop();
    }

    pub fn has_data(&self) -> bool {
        self.buffer.has_data()
    }

    /// The gateway tag currently locked onto
    pub fn tag(&self) -> Option<YsfCallsign> {
        self.tag
    }

    pub fn read(&mut self, data: &mut Data) -> bool {
        let Some(datagram) = self.buffer.get_frame() else {
            return false;
        };
        let packet = match Packet::parse(&datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("YSF: {e}");
                return true;
            }
        };
        let fic = match Fich::decode(&packet.frame) {
            Ok(fic) => fic,
            Err(e) => {
                debug!("YSF: {e}");
                return true;
            }
        };

        match fic.fi {
            fich::FI_HEADER => {
                let src = payload::process_header_data(&packet.frame)
                    .map(|header| header.src.base())
                    .unwrap_or_else(|_| packet.src.base());
                if data.set_ysf(&src, fic.dg_id).is_some() {
                    if !self.in_active {
                        info!("YSF: header from {src} on DG-ID {}", fic.dg_id);
                    }
                    self.in_active = true;
                }
            }
            fich::FI_TERMINATOR => {
                if self.in_active {
                    info!("YSF: end of transmission");
                    data.set_end();
                    self.in_active = false;
                }
            }
            fich::FI_COMMUNICATIONS if fic.dt == fich::DT_VD_MODE2 => {
                if !self.in_active && !self.late_entry(data, &packet, &fic) {
                    return true;
                }
                for vch in payload::read_vd_mode2_audio(&packet.frame) {
                    data.write_audio(&vch);
                }
                if packet.end {
                    data.set_end();
                    self.in_active = false;
                }
            }
            _ => debug!("YSF: ignoring frame type {} data type {}", fic.fi, fic.dt),
        }
        true
    }

    /// Pick up a stream whose header was missed
    fn late_entry(&mut self, data: &mut Data, packet: &Packet, fic: &Fich) -> bool {
        let src = if !packet.src.is_blank() {
            packet.src.base()
        } else if fic.fn_ == 1 {
            match payload::process_vd_mode2_data(&packet.frame) {
                Ok(dch) => YsfCallsign::from_bytes(&dch).base(),
                Err(_) => return false,
            }
        } else {
            return false;
        };

        if data.set_ysf(&src, fic.dg_id).is_none() {
            return false;
        }
        info!("YSF: late entry from {src} on DG-ID {}", fic.dg_id);
        self.in_active = true;
        true
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out.is_none() {
            let dg_id = match route.dst {
                Destination::Ysf { dg_id } => dg_id,
                _ => 0,
            };
            let src = YsfCallsign::new(&route.src_callsign);
            info!("YSF: transmitting {src} on DG-ID {dg_id}");
            self.out = Some(Outbound {
                src,
                dg_id,
                counter: 0,
                fn_: 0,
                pending: Vec::with_capacity(SECTIONS),
            });
            sent |= self.send_header_frame(fich::FI_HEADER, false);
        }

        while let Some(audio) = data.read_audio() {
            let Some(vch) = block::<VCH_LEN>(Mode::Ysf, &audio) else {
                continue;
            };
            let full = self.out.as_mut().is_some_and(|out| {
                out.pending.push(vch);
                out.pending.len() == SECTIONS
            });
            if full {
                sent |= self.send_voice();
            }
        }

        if data.is_end() {
            if self.out.as_ref().is_some_and(|out| !out.pending.is_empty()) {
                sent |= self.send_voice();
            }
            sent |= self.send_header_frame(fich::FI_TERMINATOR, true);
            self.out = None;
            info!("YSF: transmission ended");
        }
        sent
    }

    fn send_header_frame(&mut self, fi: u8, end: bool) -> bool {
        let Some(out) = self.out.as_ref() else {
            return false;
        };
        let mut frame = ysf::new_frame();
        Fich::vd_mode2(fi, 0, FRAME_TOTAL, out.dg_id).encode(&mut frame);
        let header = HeaderData {
            dst: YsfCallsign::new("ALL"),
            src: out.src,
            downlink: self.callsign,
            uplink: self.callsign,
        };
        payload::create_header_data(&header, &mut frame);
        self.send_frame(frame, end)
    }

    /// One communications frame from the pending blocks, zero padded
    fn send_voice(&mut self) -> bool {
        let Some(out) = self.out.as_mut() else {
            return false;
        };
        let mut blocks = [[0u8; VCH_LEN]; SECTIONS];
        for (slot, vch) in blocks.iter_mut().zip(out.pending.drain(..)) {
            *slot = vch;
        }

        let fn_ = out.fn_;
        let mut frame = ysf::new_frame();
        Fich::vd_mode2(fich::FI_COMMUNICATIONS, fn_, FRAME_TOTAL, out.dg_id).encode(&mut frame);
        let dch = match fn_ {
            0 => *YsfCallsign::new("ALL").as_bytes(),
            1 => *out.src.as_bytes(),
            _ => [b' '; 10],
        };
        payload::create_vd_mode2_data(&dch, &mut frame);
        payload::write_vd_mode2_audio(&blocks, &mut frame);
        out.fn_ = (fn_ + 1) % (FRAME_TOTAL + 1);
        self.send_frame(frame, false)
    }

    fn send_frame(&mut self, frame: [u8; ysf::FRAME_LEN], end: bool) -> bool {
        let Some(out) = self.out.as_mut() else {
            warn!("YSF: no stream to send on");
            return false;
        };
        let packet = Packet {
            gateway: self.callsign,
            src: out.src,
            dst: YsfCallsign::new("ALL"),
            counter: out.counter,
            end,
            frame,
        };
        out.counter = (out.counter + 1) & 0x7F;
        self.endpoint.send(&packet.encode())
    }

    /// Forget the stream and release the tag lock
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.release_tag();
        self.in_active = false;
        self.out = None;
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}
