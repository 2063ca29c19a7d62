//! NXDN adapter (Icom `ICOM` framing)
//!
//! Calls open with a FACCH1 VCALL and close with TX_REL. A call whose
//! header was missed is recognised from the VCALL spread over four SACCH
//! parts. Voice frames carry four AMBE+2 blocks unless the FACCH steals
//! half of them.

use dv_protocol::nxdn::{self, lich, Layer3, Packet, SacchCollector, VCH_LEN};
use dv_protocol::{Mode, RingBuffer};
use tracing::{debug, info};

use super::{block, AMBE2_SILENCE, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;
use crate::routing::Destination;

const BLOCKS_PER_FRAME: usize = 4;
const SACCH_PARTS: usize = 4;

struct Outbound {
    call: Layer3,
    part: usize,
    pending: Vec<[u8; VCH_LEN]>,
}

pub struct NxdnNetwork {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    ran: u8,
    in_active: bool,
    sacch: SacchCollector,
    out: Option<Outbound>,
}

impl NxdnNetwork {
    pub fn new(endpoint: Endpoint, ran: u8) -> Self {
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "NXDN network"),
            ran,
            in_active: false,
            sacch: SacchCollector::new(),
            out: None,
        }
    }

    pub fn clock(&mut self, _ms: u64) {
        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if nxdn::is_connect_request(&datagram) {
            debug!("NXDN: answering connect request");
            self.endpoint.send(&nxdn::connect_reply(&datagram));
            return;
        }
        if datagram.len() != nxdn::PACKET_LEN || !datagram.starts_with(nxdn::MAGIC) {
            debug!("NXDN: dropping {} byte datagram", datagram.len());
            return;
        }
        self.buffer.add_frame(&datagram);
    }

    pub fn has_data(&self) -> bool {
        self.buffer.has_data()
    }

    pub fn read(&mut self, data: &mut Data) -> bool {
        let Some(frame) = self.buffer.get_frame() else {
            return false;
        };
        let packet = match Packet::parse(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("NXDN: {e}");
                return true;
            }
        };

        if packet.lich.usc == lich::USC_UDCH {
            if self.in_active && !data.write_raw(&frame) {
                debug!("NXDN: not forwarding UDCH frame");
            }
            return true;
        }

        let control = packet.facch();
        if let Some(message) = control.filter(|m| m.is_vcall()) {
            self.start(data, message);
        }

        if !packet.voice {
            if control.is_some_and(|m| m.is_tx_rel()) {
                self.end(data);
            }
            return true;
        }

        if !self.in_active {
            let Some(message) = packet.sacch().and_then(|s| self.sacch.add(&s)) else {
                return true;
            };
            if !message.is_vcall() || !self.start(data, message) {
                return true;
            }
        }

        for vch in packet.voice_blocks() {
            data.write_audio(&vch);
        }
        // A release stolen into a voice frame ends the call after its audio
        if control.is_some_and(|m| m.is_tx_rel()) {
            self.end(data);
        }
        true
    }

    fn start(&mut self, data: &mut Data, message: Layer3) -> bool {
        if data
            .set_nxdn(message.src, message.dst, message.group)
            .is_none()
        {
            return false;
        }
        if !self.in_active {
            info!(
                "NXDN: transmission from {} to {}{}",
                message.src,
                if message.group { "TG " } else { "" },
                message.dst
            );
        }
        self.in_active = true;
        true
    }

    fn end(&mut self, data: &mut Data) {
        if self.in_active {
            info!("NXDN: end of transmission");
            data.set_end();
        }
        self.in_active = false;
        self.sacch = SacchCollector::new();
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out.is_none() {
            let dst = match route.dst {
                Destination::Nxdn { tg } => tg,
                _ => route
                    .dst
                    .talkgroup()
                    .and_then(|tg| u16::try_from(tg).ok())
                    .unwrap_or(0),
            };
            let src = u16::try_from(route.src_id).unwrap_or(0);
            let call = Layer3::vcall(route.group, src, dst);
            info!("NXDN: transmitting {src} to {dst}");
            sent |= self.endpoint.send(&Packet::control(&call, self.ran).encode());
            self.out = Some(Outbound {
                call,
                part: 0,
                pending: Vec::with_capacity(BLOCKS_PER_FRAME),
            });
        }

        while let Some(audio) = data.read_audio() {
            let Some(vch) = block::<VCH_LEN>(Mode::Nxdn, &audio) else {
                continue;
            };
            let full = self.out.as_mut().is_some_and(|out| {
                out.pending.push(vch);
                out.pending.len() == BLOCKS_PER_FRAME
            });
            if full {
                sent |= self.send_voice();
            }
        }

        if data.is_end() {
            if self.out.as_ref().is_some_and(|out| !out.pending.is_empty()) {
                sent |= self.send_voice();
            }
            if let Some(out) = self.out.take() {
                let release = Layer3::tx_rel(out.call.group, out.call.src, out.call.dst);
                sent |= self.endpoint.send(&Packet::control(&release, self.ran).encode());
            }
            info!("NXDN: transmission ended");
        }
        sent
    }

    fn send_voice(&mut self) -> bool {
        let Some(out) = self.out.as_mut() else {
            return false;
        };
        let mut blocks = [AMBE2_SILENCE; BLOCKS_PER_FRAME];
        for (slot, vch) in blocks.iter_mut().zip(out.pending.drain(..)) {
            *slot = vch;
        }
        let packet = Packet::voice(&blocks, &out.call, out.part, self.ran);
        out.part = (out.part + 1) % SACCH_PARTS;
        self.endpoint.send(&packet.encode())
    }

    /// Forward queued data frames untouched
    pub fn write_raw(&mut self, data: &mut Data) -> bool {
        let mut sent = false;
        while let Some(frame) = data.read_raw() {
            sent |= self.endpoint.send(&frame);
        }
        sent
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_active = false;
        self.sacch = SacchCollector::new();
        self.out = None;
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}
