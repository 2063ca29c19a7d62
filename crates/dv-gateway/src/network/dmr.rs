//! DMR adapter (Homebrew `DMRD`)
//!
//! Outbound streams are a voice LC header, superframes of six voice bursts
//! (A carries the voice sync, B to E the embedded LC, F a null fragment),
//! and a terminator with LC. Each voice burst holds three AMBE frames; a
//! short final burst is padded with silence.

use std::time::Duration;

use dv_protocol::dmr::emb::{Emb, LCSS_SINGLE};
use dv_protocol::dmr::lc::{self, FullLcKind, Lc};
use dv_protocol::dmr::slot_type::SlotType;
use dv_protocol::dmr::{self, embedded, FrameType, Packet, AMBE_LEN, AMBE_PER_BURST, BURST_LEN};
use dv_protocol::{Mode, RingBuffer, Timer};
use tracing::{debug, info};

use super::{block, new_stream_id32, AMBE2_SILENCE, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;
use crate::routing::Destination;

const PING_INTERVAL: Duration = Duration::from_secs(10);

/// State of the stream being sent
struct Outbound {
    stream_id: u32,
    seq: u8,
    slot: u8,
    src: u32,
    dst: u32,
    group: bool,
    /// Voice burst position in the superframe, 0 (A) to 5 (F)
    n: u8,
    embedded: [[u8; 4]; 4],
    pending: Vec<[u8; AMBE_LEN]>,
}

pub struct DmrNetwork {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    repeater_id: u32,
    color_code: u8,
    ping: Timer,
    in_stream: Option<u32>,
    out: Option<Outbound>,
}

impl DmrNetwork {
    pub fn new(endpoint: Endpoint, repeater_id: u32, color_code: u8) -> Self {
        let mut ping = Timer::new(PING_INTERVAL);
        ping.start();
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "DMR network"),
            repeater_id,
            color_code,
            ping,
            in_stream: None,
            out: None,
        }
    }

    pub fn clock(&mut self, ms: u64) {
        self.ping.clock(ms);
        if self.ping.has_expired() {
            self.endpoint.send(&dmr::build_ping(self.repeater_id));
            self.ping.start();
        }

        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if !datagram.starts_with(dmr::MAGIC) {
            // MSTPONG and the other control replies
            debug!("DMR: ignoring {:?}", String::from_utf8_lossy(&datagram[..datagram.len().min(7)]));
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
                debug!("DMR: {e}");
                return true;
            }
        };

        match packet.frame {
            FrameType::DataSync {
                data_type: dmr::DT_VOICE_LC_HEADER,
            } => self.read_header(data, &packet),
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC,
            } => {
                if self.in_stream == Some(packet.stream_id) {
                    info!("DMR: end of transmission");
                    data.set_end();
                    self.in_stream = None;
                }
            }
            FrameType::DataSync {
                data_type: dmr::DT_VOICE_PI_HEADER | dmr::DT_IDLE,
            } => {}
            FrameType::DataSync { data_type } => {
                if data.route().is_none()
                    && data
                        .set_dmr(packet.slot, packet.src, packet.dst, packet.group)
                        .is_none()
                {
                    return true;
                }
                if !data.write_raw(&frame) {
                    debug!("DMR: not forwarding data burst type {data_type}");
                }
            }
            FrameType::VoiceSync | FrameType::Voice { .. } => self.read_voice(data, &packet),
        }
        true
    }

    fn read_header(&mut self, data: &mut Data, packet: &Packet) {
        if self.in_stream.is_some_and(|id| id != packet.stream_id) {
            debug!("DMR: ignoring header of stream {:08X}", packet.stream_id);
            return;
        }
        let lc = lc::decode_full(&packet.burst, FullLcKind::VoiceHeader)
            .unwrap_or_else(|_| Lc::new(packet.group, packet.src, packet.dst));

        if data.set_dmr(packet.slot, lc.src, lc.dst, lc.group).is_some() {
            if self.in_stream.is_none() {
                info!(
                    "DMR: header from {} to {}{} on slot {}",
                    lc.src,
                    if lc.group { "TG " } else { "" },
                    lc.dst,
                    packet.slot
                );
            }
            self.in_stream = Some(packet.stream_id);
        }
    }

    fn read_voice(&mut self, data: &mut Data, packet: &Packet) {
        match self.in_stream {
            Some(id) if id == packet.stream_id => {}
            Some(_) => return,
            None => {
                // Late entry: the DMRD fields carry the addressing
                if data
                    .set_dmr(packet.slot, packet.src, packet.dst, packet.group)
                    .is_none()
                {
                    return;
                }
                info!("DMR: late entry from {} to {}", packet.src, packet.dst);
                self.in_stream = Some(packet.stream_id);
            }
        }

        for ambe in dmr::extract_ambe(&packet.burst) {
            data.write_audio(&ambe);
        }
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out.is_none() {
            let (slot, dst) = match route.dst {
                Destination::Dmr { slot, tg } => (slot, tg),
                _ => (1, route.dst.talkgroup().unwrap_or(0)),
            };
            let lc = Lc::new(route.group, route.src_id, dst);
            info!("DMR: transmitting {} to {dst} on slot {slot}", route.src_id);
            self.out = Some(Outbound {
                stream_id: new_stream_id32(),
                seq: 0,
                slot,
                src: route.src_id,
                dst,
                group: route.group,
                n: 0,
                embedded: embedded::encode(&lc.to_bytes()),
                pending: Vec::with_capacity(AMBE_PER_BURST),
            });

            let mut burst = [0u8; BURST_LEN];
            lc::encode_full(&lc, FullLcKind::VoiceHeader, &mut burst);
            SlotType::new(self.color_code, dmr::DT_VOICE_LC_HEADER).encode(&mut burst);
            dmr::add_sync(&mut burst, &dmr::DATA_SYNC);
            sent |= self.send_burst(
                FrameType::DataSync {
                    data_type: dmr::DT_VOICE_LC_HEADER,
                },
                burst,
            );
        }

        while let Some(audio) = data.read_audio() {
            let Some(ambe) = block::<AMBE_LEN>(Mode::Dmr, &audio) else {
                continue;
            };
            let full = self.out.as_mut().is_some_and(|out| {
                out.pending.push(ambe);
                out.pending.len() == AMBE_PER_BURST
            });
            if full {
                sent |= self.send_voice();
            }
        }

        if data.is_end() {
            if self.out.as_ref().is_some_and(|out| !out.pending.is_empty()) {
                sent |= self.send_voice();
            }
            sent |= self.send_terminator();
            self.out = None;
            info!("DMR: transmission ended");
        }
        sent
    }

    /// One voice burst from the pending frames, padded with silence
    fn send_voice(&mut self) -> bool {
        let color_code = self.color_code;
        let Some(out) = self.out.as_mut() else {
            return false;
        };

        let mut frames = [AMBE2_SILENCE; AMBE_PER_BURST];
        for (slot, ambe) in frames.iter_mut().zip(out.pending.drain(..)) {
            *slot = ambe;
        }
        let mut burst = [0u8; BURST_LEN];
        dmr::insert_ambe(&mut burst, &frames);

        let n = out.n;
        let frame = if n == 0 {
            dmr::add_sync(&mut burst, &dmr::VOICE_SYNC);
            FrameType::VoiceSync
        } else {
            let (lcss, fragment) = match n {
                1..=4 => (embedded::lcss_for(n), out.embedded[usize::from(n - 1)]),
                _ => (LCSS_SINGLE, [0u8; 4]),
            };
            Emb::new(color_code, lcss).encode(&mut burst);
            dmr::insert_embedded(&mut burst, &fragment);
            FrameType::Voice { n }
        };
        out.n = (n + 1) % 6;
        self.send_burst(frame, burst)
    }

    fn send_terminator(&mut self) -> bool {
        let Some(out) = self.out.as_ref() else {
            return false;
        };
        let lc = Lc::new(out.group, out.src, out.dst);
        let mut burst = [0u8; BURST_LEN];
        lc::encode_full(&lc, FullLcKind::Terminator, &mut burst);
        SlotType::new(self.color_code, dmr::DT_TERMINATOR_WITH_LC).encode(&mut burst);
        dmr::add_sync(&mut burst, &dmr::DATA_SYNC);
        self.send_burst(
            FrameType::DataSync {
                data_type: dmr::DT_TERMINATOR_WITH_LC,
            },
            burst,
        )
    }

    fn send_burst(&mut self, frame: FrameType, burst: [u8; BURST_LEN]) -> bool {
        let Some(out) = self.out.as_mut() else {
            return false;
        };
        let packet = Packet {
            seq: out.seq,
            src: out.src,
            dst: out.dst,
            repeater_id: self.repeater_id,
            slot: out.slot,
            group: out.group,
            frame,
            stream_id: out.stream_id,
            burst,
            ber: 0,
            rssi: 0,
        };
        out.seq = out.seq.wrapping_add(1);
        self.endpoint.send(&packet.encode())
    }

    /// Forward queued data bursts with the route's addressing
    pub fn write_raw(&mut self, data: &mut Data) -> bool {
        let mut sent = false;
        while let Some(frame) = data.read_raw() {
            let Ok(mut packet) = Packet::parse(&frame) else {
                continue;
            };
            if let Some(route) = data.route() {
                if let Destination::Dmr { slot, tg } = route.dst {
                    packet.slot = slot;
                    packet.dst = tg;
                }
                packet.src = route.src_id;
                packet.group = route.group;
            }
            packet.repeater_id = self.repeater_id;
            sent |= self.endpoint.send(&packet.encode());
        }
        sent
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_stream = None;
        self.out = None;
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}
