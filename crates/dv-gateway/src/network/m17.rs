//! M17 adapter (`M17 ` stream packets)
//!
//! Every packet repeats the LICH, so a stream is picked up from whichever
//! packet arrives first. Each carries two 8-byte Codec2 3200 frames.

use std::time::Duration;

use dv_protocol::m17::{self, Lich, Packet, CODEC2_LEN, PAYLOAD_LEN};
use dv_protocol::{Mode, RingBuffer, Timer};
use tracing::{debug, info, warn};

use super::{block, new_stream_id16, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;

const PING_INTERVAL: Duration = Duration::from_secs(5);
const BLOCKS_PER_PACKET: usize = PAYLOAD_LEN / CODEC2_LEN;

/// Codec2 3200 silence
const SILENCE: [u8; CODEC2_LEN] = [0x00, 0x01, 0x43, 0x09, 0xE4, 0x9C, 0x08, 0x21];

struct Outbound {
    stream_id: u16,
    lich: Lich,
    frame_number: u16,
    pending: Vec<[u8; CODEC2_LEN]>,
}

pub struct M17Network {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    callsign: String,
    ping: Timer,
    in_stream: Option<u16>,
    out: Option<Outbound>,
}

impl M17Network {
    pub fn new(endpoint: Endpoint, callsign: &str) -> Self {
        let mut ping = Timer::new(PING_INTERVAL);
        ping.start();
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "M17 network"),
            callsign: callsign.to_string(),
            ping,
            in_stream: None,
            out: None,
        }
    }

    pub fn clock(&mut self, ms: u64) {
        self.ping.clock(ms);
        if self.ping.has_expired() {
            match m17::build_ping(&self.callsign) {
                Ok(ping) => {
                    self.endpoint.send(&ping);
                }
                Err(e) => warn!("M17: cannot ping as {:?}: {e}", self.callsign),
            }
            self.ping.start();
        }

        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if !datagram.starts_with(m17::MAGIC) {
            debug!("M17: ignoring {} byte control datagram", datagram.len());
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
                debug!("M17: {e}");
                return true;
            }
        };

        match self.in_stream {
            Some(id) if id == packet.stream_id => {}
            Some(_) => return true,
            None => {
                let (Some(src), Some(dst)) = (packet.lich.src_callsign(), packet.lich.dst_callsign())
                else {
                    debug!("M17: undecodable LICH callsigns");
                    return true;
                };
                if data.set_m17(&src, &dst).is_none() {
                    return true;
                }
                info!("M17: transmission from {src} to {dst}");
                self.in_stream = Some(packet.stream_id);
            }
        }

        for codec2 in packet.payload.chunks_exact(CODEC2_LEN) {
            data.write_audio(codec2);
        }
        if packet.end {
            info!("M17: end of transmission");
            data.set_end();
            self.in_stream = None;
        }
        true
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out.is_none() {
            let dst = route.dst.callsign().unwrap_or("ALL");
            let lich = match Lich::voice(&route.src_callsign, dst) {
                Ok(lich) => lich,
                Err(e) => {
                    debug!("M17: cannot address {} -> {dst}: {e}", route.src_callsign);
                    while data.read_audio().is_some() {}
                    return false;
                }
            };
            info!("M17: transmitting {} to {dst}", route.src_callsign);
            self.out = Some(Outbound {
                stream_id: new_stream_id16(),
                lich,
                frame_number: 0,
                pending: Vec::with_capacity(BLOCKS_PER_PACKET),
            });
        }

        while let Some(audio) = data.read_audio() {
            let Some(codec2) = block::<CODEC2_LEN>(Mode::M17, &audio) else {
                continue;
            };
            let full = self.out.as_mut().is_some_and(|out| {
                out.pending.push(codec2);
                out.pending.len() == BLOCKS_PER_PACKET
            });
            if full {
                sent |= self.send_packet(false);
            }
        }

        if data.is_end() {
            sent |= self.send_packet(true);
            self.out = None;
            info!("M17: transmission ended");
        }
        sent
    }

    /// One packet from the pending frames, padded with silence
    fn send_packet(&mut self, end: bool) -> bool {
        let Some(out) = self.out.as_mut() else {
            return false;
        };
        let mut payload = [0u8; PAYLOAD_LEN];
        let mut frames = out.pending.drain(..);
        for chunk in payload.chunks_exact_mut(CODEC2_LEN) {
            chunk.copy_from_slice(&frames.next().unwrap_or(SILENCE));
        }
        drop(frames);

        let packet = Packet {
            stream_id: out.stream_id,
            lich: out.lich,
            frame_number: out.frame_number,
            end,
            payload,
        };
        out.frame_number = (out.frame_number + 1) & 0x7FFF;
        self.endpoint.send(&packet.encode())
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
