//! Analogue FM adapter (USRP)

use dv_protocol::fm::{self, Packet, AUDIO_LEN};
use dv_protocol::RingBuffer;
use tracing::{debug, info, warn};

use super::BUFFER_LEN;
use crate::data::Data;
use crate::link::Endpoint;

pub struct FmNetwork {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    in_active: bool,
    out_active: bool,
    out_seq: u32,
}

impl FmNetwork {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "FM network"),
            in_active: false,
            out_active: false,
            out_seq: 0,
        }
    }

    pub fn clock(&mut self, _ms: u64) {
        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if !datagram.starts_with(fm::MAGIC) {
            debug!("FM: dropping datagram without USRP magic");
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

        match Packet::parse(&frame) {
            Ok(Packet::Voice { samples, .. }) => {
                if !self.in_active {
                    if data.set_fm().is_none() {
                        return true;
                    }
                    info!("FM: transmission started");
                    self.in_active = true;
                }
                data.write_audio(&fm::samples_to_pcm(&samples));
            }
            Ok(Packet::End { .. }) => {
                if self.in_active {
                    info!("FM: end of transmission");
                    data.set_end();
                }
                self.in_active = false;
            }
            Ok(Packet::Metadata { callsign, .. }) => info!("FM: talker {callsign}"),
            Err(e) => debug!("FM: {e}"),
        }
        true
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if !self.out_active {
            info!("FM: transmitting {}", route.src_callsign);
            let talkgroup = route.dst.talkgroup().unwrap_or(0);
            let metadata = fm::build_metadata(self.next_seq(), &route.src_callsign, route.src_id, talkgroup);
            sent |= self.endpoint.send(&metadata);
            self.out_active = true;
        }

        while let Some(pcm) = data.read_audio() {
            if pcm.len() != AUDIO_LEN {
                warn!("FM: dropping {} byte audio block, expected {AUDIO_LEN}", pcm.len());
                continue;
            }
            let packet = fm::build_voice(self.next_seq(), &fm::pcm_to_samples(&pcm));
            sent |= self.endpoint.send(&packet);
        }

        if data.is_end() {
            let end = fm::build_end(self.next_seq());
            sent |= self.endpoint.send(&end);
            self.out_active = false;
            info!("FM: transmission ended");
        }
        sent
    }

    fn next_seq(&mut self) -> u32 {
        let seq = self.out_seq;
        self.out_seq = self.out_seq.wrapping_add(1);
        seq
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_active = false;
        self.out_active = false;
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}
