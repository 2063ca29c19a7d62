//! D-Star adapter (`DSRP`)

use std::time::Duration;

use dv_protocol::dstar::{self, Header, Packet, SlowDataDecoder, SlowDataEncoder};
use dv_protocol::{Mode, RingBuffer, Timer};
use tracing::{debug, info};

use super::{block, new_stream_id16, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;

const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct DStarNetwork {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    callsign: String,
    poll: Timer,

    in_id: Option<u16>,
    in_seq: u8,
    slow_in: SlowDataDecoder,

    out_id: Option<u16>,
    out_seq: u8,
    slow_out: SlowDataEncoder,
}

impl DStarNetwork {
    /// `callsign` is the gateway's repeater callsign
    pub fn new(endpoint: Endpoint, callsign: &str) -> Self {
        let mut poll = Timer::new(POLL_INTERVAL);
        poll.start();
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "D-Star network"),
            callsign: callsign.to_string(),
            poll,
            in_id: None,
            in_seq: 0,
            slow_in: SlowDataDecoder::new(),
            out_id: None,
            out_seq: 0,
            slow_out: SlowDataEncoder::new(""),
        }
    }

    pub fn clock(&mut self, ms: u64) {
        self.poll.clock(ms);
        if self.poll.has_expired() {
            self.endpoint.send(&dstar::build_poll(&self.callsign));
            self.poll.start();
        }

        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if !datagram.starts_with(dstar::MAGIC) {
            debug!("D-Star: dropping datagram without DSRP magic");
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

        match dstar::parse(&frame) {
            Ok(Packet::Poll(text)) => debug!("D-Star: poll {text:?}"),
            Ok(Packet::Header { id, header }) => self.read_header(data, id, &header),
            Ok(Packet::Data {
                id,
                end,
                ambe,
                slow,
                ..
            }) => self.read_voice(data, id, end, &ambe, &slow),
            Err(e) => debug!("D-Star: {e}"),
        }
        true
    }

    fn read_header(&mut self, data: &mut Data, id: u16, header: &Header) {
        if self.in_id.is_some_and(|current| current != id) {
            debug!("D-Star: ignoring header of stream {id:04X}");
            return;
        }

        let (my, your) = (header.my.base(), header.your.trimmed());
        if data.set_dstar(&my, &your).is_none() {
            return;
        }
        if self.in_id.is_none() {
            info!("D-Star: header from {my} to {your}");
            self.slow_in = SlowDataDecoder::new();
            self.in_seq = 0;
        }
        self.in_id = Some(id);
    }

    fn read_voice(&mut self, data: &mut Data, id: u16, end: bool, ambe: &[u8; 9], slow: &[u8; 3]) {
        if self.in_id != Some(id) {
            return;
        }

        if dstar::is_sync(slow) {
            self.in_seq = 0;
        }
        if let Some(text) = self.slow_in.add(self.in_seq, slow) {
            info!("D-Star: slow data {text:?}");
        }
        self.in_seq = (self.in_seq + 1) % dstar::FRAMES_PER_SUPERFRAME;

        data.write_audio(ambe);
        if end {
            info!("D-Star: end of transmission");
            data.set_end();
            self.in_id = None;
        }
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out_id.is_none() {
            let your = route.dst.callsign().unwrap_or("CQCQCQ").to_string();
            let header = Header::new(&route.src_callsign, &your, &self.callsign);
            self.slow_out =
                SlowDataEncoder::new(&format!("{} via {}", route.src_callsign, route.input));
            info!("D-Star: transmitting {} to {your}", route.src_callsign);

            let id = new_stream_id16();
            self.out_id = Some(id);
            self.out_seq = 0;
            sent |= self.endpoint.send(&dstar::build_header(id, &header));
        }

        while let Some(audio) = data.read_audio() {
            if let Some(ambe) = block::<{ dstar::AMBE_LEN }>(Mode::DStar, &audio) {
                sent |= self.send_voice(&ambe, false);
            }
        }

        if data.is_end() {
            sent |= self.send_voice(&dstar::NULL_AMBE, true);
            self.out_id = None;
            info!("D-Star: transmission ended");
        }
        sent
    }

    fn send_voice(&mut self, ambe: &[u8; dstar::AMBE_LEN], end: bool) -> bool {
        let Some(id) = self.out_id else {
            return false;
        };
        let slow = self.slow_out.frame(self.out_seq);
        let packet = dstar::build_data(id, self.out_seq, end, ambe, &slow);
        self.out_seq = (self.out_seq + 1) % dstar::FRAMES_PER_SUPERFRAME;
        self.endpoint.send(&packet)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_id = None;
        self.in_seq = 0;
        self.out_id = None;
        self.out_seq = 0;
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}
