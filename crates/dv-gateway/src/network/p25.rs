//! P25 adapter (network records)
//!
//! Inbound calls are recognised from the LDU1 control records: the LCF,
//! destination and source arrive on consecutive records and the call is
//! classified once the source is known. Every voice record carries one
//! IMBE frame.

use std::time::Duration;

use dv_protocol::p25::{self, Control, Ldu1Info, Record, IMBE_LEN, RECORDS_PER_LDU};
use dv_protocol::{Mode, RingBuffer, Timer};
use tracing::{debug, info};

use super::{block, BUFFER_LEN};
use crate::data::Data;
use crate::link::Endpoint;
use crate::routing::Destination;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct P25Network {
    endpoint: Endpoint,
    buffer: RingBuffer<u8>,
    callsign: String,
    poll: Timer,

    in_active: bool,
    in_group: bool,
    in_dst: Option<u32>,

    out: Option<Ldu1Info>,
    /// Next record of the outbound superframe, 0..18
    out_index: usize,
}

impl P25Network {
    pub fn new(endpoint: Endpoint, callsign: &str) -> Self {
        let mut poll = Timer::new(POLL_INTERVAL);
        poll.start();
        Self {
            endpoint,
            buffer: RingBuffer::new(BUFFER_LEN, "P25 network"),
            callsign: callsign.to_string(),
            poll,
            in_active: false,
            in_group: true,
            in_dst: None,
            out: None,
            out_index: 0,
        }
    }

    pub fn clock(&mut self, ms: u64) {
        self.poll.clock(ms);
        if self.poll.has_expired() {
            self.endpoint.send(&p25::build_poll(&self.callsign));
            self.poll.start();
        }

        let Some(datagram) = self.endpoint.recv() else {
            return;
        };
        if datagram.is_empty() {
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

        match Record::parse(&frame) {
            Ok(Record::Voice { imbe, control, .. }) => {
                match control {
                    Some(Control::Lcf { group }) => self.in_group = group,
                    Some(Control::Destination(dst)) => self.in_dst = Some(dst),
                    Some(Control::Source(src)) => self.start(data, src),
                    None => {}
                }
                if self.in_active {
                    data.write_audio(&imbe);
                }
            }
            Ok(Record::End) => {
                if self.in_active {
                    info!("P25: end of transmission");
                    data.set_end();
                }
                self.in_active = false;
                self.in_dst = None;
                self.in_group = true;
            }
            Ok(Record::Poll) => {}
            Ok(Record::Other(record)) => {
                if self.in_active && !data.write_raw(&frame) {
                    debug!("P25: not forwarding record 0x{record:02X}");
                }
            }
            Err(e) => debug!("P25: {e}"),
        }
        true
    }

    /// Source record seen: classify once the destination is known too
    fn start(&mut self, data: &mut Data, src: u32) {
        let Some(dst) = self.in_dst else {
            return;
        };
        if data.set_p25(src, dst, self.in_group).is_none() {
            return;
        }
        if !self.in_active {
            info!(
                "P25: transmission from {src} to {}{dst}",
                if self.in_group { "TG " } else { "" }
            );
        }
        self.in_active = true;
    }

    pub fn write(&mut self, data: &mut Data) -> bool {
        let Some(route) = data.route() else {
            return false;
        };
        let mut sent = false;

        if self.out.is_none() {
            let dst = match route.dst {
                Destination::P25 { tg } => tg,
                _ => route.dst.talkgroup().unwrap_or(0),
            };
            info!("P25: transmitting {} to {dst}", route.src_id);
            self.out = Some(Ldu1Info {
                group: route.group,
                src: route.src_id,
                dst,
            });
            self.out_index = 0;
        }

        while let Some(audio) = data.read_audio() {
            let (Some(imbe), Some(info)) = (block::<IMBE_LEN>(Mode::P25, &audio), self.out) else {
                continue;
            };
            let record = if self.out_index < RECORDS_PER_LDU {
                p25::build_ldu1_record(self.out_index, &info, &imbe)
            } else {
                p25::build_ldu2_record(self.out_index - RECORDS_PER_LDU, &imbe)
            };
            self.out_index = (self.out_index + 1) % (2 * RECORDS_PER_LDU);
            sent |= self.endpoint.send(&record);
        }

        if data.is_end() {
            sent |= self.endpoint.send(&p25::build_end());
            self.out = None;
            info!("P25: transmission ended");
        }
        sent
    }

    /// Forward queued non-voice records with the route's addressing
    pub fn write_raw(&mut self, data: &mut Data) -> bool {
        let address = data
            .route()
            .map(|route| (route.src_id, route.dst.talkgroup().unwrap_or(0)));
        let mut sent = false;
        while let Some(mut frame) = data.read_raw() {
            if let Some((src, dst)) = address {
                p25::rewrite_address(&mut frame, src, dst);
            }
            sent |= self.endpoint.send(&frame);
        }
        sent
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_active = false;
        self.in_group = true;
        self.in_dst = None;
        self.out = None;
        self.out_index = 0;
    }

    /// Tell the reflector we are leaving
    pub fn close(&mut self) {
        let mut unlink = p25::build_poll(&self.callsign);
        unlink[0] = p25::UNLINK;
        self.endpoint.send(&unlink);
        self.endpoint.close();
    }
}
