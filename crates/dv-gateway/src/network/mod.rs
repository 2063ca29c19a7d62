//! Per-mode network adapters
//!
//! Every adapter follows the same cycle, driven by the gateway loop:
//!
//! 1. `clock(ms)` advances keepalive timers and performs one non-blocking
//!    receive, queueing a valid datagram in the adapter's ring buffer.
//! 2. `read(&mut Data)` parses one queued datagram, reports addressing to
//!    the routing engine and pushes audio blocks into it.
//! 3. `write(&mut Data)` pulls converted blocks out of the engine and emits
//!    native frames, including the header and trailer of a stream.
//!
//! [`Network`] is the closed set of adapters; the gateway only ever talks to
//! it.

mod dmr;
mod dstar;
mod fm;
mod m17;
mod nxdn;
mod p25;
mod ysf;

pub use dmr::DmrNetwork;
pub use dstar::DStarNetwork;
pub use fm::FmNetwork;
pub use m17::M17Network;
pub use nxdn::NxdnNetwork;
pub use p25::P25Network;
pub use ysf::YsfNetwork;

use dv_protocol::Mode;
use rand::Rng;

use crate::config::NetworkConfig;
use crate::data::Data;
use crate::error::GatewayError;
use crate::link::Endpoint;

/// Queue size for received datagrams
pub(crate) const BUFFER_LEN: usize = 1000;

/// AMBE+2 silence, padding for DMR bursts and NXDN frames
pub(crate) const AMBE2_SILENCE: [u8; 9] = [0xB9, 0xE8, 0x81, 0x52, 0x61, 0x73, 0x00, 0x2A, 0x6B];

/// A network adapter of any mode
pub enum Network {
    DStar(DStarNetwork),
    Dmr(DmrNetwork),
    Ysf(YsfNetwork),
    P25(P25Network),
    Nxdn(NxdnNetwork),
    Fm(FmNetwork),
    M17(M17Network),
}

macro_rules! dispatch {
    ($self:expr, $network:ident => $body:expr) => {
        match $self {
            Network::DStar($network) => $body,
            Network::Dmr($network) => $body,
            Network::Ysf($network) => $body,
            Network::P25($network) => $body,
            Network::Nxdn($network) => $body,
            Network::Fm($network) => $body,
            Network::M17($network) => $body,
        }
    };
}

impl Network {
    /// Resolve, bind and build the adapter described by `config`
    pub async fn open(config: &NetworkConfig) -> Result<Self, GatewayError> {
        let endpoint = Endpoint::open(&config.endpoint, config.mode.name()).await?;
        Ok(Self::with_endpoint(config, endpoint))
    }

    /// Build the adapter described by `config` over an existing endpoint
    pub fn with_endpoint(config: &NetworkConfig, endpoint: Endpoint) -> Self {
        match config.mode {
            Mode::DStar => Network::DStar(DStarNetwork::new(endpoint, &config.callsign)),
            Mode::Dmr => Network::Dmr(DmrNetwork::new(endpoint, config.id, config.color_code)),
            Mode::Ysf => Network::Ysf(YsfNetwork::new(endpoint, &config.callsign)),
            Mode::P25 => Network::P25(P25Network::new(endpoint, &config.callsign)),
            Mode::Nxdn => Network::Nxdn(NxdnNetwork::new(endpoint, config.ran)),
            Mode::Fm => Network::Fm(FmNetwork::new(endpoint)),
            Mode::M17 => Network::M17(M17Network::new(endpoint, &config.callsign)),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Network::DStar(_) => Mode::DStar,
            Network::Dmr(_) => Mode::Dmr,
            Network::Ysf(_) => Mode::Ysf,
            Network::P25(_) => Mode::P25,
            Network::Nxdn(_) => Mode::Nxdn,
            Network::Fm(_) => Mode::Fm,
            Network::M17(_) => Mode::M17,
        }
    }

    /// Keepalives plus one receive
    pub fn clock(&mut self, ms: u64) {
        dispatch!(self, n => n.clock(ms))
    }

    /// Whether a received datagram is queued
    pub fn has_data(&self) -> bool {
        dispatch!(self, n => n.has_data())
    }

    /// Process one queued datagram; false when the queue was empty
    pub fn read(&mut self, data: &mut Data) -> bool {
        dispatch!(self, n => n.read(data))
    }

    /// Emit whatever the routing engine has for this network
    pub fn write(&mut self, data: &mut Data) -> bool {
        dispatch!(self, n => n.write(data))
    }

    /// Forward queued native non-voice frames; only DMR, P25 and NXDN carry them
    pub fn write_raw(&mut self, data: &mut Data) -> bool {
        match self {
            Network::Dmr(n) => n.write_raw(data),
            Network::P25(n) => n.write_raw(data),
            Network::Nxdn(n) => n.write_raw(data),
            _ => false,
        }
    }

    /// Forget the current stream in both directions
    pub fn reset(&mut self) {
        dispatch!(self, n => n.reset())
    }

    pub fn close(&mut self) {
        dispatch!(self, n => n.close())
    }
}

/// A random non-zero 16-bit stream ID
pub(crate) fn new_stream_id16() -> u16 {
    rand::thread_rng().gen_range(1..=u16::MAX)
}

/// A random non-zero 32-bit stream ID
pub(crate) fn new_stream_id32() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

/// Fixed-size view of an audio block, or `None` when the size is wrong
pub(crate) fn block<const N: usize>(mode: Mode, data: &[u8]) -> Option<[u8; N]> {
    let block = <[u8; N]>::try_from(data).ok();
    if block.is_none() {
        tracing::warn!("{mode}: dropping {} byte audio block, expected {N}", data.len());
    }
    block
}
