//! External vocoder device
//!
//! The gateway never touches audio itself: every block that needs converting
//! goes through a [`Transcoder`]. The serial implementation speaks a small
//! framed protocol:
//!
//! ```text
//! E1 len(2, BE) type payload...      len counts type + payload
//! type 00  version request / reply (payload: version text)
//! type 01  set conversion: payload [input, output]; reply 01 ack or 7F nak
//!          the reply is queued behind any blocks still in flight
//! type 02  one audio block in either direction
//! ```

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use dv_protocol::Mode;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tracing::{debug, info, warn};

use crate::error::GatewayError;

/// Vocoder formats the transcoder converts between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranscoderMode {
    /// D-Star AMBE
    DStar,
    /// AMBE+2 as used by DMR and NXDN
    DmrNxdn,
    /// System Fusion DN (AMBE+2 with its own FEC layout)
    YsfDn,
    /// P25 phase 1 IMBE
    Imbe,
    /// 8 kHz 16-bit linear audio, big-endian
    Pcm,
    /// Codec2 at 3200 bit/s
    Codec2_3200,
}

impl TranscoderMode {
    /// The native vocoder of a network mode
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::DStar => TranscoderMode::DStar,
            Mode::Dmr | Mode::Nxdn => TranscoderMode::DmrNxdn,
            Mode::Ysf => TranscoderMode::YsfDn,
            Mode::P25 => TranscoderMode::Imbe,
            Mode::Fm => TranscoderMode::Pcm,
            Mode::M17 => TranscoderMode::Codec2_3200,
        }
    }

    /// Bytes in one 20 ms block
    pub fn block_len(&self) -> usize {
        match self {
            TranscoderMode::DStar | TranscoderMode::DmrNxdn => 9,
            TranscoderMode::YsfDn => 13,
            TranscoderMode::Imbe => 11,
            TranscoderMode::Pcm => 320,
            TranscoderMode::Codec2_3200 => 8,
        }
    }

    /// Wire code used in the set-conversion request
    pub fn code(&self) -> u8 {
        match self {
            TranscoderMode::DStar => 0x01,
            TranscoderMode::DmrNxdn => 0x02,
            TranscoderMode::YsfDn => 0x03,
            TranscoderMode::Imbe => 0x04,
            TranscoderMode::Pcm => 0x05,
            TranscoderMode::Codec2_3200 => 0x06,
        }
    }
}

/// The narrow contract the routing engine needs from a vocoder
pub trait Transcoder: Send {
    /// Connect and check the device answers
    fn open(&mut self) -> Result<(), GatewayError>;

    /// Select the conversion applied to subsequent writes
    fn set_conversion(&mut self, input: TranscoderMode, output: TranscoderMode) -> bool;

    /// Queue one input-mode block
    fn write(&mut self, block: &[u8]) -> bool;

    /// Take one converted block if one is ready; never blocks
    fn read(&mut self) -> Option<Vec<u8>>;

    fn close(&mut self);
}

pub const FRAME_START: u8 = 0xE1;
pub const TYPE_VERSION: u8 = 0x00;
pub const TYPE_SET_MODE: u8 = 0x01;
pub const TYPE_DATA: u8 = 0x02;
pub const TYPE_NAK: u8 = 0x7F;

/// Frame one message for the device
pub fn encode_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 1) as u16;
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(FRAME_START);
    out.extend_from_slice(&len.to_be_bytes());
    out.push(kind);
    out.extend_from_slice(payload);
    out
}

/// Reassembles frames from a serial byte stream
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    rx: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.extend_from_slice(bytes);
    }

    /// Next complete frame as (type, payload); junk before a start byte is dropped
    pub fn next_frame(&mut self) -> Option<(u8, Vec<u8>)> {
        match self.rx.iter().position(|&b| b == FRAME_START) {
            Some(0) => {}
            Some(at) => {
                debug!("Dropping {at} bytes of transcoder noise");
                self.rx.drain(..at);
            }
            None => {
                self.rx.clear();
                return None;
            }
        }

        if self.rx.len() < 4 {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([self.rx[1], self.rx[2]]));
        if len == 0 {
            // Not a real frame, resynchronise on the next start byte
            self.rx.remove(0);
            return self.next_frame();
        }
        if self.rx.len() < 3 + len {
            return None;
        }

        let frame: Vec<u8> = self.rx.drain(..3 + len).collect();
        Some((frame[3], frame[4..].to_vec()))
    }
}

const VERSION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Device state for the last conversion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Unset,
    Pending,
    Ready,
    Refused,
}

/// Sorts device replies against the conversion in force
///
/// The set-conversion ack arrives in line with the audio, so blocks from
/// the previous conversion are dropped until it shows up.
#[derive(Debug)]
struct Replies {
    conversion: Conversion,
}

impl Replies {
    fn new() -> Self {
        Self {
            conversion: Conversion::Unset,
        }
    }

    fn requested(&mut self) {
        self.conversion = Conversion::Pending;
    }

    fn accepts_writes(&self) -> bool {
        matches!(self.conversion, Conversion::Pending | Conversion::Ready)
    }

    /// A converted block when the reply is one for the current conversion
    fn reply(&mut self, kind: u8, payload: Vec<u8>) -> Option<Vec<u8>> {
        match (kind, self.conversion) {
            (TYPE_SET_MODE, Conversion::Pending) => {
                self.conversion = Conversion::Ready;
                None
            }
            (TYPE_NAK, Conversion::Pending) => {
                warn!("Transcoder refused the conversion");
                self.conversion = Conversion::Refused;
                None
            }
            (TYPE_DATA, Conversion::Ready) => Some(payload),
            (TYPE_DATA, _) => {
                debug!("Dropping a block from the previous conversion");
                None
            }
            (other, _) => {
                debug!("Ignoring transcoder frame type {other:02X}");
                None
            }
        }
    }
}

/// Transcoder attached to a serial port
///
/// Only [`Transcoder::open`] waits on the device. Everything after it polls,
/// so the gateway loop is never held up by the serial line.
pub struct SerialTranscoder {
    port_name: String,
    speed: u32,
    port: Option<Box<dyn SerialPort>>,
    frames: FrameBuffer,
    replies: Replies,
}

impl SerialTranscoder {
    pub fn new(port_name: &str, speed: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            speed,
            port: None,
            frames: FrameBuffer::new(),
            replies: Replies::new(),
        }
    }

    fn send(&mut self, kind: u8, payload: &[u8]) -> bool {
        let Some(port) = self.port.as_mut() else {
            return false;
        };
        match port.write_all(&encode_frame(kind, payload)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Transcoder write failed on {}: {e}", self.port_name);
                false
            }
        }
    }

    /// Pull whatever bytes the port holds into the frame buffer
    fn fill(&mut self) -> bool {
        let Some(port) = self.port.as_mut() else {
            return false;
        };
        let available = port.bytes_to_read().unwrap_or(0) as usize;
        if available == 0 {
            return true;
        }
        let mut buf = vec![0u8; available];
        match port.read(&mut buf) {
            Ok(n) => {
                self.frames.push(&buf[..n]);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => true,
            Err(e) => {
                warn!("Transcoder read failed on {}: {e}", self.port_name);
                false
            }
        }
    }

    /// Next complete frame, reading the port once if none is buffered
    fn poll_frame(&mut self) -> Option<(u8, Vec<u8>)> {
        if let Some(frame) = self.frames.next_frame() {
            return Some(frame);
        }
        if !self.fill() {
            return None;
        }
        self.frames.next_frame()
    }

    /// Wait for the version reply; blocking, so only called from `open`
    fn wait_version(&mut self) -> Option<Vec<u8>> {
        let started = Instant::now();
        while started.elapsed() < VERSION_TIMEOUT {
            match self.poll_frame() {
                Some((TYPE_VERSION, version)) => return Some(version),
                Some((other, _)) => debug!("Ignoring transcoder frame type {other:02X}"),
                None if self.port.is_none() => return None,
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }
        None
    }
}

impl Transcoder for SerialTranscoder {
    fn open(&mut self) -> Result<(), GatewayError> {
        let port = serialport::new(&self.port_name, self.speed)
            .timeout(Duration::from_millis(10))
            .open()?;
        self.port = Some(port);
        self.frames = FrameBuffer::new();
        self.replies = Replies::new();

        if !self.send(TYPE_VERSION, &[]) {
            return Err(GatewayError::Transcoder(format!(
                "cannot write to {}",
                self.port_name
            )));
        }
        match self.wait_version() {
            Some(version) => {
                info!(
                    "Transcoder on {}: {}",
                    self.port_name,
                    String::from_utf8_lossy(&version)
                );
                Ok(())
            }
            None => {
                self.port = None;
                Err(GatewayError::Transcoder(format!(
                    "no version reply from {}",
                    self.port_name
                )))
            }
        }
    }

    /// Sends the request without waiting; the ack is picked up by `read`
    fn set_conversion(&mut self, input: TranscoderMode, output: TranscoderMode) -> bool {
        if !self.send(TYPE_SET_MODE, &[input.code(), output.code()]) {
            return false;
        }
        debug!("Transcoder conversion {input:?} -> {output:?} requested");
        self.replies.requested();
        true
    }

    fn write(&mut self, block: &[u8]) -> bool {
        self.replies.accepts_writes() && self.send(TYPE_DATA, block)
    }

    fn read(&mut self) -> Option<Vec<u8>> {
        loop {
            let (kind, payload) = self.poll_frame()?;
            if let Some(block) = self.replies.reply(kind, payload) {
                return Some(block);
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closed transcoder on {}", self.port_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(TranscoderMode::for_mode(Mode::Dmr), TranscoderMode::DmrNxdn);
        assert_eq!(TranscoderMode::for_mode(Mode::Nxdn), TranscoderMode::DmrNxdn);
        assert_eq!(TranscoderMode::for_mode(Mode::Fm).block_len(), 320);
        assert_eq!(TranscoderMode::for_mode(Mode::M17).block_len(), 8);
        assert_eq!(TranscoderMode::for_mode(Mode::Ysf).block_len(), 13);
        assert_eq!(TranscoderMode::for_mode(Mode::P25).block_len(), 11);
    }

    #[test]
    fn test_encode_frame() {
        assert_eq!(
            encode_frame(TYPE_SET_MODE, &[0x01, 0x02]),
            vec![0xE1, 0x00, 0x03, 0x01, 0x01, 0x02]
        );
    }

    #[test]
    fn test_frame_buffer_split_and_noise() {
        let mut frames = FrameBuffer::new();
        let frame = encode_frame(TYPE_DATA, &[9; 9]);
        frames.push(&[0x00, 0x55]);
        frames.push(&frame[..5]);
        assert_eq!(frames.next_frame(), None);
        frames.push(&frame[5..]);
        frames.push(&encode_frame(TYPE_VERSION, b"v1"));
        assert_eq!(frames.next_frame(), Some((TYPE_DATA, vec![9; 9])));
        assert_eq!(frames.next_frame(), Some((TYPE_VERSION, b"v1".to_vec())));
        assert_eq!(frames.next_frame(), None);
    }

    #[test]
    fn test_zero_length_resyncs() {
        let mut frames = FrameBuffer::new();
        frames.push(&[0xE1, 0x00, 0x00]);
        frames.push(&encode_frame(TYPE_NAK, &[]));
        assert_eq!(frames.next_frame(), Some((TYPE_NAK, vec![])));
    }

    #[test]
    fn test_blocks_wait_for_the_ack() {
        let mut replies = Replies::new();
        replies.requested();
        assert!(replies.accepts_writes());
        assert_eq!(replies.reply(TYPE_DATA, vec![1; 9]), None);
        assert_eq!(replies.reply(TYPE_SET_MODE, vec![]), None);
        assert_eq!(replies.reply(TYPE_DATA, vec![2; 9]), Some(vec![2; 9]));
        assert_eq!(replies.reply(TYPE_VERSION, b"v1".to_vec()), None);
    }

    #[test]
    fn test_refused_conversion_stops_writes() {
        let mut replies = Replies::new();
        assert!(!replies.accepts_writes());
        replies.requested();
        assert_eq!(replies.reply(TYPE_NAK, vec![]), None);
        assert!(!replies.accepts_writes());
        assert_eq!(replies.reply(TYPE_DATA, vec![3; 9]), None);

        // A new request starts over
        replies.requested();
        assert_eq!(replies.reply(TYPE_SET_MODE, vec![]), None);
        assert_eq!(replies.reply(TYPE_DATA, vec![4; 9]), Some(vec![4; 9]));
    }

    #[test]
    fn test_missing_port() {
        let mut transcoder = SerialTranscoder::new("/dev/does-not-exist", 460_800);
        assert!(transcoder.open().is_err());
        assert!(!transcoder.write(&[0; 9]));
        assert_eq!(transcoder.read(), None);
    }
}
