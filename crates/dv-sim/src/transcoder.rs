//! Virtual vocoder
//!
//! Stands in for the serial transcoder. Output blocks are built by cycling
//! the input bytes out to the output format's length, so a test can tell
//! which input block produced which output block.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dv_gateway::{GatewayError, Transcoder, TranscoderMode};
use tracing::debug;

/// Shared record of every conversion a [`VirtualTranscoder`] was asked for
#[derive(Debug, Clone, Default)]
pub struct ConversionLog(Arc<Mutex<Vec<(TranscoderMode, TranscoderMode)>>>);

impl ConversionLog {
    fn push(&self, input: TranscoderMode, output: TranscoderMode) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((input, output));
    }

    pub fn entries(&self) -> Vec<(TranscoderMode, TranscoderMode)> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Debug, Default)]
pub struct VirtualTranscoder {
    conversion: Option<(TranscoderMode, TranscoderMode)>,
    queue: VecDeque<Vec<u8>>,
    log: ConversionLog,
    open: bool,
}

impl VirtualTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcoder and a handle on the conversions it performs
    pub fn with_log() -> (Self, ConversionLog) {
        let transcoder = Self::default();
        let log = transcoder.log.clone();
        (transcoder, log)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Transcoder for VirtualTranscoder {
    fn open(&mut self) -> Result<(), GatewayError> {
        self.open = true;
        Ok(())
    }

    fn set_conversion(&mut self, input: TranscoderMode, output: TranscoderMode) -> bool {
        self.log.push(input, output);
        self.conversion = Some((input, output));
        self.queue.clear();
        true
    }

    fn write(&mut self, block: &[u8]) -> bool {
        let Some((input, output)) = self.conversion else {
            return false;
        };
        if block.len() != input.block_len() {
            debug!(
                "Virtual transcoder: {} byte block for {input:?}, expected {}",
                block.len(),
                input.block_len()
            );
            return false;
        }
        let converted = block.iter().copied().cycle().take(output.block_len()).collect();
        self.queue.push_back(converted);
        true
    }

    fn read(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    fn close(&mut self) {
        self.open = false;
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_output_length() {
        let (mut transcoder, log) = VirtualTranscoder::with_log();
        assert!(!transcoder.write(&[1; 9]));

        assert!(transcoder.set_conversion(TranscoderMode::DStar, TranscoderMode::Imbe));
        assert!(transcoder.write(&[1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert_eq!(
            transcoder.read(),
            Some(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 1, 2])
        );
        assert_eq!(transcoder.read(), None);
        assert_eq!(log.entries(), vec![(TranscoderMode::DStar, TranscoderMode::Imbe)]);
    }

    #[test]
    fn test_rejects_wrong_block_size() {
        let mut transcoder = VirtualTranscoder::new();
        transcoder.set_conversion(TranscoderMode::Pcm, TranscoderMode::Codec2_3200);
        assert!(!transcoder.write(&[0; 9]));
        assert!(transcoder.write(&[0; 320]));
        assert_eq!(transcoder.read().map(|b| b.len()), Some(8));
    }

    #[test]
    fn test_open_close() {
        let mut transcoder = VirtualTranscoder::new();
        transcoder.open().unwrap();
        assert!(transcoder.is_open());
        transcoder.close();
        assert!(!transcoder.is_open());
    }
}
