//! Analogue FM over USRP
//!
//! Every packet starts with a 32-byte header of big-endian u32 fields:
//! magic, sequence, memory, keyup, talkgroup, type, mpxid, reserved.
//! Voice packets follow it with 160 little-endian 16-bit samples; a
//! keyup of zero with no samples ends the transmission. Type 2 packets
//! carry a metadata TLV naming the talker.

use crate::error::ParseError;

pub const MAGIC: &[u8; 4] = b"USRP";
pub const HEADER_LEN: usize = 32;
pub const SAMPLES_PER_FRAME: usize = 160;
pub const AUDIO_LEN: usize = SAMPLES_PER_FRAME * 2;

pub const TYPE_VOICE: u32 = 0;
pub const TYPE_TEXT: u32 = 2;

const TLV_SET_INFO: u8 = 0x08;

/// A parsed USRP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Voice {
        seq: u32,
        samples: Vec<i16>,
    },
    End {
        seq: u32,
    },
    Metadata {
        seq: u32,
        callsign: String,
    },
}

fn header(seq: u32, keyup: bool, packet_type: u32) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(MAGIC);
    out[4..8].copy_from_slice(&seq.to_be_bytes());
    out[12..16].copy_from_slice(&u32::from(keyup).to_be_bytes());
    out[20..24].copy_from_slice(&packet_type.to_be_bytes());
    out
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

impl Packet {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 4)?;
        if &data[0..4] != MAGIC {
            return Err(ParseError::BadMagic(data[0..4].to_vec()));
        }
        ParseError::check_len(data, HEADER_LEN)?;

        let seq = read_u32(data, 4);
        let keyup = read_u32(data, 12) != 0;
        match read_u32(data, 20) {
            TYPE_VOICE if !keyup => Ok(Packet::End { seq }),
            TYPE_VOICE => {
                ParseError::check_len(data, HEADER_LEN + AUDIO_LEN)?;
                let samples = data[HEADER_LEN..HEADER_LEN + AUDIO_LEN]
                    .chunks_exact(2)
                    .map(|s| i16::from_le_bytes([s[0], s[1]]))
                    .collect();
                Ok(Packet::Voice { seq, samples })
            }
            TYPE_TEXT => {
                let tlv = &data[HEADER_LEN..];
                if tlv.first() != Some(&TLV_SET_INFO) || tlv.len() < 15 {
                    return Err(ParseError::InvalidFrame("USRP metadata TLV".into()));
                }
                let name = &tlv[14..];
                let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
                Ok(Packet::Metadata {
                    seq,
                    callsign: String::from_utf8_lossy(&name[..end]).trim().to_string(),
                })
            }
            other => Err(ParseError::InvalidFrame(format!("USRP type {other}"))),
        }
    }
}

/// Voice packet with exactly one frame of samples
pub fn build_voice(seq: u32, samples: &[i16; SAMPLES_PER_FRAME]) -> Vec<u8> {
    let mut out = header(seq, true, TYPE_VOICE).to_vec();
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Unkey packet ending the transmission
pub fn build_end(seq: u32) -> [u8; HEADER_LEN] {
    header(seq, false, TYPE_VOICE)
}

/// Metadata packet sent once at the start of a transmission
pub fn build_metadata(seq: u32, callsign: &str, dmr_id: u32, talkgroup: u32) -> Vec<u8> {
    let mut out = header(seq, false, TYPE_TEXT).to_vec();
    let mut tlv = vec![TLV_SET_INFO, 0];
    tlv.extend_from_slice(&dmr_id.to_be_bytes()[1..]);
    tlv.extend_from_slice(&[0; 4]);
    tlv.extend_from_slice(&talkgroup.to_be_bytes()[1..]);
    // Timeslot and colour code
    tlv.extend_from_slice(&[0, 0]);
    tlv.extend_from_slice(callsign.as_bytes());
    tlv.push(0);
    tlv[1] = (tlv.len() - 2) as u8;
    out.extend_from_slice(&tlv);
    out
}

/// Convert one frame of samples into the big-endian PCM block the transcoder takes
pub fn samples_to_pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

/// Convert a big-endian PCM block back into samples
pub fn pcm_to_samples(pcm: &[u8]) -> [i16; SAMPLES_PER_FRAME] {
    let mut samples = [0i16; SAMPLES_PER_FRAME];
    for (slot, pair) in samples.iter_mut().zip(pcm.chunks_exact(2)) {
        *slot = i16::from_be_bytes([pair[0], pair[1]]);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_roundtrip() {
        let mut samples = [0i16; SAMPLES_PER_FRAME];
        samples[0] = -2;
        samples[159] = 12345;
        let bytes = build_voice(7, &samples);
        assert_eq!(bytes.len(), HEADER_LEN + AUDIO_LEN);
        // Samples are little-endian on the wire
        assert_eq!(&bytes[32..34], &[0xFE, 0xFF]);
        match Packet::parse(&bytes).unwrap() {
            Packet::Voice { seq, samples: parsed } => {
                assert_eq!(seq, 7);
                assert_eq!(parsed, samples.to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_end() {
        assert_eq!(Packet::parse(&build_end(9)).unwrap(), Packet::End { seq: 9 });
    }

    #[test]
    fn test_metadata() {
        let bytes = build_metadata(1, "N0CALL", 1_234_567, 9);
        assert_eq!(bytes[32], 0x08);
        assert_eq!(
            Packet::parse(&bytes).unwrap(),
            Packet::Metadata {
                seq: 1,
                callsign: "N0CALL".into()
            }
        );
    }

    #[test]
    fn test_pcm_conversion() {
        let samples = [0x1234i16; SAMPLES_PER_FRAME];
        let pcm = samples_to_pcm(&samples);
        assert_eq!(&pcm[..2], &[0x12, 0x34]);
        assert_eq!(pcm_to_samples(&pcm), samples);
    }
}
